mod common;

use common::*;

use std::sync::Arc;
use std::time::Duration;

use omnio::{Error, OpenMode, ReadOpts, WriteOpts};

#[tokio::test]
async fn test_exclusive_create_race() {
	let ctx = context().await;

	let wx = WriteOpts {
		flag: OpenMode::WriteExclusive,
		..Default::default()
	};
	let (r1, r2) = tokio::join!(
		ctx.engine.put_object("x", "payload-one", wx.clone()),
		ctx.engine.put_object("x", "payload-two", wx),
	);

	// exactly one winner
	let winner = match (r1, r2) {
		(Ok(_), Err(Error::ObjectExists(_))) => b"payload-one".to_vec(),
		(Err(Error::ObjectExists(_)), Ok(_)) => b"payload-two".to_vec(),
		(r1, r2) => panic!("unexpected outcome: {:?} / {:?}", r1.map(|i| i.checksum), r2.map(|i| i.checksum)),
	};

	let file = ctx.engine.get_object("x", &ReadOpts::default()).await.unwrap();
	assert_eq!(&file.bytes()[..], &winner[..]);
	assert_eq!(ctx.entity_count(), 1);
}

#[tokio::test]
async fn test_append_compare_and_set_race() {
	let ctx = context().await;

	ctx.engine
		.put_object("cas.txt", "base", WriteOpts::default())
		.await
		.unwrap();
	let checksum = ctx
		.engine
		.stat_object("cas.txt", &ReadOpts::default())
		.await
		.unwrap()
		.checksum;

	let append = WriteOpts {
		flag: OpenMode::Append,
		expect_checksum: Some(checksum),
		..Default::default()
	};
	let (r1, r2) = tokio::join!(
		ctx.engine.put_object("cas.txt", "-one", append.clone()),
		ctx.engine.put_object("cas.txt", "-two", append),
	);

	let winner: &[u8] = match (&r1, &r2) {
		(Ok(_), Err(Error::PreconditionFailed(_, _))) => b"base-one",
		(Err(Error::PreconditionFailed(_, _)), Ok(_)) => b"base-two",
		_ => panic!("unexpected outcome: {:?} / {:?}", r1.is_ok(), r2.is_ok()),
	};

	// readback reflects the winning append alone
	let file = ctx
		.engine
		.get_object("cas.txt", &ReadOpts::default())
		.await
		.unwrap();
	assert_eq!(&file.bytes()[..], winner);
	assert_eq!(file.checksum(), md5_hex(winner));
}

#[tokio::test]
async fn test_abort_rolls_back() {
	let ctx = context().await;

	let mut stream = ctx
		.engine
		.open_write("y", WriteOpts::default())
		.await
		.unwrap();
	let entity = stream.entity_id();
	stream.write(&random_bytes(1_000_000)).await.unwrap();
	stream.abort().await.unwrap();

	let res = ctx.engine.get_object("y", &ReadOpts::default()).await;
	assert!(matches!(res, Err(Error::ObjectNotFound(_))));
	assert!(!ctx.entity_dir(&entity).exists());
	assert_eq!(ctx.entity_count(), 0);
}

#[tokio::test]
async fn test_abort_keeps_previous_object() {
	let ctx = context().await;

	ctx.engine
		.put_object("z.txt", "before", WriteOpts::default())
		.await
		.unwrap();

	let mut stream = ctx
		.engine
		.open_write("z.txt", WriteOpts::default())
		.await
		.unwrap();
	stream.write(b"after").await.unwrap();
	stream.abort().await.unwrap();

	let file = ctx
		.engine
		.get_object("z.txt", &ReadOpts::default())
		.await
		.unwrap();
	assert_eq!(&file.bytes()[..], b"before");
}

#[tokio::test]
async fn test_checksum_tamper_detection() {
	let ctx = context().await;

	let data = random_bytes(PART_SIZE as usize + 1000);
	ctx.engine
		.put_object("victim.bin", data, WriteOpts::default())
		.await
		.unwrap();
	let meta = ctx
		.engine
		.stat_object("victim.bin", &ReadOpts::default())
		.await
		.unwrap();
	assert_eq!(meta.num_parts, 2);

	// corrupt one byte of part "2" out-of-band
	let part_path = ctx.entity_dir(&meta.entity_id).join("2");
	let mut part = std::fs::read(&part_path).unwrap();
	part[0] ^= 0xff;
	std::fs::write(&part_path, &part).unwrap();

	let res = ctx.engine.get_object("victim.bin", &ReadOpts::default()).await;
	assert!(matches!(res, Err(Error::ChecksumMismatch(_, _))));
}

#[tokio::test]
async fn test_missing_part_detection() {
	let ctx = context().await;

	let data = random_bytes(PART_SIZE as usize + 1000);
	ctx.engine
		.put_object("victim.bin", data, WriteOpts::default())
		.await
		.unwrap();
	let meta = ctx
		.engine
		.stat_object("victim.bin", &ReadOpts::default())
		.await
		.unwrap();

	std::fs::remove_file(ctx.entity_dir(&meta.entity_id).join("2")).unwrap();

	let res = ctx.engine.get_object("victim.bin", &ReadOpts::default()).await;
	assert!(matches!(res, Err(Error::EntityNotFound(_, 2))));
}

#[tokio::test]
async fn test_concurrent_readers() {
	let ctx = context().await;

	let data = random_bytes(100_000);
	ctx.engine
		.put_object("shared.bin", data.clone(), WriteOpts::default())
		.await
		.unwrap();

	let opts_a = ReadOpts::default();
	let opts_b = ReadOpts::default();
	let (a, b) = tokio::join!(
		ctx.engine.get_object("shared.bin", &opts_a),
		ctx.engine.get_object("shared.bin", &opts_b),
	);
	assert_eq!(&a.unwrap().bytes()[..], &data[..]);
	assert_eq!(&b.unwrap().bytes()[..], &data[..]);
}

#[tokio::test]
async fn test_operations_fail_after_close() {
	let ctx = context().await;

	ctx.engine
		.put_object("x.txt", "x", WriteOpts::default())
		.await
		.unwrap();
	ctx.engine.close().await.unwrap();
	assert!(ctx.engine.closed());

	assert!(matches!(
		ctx.engine.put_object("y.txt", "y", WriteOpts::default()).await,
		Err(Error::EngineClosed)
	));
	assert!(matches!(
		ctx.engine.get_object("x.txt", &ReadOpts::default()).await,
		Err(Error::EngineClosed)
	));
	assert!(matches!(
		ctx.engine.delete_object("x.txt").await,
		Err(Error::EngineClosed)
	));
	assert!(matches!(
		ctx.engine.list_objects("", &Default::default()).await,
		Err(Error::EngineClosed)
	));
	// closing twice reports the same
	assert!(matches!(ctx.engine.close().await, Err(Error::EngineClosed)));
}

#[tokio::test]
async fn test_close_waits_for_open_streams() {
	let ctx = context().await;
	let engine = Arc::new(ctx.engine);

	let mut stream = engine
		.open_write("slow.bin", WriteOpts::default())
		.await
		.unwrap();
	stream.write(b"data").await.unwrap();

	let closer = {
		let engine = engine.clone();
		tokio::spawn(async move { engine.close().await })
	};

	// the close must cooperate with the in-flight stream, not revoke it
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(!closer.is_finished());

	stream.close().await.unwrap();
	closer.await.unwrap().unwrap();

	// the committed write survived the shutdown
	assert!(engine.closed());
}

#[tokio::test]
async fn test_reopen_preserves_objects() {
	let ctx = context().await;

	let data = random_bytes(10_000);
	ctx.engine
		.put_object("durable.bin", data.clone(), WriteOpts::default())
		.await
		.unwrap();
	ctx.engine.close().await.unwrap();

	// a fresh engine on the same bucket re-runs migrations as no-ops and
	// sees the previous objects
	let config = omnio::Config {
		root_dir: ctx.root.clone(),
		bucket_name: BUCKET.to_string(),
		part_size: PART_SIZE,
		allow_bucket_dots: false,
		max_description_size: 8 * 1024,
		max_user_metadata_size: 8 * 1024,
	};
	let engine = omnio::Engine::open(config).await.unwrap();
	let file = engine
		.get_object("durable.bin", &ReadOpts::default())
		.await
		.unwrap();
	assert_eq!(&file.bytes()[..], &data[..]);
	engine.close().await.unwrap();
}
