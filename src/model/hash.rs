//! Incremental MD5 with a serialisable internal state.
//!
//! Object rows store the hash state reached after digesting the whole
//! object, so that an append can resume hashing where the previous write
//! left off instead of re-reading every part. The off-the-shelf digest
//! crates keep their compression state private, which rules them out here;
//! this is a plain RFC 1321 implementation whose state round-trips through
//! a byte buffer. Tests cross-check every digest against the `md-5` crate.

use omnio_util::error::Error;

const INIT_STATE: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

#[rustfmt::skip]
const K: [u32; 64] = [
	0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee,
	0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
	0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be,
	0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
	0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa,
	0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
	0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed,
	0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
	0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c,
	0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
	0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05,
	0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
	0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039,
	0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
	0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1,
	0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

#[rustfmt::skip]
const S: [u32; 64] = [
	7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
	5,  9, 14, 20, 5,  9, 14, 20, 5,  9, 14, 20, 5,  9, 14, 20,
	4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
	6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// An incremental MD5 hasher
#[derive(Clone)]
pub struct Md5State {
	state: [u32; 4],
	// total number of bytes fed so far; the buffer holds the last
	// (len % 64) of them, waiting for a full block
	len: u64,
	buf: [u8; 64],
}

impl Default for Md5State {
	fn default() -> Self {
		Self::new()
	}
}

impl Md5State {
	pub fn new() -> Self {
		Md5State {
			state: INIT_STATE,
			len: 0,
			buf: [0u8; 64],
		}
	}

	/// Rebuild a hasher from bytes previously returned by `state_bytes`
	pub fn from_state(bytes: &[u8]) -> Result<Self, Error> {
		if bytes.len() < 24 {
			return Err(Error::invalid_input("truncated MD5 state"));
		}
		let mut state = [0u32; 4];
		for (i, s) in state.iter_mut().enumerate() {
			let mut w = [0u8; 4];
			w.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
			*s = u32::from_le_bytes(w);
		}
		let mut len_bytes = [0u8; 8];
		len_bytes.copy_from_slice(&bytes[16..24]);
		let len = u64::from_le_bytes(len_bytes);

		let tail = &bytes[24..];
		if tail.len() != (len % 64) as usize {
			return Err(Error::invalid_input("inconsistent MD5 state length"));
		}
		let mut buf = [0u8; 64];
		buf[..tail.len()].copy_from_slice(tail);

		Ok(Md5State { state, len, buf })
	}

	/// Serialize the current state: chaining words, total length, and the
	/// unprocessed tail of the last block
	pub fn state_bytes(&self) -> Vec<u8> {
		let fill = (self.len % 64) as usize;
		let mut out = Vec::with_capacity(24 + fill);
		for s in self.state.iter() {
			out.extend_from_slice(&s.to_le_bytes());
		}
		out.extend_from_slice(&self.len.to_le_bytes());
		out.extend_from_slice(&self.buf[..fill]);
		out
	}

	pub fn update(&mut self, mut data: &[u8]) {
		let mut fill = (self.len % 64) as usize;
		self.len += data.len() as u64;

		if fill > 0 {
			let take = std::cmp::min(64 - fill, data.len());
			self.buf[fill..fill + take].copy_from_slice(&data[..take]);
			data = &data[take..];
			fill += take;
			if fill == 64 {
				let block = self.buf;
				compress(&mut self.state, &block);
			} else {
				return;
			}
		}

		while data.len() >= 64 {
			let mut block = [0u8; 64];
			block.copy_from_slice(&data[..64]);
			compress(&mut self.state, &block);
			data = &data[64..];
		}

		self.buf[..data.len()].copy_from_slice(data);
	}

	/// Finish the hash without consuming the hasher: returns the lowercase
	/// hex digest and the resumable pre-finalisation state
	pub fn digest(&self) -> (String, Vec<u8>) {
		let state_bytes = self.state_bytes();

		let mut this = self.clone();
		let bit_len = this.len.wrapping_mul(8);
		this.update(&[0x80]);
		while this.len % 64 != 56 {
			this.update(&[0]);
		}
		this.update(&bit_len.to_le_bytes());

		let mut out = [0u8; 16];
		for (i, s) in this.state.iter().enumerate() {
			out[i * 4..i * 4 + 4].copy_from_slice(&s.to_le_bytes());
		}
		(hex::encode(out), state_bytes)
	}
}

fn compress(state: &mut [u32; 4], block: &[u8; 64]) {
	let mut m = [0u32; 16];
	for (i, w) in m.iter_mut().enumerate() {
		let mut word = [0u8; 4];
		word.copy_from_slice(&block[i * 4..i * 4 + 4]);
		*w = u32::from_le_bytes(word);
	}

	let (mut a, mut b, mut c, mut d) = (state[0], state[1], state[2], state[3]);

	for i in 0..64 {
		let (f, g) = match i / 16 {
			0 => ((b & c) | (!b & d), i),
			1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
			2 => (b ^ c ^ d, (3 * i + 5) % 16),
			_ => (c ^ (b | !d), (7 * i) % 16),
		};
		let tmp = d;
		d = c;
		c = b;
		b = b.wrapping_add(
			a.wrapping_add(f)
				.wrapping_add(K[i])
				.wrapping_add(m[g])
				.rotate_left(S[i]),
		);
		a = tmp;
	}

	state[0] = state[0].wrapping_add(a);
	state[1] = state[1].wrapping_add(b);
	state[2] = state[2].wrapping_add(c);
	state[3] = state[3].wrapping_add(d);
}
