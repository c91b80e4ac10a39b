//! Closed set of accepted MIME types and extension-based defaulting

/// MIME type used when the object path extension is unknown
pub const DEFAULT_MIME: &str = "application/octet-stream";

// Sorted, so that membership checks can use binary search
#[rustfmt::skip]
static MIME_TYPES: &[&str] = &[
	"application/epub+zip",
	"application/gzip",
	"application/java-archive",
	"application/json",
	"application/ld+json",
	"application/msword",
	"application/octet-stream",
	"application/ogg",
	"application/pdf",
	"application/rtf",
	"application/vnd.amazon.ebook",
	"application/vnd.apple.installer+xml",
	"application/vnd.ms-excel",
	"application/vnd.ms-fontobject",
	"application/vnd.ms-powerpoint",
	"application/vnd.oasis.opendocument.presentation",
	"application/vnd.oasis.opendocument.spreadsheet",
	"application/vnd.oasis.opendocument.text",
	"application/vnd.openxmlformats-officedocument.presentationml.presentation",
	"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
	"application/vnd.openxmlformats-officedocument.wordprocessingml.document",
	"application/vnd.rar",
	"application/vnd.visio",
	"application/wasm",
	"application/x-7z-compressed",
	"application/x-abiword",
	"application/x-bzip",
	"application/x-bzip2",
	"application/x-cdf",
	"application/x-csh",
	"application/x-freearc",
	"application/x-httpd-php",
	"application/x-ndjson",
	"application/x-sh",
	"application/x-shockwave-flash",
	"application/x-tar",
	"application/xhtml+xml",
	"application/xml",
	"application/yaml",
	"application/zip",
	"audio/3gpp",
	"audio/3gpp2",
	"audio/aac",
	"audio/flac",
	"audio/midi",
	"audio/mpeg",
	"audio/ogg",
	"audio/opus",
	"audio/wav",
	"audio/webm",
	"font/otf",
	"font/ttf",
	"font/woff",
	"font/woff2",
	"image/apng",
	"image/avif",
	"image/bmp",
	"image/gif",
	"image/heic",
	"image/heif",
	"image/jpeg",
	"image/png",
	"image/svg+xml",
	"image/tiff",
	"image/vnd.microsoft.icon",
	"image/webp",
	"model/gltf+json",
	"model/gltf-binary",
	"text/calendar",
	"text/css",
	"text/csv",
	"text/html",
	"text/javascript",
	"text/markdown",
	"text/plain",
	"text/tab-separated-values",
	"video/3gpp",
	"video/3gpp2",
	"video/mp2t",
	"video/mp4",
	"video/mpeg",
	"video/ogg",
	"video/webm",
	"video/x-msvideo",
];

// Sorted by extension
#[rustfmt::skip]
static EXT_TO_MIME: &[(&str, &str)] = &[
	("3g2", "video/3gpp2"),
	("3gp", "video/3gpp"),
	("7z", "application/x-7z-compressed"),
	("aac", "audio/aac"),
	("abw", "application/x-abiword"),
	("apng", "image/apng"),
	("arc", "application/x-freearc"),
	("avi", "video/x-msvideo"),
	("avif", "image/avif"),
	("azw", "application/vnd.amazon.ebook"),
	("bin", "application/octet-stream"),
	("bmp", "image/bmp"),
	("bz", "application/x-bzip"),
	("bz2", "application/x-bzip2"),
	("cda", "application/x-cdf"),
	("csh", "application/x-csh"),
	("css", "text/css"),
	("csv", "text/csv"),
	("doc", "application/msword"),
	("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
	("eot", "application/vnd.ms-fontobject"),
	("epub", "application/epub+zip"),
	("flac", "audio/flac"),
	("gif", "image/gif"),
	("glb", "model/gltf-binary"),
	("gltf", "model/gltf+json"),
	("gz", "application/gzip"),
	("heic", "image/heic"),
	("heif", "image/heif"),
	("htm", "text/html"),
	("html", "text/html"),
	("ico", "image/vnd.microsoft.icon"),
	("ics", "text/calendar"),
	("jar", "application/java-archive"),
	("jpeg", "image/jpeg"),
	("jpg", "image/jpeg"),
	("js", "text/javascript"),
	("json", "application/json"),
	("jsonld", "application/ld+json"),
	("md", "text/markdown"),
	("mid", "audio/midi"),
	("midi", "audio/midi"),
	("mjs", "text/javascript"),
	("mp3", "audio/mpeg"),
	("mp4", "video/mp4"),
	("mpeg", "video/mpeg"),
	("mpkg", "application/vnd.apple.installer+xml"),
	("ndjson", "application/x-ndjson"),
	("odp", "application/vnd.oasis.opendocument.presentation"),
	("ods", "application/vnd.oasis.opendocument.spreadsheet"),
	("odt", "application/vnd.oasis.opendocument.text"),
	("oga", "audio/ogg"),
	("ogg", "application/ogg"),
	("ogv", "video/ogg"),
	("ogx", "application/ogg"),
	("opus", "audio/opus"),
	("otf", "font/otf"),
	("pdf", "application/pdf"),
	("php", "application/x-httpd-php"),
	("png", "image/png"),
	("ppt", "application/vnd.ms-powerpoint"),
	("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
	("rar", "application/vnd.rar"),
	("rtf", "application/rtf"),
	("sh", "application/x-sh"),
	("svg", "image/svg+xml"),
	("swf", "application/x-shockwave-flash"),
	("tar", "application/x-tar"),
	("tif", "image/tiff"),
	("tiff", "image/tiff"),
	("ts", "video/mp2t"),
	("tsv", "text/tab-separated-values"),
	("ttf", "font/ttf"),
	("txt", "text/plain"),
	("vsd", "application/vnd.visio"),
	("wasm", "application/wasm"),
	("wav", "audio/wav"),
	("weba", "audio/webm"),
	("webm", "video/webm"),
	("webp", "image/webp"),
	("woff", "font/woff"),
	("woff2", "font/woff2"),
	("xhtml", "application/xhtml+xml"),
	("xls", "application/vnd.ms-excel"),
	("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
	("xml", "application/xml"),
	("yaml", "application/yaml"),
	("yml", "application/yaml"),
	("zip", "application/zip"),
];

/// Whether the given MIME type is part of the accepted set
pub fn is_valid(mime: &str) -> bool {
	MIME_TYPES.binary_search(&mime).is_ok()
}

/// Default MIME type for an object path, from its extension
pub fn from_path(path: &str) -> &'static str {
	let name = path.rsplit('/').next().unwrap_or(path);
	let ext = match name.rsplit_once('.') {
		Some((stem, ext)) if !stem.is_empty() => ext,
		_ => return DEFAULT_MIME,
	};
	let ext = ext.to_ascii_lowercase();
	match EXT_TO_MIME.binary_search_by(|(e, _)| e.cmp(&ext.as_str())) {
		Ok(i) => EXT_TO_MIME[i].1,
		Err(_) => DEFAULT_MIME,
	}
}
