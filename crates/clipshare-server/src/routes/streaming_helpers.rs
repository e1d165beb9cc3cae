//! Shared streaming helpers: range parsing, content-type guessing, and
//! chunked file serving via `ReaderStream`.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read size for streamed bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// A single byte range as written in a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=a-b` or, with `None`, `bytes=a-`.
    From { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

/// What to send for a request against a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Whole file with `200`.
    Full,
    /// Inclusive `[start, end]` with `206`.
    Partial { start: u64, end: u64 },
    /// Nothing overlaps the file; `416`.
    Unsatisfiable,
}

/// Parse a single-range `Range: bytes=...` header value.
///
/// Returns `None` for anything malformed and for multi-range requests, both
/// of which are answered with the full file.
pub fn parse_range_header(value: &str) -> Option<RangeSpec> {
    let bytes_prefix = value.trim().strip_prefix("bytes=")?;
    if bytes_prefix.contains(',') {
        return None;
    }
    let (start_str, end_str) = bytes_prefix.split_once('-')?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    if start_str.is_empty() {
        return Some(RangeSpec::Suffix(end_str.parse().ok()?));
    }

    let start: u64 = start_str.parse().ok()?;
    let end: Option<u64> = if end_str.is_empty() {
        None
    } else {
        let end: u64 = end_str.parse().ok()?;
        if end < start {
            return None;
        }
        Some(end)
    };

    Some(RangeSpec::From { start, end })
}

/// Decide which bytes of a `file_size`-byte file a `Range` header selects.
pub fn resolve_range(range_header: Option<&str>, file_size: u64) -> ByteRange {
    let Some(spec) = range_header.and_then(parse_range_header) else {
        return ByteRange::Full;
    };

    match spec {
        RangeSpec::From { start, .. } if start >= file_size => ByteRange::Unsatisfiable,
        RangeSpec::From { start, end } => ByteRange::Partial {
            start,
            end: end.unwrap_or(u64::MAX).min(file_size - 1),
        },
        RangeSpec::Suffix(0) => ByteRange::Unsatisfiable,
        RangeSpec::Suffix(_) if file_size == 0 => ByteRange::Unsatisfiable,
        RangeSpec::Suffix(n) => ByteRange::Partial {
            start: file_size.saturating_sub(n),
            end: file_size - 1,
        },
    }
}

/// Guess the MIME type from the file extension.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "ts" => "video/mp2t",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Options for [`serve_file_streaming`].
#[derive(Debug, Default)]
pub struct ServeOptions<'a> {
    /// Raw `Range` header, if the client sent one.
    pub range_header: Option<&'a str>,
    /// Send headers only.
    pub head_only: bool,
    /// Extra headers added to every successful response.
    pub extra_headers: Vec<(header::HeaderName, HeaderValue)>,
}

/// Serve a file using chunked streaming via `ReaderStream`.
///
/// The file is opened before anything else so the handle stays valid even
/// if the path is unlinked while the body is still being sent. Reads are done
/// in 64KB chunks so memory stays bounded regardless of file size.
pub async fn serve_file_streaming(
    file_path: &Path,
    opts: ServeOptions<'_>,
) -> Result<Response, clipshare_core::Error> {
    let mut file = tokio::fs::File::open(file_path)
        .await
        .map_err(|_| clipshare_core::Error::not_found("file", file_path.display()))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|_| clipshare_core::Error::not_found("file", file_path.display()))?;

    let file_size = metadata.len();
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let content_type = guess_content_type(&file_name);

    let (status, start, length) = match resolve_range(opts.range_header, file_size) {
        ByteRange::Unsatisfiable => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty())
                .map_err(|e| clipshare_core::Error::Internal(format!("response build failed: {e}")));
        }
        ByteRange::Full => (StatusCode::OK, 0, file_size),
        ByteRange::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes");
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{}/{file_size}", start + length - 1),
        );
    }
    for (name, value) in opts.extra_headers {
        builder = builder.header(name, value);
    }

    let body = if opts.head_only {
        Body::empty()
    } else {
        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| clipshare_core::Error::Internal(format!("Seek failed: {e}")))?;
        }
        // Wrap in a Take to limit reads to exactly `length` bytes.
        let limited = file.take(length);
        Body::from_stream(ReaderStream::with_capacity(limited, CHUNK_SIZE))
    };

    builder
        .body(body)
        .map_err(|e| clipshare_core::Error::Internal(format!("response build failed: {e}")))
}
