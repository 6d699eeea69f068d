//! Range-capable, optionally-gzipped artifact streaming.

use std::path::Path;

use async_compression::tokio::bufread::GzipEncoder;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio_util::io::ReaderStream;

/// A single, fully-resolved byte range (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a single `Range: bytes=START-[END]` header value against a known
/// file size. Multi-range requests (containing a comma) and suffix ranges
/// (`bytes=-N`) are rejected, matching this service's documented behavior.
pub fn parse_range(header_value: &str, file_size: u64) -> Result<ByteRange, ()> {
    let spec = header_value.strip_prefix("bytes=").ok_or(())?;
    if spec.contains(',') {
        return Err(());
    }
    let (start_str, end_str) = spec.split_once('-').ok_or(())?;
    if start_str.is_empty() {
        return Err(());
    }
    let start: u64 = start_str.parse().map_err(|_| ())?;
    let end: u64 = if end_str.is_empty() {
        file_size.saturating_sub(1)
    } else {
        end_str.parse().map_err(|_| ())?
    };

    if file_size == 0 || start >= file_size || start > end {
        return Err(());
    }
    Ok(ByteRange {
        start,
        end: end.min(file_size.saturating_sub(1)),
    })
}

/// Serve `path` as an attachment named `export_<id>.csv[.gz]`, honoring an
/// optional `Range` header and gzip-on-the-fly when the client advertises
/// `Accept-Encoding: gzip`.
pub async fn serve_file(
    path: &Path,
    export_id: &str,
    range_header: Option<&str>,
    accept_gzip: bool,
) -> std::io::Result<Response> {
    let metadata = tokio::fs::metadata(path).await?;
    let file_size = metadata.len();

    let range = match range_header {
        Some(value) => match parse_range(value, file_size) {
            Ok(range) => Some(range),
            Err(()) => {
                let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                response.headers_mut().insert(
                    header::CONTENT_RANGE,
                    HeaderValue::from_str(&format!("bytes */{file_size}")).unwrap(),
                );
                return Ok(response);
            }
        },
        None => None,
    };

    let extension = if accept_gzip { ".csv.gz" } else { ".csv" };
    let disposition = format!("attachment; filename=\"export_{export_id}{extension}\"");

    let mut file = tokio::fs::File::open(path).await?;
    let body_len = match range {
        Some(range) => {
            file.seek(SeekFrom::Start(range.start)).await?;
            Some(range.len())
        }
        None => Some(file_size),
    };

    let mut response = if accept_gzip {
        let reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match range {
            Some(range) => Box::new(file.take(range.len())),
            None => Box::new(file),
        };
        let encoder = GzipEncoder::new(BufReader::new(reader));
        Body::from_stream(ReaderStream::new(encoder)).into_response()
    } else {
        match range {
            Some(range) => Body::from_stream(ReaderStream::new(file.take(range.len()))).into_response(),
            None => Body::from_stream(ReaderStream::new(file)).into_response(),
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).unwrap(),
    );

    if accept_gzip {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    } else if let Some(len) = body_len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_str(&len.to_string()).unwrap());
    }

    if let Some(range) = range {
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, range.end, file_size)).unwrap(),
        );
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_range_within_bounds() {
        let range = parse_range("bytes=2-4", 10).unwrap();
        assert_eq!(range, ByteRange { start: 2, end: 4 });
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn open_ended_range_extends_to_file_size() {
        let range = parse_range("bytes=0-", 10).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 9 });
    }

    #[test]
    fn start_beyond_file_size_is_unsatisfiable() {
        assert!(parse_range("bytes=10-", 10).is_err());
    }

    #[test]
    fn start_after_end_is_unsatisfiable() {
        assert!(parse_range("bytes=5-2", 10).is_err());
    }

    #[test]
    fn multi_range_is_rejected() {
        assert!(parse_range("bytes=0-1,3-4", 10).is_err());
    }

    #[test]
    fn suffix_range_is_rejected() {
        assert!(parse_range("bytes=-5", 10).is_err());
    }

    #[test]
    fn malformed_unit_is_rejected() {
        assert!(parse_range("chunks=0-1", 10).is_err());
    }
}
