//! Capability probing.
//!
//! Determines whether a remote resource supports byte ranges and what
//! its total length is, without ever failing: absence of information is
//! itself a valid result that forces the single-stream path.

use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use segload_core::download::CapabilityInfo;

/// Probe a URL for range support and total length.
///
/// Issues a metadata-only HEAD request first; if that fails or yields
/// no usable length, issues a zero-length range probe (`bytes=0-0`) and
/// inspects the response for a partial-content status or an explicit
/// `Accept-Ranges` header, recovering the total length from
/// `Content-Range`, else from `Content-Length`.
pub async fn probe(client: &Client, url: &str) -> CapabilityInfo {
    let mut total_bytes: Option<u64> = None;
    let mut supports_ranges = false;

    match client.head(url).send().await {
        Ok(resp) if resp.status().is_success() => {
            total_bytes = header_u64(resp.headers(), CONTENT_LENGTH);
            supports_ranges = accepts_byte_ranges(resp.headers());
        }
        Ok(resp) => {
            tracing::debug!(url, status = %resp.status(), "HEAD probe rejected");
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "HEAD probe failed");
        }
    }

    if total_bytes.is_none() || !supports_ranges {
        if let Ok(resp) = client.get(url).header(RANGE, "bytes=0-0").send().await {
            let status = resp.status();
            if status == StatusCode::PARTIAL_CONTENT {
                supports_ranges = true;
            } else if !supports_ranges {
                supports_ranges = accepts_byte_ranges(resp.headers());
            }

            if total_bytes.is_none() {
                total_bytes = resp
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_content_range_total);
            }
            // A 206 body is the probe byte itself, so its Content-Length
            // says nothing about the full resource.
            if total_bytes.is_none() && status != StatusCode::PARTIAL_CONTENT {
                total_bytes = header_u64(resp.headers(), CONTENT_LENGTH);
            }
        } else {
            tracing::debug!(url, "Range probe failed");
        }
    }

    tracing::debug!(url, ?total_bytes, supports_ranges, "Capability probe done");

    CapabilityInfo {
        total_bytes,
        supports_ranges,
    }
}

fn accepts_byte_ranges(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("bytes"))
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

/// Extract the total from a `Content-Range` value like `bytes 0-0/12345`.
///
/// Returns `None` for the unknown-length form `bytes 0-0/*`.
fn parse_content_range_total(header_value: &str) -> Option<u64> {
    header_value
        .split('/')
        .next_back()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_parses() {
        assert_eq!(parse_content_range_total("bytes 0-0/12345"), Some(12_345));
        assert_eq!(parse_content_range_total("bytes 0-499/500"), Some(500));
    }

    #[test]
    fn content_range_unknown_total_is_none() {
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn accept_ranges_detection() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert!(!accepts_byte_ranges(&headers));
        headers.insert(ACCEPT_RANGES, "none".parse().unwrap());
        assert!(!accepts_byte_ranges(&headers));
        headers.insert(ACCEPT_RANGES, "Bytes".parse().unwrap());
        assert!(accepts_byte_ranges(&headers));
    }
}
