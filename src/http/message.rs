//! HTTP/1.1 request framing — a two-phase parser over a growing byte buffer.
//!
//! # Phases
//! 1. **Headers** — scan for the `CRLF CRLF` terminator.  Absent →
//!    [`Parse::Incomplete`], the caller reads more bytes.  Present → parse
//!    the start line (`method SP uri SP version CRLF`) and up to
//!    [`MAX_HEADERS`] `key: value` lines.
//! 2. **Body** — a non-zero `Content-Length` (case-sensitive literal match)
//!    requires `header_len + content_length` bytes in the buffer; short →
//!    [`Parse::NeedBody`] with the total the caller must accumulate.
//!
//! A malformed start line or header line is an error, never a "read more"
//! signal: the connection handler replies with an error without ever seeing
//! the half-parsed message.
//!
//! # Borrowing
//! [`HttpMessage`] borrows every field from the request buffer, so no bytes
//! are copied during parsing.  Handlers copy what they need to outlive the
//! buffer (an `img_id`, an image body).

use crate::error::{ImgfsError, Result};

/// Line terminator within the header section.
pub const LINE_DELIM: &str = "\r\n";
/// Terminator of the whole header section.
pub const HDR_END_DELIM: &str = "\r\n\r\n";
/// Parsing stops after this many header lines.
pub const MAX_HEADERS: usize = 32;

// ── Parsed message ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpHeader<'a> {
    pub key:   &'a str,
    pub value: &'a str,
}

/// One parsed request, borrowing from the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage<'a> {
    pub method:  &'a str,
    pub uri:     &'a str,
    pub headers: Vec<HttpHeader<'a>>,
    pub body:    &'a [u8],
}

impl HttpMessage<'_> {
    /// Serialize back to wire form (`HTTP/1.1`, headers as stored, body
    /// appended verbatim).  The inverse of [`parse`] for well-formed input.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.uri.as_bytes());
        out.extend_from_slice(b" HTTP/1.1");
        out.extend_from_slice(LINE_DELIM.as_bytes());
        for h in &self.headers {
            out.extend_from_slice(h.key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(h.value.as_bytes());
            out.extend_from_slice(LINE_DELIM.as_bytes());
        }
        out.extend_from_slice(LINE_DELIM.as_bytes());
        out.extend_from_slice(self.body);
        out
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

/// Outcome of one [`parse`] attempt.
#[derive(Debug)]
pub enum Parse<'a> {
    /// The header terminator is not in the buffer yet.
    Incomplete,
    /// Headers parsed; the buffer must grow to `total` bytes before the
    /// body is complete.
    NeedBody { total: usize },
    /// Fully parsed.
    Done(HttpMessage<'a>),
}

/// Parse one request from the bytes received so far.
///
/// Returns `InvalidArgument` for anything structurally malformed: a bad
/// start line, a header line without `": "`, too many headers, or an
/// unparsable `Content-Length` value.
pub fn parse(buf: &[u8]) -> Result<Parse<'_>> {
    let header_len = match find(buf, HDR_END_DELIM.as_bytes()) {
        Some(pos) => pos + HDR_END_DELIM.len(),
        None => return Ok(Parse::Incomplete),
    };

    let head = std::str::from_utf8(&buf[..header_len])
        .map_err(|_| ImgfsError::InvalidArgument)?;
    let mut lines = head.split(LINE_DELIM);

    // Start line: method SP uri SP version.
    let start = lines.next().ok_or(ImgfsError::InvalidArgument)?;
    let mut parts = start.split(' ');
    let method  = parts.next().filter(|m| !m.is_empty()).ok_or(ImgfsError::InvalidArgument)?;
    let uri     = parts.next().filter(|u| !u.is_empty()).ok_or(ImgfsError::InvalidArgument)?;
    let version = parts.next().ok_or(ImgfsError::InvalidArgument)?;
    if !version.starts_with("HTTP/") || parts.next().is_some() {
        return Err(ImgfsError::InvalidArgument);
    }

    // Header lines up to the blank one before the terminator.
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(ImgfsError::InvalidArgument);
        }
        let (key, value) = line.split_once(": ").ok_or(ImgfsError::InvalidArgument)?;
        headers.push(HttpHeader { key, value });
    }

    // Case-sensitive literal match, as the wire format prescribes it here.
    let content_length = match headers.iter().find(|h| h.key == "Content-Length") {
        Some(h) => h.value.parse::<usize>().map_err(|_| ImgfsError::InvalidArgument)?,
        None => 0,
    };

    let total = header_len + content_length;
    if buf.len() < total {
        return Ok(Parse::NeedBody { total });
    }

    Ok(Parse::Done(HttpMessage {
        method,
        uri,
        headers,
        body: &buf[header_len..total],
    }))
}

/// First occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── URI query variables ──────────────────────────────────────────────────────

/// Extract the value of `name=` from the query part of a URI.
///
/// The match is anchored: the parameter name must directly follow `?` or
/// `&`, and the value runs to the next `&` or the end of the string.
/// Returns `None` when the URI has no query or the parameter is absent.
pub fn get_var<'a>(uri: &'a str, name: &str) -> Option<&'a str> {
    let query_at = uri.find('?')?;
    let query = &uri[query_at..];
    let pat = format!("{name}=");

    for (idx, _) in query.match_indices(&pat) {
        // idx == 1 ⇔ directly after the '?'.
        if idx == 1 || query.as_bytes()[idx - 1] == b'&' {
            let start = idx + pat.len();
            let end = query[start..].find('&').map_or(query.len(), |e| start + e);
            return Some(&query[start..end]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_LIST: &[u8] = b"GET /imgfs/list HTTP/1.1\r\nHost: localhost:8000\r\n\r\n";

    #[test]
    fn parses_a_body_less_request() {
        let msg = match parse(GET_LIST).unwrap() {
            Parse::Done(m) => m,
            other => panic!("expected Done, got {other:?}"),
        };
        assert_eq!(msg.method, "GET");
        assert_eq!(msg.uri, "/imgfs/list");
        assert_eq!(msg.headers.len(), 1);
        assert_eq!(msg.headers[0], HttpHeader { key: "Host", value: "localhost:8000" });
        assert!(msg.body.is_empty());
    }

    #[test]
    fn incomplete_until_terminator() {
        for cut in 1..GET_LIST.len() - 1 {
            assert!(matches!(parse(&GET_LIST[..cut]).unwrap(), Parse::Incomplete));
        }
    }

    #[test]
    fn body_gated_on_content_length() {
        let head = b"POST /imgfs/insert?name=pic1 HTTP/1.1\r\nContent-Length: 5\r\n\r\n";
        match parse(head).unwrap() {
            Parse::NeedBody { total } => assert_eq!(total, head.len() + 5),
            other => panic!("expected NeedBody, got {other:?}"),
        }

        let mut full = head.to_vec();
        full.extend_from_slice(b"jpeg!");
        let msg = match parse(&full).unwrap() {
            Parse::Done(m) => m,
            other => panic!("expected Done, got {other:?}"),
        };
        assert_eq!(msg.body, b"jpeg!");
    }

    #[test]
    fn malformed_start_line_is_an_error() {
        for bad in [
            &b"GET\r\n\r\n"[..],
            &b"GET /x\r\n\r\n"[..],
            &b"GET /x HTTP/1.1 extra\r\n\r\n"[..],
            &b" /x HTTP/1.1\r\n\r\n"[..],
            &b"GET /x FTP/1.1\r\n\r\n"[..],
        ] {
            assert!(parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn malformed_header_line_is_an_error() {
        assert!(parse(b"GET /x HTTP/1.1\r\nNoColonHere\r\n\r\n").is_err());
        assert!(parse(b"GET /x HTTP/1.1\r\nContent-Length: ten\r\n\r\n").is_err());
    }

    #[test]
    fn header_count_is_capped() {
        let mut req = b"GET /x HTTP/1.1\r\n".to_vec();
        for i in 0..=MAX_HEADERS {
            req.extend_from_slice(format!("H{i}: v\r\n").as_bytes());
        }
        req.extend_from_slice(b"\r\n");
        assert!(parse(&req).is_err());
    }

    #[test]
    fn serializer_inverts_parser() {
        let mut req = b"POST /imgfs/insert?name=pic1 HTTP/1.1\r\nContent-Length: 4\r\n\r\n".to_vec();
        req.extend_from_slice(b"body");
        let msg = match parse(&req).unwrap() {
            Parse::Done(m) => m,
            other => panic!("expected Done, got {other:?}"),
        };
        assert_eq!(msg.to_bytes(), req);
    }

    #[test]
    fn get_var_is_anchored() {
        let uri = "/imgfs/read?img_id=pic1&res=thumb";
        assert_eq!(get_var(uri, "img_id"), Some("pic1"));
        assert_eq!(get_var(uri, "res"), Some("thumb"));
        // "id" occurs inside "img_id" but never after '?' or '&'.
        assert_eq!(get_var(uri, "id"), None);
        assert_eq!(get_var(uri, "name"), None);
        assert_eq!(get_var("/imgfs/list", "img_id"), None);
        assert_eq!(get_var("/x?img_id=", "img_id"), Some(""));
        assert_eq!(get_var("/x?a=1&img_id=last", "img_id"), Some("last"));
    }
}
