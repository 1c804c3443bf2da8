//! HTTP server loop — one detached worker thread per accepted connection.
//!
//! # Per-connection protocol
//! 1. Read into a [`MAX_HEADER_SIZE`] buffer until the header terminator
//!    appears; exhausting the buffer without it aborts the connection.
//! 2. Parse (`http::message`).  A non-zero `Content-Length` grows the
//!    buffer to `header_len + content_length` (capped at [`MAX_BODY_SIZE`])
//!    and reading continues until the body is complete.
//! 3. Invoke the injected [`HttpHandler`] with the parsed message.
//! 4. Close the socket.  Connections are never reused (no keep-alive).
//!
//! Malformed requests are answered with a `500` error reply before the
//! handler is ever invoked.  The handler is a capability passed to
//! [`HttpServer::serve`], not module state, so several servers can coexist
//! in one process (the tests rely on this).

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};

use crate::error::{ImgfsError, Result};
use crate::http::message::{self, Parse};

/// Upper bound on the header section of a request.
pub const MAX_HEADER_SIZE: usize = 2048;
/// Upper bound on a request body; larger uploads are refused.
pub const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

pub const HTTP_OK:    &str = "200 OK";
pub const HTTP_FOUND: &str = "302 Found";
pub const HTTP_ERROR: &str = "500 Internal Server Error";

/// Capability invoked once per fully received request.
pub trait HttpHandler: Send + Sync {
    fn handle(&self, msg: &message::HttpMessage<'_>, conn: &mut TcpStream) -> Result<()>;
}

// ── Server ───────────────────────────────────────────────────────────────────

pub struct HttpServer {
    listener: TcpListener,
}

impl HttpServer {
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        Ok(Self { listener })
    }

    /// Port actually bound (useful when `bind(0)` picked one).
    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accept loop: one detached worker per connection, each handling a
    /// single request to completion.  Returns when `accept` fails, which is
    /// how closing the listener shuts the server down; in-flight workers
    /// finish their request.
    pub fn serve<H: HttpHandler + 'static>(&self, handler: Arc<H>) -> Result<()> {
        for conn in self.listener.incoming() {
            let conn = conn?;
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let peer = conn.peer_addr().ok();
                if let Err(e) = handle_connection(conn, &*handler) {
                    warn!("connection {peer:?}: {e}");
                }
            });
        }
        Ok(())
    }
}

// ── Connection handling ──────────────────────────────────────────────────────

fn handle_connection<H: HttpHandler + ?Sized>(mut conn: TcpStream, handler: &H) -> Result<()> {
    let mut buf = vec![0u8; MAX_HEADER_SIZE];
    let mut received = 0usize;

    // Phase 1: accumulate the header section.
    while message::parse(&buf[..received]).is_ok_and(|p| matches!(p, Parse::Incomplete)) {
        if received == buf.len() {
            // Header larger than the buffer — abort without a reply.
            return Err(ImgfsError::InvalidArgument);
        }
        let n = conn.read(&mut buf[received..])?;
        if n == 0 {
            // Peer closed before sending a request; nothing to answer.
            return Ok(());
        }
        received += n;
    }

    // Phase 2: grow for the body if the headers announce one.
    loop {
        let total = match message::parse(&buf[..received]) {
            Ok(Parse::Done(_)) => break,
            Ok(Parse::NeedBody { total }) => total,
            Ok(Parse::Incomplete) => return Err(ImgfsError::InvalidArgument),
            Err(e) => {
                let _ = reply(&mut conn, HTTP_ERROR, "", format!("Error: {e}\n").as_bytes());
                return Err(e);
            }
        };
        if total > MAX_HEADER_SIZE + MAX_BODY_SIZE {
            let e = ImgfsError::OutOfMemory;
            let _ = reply(&mut conn, HTTP_ERROR, "", format!("Error: {e}\n").as_bytes());
            return Err(e);
        }
        if buf.len() < total {
            buf.resize(total, 0);
        }
        while received < total {
            let n = conn.read(&mut buf[received..total])?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            received += n;
        }
    }

    match message::parse(&buf[..received])? {
        Parse::Done(msg) => {
            debug!("{} {}", msg.method, msg.uri);
            handler.handle(&msg, &mut conn)
        }
        _ => Err(ImgfsError::InvalidArgument),
    }
}

// ── Replies ──────────────────────────────────────────────────────────────────

/// Send one complete reply and shut the write side down.
///
/// `extra_headers` is zero or more full header lines, each including its
/// trailing CRLF; `Content-Length` is always appended here.
pub fn reply(conn: &mut TcpStream, status: &str, extra_headers: &str, body: &[u8]) -> Result<()> {
    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(extra_headers.as_bytes());
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);

    conn.write_all(&out)?;
    conn.shutdown(Shutdown::Write)?;
    Ok(())
}

/// Serve a file from disk as `text/html`; missing file → `404 Not Found`.
pub fn serve_file(conn: &mut TcpStream, path: &std::path::Path) -> Result<()> {
    match std::fs::read(path) {
        Ok(bytes) => reply(
            conn,
            HTTP_OK,
            "Content-Type: text/html; charset=utf-8\r\n",
            &bytes,
        ),
        Err(e) => {
            warn!("serve_file: cannot read {}: {e}", path.display());
            reply(conn, "404 Not Found", "", b"")
        }
    }
}
