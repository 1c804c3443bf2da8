//! Request router — the bridge between the HTTP layer and the storage
//! engine.
//!
//! Holds the one shared engine behind a process-wide mutex.  Every engine
//! operation (including the lazy resize a `read` may trigger) runs with the
//! lock held end-to-end; reply bytes are sent only after the lock is
//! released, with the payload already materialized in the worker's memory.
//!
//! Routes are matched on the exact path (query string stripped); anything
//! else is `invalid command`.  All failures become a `500` reply with body
//! `"Error: <message>\n"`; successful mutations redirect to the index page.

use std::net::TcpStream;
use std::path::Path;
use std::sync::Mutex;

use log::debug;

use crate::error::{ImgfsError, Result};
use crate::http::message::{get_var, HttpMessage};
use crate::http::server::{self, HttpHandler, HTTP_ERROR, HTTP_FOUND, HTTP_OK};
use crate::metadata::Resolution;
use crate::store::{ImgFs, ListMode};

/// Static page served for `/` and `/index.html`, resolved relative to the
/// server's working directory.
pub const BASE_FILE: &str = "index.html";
/// Default listening port of `imgfs-server`.
pub const DEFAULT_PORT: u16 = 8000;

pub struct ServerService {
    fs:   Mutex<ImgFs>,
    port: u16,
}

impl ServerService {
    pub fn new(fs: ImgFs, port: u16) -> Self {
        Self { fs: Mutex::new(fs), port }
    }

    /// Lock the engine.  A worker that panicked while holding the lock must
    /// not wedge the server, so poisoning is stripped.
    fn engine(&self) -> std::sync::MutexGuard<'_, ImgFs> {
        self.fs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reply_error(&self, conn: &mut TcpStream, err: &ImgfsError) -> Result<()> {
        debug!("replying error: {err}");
        server::reply(conn, HTTP_ERROR, "", format!("Error: {err}\n").as_bytes())
    }

    fn reply_302(&self, conn: &mut TcpStream) -> Result<()> {
        let location = format!("Location: http://localhost:{}/{}\r\n", self.port, BASE_FILE);
        server::reply(conn, HTTP_FOUND, &location, b"")
    }

    /// Required, non-empty query parameter.
    fn require_var<'a>(msg: &HttpMessage<'a>, name: &str) -> Result<&'a str> {
        get_var(msg.uri, name)
            .filter(|v| !v.is_empty())
            .ok_or(ImgfsError::NotEnoughArguments)
    }

    // ── Route handlers ───────────────────────────────────────────────────────

    fn handle_list(&self, conn: &mut TcpStream) -> Result<()> {
        let json = {
            let fs = self.engine();
            fs.list(ListMode::Json)?
        };
        let json = json.ok_or(ImgfsError::InvalidArgument)?;
        server::reply(conn, HTTP_OK,
                      "Content-Type: application/json\r\n",
                      json.as_bytes())
    }

    fn handle_read(&self, conn: &mut TcpStream, msg: &HttpMessage<'_>) -> Result<()> {
        let img_id = Self::require_var(msg, "img_id")?;
        let res = Resolution::from_name(Self::require_var(msg, "res")?)
            .ok_or(ImgfsError::Resolutions)?;

        let image = {
            let mut fs = self.engine();
            fs.read(img_id, res)?
        };
        server::reply(conn, HTTP_OK, "Content-Type: image/jpeg\r\n", &image)
    }

    fn handle_delete(&self, conn: &mut TcpStream, msg: &HttpMessage<'_>) -> Result<()> {
        let img_id = Self::require_var(msg, "img_id")?;
        {
            let mut fs = self.engine();
            fs.delete(img_id)?;
        }
        self.reply_302(conn)
    }

    fn handle_insert(&self, conn: &mut TcpStream, msg: &HttpMessage<'_>) -> Result<()> {
        if msg.body.is_empty() {
            return Err(ImgfsError::InvalidArgument);
        }
        let img_id = Self::require_var(msg, "name")?;
        {
            let mut fs = self.engine();
            fs.insert(msg.body, img_id)?;
        }
        self.reply_302(conn)
    }
}

impl HttpHandler for ServerService {
    fn handle(&self, msg: &HttpMessage<'_>, conn: &mut TcpStream) -> Result<()> {
        let path = msg.uri.split('?').next().unwrap_or(msg.uri);

        let outcome = match (msg.method, path) {
            ("GET", "/") | ("GET", "/index.html") => {
                return server::serve_file(conn, Path::new(BASE_FILE));
            }
            ("GET", "/imgfs/list")    => self.handle_list(conn),
            ("GET", "/imgfs/read")    => self.handle_read(conn, msg),
            ("GET", "/imgfs/delete")  => self.handle_delete(conn, msg),
            ("POST", "/imgfs/insert") => self.handle_insert(conn, msg),
            _                         => Err(ImgfsError::InvalidCommand),
        };

        match outcome {
            Ok(()) => Ok(()),
            // Engine/parameter failures become error replies; only a failure
            // to send the reply itself propagates to the worker.
            Err(e) => self.reply_error(conn, &e),
        }
    }
}
