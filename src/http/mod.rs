//! Minimal HTTP/1.1 layer: request framing plus a thread-per-connection
//! server loop.  One request per connection, no keep-alive, no TLS.

pub mod message;
pub mod server;

pub use message::{get_var, parse, HttpHeader, HttpMessage, Parse};
pub use server::{HttpHandler, HttpServer, MAX_BODY_SIZE, MAX_HEADER_SIZE};
