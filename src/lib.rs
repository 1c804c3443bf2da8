//! # imgfs — single-file content-addressed JPEG image database
//!
//! Format guarantees (frozen in v1):
//! - All numeric fields on disk are little-endian; never negotiated
//! - The header's `name` field is the magic; a mismatched tag refuses to open
//! - Fixed prefix: 64-byte header + `max_files` × 208-byte metadata slots;
//!   image blobs are only ever appended past it
//! - Blob bytes hit the disk before any metadata that references them; a
//!   crash can leave unreferenced garbage, never a dangling table entry
//! - Identical content (SHA-256) stored under distinct ids shares one blob;
//!   shared bytes are never reclaimed, so aliases survive deletes
//! - Derived variants (thumbnail, small) are materialized lazily on first
//!   read and cached in the same file
//!
//! The HTTP front-end (`imgfs-server`) serializes every engine operation
//! behind one mutex and handles each connection on its own worker thread;
//! the CLI (`imgfscmd`) calls the engine directly.

pub mod error;
pub mod header;
pub mod http;
pub mod image_content;
pub mod metadata;
pub mod service;
pub mod store;

// Flat re-exports for the most common types.
pub use error::{ImgfsError, Result};
pub use header::{Header, FORMAT_TAG, HEADER_SIZE, MAX_FILES_CAP};
pub use http::{HttpHandler, HttpMessage, HttpServer};
pub use metadata::{Metadata, Resolution, MAX_IMG_ID, METADATA_SIZE, NB_RES};
pub use service::{ServerService, BASE_FILE, DEFAULT_PORT};
pub use store::{CreateOptions, ImgFs, ListMode, OpenMode};
