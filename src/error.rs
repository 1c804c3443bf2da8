//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the engine, the HTTP layer, and the CLI
//! returns [`ImgfsError`].  Each variant carries a stable numeric code used
//! as the process exit status by `imgfscmd`; the HTTP router turns any
//! variant into a `500` reply whose body is `"Error: <message>\n"`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImgfsError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not enough arguments")]
    NotEnoughArguments,
    /// The image id is empty or longer than [`crate::metadata::MAX_IMG_ID`].
    #[error("invalid image id")]
    InvalidId,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Request body exceeded the server's size cap.
    #[error("not enough memory")]
    OutOfMemory,
    /// The file is not an imgFS database this build can read.
    #[error("not a valid imgFS file: {0}")]
    BadFormat(String),
    #[error("No such image")]
    NotFound,
    #[error("image database is full")]
    Full,
    #[error("duplicate image id")]
    DuplicateId,
    #[error("invalid resolution")]
    Resolutions,
    #[error("image processing error: {0}")]
    ImgLib(String),
    #[error("invalid command")]
    InvalidCommand,
}

impl ImgfsError {
    /// Stable numeric code, used as the CLI process exit status.
    pub fn code(&self) -> i32 {
        match self {
            ImgfsError::InvalidArgument    => 1,
            ImgfsError::NotEnoughArguments => 2,
            ImgfsError::InvalidId          => 3,
            ImgfsError::Io(_)              => 4,
            ImgfsError::OutOfMemory        => 5,
            ImgfsError::BadFormat(_)       => 6,
            ImgfsError::NotFound           => 7,
            ImgfsError::Full               => 8,
            ImgfsError::DuplicateId        => 9,
            ImgfsError::Resolutions        => 10,
            ImgfsError::ImgLib(_)          => 11,
            ImgfsError::InvalidCommand     => 12,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImgfsError>;
