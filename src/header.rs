//! Database header — format anchor at offset 0.
//!
//! # On-disk layout (64 bytes, all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0     32   name         ASCII tag, NUL-padded ("ImgFS v1"); doubles as magic
//!   32      4   version      bumped on every successful mutation (LE u32)
//!   36      4   nb_files     count of valid metadata slots (LE u32)
//!   40      4   max_files    slot capacity, fixed at create time (LE u32)
//!   44      8   resized_res  thumb w, thumb h, small w, small h (4 × LE u16)
//!   52     12   zero padding to exactly 64 bytes
//! ```
//!
//! The original resolution has no header-configured bounds; only the two
//! derived variants (thumbnail, small) are parameterized here.
//!
//! # Endianness
//! All numeric fields are little-endian.  A file whose `name` field does not
//! match [`FORMAT_TAG`] is rejected at open — the tag is the magic.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

use crate::error::{ImgfsError, Result};

/// ASCII tag written into the `name` field of every new database.
pub const FORMAT_TAG: &str = "ImgFS v1";
/// Fixed width of the `name` field (31 significant bytes + NUL).
pub const MAX_NAME: usize = 31;
/// Fixed byte size of the header.
pub const HEADER_SIZE: usize = 64;
/// Sanity cap on `max_files`; larger values are treated as corruption.
pub const MAX_FILES_CAP: u32 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name:        String,
    pub version:     u32,
    pub nb_files:    u32,
    pub max_files:   u32,
    /// (width, height) pairs for the derived variants:
    /// `[0..2]` = thumbnail, `[2..4]` = small.
    pub resized_res: [u16; 4],
}

impl Header {
    pub fn new(max_files: u32, thumb_res: (u16, u16), small_res: (u16, u16)) -> Self {
        Self {
            name:        FORMAT_TAG.to_owned(),
            version:     0,
            nb_files:    0,
            max_files,
            resized_res: [thumb_res.0, thumb_res.1, small_res.0, small_res.1],
        }
    }

    /// Target (width, height) bounds for one derived resolution.
    /// `res_index` is 0 (thumbnail) or 1 (small).
    pub fn resized(&self, res_index: usize) -> (u16, u16) {
        (self.resized_res[2 * res_index], self.resized_res[2 * res_index + 1])
    }

    /// Write the header, padded to exactly [`HEADER_SIZE`] bytes.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let mut name_field = [0u8; MAX_NAME + 1];
        let tag = self.name.as_bytes();
        debug_assert!(tag.len() <= MAX_NAME, "header name exceeds {MAX_NAME} bytes");
        name_field[..tag.len()].copy_from_slice(tag);

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&name_field);                       // 32
        buf.write_u32::<LittleEndian>(self.version)?;             // 4
        buf.write_u32::<LittleEndian>(self.nb_files)?;            // 4
        buf.write_u32::<LittleEndian>(self.max_files)?;           // 4
        for r in self.resized_res {
            buf.write_u16::<LittleEndian>(r)?;                    // 2 each
        }
        buf.resize(HEADER_SIZE, 0u8);

        w.write_all(&buf)?;
        Ok(())
    }

    /// Read and validate a header: tag match, `max_files` in (0, cap].
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf)?;

        // The name field is the magic — reject anything else up front.
        let nul = buf[..=MAX_NAME].iter().position(|&b| b == 0).ok_or_else(|| {
            ImgfsError::BadFormat("unterminated name field".to_owned())
        })?;
        let name = std::str::from_utf8(&buf[..nul])
            .map_err(|_| ImgfsError::BadFormat("non-ASCII name field".to_owned()))?
            .to_owned();
        if name != FORMAT_TAG {
            return Err(ImgfsError::BadFormat(format!("unknown format tag {name:?}")));
        }

        let mut cur = &buf[MAX_NAME + 1..];
        let version   = cur.read_u32::<LittleEndian>()?;
        let nb_files  = cur.read_u32::<LittleEndian>()?;
        let max_files = cur.read_u32::<LittleEndian>()?;
        let mut resized_res = [0u16; 4];
        for r in &mut resized_res {
            *r = cur.read_u16::<LittleEndian>()?;
        }

        if max_files == 0 || max_files > MAX_FILES_CAP {
            return Err(ImgfsError::BadFormat(format!(
                "max_files {max_files} outside (0, {MAX_FILES_CAP}]"
            )));
        }

        Ok(Self { name, version, nb_files, max_files, resized_res })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "── {} ───────────────────────────────────────────", self.name)?;
        writeln!(f, "  version    {}", self.version)?;
        writeln!(f, "  images     {} / {}", self.nb_files, self.max_files)?;
        writeln!(f, "  thumbnail  {} x {}", self.resized_res[0], self.resized_res[1])?;
        write!(f,   "  small      {} x {}", self.resized_res[2], self.resized_res[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Header {
        let mut h = Header::new(128, (64, 64), (256, 256));
        h.version = 7;
        h.nb_files = 3;
        h
    }

    #[test]
    fn roundtrip_is_bit_exact() {
        let h = sample();
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let back = Header::read_from(Cursor::new(&buf)).unwrap();
        assert_eq!(back, h);

        // Field positions are frozen.
        assert_eq!(&buf[..8], FORMAT_TAG.as_bytes());
        assert_eq!(u32::from_le_bytes(buf[32..36].try_into().unwrap()), 7);
        assert_eq!(u32::from_le_bytes(buf[36..40].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(buf[40..44].try_into().unwrap()), 128);
        assert_eq!(u16::from_le_bytes(buf[44..46].try_into().unwrap()), 64);
        assert_eq!(u16::from_le_bytes(buf[50..52].try_into().unwrap()), 256);
        assert!(buf[52..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_unknown_tag() {
        let h = sample();
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        buf[0] = b'X';
        assert!(matches!(
            Header::read_from(Cursor::new(&buf)),
            Err(ImgfsError::BadFormat(_))
        ));
    }

    #[test]
    fn rejects_zero_and_oversized_max_files() {
        for bad in [0u32, MAX_FILES_CAP + 1] {
            let h = sample();
            let mut buf = Vec::new();
            h.write_to(&mut buf).unwrap();
            buf[40..44].copy_from_slice(&bad.to_le_bytes());
            assert!(matches!(
                Header::read_from(Cursor::new(&buf)),
                Err(ImgfsError::BadFormat(_))
            ));
        }
    }

    #[test]
    fn short_read_is_io() {
        let h = sample();
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        buf.truncate(40);
        assert!(matches!(
            Header::read_from(Cursor::new(&buf)),
            Err(ImgfsError::Io(_))
        ));
    }
}
