//! Metadata slot records and the resolution-variant registry.
//!
//! # On-disk layout (208 bytes per slot, all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0    128   img_id    ASCII, NUL-padded (127 significant bytes max)
//!  128     32   sha       SHA-256 of the original-resolution bytes
//!  160      4   width     original width  (LE u32)
//!  164      4   height    original height (LE u32)
//!  168     12   size      3 × LE u32 — thumb, small, orig; 0 = not materialized
//!  180     24   offset    3 × LE u64 — absolute blob offsets; undefined where size == 0
//!  204      2   is_valid  1 = occupied slot, 0 = free (LE u16)
//!  206      2   zero padding
//! ```
//!
//! # Validity
//! A slot with `is_valid == 0` is free; every other field of it is ignored.
//! Decoding a *valid* slot whose `img_id` is not NUL-terminated within its
//! 128 bytes fails — that is corruption, not a long name.
//!
//! # Resolution indices
//! Frozen: thumbnail = 0, small = 1, original = 2.  These are array indices
//! into `size` and `offset` and part of the on-disk format.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{ImgfsError, Result};

/// Maximum significant bytes in an image id (the field is one byte wider
/// for the NUL).
pub const MAX_IMG_ID: usize = 127;
/// Fixed byte size of one metadata slot.
pub const METADATA_SIZE: usize = 208;
/// Byte length of a SHA-256 digest.
pub const SHA_LEN: usize = 32;
/// Number of resolution variants (thumb, small, orig).
pub const NB_RES: usize = 3;

// ── Resolution variants ──────────────────────────────────────────────────────

/// One of the three stored resolution variants of an image.
///
/// The discriminants are the frozen on-disk array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Resolution {
    Thumb = 0,
    Small = 1,
    Orig  = 2,
}

impl Resolution {
    /// Index into the `size` / `offset` arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse a CLI / query-string token.  Accepts the long and short forms.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "thumb" | "thumbnail" => Some(Resolution::Thumb),
            "small"               => Some(Resolution::Small),
            "orig" | "original"   => Some(Resolution::Orig),
            _                     => None,
        }
    }

    /// Canonical short name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            Resolution::Thumb => "thumb",
            Resolution::Small => "small",
            Resolution::Orig  => "orig",
        }
    }

    /// Filename suffix used by `imgfscmd read` output files.
    pub fn suffix(self) -> &'static str {
        match self {
            Resolution::Thumb => "_thumb",
            Resolution::Small => "_small",
            Resolution::Orig  => "_orig",
        }
    }
}

// ── Metadata slot ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub img_id:   String,
    /// SHA-256 of the original-resolution bytes — the dedup key.
    pub sha:      [u8; SHA_LEN],
    /// Original width, height.
    pub orig_res: [u32; 2],
    /// Stored blob size per variant; 0 means "not materialized".
    pub size:     [u32; NB_RES],
    /// Absolute byte offset per variant; undefined where `size` is 0.
    pub offset:   [u64; NB_RES],
    pub is_valid: bool,
}

impl Metadata {
    /// Write the 208-byte record.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let mut id_field = [0u8; MAX_IMG_ID + 1];
        let id = self.img_id.as_bytes();
        debug_assert!(id.len() <= MAX_IMG_ID, "img_id exceeds {MAX_IMG_ID} bytes");
        id_field[..id.len()].copy_from_slice(id);

        let mut buf = Vec::with_capacity(METADATA_SIZE);
        buf.extend_from_slice(&id_field);                         // 128
        buf.extend_from_slice(&self.sha);                         // 32
        buf.write_u32::<LittleEndian>(self.orig_res[0])?;         // 4
        buf.write_u32::<LittleEndian>(self.orig_res[1])?;         // 4
        for s in self.size {
            buf.write_u32::<LittleEndian>(s)?;                    // 4 each
        }
        for o in self.offset {
            buf.write_u64::<LittleEndian>(o)?;                    // 8 each
        }
        buf.write_u16::<LittleEndian>(u16::from(self.is_valid))?; // 2
        buf.resize(METADATA_SIZE, 0u8);

        w.write_all(&buf)?;
        Ok(())
    }

    /// Read and validate one 208-byte record.
    ///
    /// Free slots decode leniently (their fields are ignored per the format
    /// contract); valid slots must carry a NUL-terminated ASCII `img_id`.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut buf = [0u8; METADATA_SIZE];
        r.read_exact(&mut buf)?;

        let is_valid = u16::from_le_bytes(buf[204..206].try_into().unwrap()) == 1;

        let img_id = match buf[..MAX_IMG_ID + 1].iter().position(|&b| b == 0) {
            Some(nul) => std::str::from_utf8(&buf[..nul])
                .map_err(|_| ImgfsError::BadFormat("non-ASCII img_id".to_owned()))?
                .to_owned(),
            None if is_valid => {
                return Err(ImgfsError::BadFormat("unterminated img_id".to_owned()));
            }
            None => String::new(),
        };

        let sha: [u8; SHA_LEN] = buf[128..160].try_into().unwrap();

        let mut cur = &buf[160..];
        let orig_res = [
            cur.read_u32::<LittleEndian>()?,
            cur.read_u32::<LittleEndian>()?,
        ];
        let mut size = [0u32; NB_RES];
        for s in &mut size {
            *s = cur.read_u32::<LittleEndian>()?;
        }
        let mut offset = [0u64; NB_RES];
        for o in &mut offset {
            *o = cur.read_u64::<LittleEndian>()?;
        }

        Ok(Self { img_id, sha, orig_res, size, offset, is_valid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Metadata {
        Metadata {
            img_id:   "papillon".to_owned(),
            sha:      [0xAB; SHA_LEN],
            orig_res: [1200, 800],
            size:     [0, 0, 72876],
            offset:   [0, 0, 26688],
            is_valid: true,
        }
    }

    #[test]
    fn roundtrip_is_bit_exact() {
        let m = sample();
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), METADATA_SIZE);

        let back = Metadata::read_from(Cursor::new(&buf)).unwrap();
        assert_eq!(back, m);

        // Frozen field positions.
        assert_eq!(&buf[..8], b"papillon");
        assert_eq!(buf[8], 0);
        assert_eq!(&buf[128..160], &[0xAB; 32]);
        assert_eq!(u32::from_le_bytes(buf[160..164].try_into().unwrap()), 1200);
        assert_eq!(u32::from_le_bytes(buf[176..180].try_into().unwrap()), 72876);
        assert_eq!(u64::from_le_bytes(buf[196..204].try_into().unwrap()), 26688);
        assert_eq!(u16::from_le_bytes(buf[204..206].try_into().unwrap()), 1);
    }

    #[test]
    fn valid_slot_requires_nul_terminated_id() {
        let m = sample();
        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        for b in &mut buf[..MAX_IMG_ID + 1] {
            *b = b'a';
        }
        assert!(matches!(
            Metadata::read_from(Cursor::new(&buf)),
            Err(ImgfsError::BadFormat(_))
        ));
    }

    #[test]
    fn free_slot_decodes_leniently() {
        // A zeroed record is a free slot regardless of the id field.
        let buf = [0u8; METADATA_SIZE];
        let m = Metadata::read_from(Cursor::new(&buf)).unwrap();
        assert!(!m.is_valid);
        assert!(m.img_id.is_empty());
    }

    #[test]
    fn resolution_tokens() {
        assert_eq!(Resolution::from_name("thumb"), Some(Resolution::Thumb));
        assert_eq!(Resolution::from_name("thumbnail"), Some(Resolution::Thumb));
        assert_eq!(Resolution::from_name("small"), Some(Resolution::Small));
        assert_eq!(Resolution::from_name("orig"), Some(Resolution::Orig));
        assert_eq!(Resolution::from_name("original"), Some(Resolution::Orig));
        assert_eq!(Resolution::from_name("huge"), None);
        assert_eq!(Resolution::Orig.index(), 2);
        assert_eq!(Resolution::Thumb.index(), 0);
    }
}
