//! Storage engine — the single-file image database.
//!
//! # File anatomy
//! A database is one contiguous file:
//!
//! ```text
//! [ header (64 B) ][ metadata[0] ] … [ metadata[max_files-1] ][ image blobs … ]
//! ```
//!
//! The fixed prefix (header + table) is written in full at create time and
//! patched per-record afterwards.  Image blobs are only ever appended past
//! the prefix; nothing is compacted or reclaimed.
//!
//! # Write discipline
//! Blob bytes are written before any metadata bytes that reference them.  A
//! failure mid-insert or mid-resize can leave unreferenced garbage at the
//! end of the file; it can never leave the table pointing at bytes that were
//! not written.  On any such failure the in-memory slot is reverted before
//! the error surfaces.
//!
//! # Dedup
//! Inserting bytes whose SHA-256 already exists under another id stores no
//! new blob: the fresh slot adopts every `(offset, size)` pair of the
//! existing one.  Deleting one of the aliases never reclaims the shared
//! bytes, so the surviving id stays readable.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{ImgfsError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::image_content;
use crate::metadata::{Metadata, Resolution, MAX_IMG_ID, METADATA_SIZE};

// ── Options & modes ──────────────────────────────────────────────────────────

/// Configuration for [`ImgFs::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub max_files: u32,
    pub thumb_res: (u16, u16),
    pub small_res: (u16, u16),
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            max_files: 128,
            thumb_res: (64, 64),
            small_res: (256, 256),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Required by every mutating operation, including the lazy resize a
    /// non-original `read` may trigger.
    ReadWrite,
}

/// Output mode of [`ImgFs::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Stdout,
    Json,
}

#[derive(Serialize)]
struct ListDocument {
    #[serde(rename = "Images")]
    images: Vec<String>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct ImgFs {
    file:         File,
    pub header:   Header,
    pub metadata: Vec<Metadata>,
}

impl ImgFs {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Initialize a fresh database at `path`, truncating any existing file.
    ///
    /// Writes the header followed by a zero-filled metadata table.  Prints
    /// `"N item(s) written"` with `N = 1 + nb_files`; scripts parse that
    /// line, so its shape is part of the CLI contract.
    pub fn create<P: AsRef<Path>>(path: P, opts: CreateOptions) -> Result<Self> {
        let header = Header::new(opts.max_files, opts.thumb_res, opts.small_res);
        let metadata = vec![Metadata::default(); opts.max_files as usize];

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        header.write_to(&mut file)?;
        for slot in &metadata {
            slot.write_to(&mut file)?;
        }

        println!("{} item(s) written", 1 + header.nb_files);

        Ok(Self { file, header, metadata })
    }

    /// Open an existing database and load the full metadata table.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;

        let header = Header::read_from(&mut file)?;

        // One read for the whole table; the max_files sanity cap bounds it.
        let mut table = vec![0u8; header.max_files as usize * METADATA_SIZE];
        file.read_exact(&mut table)?;

        let mut metadata = Vec::with_capacity(header.max_files as usize);
        for chunk in table.chunks_exact(METADATA_SIZE) {
            metadata.push(Metadata::read_from(chunk)?);
        }

        Ok(Self { file, header, metadata })
    }

    /// Release the in-memory table and close the file.  Idempotent by
    /// ownership; dropping the engine is equivalent.
    pub fn close(self) {}

    // ── Listing ──────────────────────────────────────────────────────────────

    /// List the database contents.
    ///
    /// `Stdout` prints the header and one line per valid slot (in slot
    /// order) and returns `None`; `Json` returns the textual document
    /// `{"Images": ["<img_id>", …]}`.
    pub fn list(&self, mode: ListMode) -> Result<Option<String>> {
        match mode {
            ListMode::Stdout => {
                println!("{}", self.header);
                if self.header.nb_files == 0 {
                    println!("<< empty imgFS >>");
                } else {
                    println!("{:<28} {:>11} {:>10} {:>10} {:>10}  SHA-256",
                             "Name", "Resolution", "Orig", "Small", "Thumb");
                    for m in self.metadata.iter().filter(|m| m.is_valid) {
                        println!("{:<28} {:>11} {:>10} {:>10} {:>10}  {}",
                            m.img_id,
                            format!("{}x{}", m.orig_res[0], m.orig_res[1]),
                            m.size[Resolution::Orig.index()],
                            m.size[Resolution::Small.index()],
                            m.size[Resolution::Thumb.index()],
                            hex::encode(m.sha));
                    }
                }
                Ok(None)
            }
            ListMode::Json => {
                let doc = ListDocument {
                    images: self.metadata.iter()
                        .filter(|m| m.is_valid)
                        .map(|m| m.img_id.clone())
                        .collect(),
                };
                let json = serde_json::to_string(&doc)
                    .map_err(|_| ImgfsError::InvalidArgument)?;
                Ok(Some(json))
            }
        }
    }

    // ── Insert ───────────────────────────────────────────────────────────────

    /// Insert a JPEG under a fresh id.
    ///
    /// The slot is populated in memory first; the blob is appended only when
    /// content dedup did not attach existing offsets, and the header plus the
    /// one touched record are persisted last.  On any failure the slot is
    /// reverted and `nb_files` restored.
    pub fn insert(&mut self, blob: &[u8], img_id: &str) -> Result<()> {
        // The size field is a u32 on disk.
        if blob.is_empty() || blob.len() > u32::MAX as usize {
            return Err(ImgfsError::InvalidArgument);
        }
        if self.header.nb_files >= self.header.max_files {
            return Err(ImgfsError::Full);
        }
        // NUL is the on-disk id terminator, so it cannot appear in an id.
        if img_id.is_empty() || img_id.len() > MAX_IMG_ID || img_id.contains('\0') {
            return Err(ImgfsError::InvalidId);
        }

        let free = self.metadata.iter()
            .position(|m| !m.is_valid)
            .ok_or(ImgfsError::Full)?;

        let sha: [u8; 32] = Sha256::digest(blob).into();
        let (width, height) = image_content::decode_dimensions(blob)?;

        self.metadata[free] = Metadata {
            img_id:   img_id.to_owned(),
            sha,
            orig_res: [width, height],
            size:     [0; 3],
            offset:   [0; 3],
            is_valid: true,
        };
        self.header.nb_files += 1;

        if let Err(e) = self.dedup(free).and_then(|()| self.commit_insert(free, blob)) {
            self.metadata[free] = Metadata::default();
            self.header.nb_files -= 1;
            return Err(e);
        }

        debug!("inserted {img_id:?} into slot {free} ({} B)", blob.len());
        Ok(())
    }

    /// Append the blob when dedup left the slot without an original, then
    /// bump the version and persist header + slot.
    fn commit_insert(&mut self, index: usize, blob: &[u8]) -> Result<()> {
        let orig = Resolution::Orig.index();
        if self.metadata[index].offset[orig] == 0 {
            let offset = self.file.seek(SeekFrom::End(0))?;
            self.file.write_all(blob)?;
            self.metadata[index].offset[orig] = offset;
            self.metadata[index].size[orig] = blob.len() as u32;
        }

        self.header.version += 1;
        let persisted = self.write_header().and_then(|()| self.write_slot(index));
        if persisted.is_err() {
            self.header.version -= 1;
        }
        persisted
    }

    /// Name-and-content dedup for a freshly populated slot.
    ///
    /// The id check must traverse the *entire* table: a content match found
    /// early never short-circuits a later name clash.  A content match
    /// copies every `(offset, size)` pair, so the caller can decide whether
    /// to store the blob by looking at `offset[orig]`.
    fn dedup(&mut self, index: usize) -> Result<()> {
        self.metadata[index].offset[Resolution::Orig.index()] = 0;

        for j in 0..self.metadata.len() {
            if j == index || !self.metadata[j].is_valid {
                continue;
            }
            if self.metadata[j].img_id == self.metadata[index].img_id {
                return Err(ImgfsError::DuplicateId);
            }
            if self.metadata[j].sha == self.metadata[index].sha {
                debug!("content match: {:?} shares blobs with {:?}",
                       self.metadata[index].img_id, self.metadata[j].img_id);
                self.metadata[index].offset = self.metadata[j].offset;
                self.metadata[index].size = self.metadata[j].size;
            }
        }
        Ok(())
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Read one image at the requested resolution, materializing the variant
    /// on first access.
    pub fn read(&mut self, img_id: &str, res: Resolution) -> Result<Vec<u8>> {
        let pos = self.find_by_id(img_id).ok_or(ImgfsError::NotFound)?;

        let r = res.index();
        if res != Resolution::Orig
            && (self.metadata[pos].size[r] == 0 || self.metadata[pos].offset[r] == 0)
        {
            self.lazily_resize(res, pos)?;
        }

        let size = self.metadata[pos].size[r] as usize;
        let offset = self.metadata[pos].offset[r];
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Materialize a derived variant: decode the original, scale to the
    /// header-configured bounds (aspect preserved), append, persist the slot.
    ///
    /// No-op for the original resolution or an already materialized variant,
    /// which makes repeated reads idempotent.
    fn lazily_resize(&mut self, res: Resolution, pos: usize) -> Result<()> {
        let r = res.index();
        if res == Resolution::Orig || self.metadata[pos].size[r] != 0 {
            return Ok(());
        }

        let orig = Resolution::Orig.index();
        let orig_size = self.metadata[pos].size[orig] as usize;
        self.file.seek(SeekFrom::Start(self.metadata[pos].offset[orig]))?;
        let mut orig_buf = vec![0u8; orig_size];
        self.file.read_exact(&mut orig_buf)?;

        let (max_w, max_h) = self.header.resized(r);
        let variant = image_content::thumbnail(&orig_buf, max_w, max_h)?;

        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&variant)?;

        self.metadata[pos].offset[r] = offset;
        self.metadata[pos].size[r] = variant.len() as u32;
        if let Err(e) = self.write_slot(pos) {
            self.metadata[pos].offset[r] = 0;
            self.metadata[pos].size[r] = 0;
            return Err(e);
        }

        debug!("materialized {} for {:?}: {} B at offset {offset}",
               res.name(), self.metadata[pos].img_id, variant.len());
        Ok(())
    }

    // ── Delete ───────────────────────────────────────────────────────────────

    /// Invalidate the slot holding `img_id` and persist record + header.
    ///
    /// Blob bytes are never reclaimed: offsets referenced by other slots
    /// through content dedup stay valid, and unique blobs simply become
    /// unreferenced garbage.
    pub fn delete(&mut self, img_id: &str) -> Result<()> {
        let pos = self.find_by_id(img_id).ok_or(ImgfsError::NotFound)?;

        self.metadata[pos].is_valid = false;
        if let Err(e) = self.write_slot(pos) {
            self.metadata[pos].is_valid = true;
            return Err(e);
        }

        // The slot invalidation is durable at this point; a failing header
        // write surfaces as Io and the header is rewritten by the next
        // successful mutation.
        self.header.nb_files -= 1;
        self.header.version += 1;
        self.write_header()?;

        debug!("deleted {img_id:?} from slot {pos}");
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn find_by_id(&self, img_id: &str) -> Option<usize> {
        self.metadata.iter()
            .position(|m| m.is_valid && m.img_id == img_id)
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.file)
    }

    fn write_slot(&mut self, index: usize) -> Result<()> {
        let offset = HEADER_SIZE as u64 + index as u64 * METADATA_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.metadata[index].write_to(&mut self.file)
    }
}
