//! Shared-output-file discipline: the coordinator creates and truncates the
//! archive exactly once before any rank opens it for writing; every rank
//! then writes into disjoint byte ranges through its own buffered handle.
//!
//! The two phases are separated by a barrier at the call site (`main.rs`),
//! not inside this module — this module only knows how to do its half of
//! each phase.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// Default write-buffer size. `O_RDWR` is avoided on the caller's open
/// because it induces read-on-seek prefetch that stalls this buffer.
pub const WRITE_BUFFER_SIZE: usize = 512 * 1024 * 1024;

const TRAILER_BLOCK: [u8; 512] = [0u8; 512];

/// Create (or truncate) the archive file. Must be called by exactly one
/// rank, and must complete before any rank calls `open_for_write`.
pub fn create_truncate(path: &Path) -> Result<()> {
    File::create(path)
        .with_context(|| format!("Could not create archive file '{}'", path.display()))?;
    Ok(())
}

/// Warn (not fail) if the filesystem backing `path` looks too small for
/// `required` bytes. Advisory only — an actual out-of-space condition
/// still surfaces as a fatal I/O error from the write that hits it.
pub fn warn_if_low_on_space(path: &Path, required: u64) {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let probe = parent.unwrap_or_else(|| Path::new("."));
    match fs3::available_space(probe) {
        Ok(available) if available < required => {
            eprintln!(
                "{} '{}' reports {} available, but the archive is expected to need about {}",
                "warning:".yellow().bold(),
                probe.display(),
                bytesize::ByteSize(available),
                bytesize::ByteSize(required),
            );
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!(
                "{} could not determine free space for '{}': {err}",
                "warning:".yellow().bold(),
                probe.display()
            );
        }
    }
}

/// A rank's handle onto the shared archive file, tracking its own last
/// write position so it never queries the OS for the current offset —
/// doing so would force an implicit flush of the buffered writer.
pub struct SharedFile {
    writer: BufWriter<File>,
    position: u64,
}

impl SharedFile {
    pub fn open_for_write(path: &Path) -> Result<SharedFile> {
        Self::open_for_write_with_buffer(path, WRITE_BUFFER_SIZE)
    }

    pub fn open_for_write_with_buffer(path: &Path, buffer_size: usize) -> Result<SharedFile> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Could not open archive file '{}' for writing", path.display()))?;
        Ok(SharedFile {
            writer: BufWriter::with_capacity(buffer_size, file),
            position: 0,
        })
    }

    /// Seek only if `offset` differs from the tracked position, then write
    /// `bytes` and advance the tracked position.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if self.position != offset {
            self.writer
                .seek(SeekFrom::Start(offset))
                .with_context(|| format!("Could not seek the archive file to offset {offset}"))?;
            self.position = offset;
        }
        self.writer
            .write_all(bytes)
            .with_context(|| format!("Could not write {} bytes at offset {offset}", bytes.len()))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write the two-block end-of-archive marker at the tracked position.
    pub fn write_trailer(&mut self) -> Result<()> {
        self.writer
            .write_all(&TRAILER_BLOCK)
            .context("Could not write the first end-of-archive block")?;
        self.writer
            .write_all(&TRAILER_BLOCK)
            .context("Could not write the second end-of-archive block")?;
        self.position += 1024;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().context("Could not flush the archive file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_at_skips_seek_when_position_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tar");
        create_truncate(&path).unwrap();

        let mut shared = SharedFile::open_for_write_with_buffer(&path, 4096).unwrap();
        shared.write_at(0, b"abc").unwrap();
        shared.write_at(3, b"def").unwrap();
        shared.finish().unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(&contents[..6], b"abcdef");
    }

    #[test]
    fn write_at_seeks_to_a_disjoint_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tar");
        create_truncate(&path).unwrap();

        let mut shared = SharedFile::open_for_write_with_buffer(&path, 4096).unwrap();
        shared.write_at(10, b"xyz").unwrap();
        shared.finish().unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(&contents[10..13], b"xyz");
        assert_eq!(contents.len(), 13);
    }

    #[test]
    fn trailer_is_two_zero_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tar");
        create_truncate(&path).unwrap();

        let mut shared = SharedFile::open_for_write_with_buffer(&path, 4096).unwrap();
        shared.write_at(0, b"x").unwrap();
        shared.write_trailer().unwrap();
        shared.finish().unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents.len(), 1 + 1024);
        assert!(contents[1..].iter().all(|&b| b == 0));
    }
}
