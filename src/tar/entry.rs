//! One archive entry: metadata + assigned offset + footprint/header
//! synthesis. Combines `header` and `pax` into the encoder's public type.

use anyhow::Result;

use crate::metadata::{read_link_target, Kind, NameCache, Stat};

use super::header::{self, BlockFields, DIRTYPE, REGTYPE, SYMTYPE, XHDTYPE};
use super::pax::{self, LINKNAME_FIELD_SIZE, MAX_USTAR_FILE_SIZE, NAME_FIELD_SIZE};

/// One entry descriptor: everything the encoder needs to compute a
/// footprint or synthesize header bytes, with no payload bytes required.
#[derive(Debug, Clone)]
pub struct Entry {
    pub offset: u64,
    pub stat: Stat,
    pub filename: String,
    pub linkname: String,
}

impl Entry {
    /// Build a descriptor for `path`, lstat-ing it and reading its link
    /// target if it is a symlink. Directories get a trailing `/` appended
    /// unless already present.
    pub fn from_path(path: &str, offset: u64) -> Result<Entry> {
        let stat = Stat::lstat(path.as_ref())?;

        let linkname = if stat.kind == Kind::Symlink {
            read_link_target(path.as_ref())?
        } else {
            String::new()
        };

        let mut filename = path.to_string();
        if stat.kind == Kind::Directory && !filename.ends_with('/') {
            filename.push('/');
        }

        Ok(Entry {
            offset,
            stat,
            filename,
            linkname,
        })
    }

    fn typeflag(&self) -> u8 {
        match self.stat.kind {
            Kind::Regular => REGTYPE,
            Kind::Symlink => SYMTYPE,
            Kind::Directory => DIRTYPE,
        }
    }

    fn oversize(&self) -> bool {
        self.stat.kind == Kind::Regular && self.stat.size > MAX_USTAR_FILE_SIZE
    }

    /// pax records this entry needs, in a fixed order: path, linkpath, size.
    fn pax_records(&self) -> Vec<(&'static str, String)> {
        let mut records = Vec::with_capacity(3);
        if self.filename.len() > NAME_FIELD_SIZE {
            records.push(("path", self.filename.clone()));
        }
        if self.linkname.len() > LINKNAME_FIELD_SIZE {
            records.push(("linkpath", self.linkname.clone()));
        }
        if self.oversize() {
            records.push(("size", self.stat.size.to_string()));
        }
        records
    }

    /// Total length of the pax payload (0 if no pax header is needed).
    fn pax_payload_len(&self) -> u64 {
        self.pax_records()
            .iter()
            .map(|(k, v)| pax::record_length(k, v) as u64)
            .sum()
    }

    fn needs_pax(&self) -> bool {
        self.filename.len() > NAME_FIELD_SIZE
            || self.linkname.len() > LINKNAME_FIELD_SIZE
            || self.oversize()
    }

    /// The size this entry contributes to the archive: pax block (if any)
    /// + one ustar header block + padded payload.
    pub fn footprint(&self) -> u64 {
        let pax_sz = self.pax_payload_len();
        let pax_block = if pax_sz > 0 {
            header::round_up_block(header::BLOCK_SIZE as u64 + pax_sz)
        } else {
            0
        };
        let payload_padded = if self.stat.kind == Kind::Regular {
            header::round_up_block(self.stat.size)
        } else {
            0
        };
        pax_block + header::BLOCK_SIZE as u64 + payload_padded
    }

    fn synthetic_pax_name(&self) -> String {
        let path = std::path::Path::new(&self.filename);
        let dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let base = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{dir}/{base}.paxhdr")
    }

    /// Synthesize the header byte sequence: optional pax block, then the
    /// ustar block. Length is exactly `footprint()` minus the payload.
    pub fn emit_header(&self, names: &mut NameCache) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity((header::BLOCK_SIZE * 2) as usize);

        if self.needs_pax() {
            let records = self.pax_records();
            let mut payload = String::new();
            for (k, v) in &records {
                payload.push_str(&pax::format_record(k, v));
            }

            let pax_block_fields = BlockFields {
                name: &self.synthetic_pax_name(),
                mode: 0o644,
                uid: 0,
                gid: 0,
                size: payload.len() as u64,
                mtime: self.stat.mtime,
                typeflag: XHDTYPE,
                linkname: "",
                uname: "",
                gname: "",
            };
            out.extend_from_slice(&header::write_block(&pax_block_fields));
            out.extend_from_slice(payload.as_bytes());
            let padded = header::round_up_block(out.len() as u64) as usize;
            out.resize(padded, 0);
        }

        let uname = names.user_name(self.stat.uid)?.to_string();
        let gname = names.group_name(self.stat.gid)?.to_string();

        let truncated_name = truncate_to(&self.filename, NAME_FIELD_SIZE);
        let truncated_linkname = truncate_to(&self.linkname, LINKNAME_FIELD_SIZE);

        let encoded_size = match self.stat.kind {
            Kind::Regular if !self.oversize() => self.stat.size,
            _ => 0,
        };

        let ustar_fields = BlockFields {
            name: &truncated_name,
            mode: self.stat.mode,
            uid: self.stat.uid,
            gid: self.stat.gid,
            size: encoded_size,
            mtime: self.stat.mtime,
            typeflag: self.typeflag(),
            linkname: &truncated_linkname,
            uname: &uname,
            gname: &gname,
        };
        out.extend_from_slice(&header::write_block(&ustar_fields));

        Ok(out)
    }
}

/// Clamp a string to `max` bytes on a UTF-8 boundary, never splitting a
/// multi-byte codepoint. Used for the truncated ustar `name`/`linkname`
/// fields when a pax record carries the full value.
fn truncate_to(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NameCache;
    use std::io::Write;

    fn entry_for(path: &std::path::Path, offset: u64) -> Entry {
        Entry::from_path(path.to_str().unwrap(), offset).unwrap()
    }

    #[test]
    fn single_regular_file_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let ent = entry_for(&file, 0);
        // header (512) + payload padded to 512 = 1024
        assert_eq!(ent.footprint(), 1024);

        let mut names = NameCache::new();
        let hdr = ent.emit_header(&mut names).unwrap();
        assert_eq!(hdr.len(), 512);
        assert_eq!(hdr[156], REGTYPE);
        assert!(hdr.starts_with(b"hello.txt\0") || hdr[..9] == *b"hello.txt");
    }

    #[test]
    fn symlink_has_no_payload() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, b"t").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("target", &link).unwrap();

        let ent = entry_for(&link, 0);
        assert_eq!(ent.footprint(), 512);
        assert_eq!(ent.linkname, "target");

        let mut names = NameCache::new();
        let hdr = ent.emit_header(&mut names).unwrap();
        assert_eq!(hdr[156], SYMTYPE);
        assert_eq!(&hdr[124..136], b"00000000000\0");
    }

    #[test]
    fn directory_name_ends_in_slash() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("dir");
        std::fs::create_dir(&sub).unwrap();

        let ent = entry_for(&sub, 0);
        assert!(ent.filename.ends_with('/'));
        assert_eq!(ent.stat.kind, Kind::Directory);
    }

    #[test]
    fn long_filename_triggers_pax_and_truncates_ustar_name() {
        let dir = tempfile::tempdir().unwrap();
        // build a path whose *file name component* alone exceeds 100 bytes
        let long_name = "a".repeat(101);
        let file = dir.path().join(&long_name);
        std::fs::write(&file, b"x").unwrap();

        let path_str = file.to_str().unwrap().to_string();
        let ent = Entry::from_path(&path_str, 0).unwrap();
        assert!(ent.filename.len() > 100);

        let mut names = NameCache::new();
        let hdr = ent.emit_header(&mut names).unwrap();
        // pax block + ustar block, larger than a single block
        assert!(hdr.len() > 512);
        assert_eq!(hdr[156], b'x');
        let ustar_start = hdr.len() - 512;
        assert_eq!(hdr[ustar_start + 156], REGTYPE);
        let name_field = &hdr[ustar_start..ustar_start + 100];
        let nul_pos = name_field.iter().position(|&b| b == 0).unwrap_or(100);
        assert!(nul_pos <= 100);
    }

    #[test]
    fn oversize_regular_file_uses_pax_size_record() {
        // Avoid actually allocating 9 GiB: fabricate the Entry directly.
        let stat = Stat {
            kind: Kind::Regular,
            mode: 0o644,
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            size: 9 * 1024 * 1024 * 1024,
            mtime: 1_500_000_000,
        };
        let ent = Entry {
            offset: 0,
            stat,
            filename: "big.bin".to_string(),
            linkname: String::new(),
        };
        assert!(ent.oversize());
        let mut names = NameCache::new();
        let hdr = ent.emit_header(&mut names).unwrap();
        let ustar_start = hdr.len() - 512;
        assert_eq!(&hdr[ustar_start + 124..ustar_start + 136], b"00000000000\0");
        let payload = std::str::from_utf8(&hdr[512..ustar_start]).unwrap();
        assert!(payload.contains("size=9663676416\n"));
    }
}
