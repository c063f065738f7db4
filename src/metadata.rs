//! File-metadata oracle: stat/readlink results and uid/gid name resolution.
//!
//! Kept deliberately thin and process-local (no global caches): name
//! lookups are owned by whoever needs them, not stashed behind a static.

use std::collections::HashMap;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::stat::{lstat, FileStat, Mode, SFlag};
use nix::unistd::{Gid, Group, Uid, User};

/// What entry kind a path resolves to. Anything else is a fatal input error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Regular,
    Directory,
    Symlink,
}

/// Host-independent snapshot of the fields the tar header needs. Deliberately
/// its own struct rather than the raw bytes of `libc::stat`, which isn't
/// portable across hosts.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub kind: Kind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
}

impl Stat {
    /// lstat a path (does not follow symlinks) and classify it.
    pub fn lstat(path: &Path) -> Result<Stat> {
        let raw: FileStat =
            lstat(path).with_context(|| format!("Could not stat '{}'", path.display()))?;
        let mode = Mode::from_bits_truncate(raw.st_mode);
        let sflag = SFlag::from_bits_truncate(raw.st_mode & SFlag::S_IFMT.bits());
        let kind = if sflag.contains(SFlag::S_IFLNK) {
            Kind::Symlink
        } else if sflag.contains(SFlag::S_IFDIR) {
            Kind::Directory
        } else if sflag.contains(SFlag::S_IFREG) {
            Kind::Regular
        } else {
            anyhow::bail!(
                "'{}': only symbolic links, regular files and directories are supported",
                path.display()
            );
        };

        Ok(Stat {
            kind,
            mode: (mode.bits() & 0o7777) as u32,
            uid: raw.st_uid,
            gid: raw.st_gid,
            size: raw.st_size.max(0) as u64,
            mtime: raw.st_mtime,
        })
    }
}

/// Read a symlink's target. Uses the actual number of bytes `readlink`
/// returned rather than trusting `st_size`, which can disagree with the
/// target length and would otherwise index past the end of the buffer.
pub fn read_link_target(path: &Path) -> Result<String> {
    let target =
        std::fs::read_link(path).with_context(|| format!("Could not read link '{}'", path.display()))?;
    Ok(String::from_utf8_lossy(target.as_os_str().as_bytes()).into_owned())
}

/// Per-process cache of uid -> user name and gid -> group name. Owned by
/// whichever component needs it (the planner on the coordinator, or a
/// worker) rather than shared as global state.
#[derive(Default)]
pub struct NameCache {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a uid to a user name, fatal on lookup failure.
    pub fn user_name(&mut self, uid: u32) -> Result<&str> {
        if !self.users.contains_key(&uid) {
            let user = User::from_uid(Uid::from_raw(uid))
                .with_context(|| format!("Could not look up user name for uid {uid}"))?
                .ok_or_else(|| anyhow::anyhow!("Could not find user name for uid {uid}"))?;
            self.users.insert(uid, user.name);
        }
        Ok(self.users.get(&uid).expect("just inserted"))
    }

    /// Resolve a gid to a group name, fatal on lookup failure.
    pub fn group_name(&mut self, gid: u32) -> Result<&str> {
        if !self.groups.contains_key(&gid) {
            let group = Group::from_gid(Gid::from_raw(gid))
                .with_context(|| format!("Could not look up group name for gid {gid}"))?
                .ok_or_else(|| anyhow::anyhow!("Could not find group name for gid {gid}"))?;
            self.groups.insert(gid, group.name);
        }
        Ok(self.groups.get(&gid).expect("just inserted"))
    }
}
