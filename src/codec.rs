//! Wire codec for entry descriptors passed between the coordinator and a
//! worker: fixed-width little-endian fields, no inter-record framing beyond
//! each record's own leading length prefix.
//!
//! Layout of one descriptor record:
//!
//! ```text
//! total_len   u64   length of everything that follows this field
//! kind        u8    0 = regular, 1 = directory, 2 = symlink
//! mode        u32
//! uid         u32
//! gid         u32
//! size        u64
//! mtime       i64
//! offset      u64   byte offset this entry's header+payload starts at
//! name_len    u64
//! name        name_len bytes, UTF-8
//! link_len    u64   0 for non-symlinks
//! link        link_len bytes, UTF-8 (omitted entirely when link_len == 0)
//! ```
//!
//! A terminator record is `name_len == 0` with every other field zeroed;
//! `decode` returns it as `None`.

use anyhow::{bail, Context, Result};

use crate::metadata::{Kind, Stat};
use crate::tar::Entry;

const KIND_REGULAR: u8 = 0;
const KIND_DIRECTORY: u8 = 1;
const KIND_SYMLINK: u8 = 2;

fn kind_to_wire(kind: Kind) -> u8 {
    match kind {
        Kind::Regular => KIND_REGULAR,
        Kind::Directory => KIND_DIRECTORY,
        Kind::Symlink => KIND_SYMLINK,
    }
}

fn kind_from_wire(byte: u8) -> Result<Kind> {
    match byte {
        KIND_REGULAR => Ok(Kind::Regular),
        KIND_DIRECTORY => Ok(Kind::Directory),
        KIND_SYMLINK => Ok(Kind::Symlink),
        other => bail!("unrecognized entry kind byte {other} on the wire"),
    }
}

/// Encode one entry descriptor, including its leading `total_len` prefix.
pub fn encode(entry: &Entry) -> Vec<u8> {
    let name_bytes = entry.filename.as_bytes();
    let link_bytes = entry.linkname.as_bytes();

    let mut body = Vec::with_capacity(1 + 4 + 4 + 4 + 8 + 8 + 8 + 8 + name_bytes.len() + 8 + link_bytes.len());
    body.push(kind_to_wire(entry.stat.kind));
    body.extend_from_slice(&entry.stat.mode.to_le_bytes());
    body.extend_from_slice(&entry.stat.uid.to_le_bytes());
    body.extend_from_slice(&entry.stat.gid.to_le_bytes());
    body.extend_from_slice(&entry.stat.size.to_le_bytes());
    body.extend_from_slice(&entry.stat.mtime.to_le_bytes());
    body.extend_from_slice(&entry.offset.to_le_bytes());
    body.extend_from_slice(&(name_bytes.len() as u64).to_le_bytes());
    body.extend_from_slice(name_bytes);
    body.extend_from_slice(&(link_bytes.len() as u64).to_le_bytes());
    body.extend_from_slice(link_bytes);

    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Encode the terminator record that tells a worker no more descriptors are
/// coming for this job.
pub fn encode_terminator() -> Vec<u8> {
    // kind + mode + uid + gid + size + mtime + offset + name_len(0) + link_len(0)
    let body_len = 1 + 4 + 4 + 4 + 8 + 8 + 8 + 8 + 8;
    let mut out = Vec::with_capacity(8 + body_len);
    out.extend_from_slice(&(body_len as u64).to_le_bytes());
    out.resize(out.len() + body_len, 0);
    out
}

fn take<'a>(buf: &'a [u8], n: usize, what: &str) -> Result<(&'a [u8], &'a [u8])> {
    if buf.len() < n {
        bail!("truncated entry descriptor while reading {what}");
    }
    Ok(buf.split_at(n))
}

/// Decode one descriptor from the front of `buf`. Returns `(entry, consumed)`
/// where `entry` is `None` for a terminator record. `consumed` is always
/// `8 + total_len`, so the caller can advance exactly that far and never
/// guesses at padding.
pub fn decode(buf: &[u8]) -> Result<(Option<Entry>, usize)> {
    let (len_bytes, rest) = take(buf, 8, "total_len")?;
    let total_len = u64::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
    let (body, _) = take(rest, total_len, "descriptor body")?;
    let consumed = 8 + total_len;

    let (kind_b, body) = take(body, 1, "kind")?;
    let (mode_b, body) = take(body, 4, "mode")?;
    let (uid_b, body) = take(body, 4, "uid")?;
    let (gid_b, body) = take(body, 4, "gid")?;
    let (size_b, body) = take(body, 8, "size")?;
    let (mtime_b, body) = take(body, 8, "mtime")?;
    let (offset_b, body) = take(body, 8, "offset")?;
    let (name_len_b, body) = take(body, 8, "name_len")?;
    let name_len = u64::from_le_bytes(name_len_b.try_into().unwrap()) as usize;
    let (name_b, body) = take(body, name_len, "name")?;
    let (link_len_b, body) = take(body, 8, "link_len")?;
    let link_len = u64::from_le_bytes(link_len_b.try_into().unwrap()) as usize;
    let (link_b, remainder) = take(body, link_len, "link")?;

    if !remainder.is_empty() {
        bail!("descriptor body has {} trailing bytes beyond its declared fields", remainder.len());
    }

    if name_len == 0 {
        return Ok((None, consumed));
    }

    let stat = Stat {
        kind: kind_from_wire(kind_b[0])?,
        mode: u32::from_le_bytes(mode_b.try_into().unwrap()),
        uid: u32::from_le_bytes(uid_b.try_into().unwrap()),
        gid: u32::from_le_bytes(gid_b.try_into().unwrap()),
        size: u64::from_le_bytes(size_b.try_into().unwrap()),
        mtime: i64::from_le_bytes(mtime_b.try_into().unwrap()),
    };
    let offset = u64::from_le_bytes(offset_b.try_into().unwrap());
    let filename = String::from_utf8(name_b.to_vec()).context("entry name is not valid UTF-8")?;
    let linkname = String::from_utf8(link_b.to_vec()).context("link target is not valid UTF-8")?;

    Ok((
        Some(Entry {
            offset,
            stat,
            filename,
            linkname,
        }),
        consumed,
    ))
}
