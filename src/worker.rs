//! Worker executor: receives job batches from the coordinator, writes each
//! descriptor's header and payload into the shared archive file at its
//! assigned offset, and acks batch progress back.

use std::collections::VecDeque;
use std::io::Read;

use anyhow::{Context, Result};
use mpi::traits::*;

use crate::codec;
use crate::metadata::{Kind, NameCache};
use crate::sharedfile::SharedFile;
use crate::tar::header::round_up_block;
use crate::tar::Entry;
use crate::transport::Transport;

const COPY_CHUNK_SIZE: usize = 512 * 1024 * 1024;

/// Write one descriptor's header and, for regular files, its payload. Used
/// both by a worker processing its queue and by the coordinator writing the
/// synthetic index entry directly.
pub fn write_descriptor(shared: &mut SharedFile, entry: &Entry, names: &mut NameCache) -> Result<u64> {
    let header = entry.emit_header(names)?;
    shared.write_at(entry.offset, &header)?;
    let mut written = header.len() as u64;

    if entry.stat.kind == Kind::Regular {
        let mut source = std::fs::File::open(&entry.filename)
            .with_context(|| format!("Could not open source file '{}'", entry.filename))?;

        let mut remaining = entry.stat.size;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE.min(remaining.max(1) as usize)];
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            source
                .read_exact(&mut buf[..want])
                .with_context(|| format!("Could not read '{}'", entry.filename))?;
            let pos = shared.position();
            shared.write_at(pos, &buf[..want])?;
            remaining -= want as u64;
            written += want as u64;
        }

        let pad_len = round_up_block(entry.stat.size) - entry.stat.size;
        if pad_len > 0 {
            let zeros = vec![0u8; pad_len as usize];
            let pos = shared.position();
            shared.write_at(pos, &zeros)?;
            written += pad_len;
        }
    }

    Ok(written)
}

/// Run the worker loop until a terminator descriptor has been received and
/// every queued descriptor before it has been written.
pub fn run_worker(transport: &Transport, shared: &mut SharedFile) -> Result<()> {
    let world = &transport.world;
    let coordinator = world.process_at_rank(0);
    let mut names = NameCache::new();
    let mut queue: VecDeque<(Entry, Option<i32>)> = VecDeque::new();
    let mut chunk_written: u64 = 0;
    let mut done = false;

    loop {
        let incoming = if queue.is_empty() {
            Some(world.any_process().matched_probe())
        } else {
            world.any_process().immediate_matched_probe()
        };

        if let Some((message, status)) = incoming {
            let tag = status.tag();
            let count = status.count(u8::equivalent_datatype()) as usize;
            let mut buf = vec![0u8; count];
            message.matched_receive_into(&mut buf[..]);

            let mut cursor = 0usize;
            let mut is_leader = true;
            while cursor < buf.len() {
                let (maybe_entry, consumed) = codec::decode(&buf[cursor..])?;
                cursor += consumed;
                match maybe_entry {
                    Some(entry) => {
                        let ack_tag = if is_leader { Some(tag) } else { None };
                        queue.push_back((entry, ack_tag));
                    }
                    None => {
                        done = true;
                        break;
                    }
                }
                is_leader = false;
            }
        }

        if let Some((entry, ack_tag)) = queue.pop_front() {
            let written = write_descriptor(shared, &entry, &mut names)?;
            chunk_written += written;

            if let Some(tag) = ack_tag {
                let ack = chunk_written.to_le_bytes();
                coordinator.send_with_tag(&ack, tag);
                chunk_written = 0;
            }
        }

        if done && queue.is_empty() {
            break;
        }
    }

    Ok(())
}
