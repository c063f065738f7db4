//! Work dispatcher: the coordinator's round-robin loop over workers,
//! batching descriptors from the planner, keeping a bounded number of jobs
//! in flight per worker, and draining to a clean shutdown.

use anyhow::Result;
use mpi::traits::*;

use crate::codec;
use crate::config::Config;
use crate::metadata::NameCache;
use crate::path_source::PathSource;
use crate::planner::Planner;
use crate::progress::ProgressSink;
use crate::sharedfile::SharedFile;
use crate::transport::Transport;
use crate::worker::write_descriptor;

// A `Request` borrows its buffer for the scope's lifetime rather than
// owning it (`mpi::request::Request<'a, Sc>`'s `Sc` is the scope, not the
// buffer type), so the send/recv byte buffers backing each slot have to
// live in storage that outlives `mpi::request::scope(...)` — see
// `send_bufs`/`recv_bufs` in `run_coordinator`. `Slot` only holds the
// requests that borrow from that storage.
struct Slot<'a> {
    send: Option<mpi::request::Request<'a, mpi::request::LocalScope<'a>>>,
    recv: Option<mpi::request::Request<'a, mpi::request::LocalScope<'a>>>,
}

impl<'a> Slot<'a> {
    fn idle() -> Slot<'a> {
        Slot {
            send: None,
            recv: None,
        }
    }

    fn occupied(&self) -> bool {
        self.recv.is_some()
    }
}

/// Drive the dispatch loop to completion: hands the planner's descriptors
/// out to every worker rank, drains outstanding acks, broadcasts the
/// terminator, and writes the synthetic index entry and trailer directly.
pub fn run_coordinator<S: PathSource>(
    transport: &Transport,
    mut planner: Planner<S>,
    config: &Config,
    progress: &dyn ProgressSink,
    shared: &mut SharedFile,
) -> Result<()> {
    let world = &transport.world;
    let size = world.size();
    anyhow::ensure!(
        size >= 2,
        "disttar needs at least one worker rank in addition to the coordinator"
    );
    let workers: Vec<i32> = (1..size).collect();
    let num_workers = workers.len();
    let num_slots = config.max_jobs_in_flight;

    // Backing storage for every in-flight job's send/recv buffers. These
    // outer `Vec`s are sized once and never resized again, so the inner
    // buffers never move for as long as a `Request` below might borrow
    // them; only the inner `Vec<u8>`/`[u8; 8]` contents are overwritten,
    // and only once the slot holding them is idle again.
    let mut send_bufs: Vec<Vec<Vec<u8>>> = (0..num_workers)
        .map(|_| (0..num_slots).map(|_| Vec::new()).collect())
        .collect();
    let mut recv_bufs: Vec<Vec<[u8; 8]>> = (0..num_workers)
        .map(|_| vec![[0u8; 8]; num_slots])
        .collect();

    mpi::request::scope(|scope| -> Result<()> {
        let mut slots: Vec<Vec<Slot>> = (0..num_workers)
            .map(|_| (0..num_slots).map(|_| Slot::idle()).collect())
            .collect();
        let mut exhausted = false;
        let mut next_worker = 0usize;

        loop {
            let all_idle = slots.iter().all(|ws| ws.iter().all(|s| !s.occupied()));
            if exhausted && all_idle {
                break;
            }

            let wi = next_worker % num_workers;
            next_worker = next_worker.wrapping_add(1);
            let worker_rank = workers[wi];

            for slot in slots[wi].iter_mut() {
                if let Some(req) = slot.send.take() {
                    match req.test() {
                        Ok(_status) => {}
                        Err(req) => slot.send = Some(req),
                    }
                }
            }

            for (idx, slot) in slots[wi].iter_mut().enumerate() {
                if let Some(req) = slot.recv.take() {
                    match req.test() {
                        Ok(_status) => {
                            let written = u64::from_le_bytes(recv_bufs[wi][idx]);
                            progress.advance(written);
                        }
                        Err(req) => slot.recv = Some(req),
                    }
                }
            }

            if !exhausted {
                if let Some(free_idx) = slots[wi].iter().position(|s| !s.occupied()) {
                    let mut batch = Vec::new();
                    let mut batch_files = 0usize;
                    let mut batch_bytes = 0u64;

                    loop {
                        match planner.next_entry()? {
                            Some(entry) => {
                                batch_bytes += entry.footprint();
                                batch.extend_from_slice(&codec::encode(&entry));
                                batch_files += 1;
                                if batch_files >= config.max_files_in_job
                                    || batch_bytes >= config.target_job_size
                                {
                                    break;
                                }
                            }
                            None => {
                                exhausted = true;
                                break;
                            }
                        }
                    }

                    if !batch.is_empty() {
                        let tag = free_idx as i32;
                        let process = world.process_at_rank(worker_rank);

                        send_bufs[wi][free_idx] = batch;
                        recv_bufs[wi][free_idx] = [0u8; 8];

                        let recv_req = process.immediate_receive_into_with_tag(
                            scope,
                            &mut recv_bufs[wi][free_idx],
                            tag,
                        );
                        let send_req = process.immediate_send_with_tag(
                            scope,
                            &send_bufs[wi][free_idx],
                            tag,
                        );
                        slots[wi][free_idx] = Slot {
                            send: Some(send_req),
                            recv: Some(recv_req),
                        };
                    }
                }
            }
        }

        Ok(())
    })?;

    for &worker_rank in &workers {
        world
            .process_at_rank(worker_rank)
            .send_with_tag(&codec::encode_terminator(), 0);
    }

    let index_entry = planner.finish()?;
    let mut names = NameCache::new();
    write_descriptor(shared, &index_entry, &mut names)?;
    shared.write_trailer()?;

    Ok(())
}
