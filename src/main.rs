use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;

use disttar::cli::Cli;
use disttar::path_source::{ChainedSource, DirWalkSource, FileListSource, SinglePathSource};
use disttar::planner::Planner;
use disttar::progress::{BarSink, ProgressSink};
use disttar::sharedfile::{self, SharedFile};
use disttar::transport::Transport;
use disttar::{dispatch, worker};

fn build_path_source(cli: &Cli) -> Result<ChainedSource> {
    let mut chain = ChainedSource::new();

    for list_path in &cli.file_lists {
        chain.push(Box::new(FileListSource::open(list_path)?));
    }

    for path in &cli.paths {
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("Could not stat '{path}'"))?;
        if meta.is_dir() {
            chain.push(Box::new(DirWalkSource::new(path)));
        } else {
            chain.push(Box::new(SinglePathSource::new(path.clone())));
        }
    }

    Ok(chain)
}

fn index_path_for(archive: &str) -> PathBuf {
    let mut p = PathBuf::from(archive);
    let idx_name = format!("{}.idx", p.file_name().unwrap_or_default().to_string_lossy());
    p.set_file_name(idx_name);
    p
}

/// Rough estimate of the final archive size, used only for the preflight
/// disk-space warning and the progress bar's total. Directories under `-T`
/// file lists are not walked here — only positional directory arguments,
/// which are the common case for a sizable archive.
fn estimate_input_size(cli: &Cli) -> u64 {
    cli.paths.iter().filter_map(|p| dir_size(Path::new(p)).ok()).sum()
}

fn dir_size(path: &Path) -> Result<u64> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    } else {
        Ok(meta.len())
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    anyhow::ensure!(cli.create, "disttar currently only supports create mode (-c)");

    let (_universe, transport) = Transport::init();
    let config = cli.config();
    let archive_path = PathBuf::from(&cli.archive);
    let estimated_size = estimate_input_size(&cli);

    if transport.is_coordinator() {
        sharedfile::warn_if_low_on_space(&archive_path, estimated_size);
        sharedfile::create_truncate(&archive_path)?;
    }
    transport.barrier();

    let mut shared = SharedFile::open_for_write(&archive_path)?;

    if transport.is_coordinator() {
        let source = build_path_source(&cli)?;
        let index_path = index_path_for(&cli.archive);
        let planner = Planner::new(source, index_path)?;
        let progress = BarSink::new(estimated_size);

        dispatch::run_coordinator(&transport, planner, &config, &progress, &mut shared)?;

        transport.barrier();
        progress.finish();
    } else {
        worker::run_worker(&transport, &mut shared)?;
        transport.barrier();
    }

    transport.barrier();
    shared.finish()?;

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
