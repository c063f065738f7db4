use clap::Parser;

use crate::config::Config;

/// Distributed archiver: cooperatively writes a pax/ustar tar stream from
/// many cluster ranks into one shared output file.
#[derive(Parser, Debug)]
#[command(name = "disttar", version, about)]
pub struct Cli {
    /// Select create mode (the only supported action).
    #[arg(short = 'c', required = true)]
    pub create: bool,

    /// Output archive path.
    #[arg(short = 'f', value_name = "PATH")]
    pub archive: String,

    /// Newline-delimited file of paths to include, `-` for standard input.
    /// May be given more than once.
    #[arg(short = 'T', value_name = "PATH")]
    pub file_lists: Vec<String>,

    /// Additional paths to include (files or directories, walked recursively).
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// Maximum number of outstanding job batches per worker.
    #[arg(long, default_value_t = Config::default().max_jobs_in_flight)]
    pub max_jobs_in_flight: usize,

    /// Maximum number of entries batched into a single job.
    #[arg(long, default_value_t = Config::default().max_files_in_job)]
    pub max_files_in_job: usize,

    /// Target cumulative archive footprint, in bytes, for a single job batch.
    #[arg(long, default_value_t = Config::default().target_job_size)]
    pub target_job_size: u64,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            max_jobs_in_flight: self.max_jobs_in_flight,
            max_files_in_job: self.max_files_in_job,
            target_job_size: self.target_job_size,
        }
    }
}
