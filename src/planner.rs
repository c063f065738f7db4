//! Offset planner: walks the path source, stats each path, assigns it the
//! next free offset, and records an index line. Single-threaded, owned
//! entirely by the coordinator.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::path_source::PathSource;
use crate::tar::Entry;

pub struct Planner<S: PathSource> {
    source: S,
    running_offset: u64,
    index_path: PathBuf,
    index_file: Option<BufWriter<File>>,
}

impl<S: PathSource> Planner<S> {
    pub fn new(source: S, index_path: PathBuf) -> Result<Planner<S>> {
        let file = File::create(&index_path)
            .with_context(|| format!("Could not create index file '{}'", index_path.display()))?;
        Ok(Planner {
            source,
            running_offset: 0,
            index_path,
            index_file: Some(BufWriter::new(file)),
        })
    }

    /// Produce the next entry descriptor, assigning it `running_offset` and
    /// advancing by its footprint. Returns `None` once the path source is
    /// exhausted; call `finish` afterward to get the synthetic index entry.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        let Some(path) = self.source.next_path()? else {
            return Ok(None);
        };

        let entry = Entry::from_path(&path, self.running_offset)?;
        let footprint = entry.footprint();

        let index_file = self
            .index_file
            .as_mut()
            .expect("next_entry called after finish");
        writeln!(index_file, "{} {}", entry.offset, entry.filename)
            .with_context(|| format!("Could not write an index line for '{}'", entry.filename))?;

        self.running_offset += footprint;
        Ok(Some(entry))
    }

    /// Append the index file's own line, close it, and stat it to build the
    /// synthetic entry the coordinator writes directly (not through the
    /// dispatcher).
    pub fn finish(mut self) -> Result<Entry> {
        let index_path_str = self.index_path.to_string_lossy().into_owned();

        let mut index_file = self
            .index_file
            .take()
            .expect("finish called more than once");
        writeln!(index_file, "{} {}", self.running_offset, index_path_str)
            .context("Could not write the index file's self-describing line")?;
        index_file
            .flush()
            .context("Could not flush the index file")?;
        drop(index_file);

        Entry::from_path(&index_path_str, self.running_offset)
    }
}
