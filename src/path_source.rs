//! External path sources: where the list of paths to archive comes from.
//!
//! Every source implements `next_path`, yielding one path per call until
//! exhausted. Sources compose: `ChainedSource` drains each sub-source in
//! order, so `-T list.txt dir1 dir2` walks as one logical stream.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub trait PathSource {
    /// Return the next path, or `Ok(None)` once the source is exhausted.
    fn next_path(&mut self) -> Result<Option<String>>;
}

/// Reads one path per line from a file, or from stdin when the file name is
/// `-`. Blank lines are skipped; no `%include` nesting is supported.
pub struct FileListSource {
    lines: Box<dyn Iterator<Item = io::Result<String>>>,
}

impl FileListSource {
    pub fn open(path: &str) -> Result<FileListSource> {
        let lines: Box<dyn Iterator<Item = io::Result<String>>> = if path == "-" {
            Box::new(BufReader::new(io::stdin()).lines())
        } else {
            let file = File::open(path).with_context(|| format!("Could not open file list '{path}'"))?;
            Box::new(BufReader::new(file).lines())
        };
        Ok(FileListSource { lines })
    }
}

impl PathSource for FileListSource {
    fn next_path(&mut self) -> Result<Option<String>> {
        for line in self.lines.by_ref() {
            let line = line.context("Could not read a line from a file list")?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
        Ok(None)
    }
}

/// Walks a directory tree depth-first, yielding every entry under it
/// (including the root itself). `.` and `..` are never yielded since
/// `walkdir` never produces them.
pub struct DirWalkSource {
    entries: walkdir::IntoIter,
}

impl DirWalkSource {
    pub fn new(root: impl AsRef<Path>) -> DirWalkSource {
        DirWalkSource {
            entries: WalkDir::new(root).into_iter(),
        }
    }
}

impl PathSource for DirWalkSource {
    fn next_path(&mut self) -> Result<Option<String>> {
        match self.entries.next() {
            Some(Ok(entry)) => Ok(Some(entry.path().to_string_lossy().into_owned())),
            Some(Err(err)) => Err(err).context("Could not walk a directory tree"),
            None => Ok(None),
        }
    }
}

/// A single path given directly on the command line, yielded once.
pub struct SinglePathSource {
    path: Option<String>,
}

impl SinglePathSource {
    pub fn new(path: impl Into<String>) -> SinglePathSource {
        SinglePathSource {
            path: Some(path.into()),
        }
    }
}

impl PathSource for SinglePathSource {
    fn next_path(&mut self) -> Result<Option<String>> {
        Ok(self.path.take())
    }
}

/// Drains each sub-source fully, in order, before moving to the next.
#[derive(Default)]
pub struct ChainedSource {
    sources: std::collections::VecDeque<Box<dyn PathSource>>,
}

impl ChainedSource {
    pub fn new() -> ChainedSource {
        ChainedSource::default()
    }

    pub fn push(&mut self, source: Box<dyn PathSource>) {
        self.sources.push_back(source);
    }
}

impl PathSource for ChainedSource {
    fn next_path(&mut self) -> Result<Option<String>> {
        while let Some(front) = self.sources.front_mut() {
            if let Some(path) = front.next_path()? {
                return Ok(Some(path));
            }
            self.sources.pop_front();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_list_source_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        std::fs::File::create(&list)
            .unwrap()
            .write_all(b"a\n\nb\n  \nc\n")
            .unwrap();

        let mut source = FileListSource::open(list.to_str().unwrap()).unwrap();
        let mut out = Vec::new();
        while let Some(p) = source.next_path().unwrap() {
            out.push(p);
        }
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn dir_walk_source_yields_the_root_and_its_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("leaf.txt"), b"x").unwrap();

        let mut source = DirWalkSource::new(dir.path());
        let mut count = 0;
        while source.next_path().unwrap().is_some() {
            count += 1;
        }
        // root + sub + leaf.txt
        assert_eq!(count, 3);
    }

    #[test]
    fn chained_source_drains_in_order() {
        let mut chain = ChainedSource::new();
        chain.push(Box::new(SinglePathSource::new("first")));
        chain.push(Box::new(SinglePathSource::new("second")));

        assert_eq!(chain.next_path().unwrap(), Some("first".to_string()));
        assert_eq!(chain.next_path().unwrap(), Some("second".to_string()));
        assert_eq!(chain.next_path().unwrap(), None);
    }
}
