//! Random-access event input from JSON Lines files.
//!
//! Each non-blank line holds one event: an object mapping collection names to
//! arrays of generated particles.
//!
//! ```text
//! {"GenParticle": [{"pdgid": 13, "status": 1, "charge": -1, "px": 1.0, "py": 2.0, "pz": 3.0, "e": 3.9}]}
//! ```
//!
//! Files are scanned once on open to index line offsets, so any event can be
//! fetched by index without reading the ones before it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A generated particle as stored in the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenParticleRecord {
    pub pdgid: i32,
    #[serde(default = "default_status")]
    pub status: i32,
    #[serde(default)]
    pub charge: i32,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

fn default_status() -> i32 { 1 }

/// Raw input collections of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputEvent {
    pub collections: HashMap<String, Vec<GenParticleRecord>>,
}

impl InputEvent {
    pub fn collection(&self, name: &str) -> Option<&[GenParticleRecord]> {
        self.collections.get(name).map(Vec::as_slice)
    }
}

/// Source of input events addressed by index.
pub trait EventSource {
    /// Total number of events.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read event `index`.
    fn event(&mut self, index: usize) -> Result<InputEvent>;
}

struct IndexedFile {
    path: PathBuf,
    reader: BufReader<File>,
    offsets: Vec<u64>,
}

impl IndexedFile {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open event file {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut offsets = Vec::new();
        let mut position = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if read == 0 {
                break;
            }
            if !line.trim().is_empty() {
                offsets.push(position);
            }
            position += read as u64;
        }

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            offsets,
        })
    }

    fn read(&mut self, local_index: usize) -> Result<InputEvent> {
        let offset = self.offsets[local_index];
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        serde_json::from_str(line.trim()).with_context(|| {
            format!(
                "Malformed event {} in {}",
                local_index,
                self.path.display()
            )
        })
    }
}

/// Chain of JSON Lines files read as one event sequence.
pub struct JsonLinesSource {
    files: Vec<IndexedFile>,
    /// Cumulative event counts: `starts[i]` is the global index of file i's first event
    starts: Vec<usize>,
    total: usize,
}

impl JsonLinesSource {
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        let mut starts = Vec::with_capacity(paths.len());
        let mut total = 0;

        for path in paths {
            let file = IndexedFile::open(path.as_ref())?;
            tracing::debug!("Indexed {} events in {}", file.offsets.len(), file.path.display());
            starts.push(total);
            total += file.offsets.len();
            files.push(file);
        }

        Ok(Self {
            files,
            starts,
            total,
        })
    }
}

impl EventSource for JsonLinesSource {
    fn len(&self) -> usize {
        self.total
    }

    fn event(&mut self, index: usize) -> Result<InputEvent> {
        if index >= self.total {
            anyhow::bail!(
                "Event index {} out of range ({} events available)",
                index,
                self.total
            );
        }
        // Last file whose first event is <= index; empty files share a start
        // with their successor and are skipped by taking the last match.
        let file_idx = self.starts.partition_point(|&start| start <= index) - 1;
        let local = index - self.starts[file_idx];
        self.files[file_idx].read(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn event_line(pdgid: i32) -> String {
        format!(
            r#"{{"GenParticle": [{{"pdgid": {}, "px": 1.0, "py": 0.0, "pz": 0.0, "e": 1.0}}]}}"#,
            pdgid
        )
    }

    #[test]
    fn test_chain_of_files() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.jsonl", &[&event_line(11), "", &event_line(13)]);
        let empty = write_file(&dir, "empty.jsonl", &[]);
        let b = write_file(&dir, "b.jsonl", &[&event_line(22)]);

        let mut source = JsonLinesSource::open(&[a, empty, b]).unwrap();
        assert_eq!(source.len(), 3);

        let pdgids: Vec<i32> = (0..3)
            .map(|i| source.event(i).unwrap().collection("GenParticle").unwrap()[0].pdgid)
            .collect();
        assert_eq!(pdgids, vec![11, 13, 22]);

        // Random access backwards
        let first = source.event(0).unwrap();
        assert_eq!(first.collection("GenParticle").unwrap()[0].pdgid, 11);
    }

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.jsonl", &[&event_line(22)]);
        let mut source = JsonLinesSource::open(&[path]).unwrap();
        let record = &source.event(0).unwrap().collections["GenParticle"][0];
        assert_eq!(record.status, 1);
        assert_eq!(record.charge, 0);
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.jsonl", &[&event_line(11)]);
        let mut source = JsonLinesSource::open(&[path]).unwrap();
        assert!(source.event(1).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = JsonLinesSource::open(&["/nonexistent/events.jsonl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.jsonl", &["{not json"]);
        let mut source = JsonLinesSource::open(&[path]).unwrap();
        let err = format!("{:#}", source.event(0).unwrap_err());
        assert!(err.contains("Malformed event 0"));
    }
}
