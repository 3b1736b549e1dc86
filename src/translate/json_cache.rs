//! Cache backend that keeps the whole cache in one flat JSON object.
//! Every store rewrites a complete snapshot through a temp file and an
//! atomic rename, so a crash mid-write never leaves a truncated file.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::cache::{CacheBackend, CacheError};

pub struct JsonFileBackend {
    path: PathBuf,
    snapshot: HashMap<String, String>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: HashMap::new(),
        }
    }

    fn write_snapshot(&self) -> Result<(), CacheError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Sorted keys keep the file stable across rewrites.
        let ordered: BTreeMap<&String, &String> = self.snapshot.iter().collect();

        let mut temp_file = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &ordered)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp_file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CacheBackend for JsonFileBackend {
    fn load(&mut self) -> Result<HashMap<String, String>, CacheError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no cache file yet, starting empty");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        let entries: HashMap<String, String> = serde_json::from_str(&content)?;
        self.snapshot = entries.clone();
        Ok(entries)
    }

    fn store(&mut self, batch: &[(String, String)]) -> Result<(), CacheError> {
        self.snapshot.extend(batch.iter().cloned());
        self.write_snapshot()?;
        debug!(path = %self.path.display(), entries = self.snapshot.len(), "cache snapshot written");
        Ok(())
    }
}
