// ============================================================
// Layer 4 — Recording Loader
// ============================================================
// Loads recordings from a directory tree of .json files.
//
// Each file holds either a single recording:
//
//   { "id": "...", "channels": [[...], [...]], "beats": [...],
//     "events": [[...], ...], "disease_names": ["AF", ...] }
//
// or an array of such objects (a pre-chunked bundle of one
// long recording). Identifiers are file paths; listing walks
// the tree recursively and returns them sorted.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::recording::Recording;
use crate::domain::traits::RecordingSource;

/// Either layout a corpus file may use.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordingFile {
    Single(Recording),
    Bundle(Vec<Recording>),
}

/// Loads recordings from every `*.json` file under a directory.
pub struct JsonRecordingStore {
    dir: PathBuf,
}

impl JsonRecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordingSource for JsonRecordingStore {
    fn list_recordings(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            bail!("Data directory '{}' does not exist", self.dir.display());
        }
        let mut found = Vec::new();
        find_files(&self.dir, "json", &mut found)?;
        found.sort();
        tracing::debug!("Found {} recordings under '{}'", found.len(), self.dir.display());
        Ok(found)
    }

    fn load_recording(&self, id: &str) -> Result<Recording> {
        match read_file(Path::new(id))? {
            RecordingFile::Single(r) => Ok(r),
            RecordingFile::Bundle(mut rs) if rs.len() == 1 => Ok(rs.remove(0)),
            RecordingFile::Bundle(rs) => {
                bail!("'{}' holds a bundle of {} recordings, not a single one", id, rs.len())
            }
        }
    }

    fn load_bundle(&self, id: &str) -> Result<Vec<Recording>> {
        match read_file(Path::new(id))? {
            RecordingFile::Single(r) => Ok(vec![r]),
            RecordingFile::Bundle(rs) => Ok(rs),
        }
    }
}

/// Parse one corpus file. Recordings without an id get the file path.
fn read_file(path: &Path) -> Result<RecordingFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let file: RecordingFile = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not a valid recording file", path.display()))?;

    let name = path.display().to_string();
    Ok(match file {
        RecordingFile::Single(r) => RecordingFile::Single(with_default_id(r, &name, None)),
        RecordingFile::Bundle(rs) => RecordingFile::Bundle(
            rs.into_iter()
                .enumerate()
                .map(|(i, r)| with_default_id(r, &name, Some(i)))
                .collect(),
        ),
    })
}

fn with_default_id(r: Recording, name: &str, part: Option<usize>) -> Recording {
    if !r.id().is_empty() {
        return r;
    }
    match part {
        Some(i) => r.with_id(format!("{name}#{i}")),
        None => r.with_id(name),
    }
}

/// Recursively collect files with the given extension.
pub fn find_files(dir: &Path, extension: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            find_files(&path, extension, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            out.push(path.display().to_string());
        }
    }
    Ok(())
}
