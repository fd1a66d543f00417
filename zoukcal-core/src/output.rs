//! Handing a finished build to the rendering side.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{ZoukError, ZoukResult};
use crate::pipeline::Build;

pub const EVENTS_FILE: &str = "events.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Turns a build into published output.
pub trait Renderer: Send + Sync {
    fn render(&self, build: &Build) -> ZoukResult<()>;
}

/// Writes the listing and the month summaries as JSON into the output directory.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    out_dir: PathBuf,
}

impl JsonSnapshot {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        JsonSnapshot {
            out_dir: out_dir.into(),
        }
    }
}

impl Renderer for JsonSnapshot {
    fn render(&self, build: &Build) -> ZoukResult<()> {
        std::fs::create_dir_all(&self.out_dir).map_err(|e| {
            ZoukError::Output(format!("Could not create {}: {e}", self.out_dir.display()))
        })?;

        // Stage both before publishing either, so a failed write leaves the old pair.
        // The two renames themselves are still separate steps.
        let events = Staged::new(&self.out_dir.join(EVENTS_FILE), &build.listing)?;
        let summary = Staged::new(&self.out_dir.join(SUMMARY_FILE), &build.months)?;
        events.commit()?;
        summary.commit()
    }
}

/// Serialized content sitting in a temp file beside its destination.
///
/// `commit` renames it over the destination, so readers see either the old or
/// the new file, never a partial one. Dropping it uncommitted removes the temp file.
struct Staged {
    temp: NamedTempFile,
    dest: PathBuf,
}

impl Staged {
    fn new<T: Serialize + ?Sized>(dest: &Path, value: &T) -> ZoukResult<Self> {
        let dir = dest.parent().unwrap_or(Path::new("."));
        let content = serde_json::to_vec_pretty(value).map_err(|e| output_error(dest, &e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| output_error(dest, &e))?;
        temp.write_all(&content).map_err(|e| output_error(dest, &e))?;
        Ok(Staged {
            temp,
            dest: dest.to_path_buf(),
        })
    }

    fn commit(self) -> ZoukResult<()> {
        self.temp
            .persist(&self.dest)
            .map_err(|e| output_error(&self.dest, &e.error))?;
        Ok(())
    }
}

fn output_error(dest: &Path, e: &dyn std::fmt::Display) -> ZoukError {
    ZoukError::Output(format!("Write {}: {e}", dest.display()))
}
