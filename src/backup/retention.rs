//! Pruning of old backup generations under the target root.
//!
//! Generations are the immediate sub-directories of the target root, ranked
//! newest first by modification time (ties broken by name, descending). Once
//! there are at least `keep` of them, everything from rank `keep - 1` on is
//! removed, so `keep - 1` generations survive a prune.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::cmp::Reverse;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

/// One dated backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub path: PathBuf,
    pub name: OsString,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneReport {
    NothingToDelete { generations: usize },
    Deleted(Vec<PathBuf>),
}

impl PruneReport {
    pub fn deleted(&self) -> &[PathBuf] {
        match self {
            PruneReport::NothingToDelete { .. } => &[],
            PruneReport::Deleted(paths) => paths,
        }
    }
}

pub struct RetentionManager;

impl RetentionManager {
    pub fn list_generations<P: AsRef<Path>>(target_root: P) -> Result<Vec<Generation>> {
        let target_root = target_root.as_ref();
        let read_context = || format!("Cannot list backups in {target_root:?}");

        fs::read_dir(target_root)
            .map_err(Error::from)
            .with_msg(read_context())?
            .map(|entry| -> Result<Option<Generation>> {
                let entry = entry.map_err(Error::from).with_msg(read_context())?;
                if !entry.file_type()?.is_dir() {
                    return Ok(None);
                }
                let modified = entry
                    .metadata()
                    .and_then(|md| md.modified())
                    .map_err(Error::from)
                    .with_msg(format!("Cannot read modification time of {:?}", entry.path()))?;
                Ok(Some(Generation {
                    path: entry.path(),
                    name: entry.file_name(),
                    modified,
                }))
            })
            .filter_map_ok(|g| g)
            .collect()
    }

    /// Ranks `generations` newest first and returns those to remove, oldest last.
    pub fn select_for_deletion(generations: Vec<Generation>, keep: usize) -> Option<Vec<Generation>> {
        if generations.len() < keep {
            return None;
        }

        Some(
            generations
                .into_iter()
                .sorted_unstable_by_key(|g| Reverse((g.modified, g.name.clone())))
                .skip(keep.saturating_sub(1))
                .collect_vec(),
        )
    }

    /// Deletes old generations under `target_root`.
    ///
    /// The first failing deletion stops the prune and is returned as
    /// [`Error::Delete`]; generations ranked after it are left in place.
    pub fn prune<P: AsRef<Path>>(target_root: P, keep: usize) -> Result<PruneReport> {
        let generations = Self::list_generations(target_root)?;
        let count = generations.len();

        let Some(to_delete) = Self::select_for_deletion(generations, keep) else {
            info!("Not removing any old backup, number of backups {count}");
            return Ok(PruneReport::NothingToDelete { generations: count });
        };

        let mut deleted = Vec::with_capacity(to_delete.len());
        for generation in to_delete {
            info!(
                "Removing directory {} (modified {})",
                generation.name.to_string_lossy(),
                DateTime::<Local>::from(generation.modified).format("%Y-%m-%d %H:%M:%S")
            );
            fs::remove_dir_all(&generation.path).map_err(|source| Error::Delete {
                path: generation.path.clone(),
                source,
            })?;
            deleted.push(generation.path);
        }

        Ok(PruneReport::Deleted(deleted))
    }
}
