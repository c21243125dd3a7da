//! One backup run: mount check, sync, prune, unmount.
//!
//! Two runs against the same target root are not coordinated in any way;
//! callers that may overlap (cron jobs, timers) have to serialise them, for
//! instance with `flock(1)` around the binary.

use crate::backup::backup_config::BackupConfig;
use crate::backup::mount::MountPoint;
use crate::backup::notifications::Notify;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::{PruneReport, RetentionManager};
use crate::backup::signal::SignalGuard;
use crate::backup::sync::DirectorySyncer;
use chrono::{DateTime, Local};
use derive_more::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const GENERATION_DATE_FORMAT: &str = "%Y%m%d";

pub const MSG_DISK_MOUNTED: &str = "Disk mounted backup starts";
pub const MSG_FINISHED: &str = "Backup was sucessful! You can remove disk";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    MountCheck,
    Syncing,
    Pruning,
    Unmounting,
    Done,
    Failed,
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Set when the mount point could not be mounted; nothing else ran.
    pub mount_error: Option<Error>,
    /// One entry per source directory that failed to sync.
    pub sync_errors: Vec<Error>,
    /// Error that ended the sync phase early (e.g. the target root could not be created).
    pub sync_phase_error: Option<Error>,
    /// Error from pruning or unmounting.
    pub cleanup_error: Option<Error>,
    pub prune_report: Option<PruneReport>,
    pub states: Vec<RunState>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.mount_error.is_none()
            && self.sync_errors.is_empty()
            && self.sync_phase_error.is_none()
            && self.cleanup_error.is_none()
    }

    pub fn final_state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Init)
    }

    /// 1 when the mount point could not be mounted, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self.mount_error {
            Some(_) => 1,
            None => 0,
        }
    }
}

pub struct BackupRun<'a, N: Notify> {
    config: &'a BackupConfig,
    notifier: &'a N,
    backup_dir: PathBuf,
    outcome: RunOutcome,
}

impl<'a, N: Notify> BackupRun<'a, N> {
    /// `started` names the generation directory this run writes to.
    pub fn new(config: &'a BackupConfig, notifier: &'a N, started: DateTime<Local>) -> Self {
        let backup_dir = config
            .target_dir()
            .join(started.format(GENERATION_DATE_FORMAT).to_string());
        Self {
            config,
            notifier,
            backup_dir,
            outcome: RunOutcome {
                states: vec![RunState::Init],
                ..Default::default()
            },
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn transition(&mut self, state: RunState) {
        debug!("Backup run: {} -> {}", self.outcome.final_state(), state);
        self.outcome.states.push(state);
    }

    pub fn run(mut self) -> RunOutcome {
        let config = self.config;
        if let Some(mount_point) = config.mount_point() {
            self.transition(RunState::MountCheck);
            let mount_point = MountPoint::new(mount_point, config.tools());
            if let Err(e) = self.ensure_mounted(mount_point) {
                error!("Disk not mounted and cannot be mounted because {e}");
                self.notifier
                    .notify(&format!("Disk not attached please attach it! Reason {e}"));
                self.outcome.mount_error = Some(e);
                self.transition(RunState::Failed);
                return self.outcome;
            }
        }

        self.transition(RunState::Syncing);
        if let Err(e) = self.sync_all() {
            error!("{e}");
            self.notifier
                .notify(&format!("Error {e}, backup not sucessful"));
            self.outcome.sync_phase_error = Some(e);
        }

        let cleanup = {
            let _guard = SignalGuard::enter();
            self.cleanup()
        };
        if let Err(e) = cleanup {
            error!("{e}");
            self.notifier
                .notify(&format!("Error {e}, backup not sucessful"));
            self.outcome.cleanup_error = Some(e);
        }

        if self.outcome.success() || config.always_send_finish_notification() {
            self.notifier.notify(MSG_FINISHED);
        }
        self.transition(RunState::Done);
        self.outcome
    }

    fn ensure_mounted(&self, mount_point: MountPoint) -> Result<()> {
        info!("Check if {:?} is mounted", mount_point.path());
        if !mount_point.is_mounted()? {
            mount_point.mount()?;
        }

        info!("Disk mounted at {:?}, backups continues", mount_point.path());
        self.notifier.notify(MSG_DISK_MOUNTED);
        Ok(())
    }

    fn sync_all(&mut self) -> Result<()> {
        let config = self.config;
        let target_dir = config.target_dir();
        if !target_dir.exists() {
            fs::create_dir_all(target_dir)
                .map_err(Error::from)
                .with_msg(format!("Cannot create target directory {target_dir:?}"))?;
        }

        let syncer = DirectorySyncer::new(config.tools());
        for directory in config.directories() {
            let synced = syncer.sync(directory, &self.backup_dir);
            let ok = synced.is_ok();
            if let Err(e) = synced {
                error!("{e}");
                self.outcome.sync_errors.push(e);
            }
            if ok || config.always_log_sync_success() {
                info!("Backup was sucessfull");
            }
        }

        Ok(())
    }

    /// Runs with SIGINT held back; a prune failure skips the unmount.
    fn cleanup(&mut self) -> Result<()> {
        let config = self.config;
        self.transition(RunState::Pruning);
        let report = RetentionManager::prune(config.target_dir(), config.keep_backups())?;
        self.outcome.prune_report = Some(report);

        if let Some(mount_point) = config.mount_point() {
            self.transition(RunState::Unmounting);
            let mount_point = MountPoint::new(mount_point, config.tools());
            if mount_point.is_mounted()? {
                mount_point.unmount()?;
            }
        }

        Ok(())
    }
}
