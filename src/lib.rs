//! # disk-backup
//!
//! Mirrors a set of directories onto a backup disk, one dated directory per
//! run, and keeps only the most recent runs.
//!
//! ## Features
//!
//! - **Mount handling**: mounts the backup volume first and unmounts it afterwards
//! - **Mirroring**: each source directory is copied with `rsync -rav`
//! - **Retention**: old dated directories are pruned by modification time
//! - **Notifications**: plain-text mails on mount failure, errors and completion
//! - **Interrupt safety**: Ctrl-C is held back while old backups are deleted
//!
//! ## Quick Start
//!
//! ```no_run
//! use disk_backup::backup::backup_config::BackupConfig;
//! use disk_backup::backup::notifications::Notifier;
//! use disk_backup::backup::run::BackupRun;
//!
//! let config = BackupConfig::from_yaml_file("backup.yml")?;
//! let notifier = Notifier::new(config.notification().clone());
//! let outcome = BackupRun::new(&config, &notifier, chrono::Local::now()).run();
//! std::process::exit(outcome.exit_code().into());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
