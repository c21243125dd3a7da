use crate::backup::notifications::NotificationConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::{validate_dir_or_absent, validate_program};
use bon::Builder;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::Validate;

pub const DEFAULT_KEEP_BACKUPS: usize = 4;

/// Immutable parameters of one backup run.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Source directories, synced in this order.
    #[validate(length(min = 1))]
    #[builder(into)]
    #[getset(get = "pub")]
    directories: Vec<PathBuf>,

    /// Root holding one dated sub-directory per backup generation.
    #[validate(custom(function = validate_dir_or_absent))]
    #[builder(into)]
    #[getset(get = "pub")]
    target_dir: PathBuf,

    /// Volume that must be mounted before the backup starts.
    #[builder(into)]
    #[getset(get = "pub")]
    mount_point: Option<PathBuf>,

    #[validate(range(min = 1))]
    #[serde(default = "default_keep_backups")]
    #[builder(default = DEFAULT_KEEP_BACKUPS)]
    #[getset(get_copy = "pub")]
    keep_backups: usize,

    #[validate(nested)]
    #[builder(into)]
    #[getset(get = "pub")]
    notification: Option<NotificationConfig>,

    #[validate(nested)]
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub")]
    tools: ToolsConfig,

    /// Log "Backup was sucessfull" after every directory, failed or not.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    #[getset(get_copy = "pub")]
    always_log_sync_success: bool,

    /// Send the "you can remove disk" mail even when a phase failed.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    #[getset(get_copy = "pub")]
    always_send_finish_notification: bool,
}

fn default_keep_backups() -> usize {
    DEFAULT_KEEP_BACKUPS
}

fn default_true() -> bool {
    true
}

impl BackupConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, BackupConfig>(f).map_err(Error::from))
            .with_msg(format!("Parse YAML config failed: {path:?}"))
    }
}

/// External programs the run shells out to.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct ToolsConfig {
    #[validate(custom(function = validate_program))]
    #[serde(default = "default_sync_program")]
    #[builder(default = default_sync_program(), into)]
    sync_program: String,

    /// Passed to the sync program before `-rav <source> <dest>/`.
    #[serde(default)]
    #[builder(default, into)]
    sync_args: Vec<String>,

    #[validate(custom(function = validate_program))]
    #[serde(default = "default_mount_program")]
    #[builder(default = default_mount_program(), into)]
    mount_program: String,

    #[validate(custom(function = validate_program))]
    #[serde(default = "default_umount_program")]
    #[builder(default = default_umount_program(), into)]
    umount_program: String,
}

fn default_sync_program() -> String {
    "rsync".to_string()
}

fn default_mount_program() -> String {
    "mount".to_string()
}

fn default_umount_program() -> String {
    "umount".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::notifications::smtp::SmtpMode;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_builder_defaults() {
        let config = BackupConfig::builder()
            .directories(vec![PathBuf::from("/srv")])
            .target_dir("/mnt/backup")
            .build();

        assert_eq!(config.keep_backups(), DEFAULT_KEEP_BACKUPS);
        assert!(config.mount_point().is_none());
        assert!(config.notification().is_none());
        assert_eq!(config.tools().sync_program(), "rsync");
        assert_eq!(config.tools().mount_program(), "mount");
        assert_eq!(config.tools().umount_program(), "umount");
        assert!(config.always_log_sync_success());
        assert!(config.always_send_finish_notification());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_keep() {
        let config = BackupConfig::builder()
            .directories(vec![PathBuf::from("/srv")])
            .target_dir("/mnt/backup")
            .keep_backups(0)
            .build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_no_directories() {
        let config = BackupConfig::builder()
            .directories(Vec::<PathBuf>::new())
            .target_dir("/mnt/backup")
            .build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_target_that_is_a_file() {
        let file = NamedTempFile::new().unwrap();
        let config = BackupConfig::builder()
            .directories(vec![PathBuf::from("/srv")])
            .target_dir(file.path())
            .build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_program() {
        let config = BackupConfig::builder()
            .directories(vec![PathBuf::from("/srv")])
            .target_dir("/mnt/backup")
            .tools(ToolsConfig::builder().sync_program("").build())
            .build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
directories:
  - /srv
  - /home
target_dir: {}
mount_point: /mnt/usb
keep_backups: 7
notification:
  type: smtp
  host: mail.example.com
  from: backup@example.com
  to:
    - ops@example.com
tools:
  sync_args: ["--delete"]
always_send_finish_notification: false
"#,
            dir.path().display()
        )
        .unwrap();

        let config = BackupConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(
            config.directories(),
            &vec![PathBuf::from("/srv"), PathBuf::from("/home")]
        );
        assert_eq!(config.target_dir(), dir.path());
        assert_eq!(config.mount_point().as_deref(), Some(Path::new("/mnt/usb")));
        assert_eq!(config.keep_backups(), 7);
        assert_eq!(config.tools().sync_program(), "rsync");
        assert_eq!(config.tools().sync_args(), &vec!["--delete".to_string()]);
        assert!(config.always_log_sync_success());
        assert!(!config.always_send_finish_notification());
        match config.notification() {
            Some(NotificationConfig::Smtp(smtp)) => {
                assert_eq!(smtp.host(), "mail.example.com");
                assert_eq!(smtp.smtp_mode(), &SmtpMode::Unsecured);
                assert_eq!(smtp.to().len(), 1);
            }
            None => panic!("Expected smtp notification"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "directories: [/srv]\ntarget_dir: /mnt/backup\ncompression: xz\n"
        )
        .unwrap();

        assert!(BackupConfig::from_yaml_file(file.path()).is_err());
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let err = BackupConfig::from_yaml_file("/nonexistent/backup.yml").unwrap_err();

        assert!(matches!(err.root(), Error::Io(_)));
        assert!(err.to_string().contains("Parse YAML config failed"));
    }
}
