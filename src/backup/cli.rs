use crate::backup::backup_config::{BackupConfig, ToolsConfig, DEFAULT_KEEP_BACKUPS};
use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::notifications::NotificationConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use clap::Parser;
use itertools::Itertools;
use lettre::message::Mailbox;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Backup directories which are listed and remove old backups.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    after_help = "All parameters can be stored to a file in --param=value format, \
                  one parameter per line, then specify this file with @file."
)]
pub struct Args {
    /// Directory to backup. Can be specified multiple times.
    #[arg(short = 'd', long = "directory", value_name = "DIRECTORY", required_unless_present = "config")]
    pub directories: Vec<PathBuf>,

    /// Backup target directory
    #[arg(short = 't', long = "targetdir", value_name = "DIRECTORY", required_unless_present = "config")]
    pub target_dir: Option<PathBuf>,

    /// Mount point that must be mounted before backup
    #[arg(short = 'm', long = "mountpoint", value_name = "DIRECTORY")]
    pub mount_point: Option<PathBuf>,

    /// Number of backups to keep
    #[arg(short = 'k', long = "keepbackups", value_name = "KEEPBACKUPS", default_value_t = DEFAULT_KEEP_BACKUPS)]
    pub keep_backups: usize,

    /// Email to send notifications to. Can be specified multiple times.
    #[arg(short = 'e', long = "email", value_name = "EMAIL", value_delimiter = ',')]
    pub emails: Vec<String>,

    /// Email sender address, no meaning without --email
    #[arg(short = 'f', long = "from", value_name = "EMAIL", default_value = "root@localhost")]
    pub mail_from: String,

    /// SMTP server to use
    #[arg(short = 's', long = "smtpserver", value_name = "SMTPSERVER", default_value = "localhost")]
    pub smtp_server: String,

    /// SMTP server port
    #[arg(long = "smtp-port", value_name = "PORT", default_value_t = 25)]
    pub smtp_port: u16,

    /// Program used to mirror directories, called as `<program> -rav <src> <dest>/`
    #[arg(long = "sync-program", value_name = "PROGRAM", default_value = "rsync")]
    pub sync_program: String,

    /// Print debug messages
    #[arg(long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Read the whole configuration from a YAML file instead of flags
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with_all = [
            "directories",
            "target_dir",
            "mount_point",
            "keep_backups",
            "emails",
            "mail_from",
            "smtp_server",
            "smtp_port",
            "sync_program",
        ]
    )]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }

    /// Builds the run configuration. It is not validated yet.
    pub fn into_config(self) -> Result<BackupConfig> {
        if let Some(path) = &self.config {
            return BackupConfig::from_yaml_file(path);
        }

        let notification = self.notification()?;
        let target_dir = match self.target_dir {
            Some(dir) => std::path::absolute(&dir)
                .map_err(Error::from)
                .with_msg(format!("Invalid target directory {dir:?}"))?,
            None => return Err(Error::InvalidArgument("--targetdir is required".to_string())),
        };

        Ok(BackupConfig::builder()
            .directories(self.directories)
            .target_dir(target_dir)
            .maybe_mount_point(self.mount_point)
            .keep_backups(self.keep_backups)
            .maybe_notification(notification)
            .tools(ToolsConfig::builder().sync_program(self.sync_program).build())
            .build())
    }

    fn notification(&self) -> Result<Option<NotificationConfig>> {
        if self.emails.is_empty() {
            return Ok(None);
        }

        let to: Vec<Mailbox> = self
            .emails
            .iter()
            .map(|e| {
                e.parse::<Mailbox>()
                    .map_err(Error::from)
                    .with_msg(format!("Invalid email {e:?}"))
            })
            .try_collect()?;
        let from = self
            .mail_from
            .parse::<Mailbox>()
            .map_err(Error::from)
            .with_msg(format!("Invalid sender {:?}", self.mail_from))?;

        Ok(Some(
            SmtpNotificationConfig::builder()
                .host(self.smtp_server.clone())
                .port(self.smtp_port)
                .from(from)
                .to(to)
                .build()
                .into(),
        ))
    }
}

/// Replaces every `@file` argument with the lines of that file.
///
/// Each non-blank line is one argument, usually `--flag=value`. Files may
/// reference further `@file`s. The program name is never expanded.
pub fn expand_arg_files<I: IntoIterator<Item = OsString>>(args: I) -> Result<Vec<OsString>> {
    let mut args = args.into_iter();
    let mut expanded = args.next().into_iter().collect_vec();
    for arg in args {
        expand_arg(arg, &mut expanded, 0)?;
    }
    Ok(expanded)
}

const MAX_ARG_FILE_DEPTH: usize = 16;

fn expand_arg(arg: OsString, out: &mut Vec<OsString>, depth: usize) -> Result<()> {
    let Some(path) = arg.to_str().and_then(|s| s.strip_prefix('@')) else {
        out.push(arg);
        return Ok(());
    };
    if depth >= MAX_ARG_FILE_DEPTH {
        return Err(Error::InvalidArgument(format!(
            "Cannot expand @{path}: argument files nest too deep"
        )));
    }

    let contents = fs::read_to_string(Path::new(path))
        .map_err(Error::from)
        .with_msg(format!("Cannot read argument file {path:?}"))?;
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        expand_arg(OsString::from(line.trim_end()), out, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags_into_config() {
        let args = Args::try_parse_from([
            "disk-backup",
            "-d",
            "/srv",
            "--directory=/home",
            "-t",
            "/mnt/backup",
            "-m",
            "/mnt",
            "-k",
            "6",
        ])
        .unwrap();

        let config = args.into_config().unwrap();

        assert_eq!(
            config.directories(),
            &vec![PathBuf::from("/srv"), PathBuf::from("/home")]
        );
        assert_eq!(config.target_dir(), Path::new("/mnt/backup"));
        assert_eq!(config.mount_point().as_deref(), Some(Path::new("/mnt")));
        assert_eq!(config.keep_backups(), 6);
        assert!(config.notification().is_none());
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["disk-backup", "-d", "/srv", "-t", "/mnt/backup"]).unwrap();

        assert_eq!(args.keep_backups, 4);
        assert_eq!(args.smtp_server, "localhost");
        assert_eq!(args.smtp_port, 25);
        assert_eq!(args.log_level(), Level::INFO);
    }

    #[test]
    fn test_missing_target_dir_is_rejected() {
        assert!(Args::try_parse_from(["disk-backup", "-d", "/srv"]).is_err());
    }

    #[test]
    fn test_config_conflicts_with_flags() {
        assert!(Args::try_parse_from(["disk-backup", "-c", "backup.yml", "-d", "/srv"]).is_err());
        assert!(Args::try_parse_from(["disk-backup", "-c", "backup.yml"]).is_ok());
    }

    #[test]
    fn test_config_conflicts_with_every_run_flag() {
        for flags in [
            &["-k", "2"][..],
            &["-f", "backup@example.com"],
            &["-s", "mail.example.com"],
            &["--smtp-port", "587"],
            &["--sync-program", "cp"],
        ] {
            let args = ["disk-backup", "-c", "backup.yml"].iter().chain(flags);
            assert!(Args::try_parse_from(args).is_err(), "{flags:?}");
        }

        let args = Args::try_parse_from(["disk-backup", "-c", "backup.yml", "-q"]).unwrap();
        assert_eq!(args.keep_backups, DEFAULT_KEEP_BACKUPS);
    }

    #[test]
    fn test_relative_target_dir_becomes_absolute() {
        let args = Args::try_parse_from(["disk-backup", "-d", "/srv", "-t", "backups"]).unwrap();

        let config = args.into_config().unwrap();

        assert!(config.target_dir().is_absolute());
        assert!(config.target_dir().ends_with("backups"));
    }

    #[test]
    fn test_emails_build_smtp_notification() {
        let args = Args::try_parse_from([
            "disk-backup",
            "-d",
            "/srv",
            "-t",
            "/mnt/backup",
            "-e",
            "ops@example.com,admin@example.com",
            "-f",
            "backup@example.com",
            "-s",
            "mail.example.com",
        ])
        .unwrap();

        let config = args.into_config().unwrap();

        match config.notification() {
            Some(NotificationConfig::Smtp(smtp)) => {
                assert_eq!(smtp.host(), "mail.example.com");
                assert_eq!(smtp.port(), &Some(25));
                assert_eq!(smtp.to().len(), 2);
                assert_eq!(smtp.from().email.to_string(), "backup@example.com");
            }
            None => panic!("Expected smtp notification"),
        }
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let args = Args::try_parse_from([
            "disk-backup",
            "-d",
            "/srv",
            "-t",
            "/mnt/backup",
            "-e",
            "not an address",
        ])
        .unwrap();

        let err = args.into_config().unwrap_err();

        assert!(matches!(err.root(), Error::Address(_)));
    }

    #[test]
    fn test_log_level() {
        let debug = Args::try_parse_from(["disk-backup", "-c", "x.yml", "--debug"]).unwrap();
        let quiet = Args::try_parse_from(["disk-backup", "-c", "x.yml", "-q"]).unwrap();

        assert_eq!(debug.log_level(), Level::DEBUG);
        assert_eq!(quiet.log_level(), Level::ERROR);
        assert!(Args::try_parse_from(["disk-backup", "-c", "x.yml", "-q", "--debug"]).is_err());
    }

    #[test]
    fn test_expand_arg_files() {
        let mut nested = NamedTempFile::new().unwrap();
        writeln!(nested, "--keepbackups=2").unwrap();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "--directory=/srv").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "--targetdir=/mnt/backup").unwrap();
        writeln!(file, "@{}", nested.path().display()).unwrap();

        let expanded = expand_arg_files(os_args(&[
            "disk-backup",
            &format!("@{}", file.path().display()),
            "-d",
            "/home",
        ]))
        .unwrap();

        assert_eq!(
            expanded,
            os_args(&[
                "disk-backup",
                "--directory=/srv",
                "--targetdir=/mnt/backup",
                "--keepbackups=2",
                "-d",
                "/home",
            ])
        );
        let args = Args::try_parse_from(expanded).unwrap();
        assert_eq!(args.directories.len(), 2);
        assert_eq!(args.keep_backups, 2);
    }

    #[test]
    fn test_expand_arg_files_missing_file() {
        let result = expand_arg_files(os_args(&["disk-backup", "@/nonexistent/args.txt"]));

        assert!(matches!(result.unwrap_err().root(), Error::Io(_)));
    }

    #[test]
    fn test_expand_arg_files_self_reference() {
        let mut file = NamedTempFile::new().unwrap();
        let arg = format!("@{}", file.path().display());
        writeln!(file, "{arg}").unwrap();

        let result = expand_arg_files(os_args(&["disk-backup", &arg]));

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
