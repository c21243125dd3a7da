use chrono::Local;
use clap::Parser;
use disk_backup::backup::cli::{expand_arg_files, Args};
use disk_backup::backup::notifications::Notifier;
use disk_backup::backup::result_error::error::Error;
use disk_backup::backup::result_error::WithMsg;
use disk_backup::backup::run::BackupRun;
use std::process::ExitCode;
use tracing::error;
use validator::Validate;

const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let args = match expand_arg_files(std::env::args_os()) {
        Ok(args) => Args::parse_from(args),
        Err(e) => clap::Error::raw(clap::error::ErrorKind::Io, format!("{e}\n")).exit(),
    };

    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stdout)
        .init();

    let config = match args.into_config().and_then(|bc| {
        bc.validate()
            .map_err(Error::from)
            .map(|_| bc)
            .with_msg("Config validation failed")
    }) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let notifier = Notifier::new(config.notification().clone());
    let outcome = BackupRun::new(&config, &notifier, Local::now()).run();

    ExitCode::from(outcome.exit_code())
}
