//! Runs the external tools (sync, mount, umount) the backup delegates to.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Exit status and interleaved stdout/stderr of a finished command.
#[derive(Debug)]
pub struct CommandOutput {
    pub program: String,
    pub status: ExitStatus,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Turns a non-zero exit into [`Error::ExitStatus`].
    pub fn into_result(self) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ExitStatus {
                program: self.program,
                status: self.status,
                output: self.output,
            })
        }
    }
}

/// Runs `program` with `args`, blocking until it exits.
///
/// stdout and stderr share one pipe so the captured text keeps the order the
/// tool wrote it in.
pub fn run_captured<I, A>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let spawn_error = |source| Error::Command {
        program: program.to_string(),
        source,
    };

    let (mut reader, writer) = std::io::pipe().map_err(spawn_error)?;
    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(writer.try_clone().map_err(spawn_error)?)
        .stderr(writer);
    debug!("Running {:?}", command);
    let mut child = command.spawn().map_err(spawn_error)?;
    // the parent's copies of the write end must be closed or the read never ends
    drop(command);

    let mut output = Vec::new();
    reader.read_to_end(&mut output).map_err(spawn_error)?;
    let status = child.wait().map_err(spawn_error)?;

    Ok(CommandOutput {
        program: program.to_string(),
        status,
        output: String::from_utf8_lossy(&output).into_owned(),
    })
}
