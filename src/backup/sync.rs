use crate::backup::backup_config::ToolsConfig;
use crate::backup::command::run_captured;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use function_name::named;
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, info};

/// Mirrors one source directory into a backup generation with the external
/// sync tool, one process per call.
#[derive(Debug, Clone, Copy)]
pub struct DirectorySyncer<'a> {
    tools: &'a ToolsConfig,
}

impl<'a> DirectorySyncer<'a> {
    pub fn new(tools: &'a ToolsConfig) -> Self {
        Self { tools }
    }

    /// `<program> <sync_args...> -rav <source> <dest>/`
    pub fn command_args(&self, source: &Path, dest: &Path) -> Vec<OsString> {
        let mut dest_arg = dest.as_os_str().to_os_string();
        dest_arg.push("/");

        self.tools
            .sync_args()
            .iter()
            .map(OsString::from)
            .chain([
                OsString::from("-rav"),
                source.as_os_str().to_os_string(),
                dest_arg,
            ])
            .collect()
    }

    #[named]
    pub fn sync(&self, source: &Path, dest: &Path) -> Result<()> {
        info!("backing up directory {:?} to {:?}", source, dest);

        let output = run_captured(self.tools.sync_program(), self.command_args(source, dest))
            .with_debug_object_and_fn_name(source.to_path_buf(), function_path!())?;
        if !output.success() {
            return Err(Error::Sync {
                dest: dest.to_path_buf(),
                output: output.output,
            });
        }

        debug!(
            "Directory {:?} successfully stored, transferred:\n{}",
            source, output.output
        );
        Ok(())
    }
}
