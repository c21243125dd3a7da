use crate::backup::backup_config::ToolsConfig;
use crate::backup::command::run_captured;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tracing::info;

const PROC_MOUNTS: &str = "/proc/self/mounts";

/// The backup volume's mount point and the tools used to attach/detach it.
#[derive(Debug, Clone, Copy)]
pub struct MountPoint<'a> {
    path: &'a Path,
    tools: &'a ToolsConfig,
}

impl<'a> MountPoint<'a> {
    pub fn new(path: &'a Path, tools: &'a ToolsConfig) -> Self {
        Self { path, tools }
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    pub fn is_mounted(&self) -> Result<bool> {
        is_mounted(self.path)
    }

    pub fn mount(&self) -> Result<()> {
        info!("Mounting {:?}", self.path);
        run_captured(self.tools.mount_program(), [self.path])
            .and_then(|o| o.into_result())
            .map(|_| ())
            .map_err(|e| Error::mount(self.path, e))
    }

    pub fn unmount(&self) -> Result<()> {
        info!("Unmounting {:?}", self.path);
        run_captured(self.tools.umount_program(), [self.path])
            .and_then(|o| o.into_result())
            .map(|_| ())
            .map_err(|e| Error::unmount(self.path, e))
    }
}

/// A path is a mount point when it is a mount target in the mount table,
/// or when it sits on a different device than its parent.
pub fn is_mounted<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if listed_in_mount_table(path) {
        return Ok(true);
    }

    let md = match fs::symlink_metadata(path) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(Error::from(e).with_msg(format!("Cannot stat mount point {path:?}")))
        }
    };
    if md.file_type().is_symlink() || !md.is_dir() {
        return Ok(false);
    }

    let parent = path.join("..");
    let parent_md = fs::metadata(&parent)
        .map_err(Error::from)
        .with_msg(format!("Cannot stat parent of mount point {path:?}"))?;

    Ok(md.dev() != parent_md.dev() || md.ino() == parent_md.ino())
}

fn listed_in_mount_table(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(PROC_MOUNTS) else {
        return false;
    };
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_mount_field)
        .any(|target| Path::new(&target) == path)
}

/// The kernel escapes space, tab, newline and backslash as octal in mount fields.
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}
