use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    Address(#[from] lettre::address::AddressError),
    #[error(transparent)]
    Email(#[from] lettre::error::Error),
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("SMTP server rejected message: {0}")]
    SmtpSendError(String),
    #[error("Failed to run {program:?}: {source}")]
    Command {
        program: String,
        source: std::io::Error,
    },
    #[error("Command {program:?} returned {status}: {output}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        output: String,
    },
    #[error("Cannot mount {mount_point:?}: {error}")]
    Mount {
        mount_point: PathBuf,
        error: Box<Error>,
    },
    #[error("Cannot unmount {mount_point:?}: {error}")]
    Unmount {
        mount_point: PathBuf,
        error: Box<Error>,
    },
    #[error("Creating backup failed for directory {dest:?}: {output}")]
    Sync { dest: PathBuf, output: String },
    #[error("Removing old backup {path:?} failed: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    /// Peels off context wrappers and returns the error that actually happened.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithDebugObjAndFnName { error, .. } => {
                error.root()
            }
            e => e,
        }
    }

    pub fn mount<P: Into<PathBuf>>(mount_point: P, error: Error) -> Self {
        Self::Mount {
            mount_point: mount_point.into(),
            error: Box::new(error),
        }
    }

    pub fn unmount<P: Into<PathBuf>>(mount_point: P, error: Error) -> Self {
        Self::Unmount {
            mount_point: mount_point.into(),
            error: Box::new(error),
        }
    }
}
