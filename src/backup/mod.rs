pub mod backup_config;
pub mod cli;
pub mod command;
pub mod mount;
pub mod notifications;
pub mod redacted;
pub mod result_error;
pub mod retention;
pub mod run;
pub mod signal;
pub mod sync;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
