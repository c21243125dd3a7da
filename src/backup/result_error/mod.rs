//! Crate error type plus helpers for wrapping an error with where and why it happened.

use std::fmt::Debug;
pub mod error;
pub mod result;

/// Records the object being worked on and the function that failed.
pub trait WithDebugObjectAndFnName<S: Into<String>, O: Debug + 'static> {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self;
}

/// Prefixes the error with a human readable message.
pub trait WithMsg<S: Into<String>> {
    fn with_msg(self, msg: S) -> Self;
}
