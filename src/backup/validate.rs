//! Validation functions for configuration values.

use validator::ValidationError;

use std::path::Path;

/// The target root may not exist yet; it is created on the first run.
pub fn validate_dir_or_absent<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() && !dir.is_dir() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} is not a directory", dir).into()));
    }

    Ok(())
}

pub fn validate_program<S: AsRef<str>>(program: S) -> Result<(), ValidationError> {
    let program = program.as_ref();
    if program.trim().is_empty() {
        return Err(ValidationError::new("InvalidProgram")
            .with_message("program must not be empty".into()));
    }

    if program.contains('\0') {
        return Err(ValidationError::new("InvalidProgram")
            .with_message(format!("program {program:?} must not contain null").into()));
    }

    Ok(())
}
