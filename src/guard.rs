//! The uniform error boundary.
//!
//! Internal functions return `anyhow::Result` and use `?` freely. Public
//! operations end with [`OrLog::or_log`], which logs the failure together
//! with the operation name and hands the caller an absent result instead.

use tracing::error;

pub trait OrLog<T> {
    /// `Ok(v)` becomes `Some(v)`; an error is logged and becomes `None`.
    fn or_log(self, operation: &str) -> Option<T>;
}

impl<T, E> OrLog<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_log(self, operation: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                error!(operation, error = %e, "Error in function {operation}");
                None
            }
        }
    }
}
