use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс корневых ошибок, которые умеет хранить [`StackError`].
///
/// [`StackError`]: crate::StackError
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    fn as_any(&self) -> &dyn Any;

    /// Совет оператору, что делать с ошибкой. Печатается CLI.
    fn hint(&self) -> Option<&'static str> {
        None
    }
}
