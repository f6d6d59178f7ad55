pub mod rdb_error;

pub use rdb_error::*;

use std::{any::Any, io, num::ParseIntError, str::Utf8Error};

use thiserror::Error;

use crate::{ErrorExt, StackError, StatusCode};

/// Ошибка без собственного типа: код и текст.
///
/// Сюда попадают ошибки настроек и окружения, а также сбои сторонних
/// библиотек, у которых нет своего варианта в [`RdbError`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenericError {
    code: StatusCode,
    message: String,
}

impl GenericError {
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl ErrorExt for GenericError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<io::Error> for StackError {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
            io::ErrorKind::NotFound => StatusCode::NotFound,
            io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
            io::ErrorKind::InvalidData => StatusCode::Corrupted,
            _ => StatusCode::Io,
        };
        GenericError::new(code, err.to_string()).into()
    }
}

impl From<Utf8Error> for StackError {
    fn from(err: Utf8Error) -> Self {
        GenericError::new(StatusCode::InvalidUtf8, format!("invalid UTF-8: {err}")).into()
    }
}

impl From<ParseIntError> for StackError {
    fn from(err: ParseIntError) -> Self {
        GenericError::new(StatusCode::InvalidInteger, format!("invalid integer: {err}")).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_error_keeps_code() {
        let err: StackError = GenericError::new(StatusCode::InvalidValue, "bad threshold").into();
        assert_eq!(err.status_code(), StatusCode::InvalidValue);
        assert_eq!(err.to_string(), "bad threshold");
    }

    #[test]
    fn test_io_kinds() {
        for (kind, code) in [
            (io::ErrorKind::UnexpectedEof, StatusCode::UnexpectedEof),
            (io::ErrorKind::NotFound, StatusCode::NotFound),
            (io::ErrorKind::InvalidData, StatusCode::Corrupted),
            (io::ErrorKind::BrokenPipe, StatusCode::Io),
        ] {
            let err: StackError = io::Error::new(kind, "x").into();
            assert_eq!(err.status_code(), code, "{kind:?}");
        }
    }

    #[test]
    fn test_text_conversions() {
        let err: StackError = "9z".parse::<u32>().unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::InvalidInteger);

        let raw = [0xc3u8];
        let err: StackError = std::str::from_utf8(&raw).unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::InvalidUtf8);
    }
}
