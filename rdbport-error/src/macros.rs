use crate::StackError;

/// Выходит из функции с ошибкой.
///
/// `bail!(err)` принимает всё, что превращается в [`StackError`];
/// `bail!(code, "fmt", args...)` строит [`GenericError`](crate::GenericError).
#[macro_export]
macro_rules! bail {
    ($err:expr $(,)?) => {
        return ::core::result::Result::Err($crate::StackError::from($err))
    };
    ($code:expr, $($fmt:tt)+) => {
        return ::core::result::Result::Err($crate::StackError::from(
            $crate::GenericError::new($code, format!($($fmt)+)),
        ))
    };
}

/// `bail!`, если условие ложно.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($rest:tt)+) => {
        if !($cond) {
            $crate::bail!($($rest)+);
        }
    };
}

/// Контекст для любого `Result`, чья ошибка сводится к [`StackError`].
pub trait ResultExt<T> {
    fn context(
        self,
        message: impl Into<String>,
    ) -> Result<T, StackError>;

    /// Сообщение строится только на пути ошибки.
    fn with_context<M, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        M: Into<String>,
        F: FnOnce() -> M;
}

impl<T, E: Into<StackError>> ResultExt<T> for Result<T, E> {
    #[track_caller]
    fn context(
        self,
        message: impl Into<String>,
    ) -> Result<T, StackError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(message)),
        }
    }

    #[track_caller]
    fn with_context<M, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        M: Into<String>,
        F: FnOnce() -> M,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(f())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RdbError, RdbResult, StatusCode};

    fn check_version(v: u16) -> RdbResult<u16> {
        ensure!(
            v <= 9,
            RdbError::UnsupportedVersion {
                found: v as u32,
                supported: 9
            }
        );
        ensure!(v > 0, StatusCode::InvalidValue, "version {} is not valid", v);
        Ok(v)
    }

    #[test]
    fn test_ensure_both_forms() {
        assert_eq!(check_version(9).unwrap(), 9);

        let err = check_version(12).unwrap_err();
        assert!(matches!(
            err.rdb_error(),
            Some(RdbError::UnsupportedVersion { found: 12, .. })
        ));

        let err = check_version(0).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidValue);
        assert_eq!(err.to_string(), "version 0 is not valid");
    }

    #[test]
    fn test_bail_plain_message() {
        fn run() -> RdbResult<()> {
            bail!(StatusCode::Internal, "worker gone");
        }
        assert_eq!(run().unwrap_err().to_string(), "worker gone");
    }

    #[test]
    fn test_context_records_caller_line() {
        let res: Result<(), RdbError> = Err(RdbError::corrupt("x"));
        let err = res.context("zset body").unwrap_err();
        assert_eq!(err.frames()[0].message, "zset body");
        assert!(err.frames()[0].location.file().ends_with("macros.rs"));
    }

    #[test]
    fn test_with_context_is_lazy() {
        let ok: Result<u8, RdbError> = Ok(1);
        let v = ok
            .with_context(|| -> String { panic!("must not be called") })
            .unwrap();
        assert_eq!(v, 1);

        let bad: Result<u8, RdbError> = Err(RdbError::corrupt("x"));
        let err = bad.with_context(|| format!("key #{}", 7)).unwrap_err();
        assert_eq!(err.to_string(), "key #7: corrupt payload: x");
    }
}
