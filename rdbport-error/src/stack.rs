use std::{fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, RdbError, StatusCode};

/// Корневая ошибка плюс кадры контекста, добавленные по пути наверх.
///
/// Кадры хранятся от внутреннего к внешнему: первым идёт ближайший к
/// месту сбоя (`list node 3`), последним самый общий (`key "queue"`).
#[derive(Clone)]
pub struct StackError {
    root: Arc<dyn ErrorExt>,
    frames: Vec<Frame>,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub message: String,
    pub location: &'static Location<'static>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Arc::new(err),
            frames: Vec::new(),
        }
    }

    /// Добавляет внешний кадр контекста.
    #[track_caller]
    pub fn context(
        mut self,
        message: impl Into<String>,
    ) -> Self {
        self.frames.push(Frame {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn hint(&self) -> Option<&'static str> {
        self.root.hint()
    }

    pub fn root(&self) -> &dyn ErrorExt {
        self.root.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }

    /// Ошибка формата, если корень из кодека.
    pub fn rdb_error(&self) -> Option<&RdbError> {
        self.downcast_ref::<RdbError>()
    }

    /// Многострочный отчёт с местами, где добавлялся контекст.
    pub fn report(&self) -> String {
        let mut out = format!("[{}] {}", self.status_code(), self.root);
        for frame in &self.frames {
            out.push_str(&format!(
                "\n  in {} at {}:{}",
                frame.message,
                frame.location.file(),
                frame.location.line()
            ));
        }
        if let Some(hint) = self.hint() {
            out.push_str("\n  hint: ");
            out.push_str(hint);
        }
        out
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StackError")
            .field("code", &self.status_code())
            .field("root", &self.root.to_string())
            .field(
                "frames",
                &self.frames.iter().map(|fr| &fr.message).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

/// Для адаптеров, которым нужен `std::io::Read`.
impl From<StackError> for std::io::Error {
    fn from(e: StackError) -> Self {
        use std::io::ErrorKind;

        let kind = match e.status_code() {
            StatusCode::UnexpectedEof => ErrorKind::UnexpectedEof,
            StatusCode::Unsupported => ErrorKind::Unsupported,
            StatusCode::NotFound => ErrorKind::NotFound,
            StatusCode::PermissionDenied => ErrorKind::PermissionDenied,
            c if c.category() == crate::Category::Data => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
