use std::fmt;

use num_enum::TryFromPrimitive;

/// Код ошибки кодека.
///
/// Сотни задают группу: 1xx аргументы вызова, 2xx входные данные,
/// 3xx окружение (файлы, потоки), 9xx внутренние сбои.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u16)]
#[non_exhaustive]
pub enum StatusCode {
    Ok = 0,

    InvalidArgs = 100,
    InvalidValue = 101,
    WrongType = 102,
    Unsupported = 103,

    Corrupted = 200,
    ChecksumMismatch = 201,
    UnexpectedEof = 202,
    UnknownTag = 203,
    UnsupportedVersion = 204,
    InvalidUtf8 = 205,
    InvalidInteger = 206,

    Io = 300,
    NotFound = 301,
    PermissionDenied = 302,

    Internal = 900,
}

/// Кто виноват в ошибке.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Неверный вызов API или опция CLI.
    Caller,
    /// Снимок или блок повреждён либо не поддерживается.
    Data,
    /// Файловая система или поток ввода.
    Environment,
    Internal,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::try_from(code).ok()
    }

    pub fn category(self) -> Category {
        match self.code() {
            0..=199 => Category::Caller,
            200..=299 => Category::Data,
            300..=399 => Category::Environment,
            _ => Category::Internal,
        }
    }

    /// Код завершения процесса в духе `sysexits.h`.
    pub fn exit_code(self) -> i32 {
        if self == Self::Ok {
            return 0;
        }
        match self.category() {
            Category::Caller => 64,
            Category::Data => 65,
            Category::Environment => 74,
            Category::Internal => 70,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "E{:03} {:?}", self.code(), self)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
