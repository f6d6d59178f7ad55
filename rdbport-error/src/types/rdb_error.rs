use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки декодирования и кодирования снимка.
///
/// Любая из них прерывает только текущий вызов: частично собранный объект
/// освобождается, повторных попыток внутри кодека нет.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RdbError {
    /// Источник закончился раньше, чем требовал формат.
    #[error("truncated input while reading {context}: expected {expected} bytes, got {got}")]
    Truncated {
        context: String,
        expected: usize,
        got: usize,
    },

    /// Неизвестный тег типа или опкод.
    #[error("unknown tag 0x{tag:02X} in {context}")]
    UnknownTag { tag: u8, context: String },

    /// Структурно неверные данные.
    #[error("corrupt payload: {reason}")]
    CorruptPayload { reason: String },

    #[error("checksum mismatch: computed 0x{computed:016X}, recorded 0x{recorded:016X}")]
    ChecksumMismatch { computed: u64, recorded: u64 },

    /// Итератор запрошен для объекта другого логического типа.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Операция, которую адаптер потока не поддерживает (`write`, `tell`).
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("unsupported format version {found}, newest supported is {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Ёмкость пакета не кратна размеру элемента в слотах.
    #[error("batch capacity {capacity} is not a positive multiple of {slots_per_element}")]
    MisalignedBatch {
        capacity: usize,
        slots_per_element: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl RdbError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPayload {
            reason: reason.into(),
        }
    }

    pub fn truncated(
        context: impl Into<String>,
        expected: usize,
        got: usize,
    ) -> Self {
        Self::Truncated {
            context: context.into(),
            expected,
            got,
        }
    }

    pub fn unknown_tag(
        tag: u8,
        context: impl Into<String>,
    ) -> Self {
        Self::UnknownTag {
            tag,
            context: context.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

impl ErrorExt for RdbError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Truncated { .. } => StatusCode::UnexpectedEof,
            Self::UnknownTag { .. } => StatusCode::UnknownTag,
            Self::CorruptPayload { .. } => StatusCode::Corrupted,
            Self::ChecksumMismatch { .. } => StatusCode::ChecksumMismatch,
            Self::TypeMismatch { .. } => StatusCode::WrongType,
            Self::Unsupported { .. } => StatusCode::Unsupported,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::MisalignedBatch { .. } => StatusCode::InvalidArgs,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Truncated { .. } => Some("the file looks cut short, check how it was copied"),
            Self::ChecksumMismatch { .. } => {
                Some("bytes changed after the snapshot was written")
            }
            Self::UnsupportedVersion { .. } => {
                Some("the snapshot comes from a newer server, re-save it with an older one")
            }
            Self::UnknownTag { .. } => Some("module types and streams are not decoded"),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
