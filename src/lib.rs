//! Декодер и кодировщик объектов снимков Redis RDB.
//!
//! Загружает значения всех пяти типов во всех физических кодированиях,
//! пишет их обратно байт в байт совместимо с Redis 5, проверяет блоки
//! `DUMP`/`RESTORE` по CRC64 и отдаёт элементы пакетами через
//! [`BatchIterator`]. Крупные значения можно освобождать в фоне через
//! [`LazyFreePool`].

/// Пороги кодирования и их источники.
pub mod config;
/// Контейнеры, в которые материализуются объекты снимка.
pub mod database;
/// Кодек RDB, пакетный обход, отложенное освобождение.
pub mod engine;
/// Инициализация `tracing`.
pub mod logging;

// -----------------------------------------------------------------------------
//  Часто используемые публичные типы
// -----------------------------------------------------------------------------

pub use config::RdbConfig;
pub use database::{Element, Encoding, ObjectType, Value};
pub use engine::{
    create_dump_payload, decode_dump_payload, decode_object, verify_dump_payload,
    write_value, BatchIterator, ByteSource, DbEntry, FreeEffort, LazyFreePool, Loader, PullFn,
    RdbReader, RdbWriter, Slot, Writer, RDB_VERSION,
};
pub use rdbport_error::{RdbError, RdbResult, StackError};
