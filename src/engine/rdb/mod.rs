//! Кодек снимков в формате RDB (версии до 9 включительно).
//!
//! - `rio`: буферизованное чтение из источника байтов и запись с CRC64.
//! - `primitives`: длины, строки, числа с плавающей точкой.
//! - `decode` / `encode`: объекты всех типов и кодирований.
//! - `convert`: выбор компактного или развёрнутого кодирования.
//! - `payload`: блоки `DUMP`/`RESTORE`.
//! - `loader`: целые файлы снимков.

pub mod compression;
pub mod convert;
pub mod decode;
pub mod encode;
pub mod loader;
pub mod payload;
pub mod primitives;
pub mod rio;
pub mod tags;
pub mod zipmap;

pub use decode::{decode_object, load_zset};
pub use encode::{encoded_type, write_object, write_value};
pub use loader::{DbEntry, Loader, Writer};
pub use payload::{create_dump_payload, decode_dump_payload, verify_dump_payload};
pub use rio::{ByteSource, PullFn, RdbReader, RdbWriter, CRC64};
pub use tags::{TypeTag, RDB_VERSION};
