//! Формат `DUMP`/`RESTORE` для одного значения:
//!
//! ```text
//! [type:1][body][version:2 LE][crc64:8 LE]
//! ```
//!
//! CRC считается по всему, что идёт до неё, включая версию. Нулевая CRC
//! означает, что проверка отключена: такой блок принимается всегда.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use rdbport_error::{RdbError, RdbResult, ResultExt};

use super::{
    decode::decode_object,
    encode::write_value,
    primitives::read_type,
    rio::{RdbReader, RdbWriter, CRC64},
    tags::RDB_VERSION,
};
use crate::{config::RdbConfig, database::Value};

/// Размер хвоста: версия и контрольная сумма.
pub const FOOTER_SIZE: usize = 10;

/// Кодирует значение в самодостаточный блок.
pub fn create_dump_payload(
    value: &Value,
    cfg: &RdbConfig,
) -> RdbResult<Vec<u8>> {
    let mut w = RdbWriter::new(Vec::new());
    write_value(&mut w, value, cfg)?;
    w.write_u16::<LittleEndian>(RDB_VERSION)?;
    let crc = w.checksum();
    let mut out = w.into_inner();
    out.write_u64::<LittleEndian>(crc)?;
    Ok(out)
}

/// Проверяет версию и контрольную сумму, не декодируя тело.
///
/// Возвращает версию формата из хвоста.
pub fn verify_dump_payload(bytes: &[u8]) -> RdbResult<u16> {
    if bytes.len() < FOOTER_SIZE {
        return Err(RdbError::corrupt(format!(
            "payload of {} bytes is shorter than its footer",
            bytes.len()
        ))
        .into());
    }
    let footer = &bytes[bytes.len() - FOOTER_SIZE..];
    let version = LittleEndian::read_u16(&footer[..2]);
    if version > RDB_VERSION {
        return Err(RdbError::UnsupportedVersion {
            found: version as u32,
            supported: RDB_VERSION as u32,
        }
        .into());
    }

    let recorded = LittleEndian::read_u64(&footer[2..]);
    if recorded == 0 {
        tracing::warn!(
            len = bytes.len(),
            "Dump payload has a zero checksum, integrity verification skipped"
        );
        return Ok(version);
    }
    let computed = CRC64.checksum(&bytes[..bytes.len() - 8]);
    if computed != recorded {
        return Err(RdbError::ChecksumMismatch { computed, recorded }.into());
    }
    Ok(version)
}

/// Проверяет блок и декодирует значение.
pub fn decode_dump_payload(
    bytes: &[u8],
    cfg: &RdbConfig,
) -> RdbResult<Value> {
    verify_dump_payload(bytes)?;

    let body = &bytes[..bytes.len() - FOOTER_SIZE];
    let mut r = RdbReader::new(body);
    let tag = read_type(&mut r).context("dump payload")?;
    if !tag.is_object() {
        return Err(RdbError::unknown_tag(tag.as_byte(), "dump payload").into());
    }
    let value = decode_object(&mut r, tag, cfg).context("dump payload")?;
    if !r.at_eof()? {
        return Err(RdbError::corrupt(format!(
            "trailing bytes after {tag} body at offset {}",
            r.bytes_read()
        ))
        .into());
    }
    Ok(value)
}
