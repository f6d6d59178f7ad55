//! Потоковое чтение и запись целого файла снимка.
//!
//! ```text
//! "REDIS" <version:4 ASCII digits>
//! (SELECTDB | RESIZEDB | AUX | EXPIRETIME[_MS] | IDLE | FREQ | <type> <key> <value>)*
//! EOF <crc64:8 LE, версия >= 5>
//! ```
//!
//! Сроки жизни ключей только передаются вызывающему коду, загрузчик на них
//! не реагирует.

use std::io::Write;

use bytes::Bytes;
use rdbport_error::{RdbError, RdbResult, ResultExt};
use tracing::{debug, info};

use super::{
    decode::decode_object,
    encode::{encoded_type, write_object},
    primitives::{
        read_bytes, read_plain_len, read_time, read_type, write_len, write_millis, write_string,
        write_type, TimePrecision,
    },
    rio::{ByteSource, RdbReader, RdbWriter},
    tags::{TypeTag, RDB_VERSION},
};
use crate::{config::RdbConfig, database::Value};

const MAGIC: &[u8; 5] = b"REDIS";

/// Первая версия, в которой файл заканчивается контрольной суммой.
const CHECKSUM_SINCE: u16 = 5;

/// Одна запись ключ/значение из файла.
#[derive(Debug, Clone, PartialEq)]
pub struct DbEntry {
    pub db: u64,
    pub key: Bytes,
    /// Абсолютное время истечения в миллисекундах Unix.
    pub expire_at_ms: Option<i64>,
    pub value: Value,
}

/// Потоковый загрузчик файла снимка.
pub struct Loader<S> {
    r: RdbReader<S>,
    cfg: RdbConfig,
    version: Option<u16>,
    db: u64,
    aux: Vec<(Bytes, Bytes)>,
    finished: bool,
    entries: u64,
}

/// Писатель файла снимка.
pub struct Writer<W: Write> {
    w: RdbWriter<W>,
    cfg: RdbConfig,
    db: Option<u64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<S: ByteSource> Loader<S> {
    pub fn new(
        src: S,
        cfg: RdbConfig,
    ) -> Self {
        Self {
            r: RdbReader::new(src),
            cfg,
            version: None,
            db: 0,
            aux: Vec::new(),
            finished: false,
            entries: 0,
        }
    }

    /// Читает и проверяет заголовок. Повторный вызов возвращает уже
    /// прочитанную версию.
    pub fn header(&mut self) -> RdbResult<u16> {
        if let Some(v) = self.version {
            return Ok(v);
        }
        let head = self.r.read_array::<9>().context("file header")?;
        if &head[..5] != MAGIC {
            return Err(RdbError::corrupt("missing REDIS magic in file header").into());
        }
        let digits = std::str::from_utf8(&head[5..])
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| RdbError::corrupt("non-numeric version in file header"))?;
        let version: u16 = digits.parse()?;
        if version == 0 || version > RDB_VERSION {
            return Err(RdbError::UnsupportedVersion {
                found: version as u32,
                supported: RDB_VERSION as u32,
            }
            .into());
        }
        info!(version, "Reading snapshot");
        self.version = Some(version);
        Ok(version)
    }

    /// Следующая запись или `None` после `EOF` и проверки контрольной суммы.
    pub fn next_entry(&mut self) -> RdbResult<Option<DbEntry>> {
        if self.finished {
            return Ok(None);
        }
        self.header()?;

        let mut expire_at_ms = None;
        loop {
            let tag = read_type(&mut self.r)?;
            match tag {
                TypeTag::SelectDb => {
                    self.db = read_plain_len(&mut self.r).context("SELECTDB")?;
                }
                TypeTag::ResizeDb => {
                    let keys = read_plain_len(&mut self.r).context("RESIZEDB")?;
                    let expires = read_plain_len(&mut self.r).context("RESIZEDB")?;
                    debug!(db = self.db, keys, expires, "Database size hint");
                }
                TypeTag::Aux => {
                    let key = read_bytes(&mut self.r).context("AUX key")?;
                    let value = read_bytes(&mut self.r).context("AUX value")?;
                    debug!(
                        key = %String::from_utf8_lossy(&key),
                        value = %String::from_utf8_lossy(&value),
                        "Aux field"
                    );
                    self.aux.push((key, value));
                }
                TypeTag::ExpireTime => {
                    let t = read_time(&mut self.r, TimePrecision::Seconds)?;
                    expire_at_ms = Some(t.as_millis());
                }
                TypeTag::ExpireTimeMs => {
                    let t = read_time(&mut self.r, TimePrecision::Milliseconds)?;
                    expire_at_ms = Some(t.as_millis());
                }
                TypeTag::Idle => {
                    read_plain_len(&mut self.r).context("IDLE")?;
                }
                TypeTag::Freq => {
                    self.r.read_u8().context("FREQ")?;
                }
                TypeTag::Eof => {
                    self.footer()?;
                    self.finished = true;
                    info!(
                        entries = self.entries,
                        bytes = self.r.bytes_read(),
                        "Snapshot fully read"
                    );
                    return Ok(None);
                }
                TypeTag::ModuleAux => {
                    return Err(RdbError::unknown_tag(tag.as_byte(), "module aux data").into());
                }
                object => {
                    let key = read_bytes(&mut self.r).context("key")?;
                    let value = decode_object(&mut self.r, object, &self.cfg).with_context(|| {
                        format!("key {:?}", String::from_utf8_lossy(&key))
                    })?;
                    self.entries += 1;
                    return Ok(Some(DbEntry {
                        db: self.db,
                        key,
                        expire_at_ms,
                        value,
                    }));
                }
            }
        }
    }

    /// Версия формата, если заголовок уже прочитан.
    pub fn version(&self) -> Option<u16> {
        self.version
    }

    /// Поля `AUX`, встреченные до текущего места.
    pub fn aux_fields(&self) -> &[(Bytes, Bytes)] {
        &self.aux
    }

    pub fn bytes_read(&self) -> u64 {
        self.r.bytes_read()
    }

    /// Проверяет контрольную сумму файла после `EOF`.
    ///
    /// Возвращает записанную сумму, `None` для версий без неё. Нулевая
    /// сумма означает, что проверка при сохранении была отключена.
    fn footer(&mut self) -> RdbResult<Option<u64>> {
        if self.version.unwrap_or(0) < CHECKSUM_SINCE {
            return Ok(None);
        }
        let computed = self.r.checksum();
        let recorded = u64::from_le_bytes(self.r.read_array::<8>().context("file checksum")?);
        if recorded == 0 {
            tracing::warn!("Snapshot was saved without a checksum, verification skipped");
        } else if recorded != computed {
            return Err(RdbError::ChecksumMismatch { computed, recorded }.into());
        }
        Ok(Some(recorded))
    }
}

impl<W: Write> Writer<W> {
    pub fn new(
        inner: W,
        cfg: RdbConfig,
    ) -> Self {
        Self {
            w: RdbWriter::new(inner),
            cfg,
            db: None,
        }
    }

    /// Заголовок с текущей версией формата.
    pub fn header(&mut self) -> RdbResult<()> {
        write!(self.w, "REDIS{RDB_VERSION:04}")?;
        Ok(())
    }

    pub fn aux(
        &mut self,
        key: &[u8],
        value: &[u8],
    ) -> RdbResult<()> {
        write_type(&mut self.w, TypeTag::Aux)?;
        write_string(&mut self.w, key, false)?;
        write_string(&mut self.w, value, false)
    }

    /// Пишет запись, переключая базу, если она сменилась.
    pub fn write_entry(
        &mut self,
        db: u64,
        key: &[u8],
        value: &Value,
        expire_at_ms: Option<i64>,
    ) -> RdbResult<()> {
        if self.db != Some(db) {
            write_type(&mut self.w, TypeTag::SelectDb)?;
            write_len(&mut self.w, db)?;
            self.db = Some(db);
        }
        if let Some(ms) = expire_at_ms {
            write_type(&mut self.w, TypeTag::ExpireTimeMs)?;
            write_millis(&mut self.w, ms)?;
        }
        let compress = self.cfg.rdb_compression;
        write_type(&mut self.w, encoded_type(value))?;
        write_string(&mut self.w, key, compress)?;
        write_object(&mut self.w, value, &self.cfg)
    }

    /// Пишет `EOF` и контрольную сумму, возвращает внутренний писатель.
    pub fn finish(mut self) -> RdbResult<W> {
        write_type(&mut self.w, TypeTag::Eof)?;
        let crc = self.w.checksum();
        let mut inner = self.w.into_inner();
        inner.write_all(&crc.to_le_bytes())?;
        inner.flush()?;
        Ok(inner)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<S: ByteSource> Iterator for Loader<S> {
    type Item = RdbResult<DbEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(e)) => Some(Ok(e)),
            Ok(None) => None,
            Err(e) => {
                // После ошибки поток в неизвестном месте: дальше не читаем.
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> Vec<u8> {
        let cfg = RdbConfig::default();
        let mut w = Writer::new(Vec::new(), cfg);
        w.header().unwrap();
        w.aux(b"redis-ver", b"5.0.0").unwrap();
        w.write_entry(0, b"greeting", &Value::string("hello"), None)
            .unwrap();
        w.write_entry(0, b"counter", &Value::string("42"), Some(1_500_000_000_000))
            .unwrap();
        w.write_entry(3, b"other", &Value::string("x"), None).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn test_writer_loader_roundtrip() {
        let bytes = sample_file();
        assert_eq!(&bytes[..9], b"REDIS0009");

        let mut loader = Loader::new(bytes.as_slice(), RdbConfig::default());
        let entries: Vec<_> = loader.by_ref().collect::<RdbResult<_>>().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key.as_ref(), b"greeting");
        assert_eq!(entries[0].expire_at_ms, None);
        assert_eq!(entries[1].expire_at_ms, Some(1_500_000_000_000));
        assert_eq!(entries[1].value, Value::string("42"));
        assert_eq!(entries[2].db, 3);
        assert_eq!(loader.version(), Some(9));
        assert_eq!(loader.aux_fields().len(), 1);
        assert_eq!(loader.bytes_read(), bytes.len() as u64);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut bytes = sample_file();
        let n = bytes.len();
        // Последний байт ключа "other".
        bytes[n - 12] ^= 0x01;
        let err = Loader::new(bytes.as_slice(), RdbConfig::default())
            .collect::<RdbResult<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(
            err.rdb_error(),
            Some(RdbError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_checksum_accepted() {
        let mut bytes = sample_file();
        let n = bytes.len();
        bytes[n - 8..].fill(0);
        let entries: Vec<_> = Loader::new(bytes.as_slice(), RdbConfig::default())
            .collect::<RdbResult<_>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_bad_header() {
        let mut l = Loader::new(&b"RADIS0009"[..], RdbConfig::default());
        assert!(l.header().is_err());
        let mut l = Loader::new(&b"REDIS0010"[..], RdbConfig::default());
        assert!(matches!(
            l.header().unwrap_err().rdb_error(),
            Some(RdbError::UnsupportedVersion { found: 10, .. })
        ));
        let mut l = Loader::new(&b"REDIS00x9"[..], RdbConfig::default());
        assert!(l.header().is_err());
    }

    #[test]
    fn test_module_aux_is_unknown() {
        let mut bytes = b"REDIS0009".to_vec();
        bytes.push(0xF7);
        let mut l = Loader::new(bytes.as_slice(), RdbConfig::default());
        let err = l.next().unwrap().unwrap_err();
        assert!(matches!(err.rdb_error(), Some(RdbError::UnknownTag { tag: 0xF7, .. })));
        assert!(l.next().is_none());
    }

    #[test]
    fn test_old_version_without_checksum() {
        let mut bytes = b"REDIS0004".to_vec();
        bytes.extend_from_slice(b"\xfe\x00\x00\x01k\x01v\xff");
        let entries: Vec<_> = Loader::new(bytes.as_slice(), RdbConfig::default())
            .collect::<RdbResult<_>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value.as_string().unwrap().as_ref(), b"v");
    }
}
