//! Кодировщик объектов: обратная сторона [`decode_object`].
//!
//! Тег выбирается по физическому кодированию значения так, как это делает
//! Redis 5: компактные контейнеры пишутся готовым блоком, развёрнутые
//! поэлементно.
//!
//! [`decode_object`]: super::decode::decode_object

use std::io::Write;

use rdbport_error::RdbResult;

use super::{
    primitives::{write_binary_double, write_len, write_str_value, write_string, write_type},
    tags::TypeTag,
};
use crate::{
    config::RdbConfig,
    database::{HashValue, SetValue, Value, ZSetValue},
};

/// Тег, под которым значение будет записано.
pub fn encoded_type(v: &Value) -> TypeTag {
    match v {
        Value::Str(_) => TypeTag::String,
        Value::List(_) => TypeTag::ListQuicklist,
        Value::Hash(HashValue::ZipList(_)) => TypeTag::HashZiplist,
        Value::Hash(HashValue::Table(_)) => TypeTag::Hash,
        Value::Set(SetValue::IntSet(_)) => TypeTag::SetIntset,
        // У компактного множества нет своего тега в версии 9.
        Value::Set(SetValue::ZipList(_) | SetValue::Table(_)) => TypeTag::Set,
        Value::ZSet(ZSetValue::ZipList(_)) => TypeTag::ZSetZiplist,
        Value::ZSet(ZSetValue::SkipList(_)) => TypeTag::ZSet2,
    }
}

/// Пишет тег и тело.
pub fn write_value<W: Write>(
    w: &mut W,
    v: &Value,
    cfg: &RdbConfig,
) -> RdbResult<()> {
    write_type(w, encoded_type(v))?;
    write_object(w, v, cfg)
}

/// Пишет только тело объекта.
pub fn write_object<W: Write>(
    w: &mut W,
    v: &Value,
    cfg: &RdbConfig,
) -> RdbResult<()> {
    let compress = cfg.rdb_compression;
    match v {
        Value::Str(s) => write_str_value(w, s, compress),
        Value::List(ql) => {
            write_len(w, ql.node_count() as u64)?;
            for node in ql.nodes() {
                write_string(w, node.as_bytes(), compress)?;
            }
            Ok(())
        }
        Value::Hash(HashValue::ZipList(zl)) => write_string(w, zl.as_bytes(), compress),
        Value::Hash(HashValue::Table(map)) => {
            write_len(w, map.len() as u64)?;
            for (field, value) in map {
                write_string(w, field, compress)?;
                write_string(w, value, compress)?;
            }
            Ok(())
        }
        Value::Set(SetValue::IntSet(is)) => write_string(w, &is.to_bytes(), compress),
        Value::Set(SetValue::ZipList(zl)) => {
            write_len(w, zl.len() as u64)?;
            for e in zl.iter() {
                write_string(w, &e.as_bytes(), compress)?;
            }
            Ok(())
        }
        Value::Set(SetValue::Table(set)) => {
            write_len(w, set.len() as u64)?;
            for m in set {
                write_string(w, m, compress)?;
            }
            Ok(())
        }
        Value::ZSet(ZSetValue::ZipList(zl)) => write_string(w, zl.as_bytes(), compress),
        Value::ZSet(ZSetValue::SkipList(zs)) => {
            write_len(w, zs.len() as u64)?;
            // От хвоста к голове: при загрузке каждая вставка идёт в голову.
            for (member, score) in zs.rev_iter() {
                write_string(w, member, compress)?;
                write_binary_double(w, score)?;
            }
            Ok(())
        }
    }
}
