//! Примитивы формата: длины, теги типов, метки времени, строки и
//! вещественные числа.
//!
//! Чтение идёт только через [`RdbReader`], поэтому каждый разобранный байт
//! попадает в контрольную сумму. Запись симметрична и работает с любым
//! `io::Write`.

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use bytes::Bytes;
use rdbport_error::{RdbError, RdbResult};

use super::{
    compression,
    rio::{ByteSource, RdbReader},
    tags::TypeTag,
};
use crate::database::{canonical_int, StrValue};

/// Старшие два бита первого байта длины.
pub const LEN_6BIT: u8 = 0;
pub const LEN_14BIT: u8 = 1;
pub const LEN_32BIT: u8 = 0x80;
pub const LEN_64BIT: u8 = 0x81;
pub const LEN_ENCVAL: u8 = 3;

/// Младшие шесть бит специальной формы.
pub const ENC_INT8: u8 = 0;
pub const ENC_INT16: u8 = 1;
pub const ENC_INT32: u8 = 2;
pub const ENC_LZF: u8 = 3;

/// Длины текстовой формы double, кодирующие особые значения.
const DOUBLE_NAN: u8 = 253;
const DOUBLE_POS_INF: u8 = 254;
const DOUBLE_NEG_INF: u8 = 255;

/// Сверх этого размера строка читается кусками, чтобы испорченная длина
/// не приводила к гигантскому выделению памяти заранее.
const PREALLOC_LIMIT: usize = 1 << 20;

/// Строки длиннее этого порога пробуются на сжатие LZF.
pub const COMPRESS_MIN_LEN: usize = 20;

/// Строки не длиннее этого порога пробуются на целочисленную форму.
const INT_TRY_MAX_LEN: usize = 11;

/// Специальная форма строки, закодированная вместо длины.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrEncoding {
    Int8,
    Int16,
    Int32,
    Lzf,
}

/// Результат чтения поля длины.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Len(u64),
    Encoded(StrEncoding),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Seconds,
    Milliseconds,
}

/// Метка времени в той точности, в которой она была записана.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub value: i64,
    pub precision: TimePrecision,
}

impl Timestamp {
    pub fn as_millis(&self) -> i64 {
        match self.precision {
            TimePrecision::Seconds => self.value.saturating_mul(1000),
            TimePrecision::Milliseconds => self.value,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Чтение
////////////////////////////////////////////////////////////////////////////////

/// Читает поле длины или маркер специальной формы строки.
pub fn read_len<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<Length> {
    let first = r.read_u8()?;
    match first >> 6 {
        LEN_6BIT => Ok(Length::Len((first & 0x3F) as u64)),
        LEN_14BIT => {
            let next = r.read_u8()?;
            Ok(Length::Len((((first & 0x3F) as u64) << 8) | next as u64))
        }
        LEN_ENCVAL => {
            let enc = match first & 0x3F {
                ENC_INT8 => StrEncoding::Int8,
                ENC_INT16 => StrEncoding::Int16,
                ENC_INT32 => StrEncoding::Int32,
                ENC_LZF => StrEncoding::Lzf,
                other => {
                    return Err(
                        RdbError::corrupt(format!("unknown string encoding {other}")).into(),
                    )
                }
            };
            Ok(Length::Encoded(enc))
        }
        _ => match first {
            LEN_32BIT => Ok(Length::Len(BigEndian::read_u32(&r.read_array::<4>()?) as u64)),
            LEN_64BIT => Ok(Length::Len(BigEndian::read_u64(&r.read_array::<8>()?))),
            other => Err(RdbError::corrupt(format!("unknown length prefix 0x{other:02X}")).into()),
        },
    }
}

/// Длина, для которой специальная форма недопустима.
pub fn read_plain_len<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<u64> {
    match read_len(r)? {
        Length::Len(n) => Ok(n),
        Length::Encoded(enc) => {
            Err(RdbError::corrupt(format!("expected a plain length, found {enc:?}")).into())
        }
    }
}

/// Длина как `usize`, например число элементов контейнера.
pub fn read_count<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<usize> {
    let n = read_plain_len(r)?;
    usize::try_from(n).map_err(|_| RdbError::corrupt(format!("length {n} out of range")).into())
}

pub fn read_type<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<TypeTag> {
    let b = r.read_u8()?;
    TypeTag::from_byte(b).ok_or_else(|| RdbError::unknown_tag(b, "type byte").into())
}

/// Секунды идут как 4 байта LE со знаком, миллисекунды как 8 байт LE.
pub fn read_time<S: ByteSource>(
    r: &mut RdbReader<S>,
    precision: TimePrecision,
) -> RdbResult<Timestamp> {
    let value = match precision {
        TimePrecision::Seconds => LittleEndian::read_i32(&r.read_array::<4>()?) as i64,
        TimePrecision::Milliseconds => LittleEndian::read_i64(&r.read_array::<8>()?),
    };
    Ok(Timestamp { value, precision })
}

/// Читает строковый объект.
///
/// Целочисленная форма возвращается как [`StrValue::Int`] без выделения
/// памяти, LZF распаковывается ровно до исходной длины.
pub fn read_string<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<StrValue> {
    match read_len(r)? {
        Length::Encoded(StrEncoding::Int8) => Ok(StrValue::Int(r.read_u8()? as i8 as i64)),
        Length::Encoded(StrEncoding::Int16) => Ok(StrValue::Int(
            LittleEndian::read_i16(&r.read_array::<2>()?) as i64,
        )),
        Length::Encoded(StrEncoding::Int32) => Ok(StrValue::Int(
            LittleEndian::read_i32(&r.read_array::<4>()?) as i64,
        )),
        Length::Encoded(StrEncoding::Lzf) => {
            let clen = read_count(r)?;
            let len = read_count(r)?;
            let packed = read_raw(r, clen)?;
            let data = compression::decompress(&packed, len)?;
            Ok(StrValue::Raw(Bytes::from(data)))
        }
        Length::Len(n) => {
            let n = usize::try_from(n)
                .map_err(|_| RdbError::corrupt(format!("string length {n} out of range")))?;
            Ok(StrValue::Raw(Bytes::from(read_raw(r, n)?)))
        }
    }
}

/// Строковый объект в байтовой форме: целые превращаются в десятичный текст.
pub fn read_bytes<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<Bytes> {
    Ok(match read_string(r)? {
        StrValue::Raw(b) => b,
        StrValue::Int(v) => Bytes::from(v.to_string()),
    })
}

/// Текстовая форма double, используемая типом `ZSET`.
pub fn read_double<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<f64> {
    let len = r.read_u8()?;
    match len {
        DOUBLE_NAN => Ok(f64::NAN),
        DOUBLE_POS_INF => Ok(f64::INFINITY),
        DOUBLE_NEG_INF => Ok(f64::NEG_INFINITY),
        n => {
            let raw = r.read_vec(n as usize)?;
            std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| {
                    RdbError::corrupt(format!(
                        "invalid double text {:?}",
                        String::from_utf8_lossy(&raw)
                    ))
                    .into()
                })
        }
    }
}

/// Двоичный double: 8 байт IEEE-754 LE.
pub fn read_binary_double<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<f64> {
    Ok(LittleEndian::read_f64(&r.read_array::<8>()?))
}

fn read_raw<S: ByteSource>(
    r: &mut RdbReader<S>,
    len: usize,
) -> RdbResult<Vec<u8>> {
    if len <= PREALLOC_LIMIT {
        return r.read_vec(len);
    }
    let mut out = Vec::with_capacity(PREALLOC_LIMIT);
    let mut chunk = vec![0u8; PREALLOC_LIMIT];
    while out.len() < len {
        let n = (len - out.len()).min(PREALLOC_LIMIT);
        r.read_exact(&mut chunk[..n])?;
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

////////////////////////////////////////////////////////////////////////////////
// Запись
////////////////////////////////////////////////////////////////////////////////

pub fn write_type<W: Write>(
    w: &mut W,
    tag: TypeTag,
) -> RdbResult<()> {
    w.write_u8(tag.as_byte())?;
    Ok(())
}

/// Пишет длину в самой короткой форме.
pub fn write_len<W: Write>(
    w: &mut W,
    len: u64,
) -> RdbResult<()> {
    if len < 1 << 6 {
        w.write_u8(len as u8)?;
    } else if len < 1 << 14 {
        w.write_u8(((len >> 8) as u8) | (LEN_14BIT << 6))?;
        w.write_u8(len as u8)?;
    } else if len <= u32::MAX as u64 {
        w.write_u8(LEN_32BIT)?;
        w.write_u32::<BigEndian>(len as u32)?;
    } else {
        w.write_u8(LEN_64BIT)?;
        w.write_u64::<BigEndian>(len)?;
    }
    Ok(())
}

pub fn write_millis<W: Write>(
    w: &mut W,
    ms: i64,
) -> RdbResult<()> {
    w.write_i64::<LittleEndian>(ms)?;
    Ok(())
}

/// Пишет целое в специальной форме, если оно влезает в 32 бита.
///
/// Возвращает `false`, если значение слишком велико и ничего не записано.
pub fn write_int_encoded<W: Write>(
    w: &mut W,
    v: i64,
) -> RdbResult<bool> {
    let special = LEN_ENCVAL << 6;
    if let Ok(x) = i8::try_from(v) {
        w.write_u8(special | ENC_INT8)?;
        w.write_i8(x)?;
    } else if let Ok(x) = i16::try_from(v) {
        w.write_u8(special | ENC_INT16)?;
        w.write_i16::<LittleEndian>(x)?;
    } else if let Ok(x) = i32::try_from(v) {
        w.write_u8(special | ENC_INT32)?;
        w.write_i32::<LittleEndian>(x)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

/// Пишет строку: короткое каноническое целое в специальной форме,
/// длинную строку со сжатием, если оно выгодно, иначе как есть.
pub fn write_string<W: Write>(
    w: &mut W,
    s: &[u8],
    compress: bool,
) -> RdbResult<()> {
    if s.len() <= INT_TRY_MAX_LEN {
        if let Some(v) = canonical_int(s) {
            if write_int_encoded(w, v)? {
                return Ok(());
            }
        }
    }

    if compress && s.len() > COMPRESS_MIN_LEN {
        if let Some(packed) = compression::compress(s) {
            w.write_u8((LEN_ENCVAL << 6) | ENC_LZF)?;
            write_len(w, packed.len() as u64)?;
            write_len(w, s.len() as u64)?;
            w.write_all(&packed)?;
            return Ok(());
        }
    }

    write_len(w, s.len() as u64)?;
    w.write_all(s)?;
    Ok(())
}

pub fn write_str_value<W: Write>(
    w: &mut W,
    v: &StrValue,
    compress: bool,
) -> RdbResult<()> {
    match v {
        StrValue::Int(i) => {
            if !write_int_encoded(w, *i)? {
                write_string(w, i.to_string().as_bytes(), false)?;
            }
            Ok(())
        }
        StrValue::Raw(b) => write_string(w, b, compress),
    }
}

/// Текстовая форма double с особыми длинами для NaN и бесконечностей.
pub fn write_double<W: Write>(
    w: &mut W,
    v: f64,
) -> RdbResult<()> {
    if v.is_nan() {
        w.write_u8(DOUBLE_NAN)?;
    } else if v == f64::INFINITY {
        w.write_u8(DOUBLE_POS_INF)?;
    } else if v == f64::NEG_INFINITY {
        w.write_u8(DOUBLE_NEG_INF)?;
    } else {
        let text = format!("{v:?}");
        w.write_u8(text.len() as u8)?;
        w.write_all(text.as_bytes())?;
    }
    Ok(())
}

pub fn write_binary_double<W: Write>(
    w: &mut W,
    v: f64,
) -> RdbResult<()> {
    w.write_f64::<LittleEndian>(v)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
