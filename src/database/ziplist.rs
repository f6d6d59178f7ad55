//! Компактный список записей (`ziplist`) в побайтово совместимом с Redis
//! виде.
//!
//! Раскладка буфера:
//!
//! ```text
//! <zlbytes:u32 LE> <zltail:u32 LE> <zllen:u16 LE> <entry>... <0xFF>
//! entry = <prevlen: 1 или 0xFE + u32 LE> <encoding> <payload>
//! ```
//!
//! Строки длиной до 32 байт, являющиеся каноническим целым, хранятся как
//! целые. Буфер, пришедший из снимка, проверяется целиком в
//! [`ZipList::from_bytes`]; дальше итерация по нему не может выйти за
//! границы.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use rdbport_error::{RdbError, RdbResult};

use super::element::{canonical_int, Element};

const HEADER_SIZE: usize = 10;
const END: u8 = 0xFF;
const BIG_PREVLEN: u8 = 0xFE;
/// Начиная с этого значения `zllen` счётчик записей нужно пересчитывать.
const LEN_UNKNOWN: u16 = u16::MAX;

const STR_06B: u8 = 0x00;
const STR_14B: u8 = 0x40;
const STR_32B: u8 = 0x80;
const INT_16B: u8 = 0xC0;
const INT_32B: u8 = 0xD0;
const INT_64B: u8 = 0xE0;
const INT_24B: u8 = 0xF0;
const INT_8B: u8 = 0xFE;
const INT_IMM_MIN: u8 = 0xF1;
const INT_IMM_MAX: u8 = 0xFD;

/// Максимальная длина строки, для которой пробуется целочисленное
/// кодирование.
const MAX_INT_TRY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipList {
    buf: Vec<u8>,
    len: usize,
    /// Полный размер последней записи, нужен как `prevlen` следующей.
    tail_len: usize,
}

/// Итератор по записям ziplist.
pub struct ZipListIter<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: usize,
}

struct RawEntry<'a> {
    elem: Element<'a>,
    prevlen: usize,
    size: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ZipList {
    pub fn new() -> Self {
        let mut buf = vec![0u8; HEADER_SIZE + 1];
        buf[HEADER_SIZE] = END;
        let mut zl = Self {
            buf,
            len: 0,
            tail_len: 0,
        };
        zl.write_header(HEADER_SIZE);
        zl
    }

    /// Принимает сериализованный ziplist и проверяет его структуру.
    pub fn from_bytes(buf: Vec<u8>) -> RdbResult<Self> {
        if buf.len() < HEADER_SIZE + 1 {
            return Err(RdbError::corrupt(format!("ziplist of {} bytes is too short", buf.len())).into());
        }
        let zlbytes = LittleEndian::read_u32(&buf[0..4]) as usize;
        let zltail = LittleEndian::read_u32(&buf[4..8]) as usize;
        let zllen = LittleEndian::read_u16(&buf[8..10]);
        if zlbytes != buf.len() {
            return Err(RdbError::corrupt(format!(
                "ziplist header declares {zlbytes} bytes, blob has {}",
                buf.len()
            ))
            .into());
        }
        if buf[buf.len() - 1] != END {
            return Err(RdbError::corrupt("ziplist is not terminated").into());
        }

        let end = buf.len() - 1;
        let mut pos = HEADER_SIZE;
        let mut count = 0usize;
        let mut prev_size = 0usize;
        let mut last_start = HEADER_SIZE;
        while pos < end {
            let entry = decode_entry(&buf[..end], pos)?;
            if entry.prevlen != prev_size {
                return Err(RdbError::corrupt(format!(
                    "ziplist entry at {pos} has prevlen {}, expected {prev_size}",
                    entry.prevlen
                ))
                .into());
            }
            last_start = pos;
            prev_size = entry.size;
            pos += entry.size;
            count += 1;
        }
        if last_start != zltail {
            return Err(RdbError::corrupt(format!(
                "ziplist tail offset {zltail} does not match last entry at {last_start}"
            ))
            .into());
        }
        if zllen != LEN_UNKNOWN && zllen as usize != count {
            return Err(RdbError::corrupt(format!(
                "ziplist header declares {zllen} entries, found {count}"
            ))
            .into());
        }

        Ok(Self {
            buf,
            len: count,
            tail_len: prev_size,
        })
    }

    /// Собирает ziplist из последовательности элементов.
    pub fn from_elements<'e, I>(items: I) -> Self
    where
        I: IntoIterator<Item = Element<'e>>,
    {
        let mut zl = Self::new();
        for item in items {
            zl.push(item);
        }
        zl
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Размер сериализованного буфера в байтах.
    #[inline]
    pub fn blob_len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn iter(&self) -> ZipListIter<'_> {
        ZipListIter {
            buf: &self.buf[..self.buf.len() - 1],
            pos: HEADER_SIZE,
            remaining: self.len,
        }
    }

    /// Добавляет элемент в конец. Байтовые строки, похожие на целое,
    /// кодируются как целые.
    pub fn push(
        &mut self,
        elem: Element<'_>,
    ) {
        let mut entry = Vec::with_capacity(16);
        encode_prevlen(&mut entry, self.tail_len);
        match elem {
            Element::Int(v) => encode_int(&mut entry, v),
            Element::Bytes(b) => match try_int(b) {
                Some(v) => encode_int(&mut entry, v),
                None => encode_str(&mut entry, b),
            },
        }

        let tail_offset = self.buf.len() - 1;
        self.buf.truncate(tail_offset);
        self.buf.extend_from_slice(&entry);
        self.buf.push(END);
        self.len += 1;
        self.tail_len = entry.len();
        self.write_header(tail_offset);
    }

    pub fn push_bytes(
        &mut self,
        b: &[u8],
    ) {
        self.push(Element::Bytes(b));
    }

    pub fn push_int(
        &mut self,
        v: i64,
    ) {
        self.push(Element::Int(v));
    }

    /// Оценка размера буфера после добавления `elem`, без самой вставки.
    pub fn size_after_push(
        &self,
        elem: &Element<'_>,
    ) -> usize {
        let prevlen = if self.tail_len < BIG_PREVLEN as usize { 1 } else { 5 };
        let body = match elem {
            Element::Int(v) => int_payload_size(*v) + 1,
            Element::Bytes(b) => match try_int(b) {
                Some(v) => int_payload_size(v) + 1,
                None => str_header_size(b.len()) + b.len(),
            },
        };
        self.buf.len() + prevlen + body
    }

    /// Максимальная длина байтовой формы среди элементов.
    pub fn max_elem_len(&self) -> usize {
        self.iter().map(|e| e.byte_len()).max().unwrap_or(0)
    }

    fn write_header(
        &mut self,
        tail_offset: usize,
    ) {
        let total = self.buf.len() as u32;
        LittleEndian::write_u32(&mut self.buf[0..4], total);
        LittleEndian::write_u32(&mut self.buf[4..8], tail_offset as u32);
        let zllen = if self.len < LEN_UNKNOWN as usize {
            self.len as u16
        } else {
            LEN_UNKNOWN
        };
        LittleEndian::write_u16(&mut self.buf[8..10], zllen);
    }
}

fn try_int(b: &[u8]) -> Option<i64> {
    if b.is_empty() || b.len() > MAX_INT_TRY_LEN {
        return None;
    }
    canonical_int(b)
}

fn encode_prevlen(
    out: &mut Vec<u8>,
    prevlen: usize,
) {
    if prevlen < BIG_PREVLEN as usize {
        out.push(prevlen as u8);
    } else {
        out.push(BIG_PREVLEN);
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, prevlen as u32);
        out.extend_from_slice(&b);
    }
}

fn str_header_size(len: usize) -> usize {
    if len <= 0x3F {
        1
    } else if len <= 0x3FFF {
        2
    } else {
        5
    }
}

fn encode_str(
    out: &mut Vec<u8>,
    s: &[u8],
) {
    let len = s.len();
    if len <= 0x3F {
        out.push(STR_06B | len as u8);
    } else if len <= 0x3FFF {
        out.push(STR_14B | ((len >> 8) as u8 & 0x3F));
        out.push(len as u8);
    } else {
        out.push(STR_32B);
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, len as u32);
        out.extend_from_slice(&b);
    }
    out.extend_from_slice(s);
}

fn int_payload_size(v: i64) -> usize {
    if (0..=12).contains(&v) {
        0
    } else if v >= i8::MIN as i64 && v <= i8::MAX as i64 {
        1
    } else if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
        2
    } else if (-(1 << 23)..(1 << 23)).contains(&v) {
        3
    } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        4
    } else {
        8
    }
}

fn encode_int(
    out: &mut Vec<u8>,
    v: i64,
) {
    match int_payload_size(v) {
        0 => out.push(INT_IMM_MIN + v as u8),
        1 => {
            out.push(INT_8B);
            out.push(v as i8 as u8);
        }
        2 => {
            out.push(INT_16B);
            out.extend_from_slice(&(v as i16).to_le_bytes());
        }
        3 => {
            out.push(INT_24B);
            out.extend_from_slice(&(v as i32).to_le_bytes()[..3]);
        }
        4 => {
            out.push(INT_32B);
            out.extend_from_slice(&(v as i32).to_le_bytes());
        }
        _ => {
            out.push(INT_64B);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

fn need(
    buf: &[u8],
    pos: usize,
    n: usize,
) -> RdbResult<()> {
    if pos + n > buf.len() {
        return Err(RdbError::corrupt(format!(
            "ziplist entry at {pos} overruns the blob ({n} bytes needed)"
        ))
        .into());
    }
    Ok(())
}

/// Разбирает запись по смещению `pos`. `buf` не включает завершающий 0xFF.
fn decode_entry(
    buf: &[u8],
    pos: usize,
) -> RdbResult<RawEntry<'_>> {
    let mut p = pos;
    need(buf, p, 1)?;
    let prevlen = if buf[p] < BIG_PREVLEN {
        p += 1;
        buf[p - 1] as usize
    } else if buf[p] == BIG_PREVLEN {
        need(buf, p, 5)?;
        p += 5;
        LittleEndian::read_u32(&buf[p - 4..p]) as usize
    } else {
        return Err(RdbError::corrupt(format!("bad ziplist prevlen byte at {pos}")).into());
    };

    need(buf, p, 1)?;
    let enc = buf[p];
    p += 1;
    let elem = match enc >> 6 {
        0 => {
            let len = (enc & 0x3F) as usize;
            need(buf, p, len)?;
            p += len;
            Element::Bytes(&buf[p - len..p])
        }
        1 => {
            need(buf, p, 1)?;
            let len = (((enc & 0x3F) as usize) << 8) | buf[p] as usize;
            p += 1;
            need(buf, p, len)?;
            p += len;
            Element::Bytes(&buf[p - len..p])
        }
        2 => {
            need(buf, p, 4)?;
            let len = BigEndian::read_u32(&buf[p..p + 4]) as usize;
            p += 4;
            need(buf, p, len)?;
            p += len;
            Element::Bytes(&buf[p - len..p])
        }
        _ => {
            let (v, n) = match enc {
                INT_8B => {
                    need(buf, p, 1)?;
                    (buf[p] as i8 as i64, 1)
                }
                INT_16B => {
                    need(buf, p, 2)?;
                    (LittleEndian::read_i16(&buf[p..p + 2]) as i64, 2)
                }
                INT_24B => {
                    need(buf, p, 3)?;
                    (LittleEndian::read_i24(&buf[p..p + 3]) as i64, 3)
                }
                INT_32B => {
                    need(buf, p, 4)?;
                    (LittleEndian::read_i32(&buf[p..p + 4]) as i64, 4)
                }
                INT_64B => {
                    need(buf, p, 8)?;
                    (LittleEndian::read_i64(&buf[p..p + 8]), 8)
                }
                INT_IMM_MIN..=INT_IMM_MAX => (((enc & 0x0F) as i64) - 1, 0),
                other => {
                    return Err(RdbError::corrupt(format!(
                        "unknown ziplist entry encoding 0x{other:02X} at {pos}"
                    ))
                    .into())
                }
            };
            p += n;
            Element::Int(v)
        }
    };

    Ok(RawEntry {
        elem,
        prevlen,
        size: p - pos,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ZipList {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Iterator for ZipListIter<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // Буфер проверен при построении, ошибка здесь невозможна.
        let entry = decode_entry(self.buf, self.pos).ok()?;
        self.pos += entry.size;
        self.remaining -= 1;
        Some(entry.elem)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ZipListIter<'_> {}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
