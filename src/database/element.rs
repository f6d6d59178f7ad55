use std::{borrow::Cow, cmp::Ordering, fmt};

use bytes::Bytes;

/// Один элемент контейнера: байтовая строка или 64-битное целое.
///
/// Компактные кодировки хранят числовые строки как целые, поэтому при
/// итерации элемент может прийти в любом из двух видов. Байтовое
/// представление целого всегда каноническая десятичная запись.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<'a> Element<'a> {
    /// Байтовая форма элемента. Для `Int` выделяет строку.
    pub fn as_bytes(&self) -> Cow<'a, [u8]> {
        match *self {
            Element::Bytes(b) => Cow::Borrowed(b),
            Element::Int(v) => Cow::Owned(v.to_string().into_bytes()),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().into_owned()
    }

    pub fn to_bytes(&self) -> Bytes {
        match *self {
            Element::Bytes(b) => Bytes::copy_from_slice(b),
            Element::Int(v) => Bytes::from(v.to_string()),
        }
    }

    /// Длина байтовой формы без выделения памяти.
    pub fn byte_len(&self) -> usize {
        match *self {
            Element::Bytes(b) => b.len(),
            Element::Int(v) => int_str_len(v),
        }
    }

    /// Целочисленное значение, если элемент им является или его байтовая
    /// форма каноническое целое.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Element::Bytes(b) => canonical_int(b),
            Element::Int(v) => Some(v),
        }
    }

    /// Сравнение по байтовой форме.
    pub fn cmp_bytes(
        &self,
        other: &Element<'_>,
    ) -> Ordering {
        match (self, other) {
            (Element::Bytes(a), Element::Bytes(b)) => a.cmp(b),
            _ => self.as_bytes().as_ref().cmp(other.as_bytes().as_ref()),
        }
    }

    pub fn eq_bytes(
        &self,
        other: &[u8],
    ) -> bool {
        match *self {
            Element::Bytes(b) => b == other,
            Element::Int(v) => canonical_int(other) == Some(v),
        }
    }
}

/// Строгий разбор десятичного `i64`: без знака `+`, без ведущих нулей,
/// без пробелов, `-0` не допускается.
///
/// Только такие строки можно хранить как целые без потери исходных байт.
pub fn canonical_int(s: &[u8]) -> Option<i64> {
    if s.is_empty() || s.len() > 20 {
        return None;
    }
    let text = std::str::from_utf8(s).ok()?;
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if text == "-0" {
        return None;
    }
    text.parse::<i64>().ok()
}

fn int_str_len(v: i64) -> usize {
    let mut n = if v < 0 { 2 } else { 1 };
    let mut x = v.unsigned_abs();
    while x >= 10 {
        x /= 10;
        n += 1;
    }
    n
}

impl fmt::Display for Element<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Element::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Element::Int(v) => write!(f, "{v}"),
        }
    }
}

impl<'a> From<&'a [u8]> for Element<'a> {
    fn from(b: &'a [u8]) -> Self {
        Element::Bytes(b)
    }
}

impl From<i64> for Element<'_> {
    fn from(v: i64) -> Self {
        Element::Int(v)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
