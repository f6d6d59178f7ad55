use byteorder::{ByteOrder, LittleEndian};
use rdbport_error::{RdbError, RdbResult};

/// Ширина элемента в `IntSet`, совпадает с полем `encoding` в
/// сериализованном виде (2, 4 или 8 байт).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntEncoding {
    Int16 = 2,
    Int32 = 4,
    Int64 = 8,
}

/// Итератор по всем элементам `IntSet`.
pub enum IntSetIter<'a> {
    Int16(std::slice::Iter<'a, i16>),
    Int32(std::slice::Iter<'a, i32>),
    Int64(std::slice::Iter<'a, i64>),
}

/// Отсортированное множество целых с адаптивной шириной элемента.
///
/// Сериализуется в формат `intset` снимка:
/// `<encoding:u32 LE> <length:u32 LE> <contents LE>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSet {
    enc: IntEncoding,
    data16: Vec<i16>,
    data32: Vec<i32>,
    data64: Vec<i64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl IntSet {
    pub fn new() -> Self {
        Self {
            enc: IntEncoding::Int16,
            data16: Vec::new(),
            data32: Vec::new(),
            data64: Vec::new(),
        }
    }

    /// Разбирает сериализованный intset. Элементы должны строго
    /// возрастать и помещаться в заявленную ширину.
    pub fn from_bytes(buf: &[u8]) -> RdbResult<Self> {
        if buf.len() < 8 {
            return Err(RdbError::corrupt("intset header is truncated").into());
        }
        let enc = match LittleEndian::read_u32(&buf[0..4]) {
            2 => IntEncoding::Int16,
            4 => IntEncoding::Int32,
            8 => IntEncoding::Int64,
            other => {
                return Err(RdbError::corrupt(format!("invalid intset encoding {other}")).into())
            }
        };
        let count = LittleEndian::read_u32(&buf[4..8]) as usize;
        let width = enc as usize;
        let body = &buf[8..];
        if body.len() != count * width {
            return Err(RdbError::corrupt(format!(
                "intset declares {count} x {width} bytes, blob has {}",
                body.len()
            ))
            .into());
        }

        let mut set = Self::new();
        set.enc = enc;
        let mut prev: Option<i64> = None;
        for chunk in body.chunks_exact(width) {
            let v = match enc {
                IntEncoding::Int16 => LittleEndian::read_i16(chunk) as i64,
                IntEncoding::Int32 => LittleEndian::read_i32(chunk) as i64,
                IntEncoding::Int64 => LittleEndian::read_i64(chunk),
            };
            if prev.is_some_and(|p| p >= v) {
                return Err(RdbError::corrupt("intset is not strictly ascending").into());
            }
            prev = Some(v);
            match enc {
                IntEncoding::Int16 => set.data16.push(v as i16),
                IntEncoding::Int32 => set.data32.push(v as i32),
                IntEncoding::Int64 => set.data64.push(v),
            }
        }
        Ok(set)
    }

    /// Сериализует множество в формат `intset`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.enc as usize;
        let mut out = vec![0u8; 8 + self.len() * width];
        LittleEndian::write_u32(&mut out[0..4], width as u32);
        LittleEndian::write_u32(&mut out[4..8], self.len() as u32);
        let body = &mut out[8..];
        match self.enc {
            IntEncoding::Int16 => LittleEndian::write_i16_into(&self.data16, body),
            IntEncoding::Int32 => LittleEndian::write_i32_into(&self.data32, body),
            IntEncoding::Int64 => LittleEndian::write_i64_into(&self.data64, body),
        }
        out
    }

    #[inline]
    pub fn encoding(&self) -> IntEncoding {
        self.enc
    }

    /// Возвращает кол-во элементов во множестве.
    #[inline]
    pub fn len(&self) -> usize {
        match self.enc {
            IntEncoding::Int16 => self.data16.len(),
            IntEncoding::Int32 => self.data32.len(),
            IntEncoding::Int64 => self.data64.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Проверяет, содержит ли множество значение.
    pub fn contains(
        &self,
        v: i64,
    ) -> bool {
        match self.enc {
            IntEncoding::Int16 => {
                i16::try_from(v).is_ok_and(|x| self.data16.binary_search(&x).is_ok())
            }
            IntEncoding::Int32 => {
                i32::try_from(v).is_ok_and(|x| self.data32.binary_search(&x).is_ok())
            }
            IntEncoding::Int64 => self.data64.binary_search(&v).is_ok(),
        }
    }

    /// Вставляет значение, при необходимости расширяя кодировку.
    /// Возвращает `false`, если значение уже было.
    pub fn insert(
        &mut self,
        v: i64,
    ) -> bool {
        let need = value_encoding(v);
        if need > self.enc {
            self.upgrade(need);
        }

        match self.enc {
            IntEncoding::Int16 => {
                let x = v as i16;
                match self.data16.binary_search(&x) {
                    Ok(_) => false,
                    Err(pos) => {
                        self.data16.insert(pos, x);
                        true
                    }
                }
            }
            IntEncoding::Int32 => {
                let x = v as i32;
                match self.data32.binary_search(&x) {
                    Ok(_) => false,
                    Err(pos) => {
                        self.data32.insert(pos, x);
                        true
                    }
                }
            }
            IntEncoding::Int64 => match self.data64.binary_search(&v) {
                Ok(_) => false,
                Err(pos) => {
                    self.data64.insert(pos, v);
                    true
                }
            },
        }
    }

    /// Итератор по элементам в порядке возрастания.
    #[inline]
    pub fn iter(&self) -> IntSetIter<'_> {
        match self.enc {
            IntEncoding::Int16 => IntSetIter::Int16(self.data16.iter()),
            IntEncoding::Int32 => IntSetIter::Int32(self.data32.iter()),
            IntEncoding::Int64 => IntSetIter::Int64(self.data64.iter()),
        }
    }

    fn upgrade(
        &mut self,
        new_enc: IntEncoding,
    ) {
        match (self.enc, new_enc) {
            (IntEncoding::Int16, IntEncoding::Int32) => {
                self.data32 = self.data16.drain(..).map(|x| x as i32).collect();
            }
            (IntEncoding::Int16, IntEncoding::Int64) => {
                self.data64 = self.data16.drain(..).map(|x| x as i64).collect();
            }
            (IntEncoding::Int32, IntEncoding::Int64) => {
                self.data64 = self.data32.drain(..).map(|x| x as i64).collect();
            }
            _ => {}
        }
        self.enc = new_enc;
    }
}

fn value_encoding(v: i64) -> IntEncoding {
    if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
        IntEncoding::Int16
    } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        IntEncoding::Int32
    } else {
        IntEncoding::Int64
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для IntSet, IntSetIter
////////////////////////////////////////////////////////////////////////////////

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for IntSetIter<'_> {
    type Item = i64;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            IntSetIter::Int16(iter) => iter.next().map(|&x| x as i64),
            IntSetIter::Int32(iter) => iter.next().map(|&x| x as i64),
            IntSetIter::Int64(iter) => iter.next().copied(),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            IntSetIter::Int16(iter) => iter.size_hint(),
            IntSetIter::Int32(iter) => iter.size_hint(),
            IntSetIter::Int64(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for IntSetIter<'_> {}

impl FromIterator<i64> for IntSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        let mut set = IntSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
