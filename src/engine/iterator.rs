//! Пакетный обход уже загруженного значения.
//!
//! Логический элемент занимает фиксированное число слотов: пара хеша два
//! (поле, затем значение), член отсортированного множества один (оценка
//! лежит в самом слоте), всё остальное один. Слоты ссылаются на байты
//! значения и ничего не копируют, кроме целых из компактных кодировок.

use std::collections::{hash_map, hash_set};

use bytes::Bytes;
use rdbport_error::{RdbError, RdbResult};

use crate::database::{
    ziplist_score, Element, HashValue, IntSetIter, ObjectType, QuickListIter, SetValue,
    Value, ZSetValue, ZSkipListIter, ZipListIter,
};

/// Один слот пакета.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot<'a> {
    pub elem: Element<'a>,
    /// Оценка для членов отсортированного множества.
    pub score: Option<f64>,
}

/// Обход значения по слотам в каноническом порядке.
pub enum SlotIter<'a> {
    Str(Option<Element<'a>>),
    List(QuickListIter<'a>),
    /// Компактный хеш или множество: элементы блоба по порядку.
    Flat(ZipListIter<'a>),
    HashTable {
        it: hash_map::Iter<'a, Bytes, Bytes>,
        value: Option<&'a Bytes>,
    },
    IntSet(IntSetIter<'a>),
    SetTable(hash_set::Iter<'a, Bytes>),
    ZSetZip(ZipListIter<'a>),
    ZSetSkip(ZSkipListIter<'a>),
}

/// Курсор, который заполняет пакет слотов за один вызов.
///
/// Живёт не дольше значения. Срез из [`load`](Self::load) действует до
/// следующего вызова.
pub struct BatchIterator<'a> {
    slots: SlotIter<'a>,
    per_element: usize,
    buf: Vec<Slot<'a>>,
    done: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Value {
    /// Обычный итератор по слотам, без пакетов.
    pub fn slots(&self) -> SlotIter<'_> {
        match self {
            Value::Str(s) => SlotIter::Str(Some(s.as_element())),
            Value::List(ql) => SlotIter::List(ql.iter()),
            Value::Hash(HashValue::ZipList(zl)) | Value::Set(SetValue::ZipList(zl)) => {
                SlotIter::Flat(zl.iter())
            }
            Value::Hash(HashValue::Table(map)) => SlotIter::HashTable {
                it: map.iter(),
                value: None,
            },
            Value::Set(SetValue::IntSet(is)) => SlotIter::IntSet(is.iter()),
            Value::Set(SetValue::Table(set)) => SlotIter::SetTable(set.iter()),
            Value::ZSet(ZSetValue::ZipList(zl)) => SlotIter::ZSetZip(zl.iter()),
            Value::ZSet(ZSetValue::SkipList(zs)) => SlotIter::ZSetSkip(zs.iter()),
        }
    }
}

/// Сколько слотов занимает один логический элемент типа.
pub fn slots_per_element(t: ObjectType) -> usize {
    match t {
        ObjectType::Hash => 2,
        _ => 1,
    }
}

impl<'a> BatchIterator<'a> {
    /// Открывает курсор, если тип значения совпадает с ожидаемым.
    pub fn new(
        value: &'a Value,
        expected: ObjectType,
    ) -> RdbResult<Self> {
        let found = value.object_type();
        if found != expected {
            return Err(RdbError::TypeMismatch {
                expected: expected.name(),
                found: found.name(),
            }
            .into());
        }
        Ok(Self {
            slots: value.slots(),
            per_element: slots_per_element(found),
            buf: Vec::new(),
            done: false,
        })
    }

    /// Следующие не более `capacity` логических элементов.
    ///
    /// Пустой срез означает, что значение пройдено до конца.
    pub fn load(
        &mut self,
        capacity: usize,
    ) -> RdbResult<&[Slot<'a>]> {
        if capacity == 0 {
            return Err(RdbError::MisalignedBatch {
                capacity,
                slots_per_element: self.per_element,
            }
            .into());
        }
        self.fill(capacity.saturating_mul(self.per_element));
        Ok(&self.buf)
    }

    /// То же, что [`load`](Self::load), но ёмкость задана в слотах и
    /// обязана быть кратна размеру элемента.
    pub fn load_slots(
        &mut self,
        slots: usize,
    ) -> RdbResult<&[Slot<'a>]> {
        if slots == 0 || slots % self.per_element != 0 {
            return Err(RdbError::MisalignedBatch {
                capacity: slots,
                slots_per_element: self.per_element,
            }
            .into());
        }
        self.fill(slots);
        Ok(&self.buf)
    }

    pub fn slots_per_element(&self) -> usize {
        self.per_element
    }

    /// Закрывает курсор. То же самое делает `Drop`.
    pub fn release(self) {}

    fn fill(
        &mut self,
        max_slots: usize,
    ) {
        self.buf.clear();
        if self.done {
            return;
        }
        self.buf.reserve(max_slots.min(1024));
        while self.buf.len() < max_slots {
            match self.slots.next() {
                Some(s) => self.buf.push(s),
                None => {
                    self.done = true;
                    break;
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<'a> Iterator for SlotIter<'a> {
    type Item = Slot<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let plain = |elem| Slot { elem, score: None };
        match self {
            SlotIter::Str(s) => s.take().map(plain),
            SlotIter::List(it) => it.next().map(plain),
            SlotIter::Flat(it) => it.next().map(plain),
            SlotIter::HashTable { it, value } => {
                if let Some(v) = value.take() {
                    return Some(plain(Element::Bytes(v)));
                }
                let (k, v) = it.next()?;
                *value = Some(v);
                Some(plain(Element::Bytes(k)))
            }
            SlotIter::IntSet(it) => it.next().map(|v| plain(Element::Int(v))),
            SlotIter::SetTable(it) => it.next().map(|m| plain(Element::Bytes(m))),
            SlotIter::ZSetZip(it) => {
                let member = it.next()?;
                let score = it.next()?;
                Some(Slot {
                    elem: member,
                    score: Some(ziplist_score(&score)),
                })
            }
            SlotIter::ZSetSkip(it) => it.next().map(|(m, s)| Slot {
                elem: Element::Bytes(m),
                score: Some(s),
            }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
