use std::fmt;

use ahash::{AHashMap, AHashSet};
use bytes::Bytes;
use serde::Serialize;

use super::{
    element::{canonical_int, Element},
    IntSet, QuickList, SortedSet, ZipList,
};

/// Logical type of a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    String,
    List,
    Set,
    ZSet,
    Hash,
}

/// Physical encoding of a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Raw,
    Int,
    QuickList,
    ZipList,
    IntSet,
    HashTable,
    SkipList,
}

/// A scalar string, either raw bytes or a canonical 64-bit integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrValue {
    Raw(Bytes),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HashValue {
    /// Field/value pairs flattened into one ziplist.
    ZipList(ZipList),
    Table(AHashMap<Bytes, Bytes>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    IntSet(IntSet),
    ZipList(ZipList),
    Table(AHashSet<Bytes>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZSetValue {
    /// Member/score pairs in ascending order, flattened into one ziplist.
    ZipList(ZipList),
    SkipList(SortedSet),
}

/// A fully materialized snapshot object.
///
/// Each variant carries its physical encoding; iteration yields the same
/// element shape for every encoding of a given logical type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(StrValue),
    List(QuickList),
    Hash(HashValue),
    Set(SetValue),
    ZSet(ZSetValue),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::String => "string",
            ObjectType::List => "list",
            ObjectType::Set => "set",
            ObjectType::ZSet => "zset",
            ObjectType::Hash => "hash",
        }
    }
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Int => "int",
            Encoding::QuickList => "quicklist",
            Encoding::ZipList => "ziplist",
            Encoding::IntSet => "intset",
            Encoding::HashTable => "hashtable",
            Encoding::SkipList => "skiplist",
        }
    }
}

impl StrValue {
    /// Stores canonical integers as `Int`, everything else as raw bytes.
    pub fn from_bytes(b: Bytes) -> Self {
        if b.len() <= 20 {
            if let Some(v) = canonical_int(&b) {
                return StrValue::Int(v);
            }
        }
        StrValue::Raw(b)
    }

    pub fn as_element(&self) -> Element<'_> {
        match self {
            StrValue::Raw(b) => Element::Bytes(b),
            StrValue::Int(v) => Element::Int(*v),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        self.as_element().to_bytes()
    }
}

impl Value {
    /// Builds a string value, applying integer encoding when possible.
    pub fn string(b: impl Into<Bytes>) -> Self {
        Value::Str(StrValue::from_bytes(b.into()))
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Value::Str(_) => ObjectType::String,
            Value::List(_) => ObjectType::List,
            Value::Hash(_) => ObjectType::Hash,
            Value::Set(_) => ObjectType::Set,
            Value::ZSet(_) => ObjectType::ZSet,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::Str(StrValue::Raw(_)) => Encoding::Raw,
            Value::Str(StrValue::Int(_)) => Encoding::Int,
            Value::List(_) => Encoding::QuickList,
            Value::Hash(HashValue::ZipList(_)) => Encoding::ZipList,
            Value::Hash(HashValue::Table(_)) => Encoding::HashTable,
            Value::Set(SetValue::IntSet(_)) => Encoding::IntSet,
            Value::Set(SetValue::ZipList(_)) => Encoding::ZipList,
            Value::Set(SetValue::Table(_)) => Encoding::HashTable,
            Value::ZSet(ZSetValue::ZipList(_)) => Encoding::ZipList,
            Value::ZSet(ZSetValue::SkipList(_)) => Encoding::SkipList,
        }
    }

    /// Number of logical elements: pairs for hashes, members for sets.
    pub fn len(&self) -> usize {
        match self {
            Value::Str(_) => 1,
            Value::List(l) => l.len(),
            Value::Hash(HashValue::ZipList(zl)) => zl.len() / 2,
            Value::Hash(HashValue::Table(m)) => m.len(),
            Value::Set(SetValue::IntSet(s)) => s.len(),
            Value::Set(SetValue::ZipList(zl)) => zl.len(),
            Value::Set(SetValue::Table(s)) => s.len(),
            Value::ZSet(ZSetValue::ZipList(zl)) => zl.len() / 2,
            Value::ZSet(ZSetValue::SkipList(z)) => z.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte form of a string value.
    pub fn as_string(&self) -> Option<Bytes> {
        match self {
            Value::Str(s) => Some(s.to_bytes()),
            _ => None,
        }
    }

    /// List items in order.
    pub fn list_items(&self) -> Option<Vec<Bytes>> {
        match self {
            Value::List(l) => Some(l.iter().map(|e| e.to_bytes()).collect()),
            _ => None,
        }
    }

    /// Hash pairs in storage order.
    pub fn hash_pairs(&self) -> Option<Vec<(Bytes, Bytes)>> {
        match self {
            Value::Hash(HashValue::ZipList(zl)) => {
                let mut it = zl.iter();
                let mut out = Vec::with_capacity(zl.len() / 2);
                while let (Some(k), Some(v)) = (it.next(), it.next()) {
                    out.push((k.to_bytes(), v.to_bytes()));
                }
                Some(out)
            }
            Value::Hash(HashValue::Table(m)) => {
                Some(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            _ => None,
        }
    }

    /// Set members in storage order.
    pub fn set_members(&self) -> Option<Vec<Bytes>> {
        match self {
            Value::Set(SetValue::IntSet(s)) => {
                Some(s.iter().map(|v| Bytes::from(v.to_string())).collect())
            }
            Value::Set(SetValue::ZipList(zl)) => Some(zl.iter().map(|e| e.to_bytes()).collect()),
            Value::Set(SetValue::Table(s)) => Some(s.iter().cloned().collect()),
            _ => None,
        }
    }

    /// Sorted-set entries in ascending `(score, member)` order.
    pub fn zset_entries(&self) -> Option<Vec<(Bytes, f64)>> {
        match self {
            Value::ZSet(ZSetValue::ZipList(zl)) => {
                let mut it = zl.iter();
                let mut out = Vec::with_capacity(zl.len() / 2);
                while let (Some(m), Some(s)) = (it.next(), it.next()) {
                    out.push((m.to_bytes(), ziplist_score(&s)));
                }
                Some(out)
            }
            Value::ZSet(ZSetValue::SkipList(z)) => Some(
                z.iter()
                    .map(|(m, s)| (Bytes::copy_from_slice(m), s))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Reads a score stored in a compact sorted set.
///
/// Integral scores are stored as ziplist integers, others as their
/// shortest round-trip decimal text.
pub fn ziplist_score(e: &Element<'_>) -> f64 {
    match e {
        Element::Int(v) => *v as f64,
        Element::Bytes(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| parse_score_text(s))
            .unwrap_or(f64::NAN),
    }
}

/// Parses score text, accepting the `inf`/`-inf` spellings as well.
pub fn parse_score_text(s: &str) -> Option<f64> {
    match s {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => s.parse::<f64>().ok(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for ObjectType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Encoding {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
