use ahash::AHashMap;
use bytes::Bytes;

use super::skiplist::{ZSkipList, ZSkipListIter, ZSkipListRevIter};

/// Развёрнутое представление sorted set: словарь член → счёт плюс
/// пропускной список для порядка.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    dict: AHashMap<Bytes, f64>,
    list: ZSkipList,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            dict: AHashMap::with_capacity(cap),
            list: ZSkipList::with_capacity(cap),
        }
    }

    /// Добавляет член. Возвращает `false` и ничего не меняет, если член
    /// уже есть.
    pub fn insert(
        &mut self,
        member: Bytes,
        score: f64,
    ) -> bool {
        if self.dict.contains_key(&member) {
            return false;
        }
        self.dict.insert(member.clone(), score);
        self.list.insert(score, member);
        true
    }

    pub fn score(
        &self,
        member: &[u8],
    ) -> Option<f64> {
        self.dict.get(member).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Элементы по возрастанию счёта.
    pub fn iter(&self) -> ZSkipListIter<'_> {
        self.list.iter()
    }

    /// Элементы по убыванию счёта.
    pub fn rev_iter(&self) -> ZSkipListRevIter<'_> {
        self.list.rev_iter()
    }
}

impl PartialEq for SortedSet {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}
