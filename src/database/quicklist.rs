use super::{element::Element, ziplist::ZipList, ziplist::ZipListIter};

/// Лимиты размера узла в байтах для отрицательного `fill` (-1..-5).
const NODE_SIZE_LIMITS: [usize; 5] = [4096, 8192, 16384, 32768, 65536];
/// При положительном `fill` узел всё равно не растёт больше этого размера.
const SIZE_SAFETY_LIMIT: usize = 8192;

/// Список из узлов-ziplist.
///
/// `fill` повторяет `list-max-ziplist-size`: положительное значение это
/// максимум записей в узле, отрицательное выбирает лимит размера узла из
/// [`NODE_SIZE_LIMITS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickList {
    nodes: Vec<ZipList>,
    len: usize,
    fill: i32,
}

/// Итератор по всем элементам в порядке вставки.
pub struct QuickListIter<'a> {
    nodes: std::slice::Iter<'a, ZipList>,
    current: Option<ZipListIter<'a>>,
    remaining: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl QuickList {
    pub fn new(fill: i32) -> Self {
        Self {
            nodes: Vec::new(),
            len: 0,
            fill,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fill(&self) -> i32 {
        self.fill
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[ZipList] {
        &self.nodes
    }

    /// Добавляет элемент в хвост, открывая новый узел, если текущий
    /// заполнен.
    pub fn push_back(
        &mut self,
        elem: Element<'_>,
    ) {
        let fits = self
            .nodes
            .last()
            .is_some_and(|tail| self.node_allows(tail, &elem));
        if !fits {
            self.nodes.push(ZipList::new());
        }
        if let Some(tail) = self.nodes.last_mut() {
            tail.push(elem);
            self.len += 1;
        }
    }

    /// Присоединяет готовый узел как есть. Пустые узлы пропускаются.
    pub fn append_node(
        &mut self,
        node: ZipList,
    ) {
        if node.is_empty() {
            return;
        }
        self.len += node.len();
        self.nodes.push(node);
    }

    pub fn iter(&self) -> QuickListIter<'_> {
        QuickListIter {
            nodes: self.nodes.iter(),
            current: None,
            remaining: self.len,
        }
    }

    fn node_allows(
        &self,
        node: &ZipList,
        elem: &Element<'_>,
    ) -> bool {
        let new_size = node.size_after_push(elem);
        if self.fill >= 0 {
            node.len() < self.fill as usize && new_size <= SIZE_SAFETY_LIMIT
        } else {
            let idx = (self.fill.unsigned_abs() as usize - 1).min(NODE_SIZE_LIMITS.len() - 1);
            new_size <= NODE_SIZE_LIMITS[idx]
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<'a> Iterator for QuickListIter<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cur) = self.current.as_mut() {
                if let Some(e) = cur.next() {
                    self.remaining -= 1;
                    return Some(e);
                }
            }
            self.current = Some(self.nodes.next()?.iter());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for QuickListIter<'_> {}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
