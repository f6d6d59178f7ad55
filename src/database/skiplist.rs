use std::cmp::Ordering;

use bytes::Bytes;

/// Максимальный уровень узла.
const MAX_LEVEL: usize = 32;

/// Вероятностный коэффициент (1/4) для уровня нового узла.
const P: u32 = 0x4000;
const MASK: u32 = 0xFFFF;

/// Индекс головного узла в арене.
const HEAD: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    member: Bytes,
    score: f64,
    forward: Vec<Option<usize>>,
    backward: Option<usize>,
}

/// Пропускной список, упорядоченный по `(score, member)`.
///
/// Узлы живут в арене `Vec<Node>` и ссылаются друг на друга индексами.
/// Удаление не поддерживается: список только строится при загрузке и
/// читается.
#[derive(Debug, Clone)]
pub struct ZSkipList {
    nodes: Vec<Node>,
    tail: Option<usize>,
    level: usize,
}

/// Итератор в порядке возрастания.
pub struct ZSkipListIter<'a> {
    list: &'a ZSkipList,
    next: Option<usize>,
    remaining: usize,
}

/// Итератор в порядке убывания.
pub struct ZSkipListRevIter<'a> {
    list: &'a ZSkipList,
    next: Option<usize>,
    remaining: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ZSkipList {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let mut nodes = Vec::with_capacity(cap + 1);
        nodes.push(Node {
            member: Bytes::new(),
            score: 0.0,
            forward: vec![None; MAX_LEVEL],
            backward: None,
        });
        Self {
            nodes,
            tail: None,
            level: 1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    fn random_level() -> usize {
        let mut lvl = 1;
        while lvl < MAX_LEVEL && (fastrand::u32(..) & MASK) < P {
            lvl += 1;
        }
        lvl
    }

    /// Вставляет пару. Уникальность члена обеспечивает вызывающий код
    /// через словарь.
    pub fn insert(
        &mut self,
        score: f64,
        member: Bytes,
    ) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if cmp_entry(&self.nodes[next], score, &member) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }

        let lvl = Self::random_level();
        if lvl > self.level {
            // update[self.level..lvl] уже указывают на HEAD
            self.level = lvl;
        }

        let idx = self.nodes.len();
        let mut forward = vec![None; lvl];
        for (i, slot) in forward.iter_mut().enumerate() {
            let prev = update[i];
            *slot = self.nodes[prev].forward[i];
        }
        let backward = if update[0] == HEAD {
            None
        } else {
            Some(update[0])
        };
        let next0 = forward[0];
        self.nodes.push(Node {
            member,
            score,
            forward,
            backward,
        });
        for (i, &prev) in update.iter().enumerate().take(lvl) {
            self.nodes[prev].forward[i] = Some(idx);
        }
        match next0 {
            Some(n) => self.nodes[n].backward = Some(idx),
            None => self.tail = Some(idx),
        }
    }

    /// Первый (минимальный) элемент.
    pub fn first(&self) -> Option<(&[u8], f64)> {
        self.nodes[HEAD].forward[0].map(|i| self.entry(i))
    }

    /// Последний (максимальный) элемент.
    pub fn last(&self) -> Option<(&[u8], f64)> {
        self.tail.map(|i| self.entry(i))
    }

    pub fn iter(&self) -> ZSkipListIter<'_> {
        ZSkipListIter {
            list: self,
            next: self.nodes[HEAD].forward[0],
            remaining: self.len(),
        }
    }

    pub fn rev_iter(&self) -> ZSkipListRevIter<'_> {
        ZSkipListRevIter {
            list: self,
            next: self.tail,
            remaining: self.len(),
        }
    }

    #[inline]
    fn entry(
        &self,
        i: usize,
    ) -> (&[u8], f64) {
        let n = &self.nodes[i];
        (n.member.as_ref(), n.score)
    }
}

/// Сравнивает узел с парой `(score, member)`.
fn cmp_entry(
    node: &Node,
    score: f64,
    member: &[u8],
) -> Ordering {
    // NaN сюда не попадает: декодер отвергает такие счёты.
    node.score
        .partial_cmp(&score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| node.member.as_ref().cmp(member))
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ZSkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Iterator for ZSkipListIter<'a> {
    type Item = (&'a [u8], f64);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        self.next = self.list.nodes[i].forward[0];
        self.remaining -= 1;
        Some(self.list.entry(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ZSkipListIter<'_> {}

impl<'a> Iterator for ZSkipListRevIter<'a> {
    type Item = (&'a [u8], f64);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        self.next = self.list.nodes[i].backward;
        self.remaining -= 1;
        Some(self.list.entry(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ZSkipListRevIter<'_> {}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(f64, &str)]) -> ZSkipList {
        let mut sl = ZSkipList::new();
        for &(s, m) in pairs {
            sl.insert(s, Bytes::copy_from_slice(m.as_bytes()));
        }
        sl
    }

    #[test]
    fn test_empty() {
        let sl = ZSkipList::new();
        assert!(sl.is_empty());
        assert!(sl.first().is_none());
        assert!(sl.last().is_none());
        assert_eq!(sl.iter().count(), 0);
    }

    /// Порядок по счёту, при равном счёте по байтам члена.
    #[test]
    fn test_order_with_ties() {
        let sl = build(&[(2.0, "b"), (1.0, "z"), (2.0, "a"), (-1.5, "m"), (2.0, "aa")]);
        let got: Vec<_> = sl
            .iter()
            .map(|(m, s)| (String::from_utf8_lossy(m).into_owned(), s))
            .collect();
        assert_eq!(
            got,
            vec![
                ("m".to_string(), -1.5),
                ("z".to_string(), 1.0),
                ("a".to_string(), 2.0),
                ("aa".to_string(), 2.0),
                ("b".to_string(), 2.0),
            ]
        );
        assert_eq!(sl.first().unwrap().0, b"m");
        assert_eq!(sl.last().unwrap().0, b"b");
    }

    #[test]
    fn test_rev_iter_mirrors_iter() {
        let mut sl = ZSkipList::new();
        for i in 0..500 {
            let score = ((i * 7919) % 503) as f64;
            sl.insert(score, Bytes::from(format!("m{i}")));
        }
        let fwd: Vec<_> = sl.iter().collect();
        let mut rev: Vec<_> = sl.rev_iter().collect();
        rev.reverse();
        assert_eq!(fwd, rev);
        assert_eq!(fwd.len(), 500);
        assert!(fwd.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_descending_insert_order() {
        let mut sl = ZSkipList::with_capacity(300);
        for i in (0..300).rev() {
            sl.insert(i as f64, Bytes::from(i.to_string()));
        }
        let scores: Vec<_> = sl.iter().map(|(_, s)| s).collect();
        let want: Vec<_> = (0..300).map(|i| i as f64).collect();
        assert_eq!(scores, want);
    }

    #[test]
    fn test_infinities() {
        let sl = build(&[(f64::INFINITY, "hi"), (f64::NEG_INFINITY, "lo"), (0.0, "mid")]);
        let members: Vec<_> = sl.iter().map(|(m, _)| m.to_vec()).collect();
        assert_eq!(members, vec![b"lo".to_vec(), b"mid".to_vec(), b"hi".to_vec()]);
    }
}
