//! Выбор физического кодирования для хешей, множеств и sorted set.
//!
//! Компактная форма выбирается, пока число элементов и длина самого
//! длинного элемента не превышают пороги из [`RdbConfig`]. Компактные
//! блоки из снимка, которые перерастают пороги, разворачиваются.

use ahash::{AHashMap, AHashSet};
use bytes::Bytes;
use rdbport_error::{RdbError, RdbResult};

use crate::{
    config::RdbConfig,
    database::{
        canonical_int, ziplist_score, Element, HashValue, IntSet, SetValue, SortedSet, ZSetValue,
        ZipList,
    },
};

/// Наибольшее целое, которое `f64` представляет точно.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

////////////////////////////////////////////////////////////////////////////////
// Хеши
////////////////////////////////////////////////////////////////////////////////

pub fn hash_fits_compact(
    len: usize,
    max_elem_len: usize,
    cfg: &RdbConfig,
) -> bool {
    len <= cfg.hash_max_ziplist_entries && max_elem_len <= cfg.hash_max_ziplist_value
}

/// Строит хеш из пар в порядке чтения. Повторный ключ это `CorruptPayload`.
pub fn hash_from_pairs(
    pairs: Vec<(Bytes, Bytes)>,
    cfg: &RdbConfig,
) -> RdbResult<HashValue> {
    let max_len = pairs
        .iter()
        .map(|(k, v)| k.len().max(v.len()))
        .max()
        .unwrap_or(0);

    if hash_fits_compact(pairs.len(), max_len, cfg) {
        let mut seen = AHashSet::with_capacity(pairs.len());
        let mut zl = ZipList::new();
        for (k, v) in &pairs {
            if !seen.insert(k.as_ref()) {
                return Err(duplicate("hash field", k));
            }
            zl.push_bytes(k);
            zl.push_bytes(v);
        }
        return Ok(HashValue::ZipList(zl));
    }

    let mut map = AHashMap::with_capacity(pairs.len());
    for (k, v) in pairs {
        if map.contains_key(&k) {
            return Err(duplicate("hash field", &k));
        }
        map.insert(k, v);
    }
    Ok(HashValue::Table(map))
}

/// Проверяет компактный хеш из снимка и разворачивает его, если он
/// больше порогов.
pub fn hash_from_ziplist(
    zl: ZipList,
    cfg: &RdbConfig,
) -> RdbResult<HashValue> {
    if zl.len() % 2 != 0 {
        return Err(RdbError::corrupt(format!("hash ziplist with odd entry count {}", zl.len())).into());
    }
    let pairs = zl.len() / 2;
    let mut fields = AHashSet::with_capacity(pairs);
    for (i, e) in zl.iter().enumerate() {
        if i % 2 == 0 && !fields.insert(e.to_bytes()) {
            return Err(duplicate("hash field", &e.to_bytes()));
        }
    }

    if hash_fits_compact(pairs, zl.max_elem_len(), cfg) {
        return Ok(HashValue::ZipList(zl));
    }
    tracing::debug!(pairs, "Expanding oversized compact hash");
    let mut map = AHashMap::with_capacity(pairs);
    let mut it = zl.iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        map.insert(k.to_bytes(), v.to_bytes());
    }
    Ok(HashValue::Table(map))
}

////////////////////////////////////////////////////////////////////////////////
// Множества
////////////////////////////////////////////////////////////////////////////////

/// Выбирает intset, компактный список или таблицу.
pub fn set_from_members(
    members: Vec<Bytes>,
    cfg: &RdbConfig,
) -> RdbResult<SetValue> {
    if members.len() <= cfg.set_max_intset_entries {
        let ints: Option<Vec<i64>> = members.iter().map(|m| canonical_int(m)).collect();
        if let Some(ints) = ints {
            let mut is = IntSet::new();
            for (v, m) in ints.into_iter().zip(&members) {
                if !is.insert(v) {
                    return Err(duplicate("set member", m));
                }
            }
            return Ok(SetValue::IntSet(is));
        }
    }

    let max_len = members.iter().map(|m| m.len()).max().unwrap_or(0);
    if members.len() <= cfg.set_max_listpack_entries && max_len <= cfg.set_max_listpack_value {
        let mut seen = AHashSet::with_capacity(members.len());
        let mut zl = ZipList::new();
        for m in &members {
            if !seen.insert(m.as_ref()) {
                return Err(duplicate("set member", m));
            }
            zl.push_bytes(m);
        }
        return Ok(SetValue::ZipList(zl));
    }

    let mut set = AHashSet::with_capacity(members.len());
    for m in members {
        if set.contains(&m) {
            return Err(duplicate("set member", &m));
        }
        set.insert(m);
    }
    Ok(SetValue::Table(set))
}

/// Intset из снимка остаётся intset, пока не превышает лимит записей.
pub fn set_from_intset(
    is: IntSet,
    cfg: &RdbConfig,
) -> SetValue {
    if is.len() <= cfg.set_max_intset_entries {
        return SetValue::IntSet(is);
    }
    tracing::debug!(members = is.len(), "Expanding oversized intset");
    SetValue::Table(is.iter().map(|v| Bytes::from(v.to_string())).collect())
}

////////////////////////////////////////////////////////////////////////////////
// Sorted set
////////////////////////////////////////////////////////////////////////////////

pub fn zset_fits_compact(
    len: usize,
    max_member_len: usize,
    cfg: &RdbConfig,
) -> bool {
    len <= cfg.zset_max_ziplist_entries && max_member_len <= cfg.zset_max_ziplist_value
}

/// Упаковывает развёрнутый sorted set в компактную форму, сохраняя
/// порядок.
pub fn zset_to_ziplist(z: &SortedSet) -> ZipList {
    let mut zl = ZipList::new();
    for (member, score) in z.iter() {
        zl.push_bytes(member);
        push_score(&mut zl, score);
    }
    zl
}

/// Счёт кладётся целым, если он целый и точно представим, иначе текстом.
pub fn push_score(
    zl: &mut ZipList,
    score: f64,
) {
    if score.fract() == 0.0
        && score.abs() < MAX_EXACT_INT
        && !(score == 0.0 && score.is_sign_negative())
    {
        zl.push_int(score as i64);
    } else {
        zl.push_bytes(format_score(score).as_bytes());
    }
}

/// Кратчайшая текстовая форма счёта, которая читается обратно без потерь.
pub fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if score == 0.0 && score.is_sign_negative() {
        "-0".to_string()
    } else {
        format!("{score:?}")
    }
}

/// Проверяет компактный sorted set из снимка: чётное число записей,
/// корректные счёты, строгий порядок и уникальные члены. Разворачивает,
/// если он больше порогов.
pub fn zset_from_ziplist(
    zl: ZipList,
    cfg: &RdbConfig,
) -> RdbResult<ZSetValue> {
    if zl.len() % 2 != 0 {
        return Err(RdbError::corrupt(format!("zset ziplist with odd entry count {}", zl.len())).into());
    }
    let pairs = zl.len() / 2;

    let mut members = AHashSet::with_capacity(pairs);
    let mut prev: Option<(f64, Element<'_>)> = None;
    let mut max_len = 0;
    let mut it = zl.iter();
    while let (Some(m), Some(s)) = (it.next(), it.next()) {
        let score = ziplist_score(&s);
        if score.is_nan() {
            return Err(RdbError::corrupt(format!("invalid score for member {m}")).into());
        }
        if let Some((ps, pm)) = prev {
            let ordered = ps < score || (ps == score && pm.cmp_bytes(&m).is_lt());
            if !ordered {
                return Err(RdbError::corrupt(format!("zset ziplist out of order at member {m}")).into());
            }
        }
        if !members.insert(m.to_bytes()) {
            return Err(duplicate("zset member", &m.to_bytes()));
        }
        max_len = max_len.max(m.byte_len());
        prev = Some((score, m));
    }

    if zset_fits_compact(pairs, max_len, cfg) {
        return Ok(ZSetValue::ZipList(zl));
    }
    tracing::debug!(pairs, max_len, "Expanding oversized compact zset");
    let mut z = SortedSet::with_capacity(pairs);
    let mut it = zl.iter();
    while let (Some(m), Some(s)) = (it.next(), it.next()) {
        z.insert(m.to_bytes(), ziplist_score(&s));
    }
    Ok(ZSetValue::SkipList(z))
}

fn duplicate(
    what: &str,
    key: &[u8],
) -> rdbport_error::StackError {
    RdbError::corrupt(format!(
        "duplicate {what} {:?}",
        String::from_utf8_lossy(key)
    ))
    .into()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_small_hash_is_compact() {
        let pairs = vec![(b("a"), b("1")), (b("b"), b("2"))];
        let h = hash_from_pairs(pairs, &RdbConfig::default()).unwrap();
        assert!(matches!(h, HashValue::ZipList(ref zl) if zl.len() == 4));
    }

    #[rstest]
    #[case(128, 64, true)]
    #[case(129, 64, false)]
    #[case(128, 65, false)]
    fn test_hash_boundary(
        #[case] count: usize,
        #[case] value_len: usize,
        #[case] compact: bool,
    ) {
        let pairs: Vec<_> = (0..count)
            .map(|i| (b(&format!("f{i}")), Bytes::from(vec![b'v'; value_len])))
            .collect();
        let h = hash_from_pairs(pairs, &RdbConfig::default()).unwrap();
        assert_eq!(matches!(h, HashValue::ZipList(_)), compact);
    }

    #[test]
    fn test_duplicate_hash_field() {
        let pairs = vec![(b("a"), b("1")), (b("a"), b("2"))];
        assert!(hash_from_pairs(pairs.clone(), &RdbConfig::default()).is_err());

        let cfg = RdbConfig {
            hash_max_ziplist_entries: 0,
            ..RdbConfig::default()
        };
        assert!(hash_from_pairs(pairs, &cfg).is_err());
    }

    #[test]
    fn test_set_encodings() {
        let cfg = RdbConfig::default();
        let ints: Vec<_> = (0..10).map(|i| b(&i.to_string())).collect();
        assert!(matches!(
            set_from_members(ints, &cfg).unwrap(),
            SetValue::IntSet(_)
        ));

        let mixed = vec![b("1"), b("x")];
        assert!(matches!(
            set_from_members(mixed, &cfg).unwrap(),
            SetValue::ZipList(_)
        ));

        let many: Vec<_> = (0..200).map(|i| b(&format!("m{i}"))).collect();
        assert!(matches!(
            set_from_members(many, &cfg).unwrap(),
            SetValue::Table(_)
        ));

        // Ведущий ноль делает строку неканонической: не intset.
        assert!(matches!(
            set_from_members(vec![b("01")], &cfg).unwrap(),
            SetValue::ZipList(_)
        ));
    }

    #[test]
    fn test_set_intset_limit() {
        let cfg = RdbConfig::default();
        let ints: Vec<_> = (0..513).map(|i| b(&i.to_string())).collect();
        assert!(matches!(
            set_from_members(ints, &cfg).unwrap(),
            SetValue::Table(_)
        ));
        let is: IntSet = (0..513).collect();
        assert!(matches!(set_from_intset(is, &cfg), SetValue::Table(ref t) if t.len() == 513));
    }

    #[test]
    fn test_duplicate_set_member() {
        let cfg = RdbConfig::default();
        assert!(set_from_members(vec![b("7"), b("7")], &cfg).is_err());
        assert!(set_from_members(vec![b("x"), b("x")], &cfg).is_err());
    }

    #[rstest]
    #[case(1.0, Element::Int(1))]
    #[case(-42.0, Element::Int(-42))]
    #[case(0.5, Element::Bytes(b"0.5"))]
    #[case(-0.0, Element::Bytes(b"-0"))]
    #[case(f64::INFINITY, Element::Bytes(b"inf"))]
    #[case(1e20, Element::Bytes(b"1e20"))]
    fn test_push_score_forms(
        #[case] score: f64,
        #[case] want: Element<'static>,
    ) {
        let mut zl = ZipList::new();
        push_score(&mut zl, score);
        let got = zl.iter().next().unwrap();
        assert!(got.cmp_bytes(&want).is_eq(), "{got} != {want}");
        let back = ziplist_score(&got);
        assert_eq!(back, score);
        assert_eq!(back.is_sign_negative(), score.is_sign_negative());
    }

    #[test]
    fn test_zset_ziplist_roundtrip() {
        let mut z = SortedSet::new();
        for (m, s) in [("b", 2.0), ("a", 2.0), ("c", -1.5)] {
            z.insert(b(m), s);
        }
        let zl = zset_to_ziplist(&z);
        let back = zset_from_ziplist(zl, &RdbConfig::default()).unwrap();
        let v = crate::database::Value::ZSet(back);
        assert_eq!(
            v.zset_entries().unwrap(),
            vec![(b("c"), -1.5), (b("a"), 2.0), (b("b"), 2.0)]
        );
    }

    #[test]
    fn test_zset_ziplist_validation() {
        let cfg = RdbConfig::default();

        let unordered = ZipList::from_elements([
            Element::Bytes(b"a"),
            Element::Int(2),
            Element::Bytes(b"b"),
            Element::Int(1),
        ]);
        assert!(zset_from_ziplist(unordered, &cfg).is_err());

        let dup = ZipList::from_elements([
            Element::Bytes(b"a"),
            Element::Int(1),
            Element::Bytes(b"a"),
            Element::Int(2),
        ]);
        assert!(zset_from_ziplist(dup, &cfg).is_err());

        let odd = ZipList::from_elements([Element::Bytes(b"a")]);
        assert!(zset_from_ziplist(odd, &cfg).is_err());

        let nan = ZipList::from_elements([Element::Bytes(b"a"), Element::Bytes(b"nope")]);
        assert!(zset_from_ziplist(nan, &cfg).is_err());
    }

    #[test]
    fn test_zset_ziplist_expands_past_limit() {
        let cfg = RdbConfig {
            zset_max_ziplist_entries: 2,
            ..RdbConfig::default()
        };
        let mut z = SortedSet::new();
        for i in 0..3 {
            z.insert(b(&format!("m{i}")), i as f64);
        }
        let zl = zset_to_ziplist(&z);
        assert!(matches!(
            zset_from_ziplist(zl, &cfg).unwrap(),
            ZSetValue::SkipList(ref s) if s.len() == 3
        ));
    }
}
