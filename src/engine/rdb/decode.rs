//! Декодеры контейнеров: по тегу типа читает тело объекта и собирает
//! значение [`Value`] в подходящем физическом кодировании.
//!
//! Любая ошибка внутри агрегата прерывает весь вызов. Частично собранный
//! контейнер освобождается обычным `Drop` до того, как ошибка уйдёт выше.

use std::cmp::Reverse;

use bytes::Bytes;
use ordered_float::OrderedFloat;
use rdbport_error::{RdbError, RdbResult, ResultExt};
use tracing::{debug, trace};

use super::{
    convert,
    primitives::{
        read_binary_double, read_bytes, read_count, read_double, read_string,
    },
    rio::{ByteSource, RdbReader},
    tags::TypeTag,
    zipmap::zipmap_pairs,
};
use crate::{
    config::RdbConfig,
    database::{IntSet, QuickList, SortedSet, StrValue, Value, ZSetValue, ZipList},
};

/// Предел предварительного выделения под объявленное число элементов.
/// Испорченный счётчик не должен сразу занимать память.
const PREALLOC_LIMIT: usize = 1 << 16;

/// Читает тело объекта с тегом `tag`.
pub fn decode_object<S: ByteSource>(
    r: &mut RdbReader<S>,
    tag: TypeTag,
    cfg: &RdbConfig,
) -> RdbResult<Value> {
    trace!(tag = %tag, offset = r.bytes_read(), "Decoding object");

    let value = match tag {
        TypeTag::String => match read_string(r)? {
            StrValue::Raw(b) => Value::Str(StrValue::from_bytes(b)),
            int => Value::Str(int),
        },
        TypeTag::List => {
            let n = read_count(r).context("list length")?;
            let mut list = QuickList::new(cfg.list_max_ziplist_size);
            for _ in 0..n {
                let item = read_bytes(r).context("list item")?;
                list.push_back(item.as_ref().into());
            }
            Value::List(list)
        }
        TypeTag::Set => {
            let n = read_count(r).context("set length")?;
            let mut members = Vec::with_capacity(n.min(PREALLOC_LIMIT));
            for _ in 0..n {
                members.push(read_bytes(r).context("set member")?);
            }
            Value::Set(convert::set_from_members(members, cfg)?)
        }
        TypeTag::ZSet | TypeTag::ZSet2 => {
            let n = read_count(r).context("zset length")?;
            Value::ZSet(load_zset(r, n, tag == TypeTag::ZSet2, cfg)?)
        }
        TypeTag::Hash => {
            let n = read_count(r).context("hash length")?;
            let mut pairs = Vec::with_capacity(n.min(PREALLOC_LIMIT));
            for _ in 0..n {
                let field = read_bytes(r).context("hash field")?;
                let value = read_bytes(r).context("hash value")?;
                pairs.push((field, value));
            }
            Value::Hash(convert::hash_from_pairs(pairs, cfg)?)
        }
        TypeTag::HashZipmap => {
            let blob = read_bytes(r)?;
            let pairs = zipmap_pairs(&blob).context("hash zipmap")?;
            Value::Hash(convert::hash_from_pairs(pairs, cfg)?)
        }
        TypeTag::ListZiplist => {
            let zl = read_ziplist(r).context("list ziplist")?;
            let mut list = QuickList::new(cfg.list_max_ziplist_size);
            for e in zl.iter() {
                list.push_back(e);
            }
            Value::List(list)
        }
        TypeTag::SetIntset => {
            let blob = read_bytes(r)?;
            let is = IntSet::from_bytes(&blob).context("set intset")?;
            Value::Set(convert::set_from_intset(is, cfg))
        }
        TypeTag::ZSetZiplist => {
            let zl = read_ziplist(r).context("zset ziplist")?;
            Value::ZSet(convert::zset_from_ziplist(zl, cfg)?)
        }
        TypeTag::HashZiplist => {
            let zl = read_ziplist(r).context("hash ziplist")?;
            Value::Hash(convert::hash_from_ziplist(zl, cfg)?)
        }
        TypeTag::ListQuicklist => {
            let nodes = read_count(r).context("quicklist length")?;
            let mut list = QuickList::new(cfg.list_max_ziplist_size);
            for _ in 0..nodes {
                list.append_node(read_ziplist(r).context("quicklist node")?);
            }
            Value::List(list)
        }
        other => return Err(RdbError::unknown_tag(other.as_byte(), "object type").into()),
    };
    Ok(value)
}

/// Загружает `n` пар (член, счёт) и выбирает кодирование.
///
/// Небольшие множества вставляются по одной паре. Начиная с
/// `zset_bulk_threshold` пары копятся в буфере, сортируются один раз по
/// убыванию счёта и вставляются в этом порядке: каждая вставка тогда
/// попадает в голову пропускного списка. Перепаковка в компактную форму
/// выполняется только после полной загрузки.
pub fn load_zset<S: ByteSource>(
    r: &mut RdbReader<S>,
    n: usize,
    binary_scores: bool,
    cfg: &RdbConfig,
) -> RdbResult<ZSetValue> {
    let mut max_len = 0usize;
    let mut read_pair = |r: &mut RdbReader<S>| -> RdbResult<(Bytes, f64)> {
        let member = read_bytes(r).context("zset member")?;
        let score = if binary_scores {
            read_binary_double(r)
        } else {
            read_double(r)
        }
        .context("zset score")?;
        if score.is_nan() {
            return Err(RdbError::corrupt(format!(
                "NaN score for member {:?}",
                String::from_utf8_lossy(&member)
            ))
            .into());
        }
        max_len = max_len.max(member.len());
        Ok((member, score))
    };

    let zs = if n < cfg.zset_bulk_threshold {
        let mut zs = SortedSet::with_capacity(n);
        for _ in 0..n {
            let (member, score) = read_pair(r)?;
            insert_unique(&mut zs, member, score)?;
        }
        zs
    } else {
        let mut entries: Vec<(Bytes, f64)> = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            if entries.len() == entries.capacity() {
                // Рост в 4 раза.
                entries.reserve(entries.capacity().max(1) * 3);
            }
            entries.push(read_pair(r)?);
        }

        let descending = entries.windows(2).all(|w| w[0].1 >= w[1].1);
        if !descending {
            entries.sort_unstable_by_key(|e| Reverse(OrderedFloat(e.1)));
        }
        debug!(members = n, presorted = descending, "Bulk-loading sorted set");

        let mut zs = SortedSet::with_capacity(entries.len());
        for (member, score) in entries {
            insert_unique(&mut zs, member, score)?;
        }
        zs
    };

    if convert::zset_fits_compact(zs.len(), max_len, cfg) {
        debug!(members = zs.len(), max_len, "Converting sorted set to ziplist");
        return Ok(ZSetValue::ZipList(convert::zset_to_ziplist(&zs)));
    }
    Ok(ZSetValue::SkipList(zs))
}

fn insert_unique(
    zs: &mut SortedSet,
    member: Bytes,
    score: f64,
) -> RdbResult<()> {
    if zs.score(&member).is_some() {
        return Err(RdbError::corrupt(format!(
            "duplicate zset member {:?}",
            String::from_utf8_lossy(&member)
        ))
        .into());
    }
    zs.insert(member, score);
    Ok(())
}

fn read_ziplist<S: ByteSource>(r: &mut RdbReader<S>) -> RdbResult<ZipList> {
    let blob = read_bytes(r)?;
    ZipList::from_bytes(blob.to_vec())
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{Encoding, HashValue, SetValue},
        engine::rdb::primitives::{write_binary_double, write_double, write_len, write_string},
    };

    fn decode(
        tag: TypeTag,
        body: &[u8],
        cfg: &RdbConfig,
    ) -> RdbResult<Value> {
        let mut r = RdbReader::new(body);
        let v = decode_object(&mut r, tag, cfg)?;
        assert!(r.at_eof().unwrap(), "body not fully consumed");
        Ok(v)
    }

    fn zset_body(
        members: &[(String, f64)],
        binary: bool,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        write_len(&mut buf, members.len() as u64).unwrap();
        for (m, s) in members {
            write_string(&mut buf, m.as_bytes(), false).unwrap();
            if binary {
                write_binary_double(&mut buf, *s).unwrap();
            } else {
                write_double(&mut buf, *s).unwrap();
            }
        }
        buf
    }

    #[test]
    fn test_string_forms() {
        let cfg = RdbConfig::default();
        let v = decode(TypeTag::String, &[0xC0, 0x7B], &cfg).unwrap();
        assert_eq!(v, Value::Str(StrValue::Int(123)));

        // Сырой текст, являющийся каноническим целым, тоже хранится как целое.
        let v = decode(TypeTag::String, b"\x0512345", &cfg).unwrap();
        assert_eq!(v.encoding(), Encoding::Int);

        let v = decode(TypeTag::String, b"\x05hello", &cfg).unwrap();
        assert_eq!(v.as_string().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn test_hash_scenario_three_pairs() {
        let mut body = vec![3u8];
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3")] {
            write_string(&mut body, k.as_bytes(), false).unwrap();
            write_string(&mut body, v.as_bytes(), false).unwrap();
        }
        let v = decode(TypeTag::Hash, &body, &RdbConfig::default()).unwrap();
        assert_eq!(v.encoding(), Encoding::ZipList);
        assert_eq!(v.len(), 3);
        let pairs = v.hash_pairs().unwrap();
        assert_eq!(pairs[2], (Bytes::from_static(b"c"), Bytes::from_static(b"3")));
    }

    #[test]
    fn test_large_hash_becomes_table() {
        let mut body = Vec::new();
        write_len(&mut body, 200).unwrap();
        for i in 0..200 {
            write_string(&mut body, format!("field:{i}").as_bytes(), false).unwrap();
            write_string(&mut body, b"v", false).unwrap();
        }
        let v = decode(TypeTag::Hash, &body, &RdbConfig::default()).unwrap();
        assert!(matches!(v, Value::Hash(HashValue::Table(ref m)) if m.len() == 200));
    }

    #[test]
    fn test_set_members_choose_intset() {
        let mut body = vec![3u8];
        for m in ["3", "1", "2"] {
            write_string(&mut body, m.as_bytes(), false).unwrap();
        }
        let v = decode(TypeTag::Set, &body, &RdbConfig::default()).unwrap();
        assert!(matches!(v, Value::Set(SetValue::IntSet(_))));
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn test_list_items_in_order() {
        let mut body = vec![3u8];
        for m in ["x", "10", "z"] {
            write_string(&mut body, m.as_bytes(), false).unwrap();
        }
        let v = decode(TypeTag::List, &body, &RdbConfig::default()).unwrap();
        let items = v.list_items().unwrap();
        assert_eq!(items, vec![Bytes::from("x"), Bytes::from("10"), Bytes::from("z")]);
    }

    #[test]
    fn test_zset_small_direct_insert() {
        let members: Vec<_> = (0..10).map(|i| (format!("m{i}"), (10 - i) as f64)).collect();
        let v = decode(TypeTag::ZSet2, &zset_body(&members, true), &RdbConfig::default()).unwrap();
        assert_eq!(v.encoding(), Encoding::ZipList);
        let entries = v.zset_entries().unwrap();
        assert_eq!(entries.first().unwrap().1, 1.0);
        assert_eq!(entries.last().unwrap().1, 10.0);
    }

    #[test]
    fn test_zset_bulk_path_sorted() {
        let mut rng = fastrand::Rng::with_seed(42);
        let members: Vec<_> = (0..300)
            .map(|i| (format!("member-{i}"), rng.f64() * 1000.0 - 500.0))
            .collect();
        let v = decode(TypeTag::ZSet, &zset_body(&members, false), &RdbConfig::default()).unwrap();
        assert_eq!(v.encoding(), Encoding::SkipList);
        let entries = v.zset_entries().unwrap();
        assert_eq!(entries.len(), 300);
        assert!(entries.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_zset_rejects_nan_and_duplicates() {
        let cfg = RdbConfig::default();
        let nan = zset_body(&[("a".into(), f64::NAN)], false);
        assert!(decode(TypeTag::ZSet, &nan, &cfg).is_err());

        let dup = zset_body(&[("a".into(), 1.0), ("a".into(), 2.0)], true);
        assert!(decode(TypeTag::ZSet2, &dup, &cfg).is_err());

        let many: Vec<_> = (0..200)
            .map(|i| (format!("m{}", i % 150), i as f64))
            .collect();
        let err = decode(TypeTag::ZSet2, &zset_body(&many, true), &cfg).unwrap_err();
        assert!(matches!(
            err.rdb_error(),
            Some(RdbError::CorruptPayload { .. })
        ));
    }

    #[test]
    fn test_zset_count_larger_than_data() {
        let mut body = zset_body(&[("a".into(), 1.0)], true);
        body[0] = 2;
        let err = decode(TypeTag::ZSet2, &body, &RdbConfig::default()).unwrap_err();
        assert!(matches!(err.rdb_error(), Some(RdbError::Truncated { .. })));
    }

    #[test]
    fn test_unsupported_types() {
        let cfg = RdbConfig::default();
        for tag in [TypeTag::Module2, TypeTag::StreamListpacks, TypeTag::Eof] {
            let err = decode(tag, &[], &cfg).unwrap_err();
            assert!(matches!(err.rdb_error(), Some(RdbError::UnknownTag { .. })));
        }
    }

    #[test]
    fn test_list_ziplist_and_quicklist_tags() {
        let zl = ZipList::from_elements((0..5).map(crate::database::Element::Int));
        let mut body = Vec::new();
        write_string(&mut body, zl.as_bytes(), false).unwrap();
        let v = decode(TypeTag::ListZiplist, &body, &RdbConfig::default()).unwrap();
        assert_eq!(v.len(), 5);

        let mut body = vec![3u8];
        for node in [&zl, &ZipList::new(), &zl] {
            write_string(&mut body, node.as_bytes(), false).unwrap();
        }
        let v = decode(TypeTag::ListQuicklist, &body, &RdbConfig::default()).unwrap();
        assert_eq!(v.len(), 10);
        match v {
            Value::List(ql) => assert_eq!(ql.node_count(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_ziplist_blob() {
        let mut body = Vec::new();
        write_string(&mut body, b"\x0b\x00\x00\x00garbage", false).unwrap();
        let err = decode(TypeTag::HashZiplist, &body, &RdbConfig::default()).unwrap_err();
        assert!(matches!(
            err.rdb_error(),
            Some(RdbError::CorruptPayload { .. })
        ));
        assert!(err.to_string().starts_with("hash ziplist: "));
    }
}
