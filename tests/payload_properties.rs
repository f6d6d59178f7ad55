use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use proptest::prelude::*;
use rdbport::{
    create_dump_payload, decode_dump_payload,
    database::{Element, ObjectType, QuickList, SortedSet, ZSetValue},
    engine::rdb::convert::{hash_from_pairs, set_from_members},
    verify_dump_payload, RdbConfig, RdbError, Value, RDB_VERSION,
};

fn blob(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max)
}

/// Байты или короткое число, чтобы задеть целочисленные кодирования.
fn member() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        blob(24),
        (-100_000i64..100_000).prop_map(|v| v.to_string().into_bytes()),
    ]
}

fn score() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-1000i64..1000).prop_map(|v| v as f64),
        -1.0e9f64..1.0e9,
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    let cfg = RdbConfig::default();
    let (c1, c2) = (cfg.clone(), cfg);
    prop_oneof![
        blob(200).prop_map(|b| Value::string(Bytes::from(b))),
        (-1_000_000i64..1_000_000).prop_map(|v| Value::string(v.to_string())),
        prop::collection::vec(member(), 0..400).prop_map(|items| {
            let mut ql = QuickList::new(-2);
            for i in &items {
                ql.push_back(Element::Bytes(i));
            }
            Value::List(ql)
        }),
        prop::collection::btree_map(member(), blob(90), 0..200).prop_map(move |m| {
            let pairs = m
                .into_iter()
                .map(|(k, v)| (Bytes::from(k), Bytes::from(v)))
                .collect();
            Value::Hash(hash_from_pairs(pairs, &c1).unwrap())
        }),
        prop::collection::btree_set(member(), 0..300).prop_map(move |s| {
            let members = s.into_iter().map(Bytes::from).collect();
            Value::Set(set_from_members(members, &c2).unwrap())
        }),
        prop::collection::btree_map(member(), score(), 0..300).prop_map(|m| {
            let mut zs = SortedSet::new();
            for (k, s) in m {
                zs.insert(Bytes::from(k), s);
            }
            Value::ZSet(ZSetValue::SkipList(zs))
        }),
    ]
}

/// Содержимое значения без учёта физического кодирования.
#[derive(Debug, PartialEq)]
enum Contents {
    Str(Bytes),
    List(Vec<Bytes>),
    Hash(BTreeMap<Bytes, Bytes>),
    Set(BTreeSet<Bytes>),
    ZSet(Vec<(Bytes, f64)>),
}

fn contents(v: &Value) -> Contents {
    match v.object_type() {
        ObjectType::String => Contents::Str(v.as_string().unwrap()),
        ObjectType::List => Contents::List(v.list_items().unwrap()),
        ObjectType::Hash => Contents::Hash(v.hash_pairs().unwrap().into_iter().collect()),
        ObjectType::Set => Contents::Set(v.set_members().unwrap().into_iter().collect()),
        ObjectType::ZSet => Contents::ZSet(v.zset_entries().unwrap()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_payload_roundtrip(v in value()) {
        let cfg = RdbConfig::default();
        let payload = create_dump_payload(&v, &cfg).unwrap();
        prop_assert_eq!(verify_dump_payload(&payload).unwrap(), RDB_VERSION);
        let back = decode_dump_payload(&payload, &cfg).unwrap();
        prop_assert_eq!(contents(&back), contents(&v));
    }

    #[test]
    fn prop_body_flip_is_detected(v in value(), pos in any::<prop::sample::Index>(), bit in 0u8..8) {
        let mut payload = create_dump_payload(&v, &RdbConfig::default()).unwrap();
        let body_len = payload.len() - 10;
        let i = pos.index(body_len);
        payload[i] ^= 1 << bit;
        let err = decode_dump_payload(&payload, &RdbConfig::default()).unwrap_err();
        let is_mismatch = matches!(err.rdb_error(), Some(RdbError::ChecksumMismatch { .. }));
        prop_assert!(is_mismatch);
    }

    #[test]
    fn prop_zero_checksum_skips_verification(v in value()) {
        let cfg = RdbConfig::default();
        let mut payload = create_dump_payload(&v, &cfg).unwrap();
        let n = payload.len();
        payload[n - 8..].fill(0);
        let back = decode_dump_payload(&payload, &cfg).unwrap();
        prop_assert_eq!(contents(&back), contents(&v));
    }
}

#[test]
fn test_uncompressed_payload_roundtrip() {
    let cfg = RdbConfig {
        rdb_compression: false,
        ..RdbConfig::default()
    };
    let v = Value::string(vec![b'a'; 4096]);
    let payload = create_dump_payload(&v, &cfg).unwrap();
    assert_eq!(payload.len(), 1 + 2 + 4096 + 10);
    assert_eq!(decode_dump_payload(&payload, &cfg).unwrap(), v);
}

proptest! {
    /// Счётчик элементов, которому не хватает тела, даёт ошибку, а не
    /// попытку выделить память под объявленное число.
    #[test]
    fn prop_oversized_count_fails_cleanly(
        tag in prop::sample::select(vec![1u8, 2, 3, 4, 5]),
        count in (1u64 << 32)..u64::MAX,
        tail in blob(64),
    ) {
        let mut payload = vec![tag, 0x81];
        payload.extend_from_slice(&count.to_be_bytes());
        payload.extend_from_slice(&tail);
        payload.extend_from_slice(&RDB_VERSION.to_le_bytes());
        payload.extend_from_slice(&[0u8; 8]);
        prop_assert!(decode_dump_payload(&payload, &RdbConfig::default()).is_err());
    }
}

#[test]
fn test_lzf_header_with_impossible_length_is_corrupt() {
    let mut payload = vec![0x00, 0xC3, 0x02, 0x81];
    payload.extend_from_slice(&(1u64 << 40).to_be_bytes());
    payload.extend_from_slice(&[0x00, b'a']);
    payload.extend_from_slice(&RDB_VERSION.to_le_bytes());
    payload.extend_from_slice(&[0u8; 8]);
    let err = decode_dump_payload(&payload, &RdbConfig::default()).unwrap_err();
    assert!(matches!(
        err.rdb_error(),
        Some(RdbError::CorruptPayload { .. })
    ));
}
