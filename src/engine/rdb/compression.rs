//! Сжатие строк алгоритмом LZF.
//!
//! Сжатая форма принимается, только если она экономит хотя бы 4 байта:
//! иначе заголовок из двух длин съедает выигрыш.

use rdbport_error::{RdbError, RdbResult};

/// Минимальная экономия, при которой сжатая форма имеет смысл.
const MIN_SAVING: usize = 4;

/// Предельное расширение LZF: обратная ссылка из 3 байт даёт до 264 байт.
const MAX_EXPANSION: usize = 88;

/// Проверяет, стоит ли пытаться сжать строку заданной длины.
pub fn should_compress(len: usize) -> bool {
    len > super::primitives::COMPRESS_MIN_LEN
}

/// Сжимает `data`. `None`, если сжатие невозможно или невыгодно.
pub fn compress(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() <= MIN_SAVING {
        return None;
    }
    match lzf::compress(data) {
        Ok(packed) if packed.len() <= data.len() - MIN_SAVING => Some(packed),
        _ => None,
    }
}

/// Распаковывает ровно `original_len` байт.
///
/// Любое расхождение в длине это `CorruptPayload`. Длина, которую `data`
/// не может дать даже при предельном расширении, отвергается до выделения
/// выходного буфера.
pub fn decompress(
    data: &[u8],
    original_len: usize,
) -> RdbResult<Vec<u8>> {
    if original_len == 0 {
        return Err(RdbError::corrupt("LZF string with zero original length").into());
    }
    if original_len > data.len().saturating_mul(MAX_EXPANSION) {
        return Err(RdbError::corrupt(format!(
            "LZF original length {original_len} cannot come from {} compressed bytes",
            data.len()
        ))
        .into());
    }
    let out = lzf::decompress(data, original_len)
        .map_err(|e| RdbError::corrupt(format!("LZF decompression failed: {e:?}")))?;
    if out.len() != original_len {
        return Err(RdbError::corrupt(format!(
            "LZF produced {} bytes, expected {original_len}",
            out.len()
        ))
        .into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_compress_threshold() {
        assert!(!should_compress(20));
        assert!(should_compress(21));
    }

    #[test]
    fn test_compress_roundtrip() {
        let data: Vec<u8> = (0..65536).map(|i| b'0' + (i % 2) as u8).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len() / 10);
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    /// Случайные байты не сжимаются, и сжатая форма не выбирается.
    #[test]
    fn test_incompressible_input() {
        let mut rng = fastrand::Rng::with_seed(7);
        let data: Vec<u8> = (0..256).map(|_| rng.u8(..)).collect();
        assert!(compress(&data).is_none());
        assert!(compress(b"abcd").is_none());
    }

    #[test]
    fn test_wrong_length_is_corrupt() {
        let data = vec![b'x'; 100];
        let packed = compress(&data).unwrap();
        for bad in [0, 50, 101] {
            let err = decompress(&packed, bad).unwrap_err();
            assert!(matches!(
                err.rdb_error(),
                Some(RdbError::CorruptPayload { .. })
            ));
        }
    }
    #[test]
    fn test_impossible_original_length_is_corrupt() {
        // Литерал из одного байта не развернётся в терабайт.
        let err = decompress(&[0x00, b'a'], 1 << 40).unwrap_err();
        assert!(matches!(
            err.rdb_error(),
            Some(RdbError::CorruptPayload { .. })
        ));
        assert_eq!(decompress(&[0x00, b'a'], 1).unwrap(), b"a");
    }

    /// Самая плотная форма: литерал и цепочка длинных обратных ссылок.
    #[test]
    fn test_dense_input_within_expansion_bound() {
        let data = vec![b'q'; 1 << 16];
        let packed = compress(&data).unwrap();
        assert!(data.len() <= packed.len() * MAX_EXPANSION);
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }
}
