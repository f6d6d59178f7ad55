//! Разбор устаревшего формата `zipmap` (тег `HASH_ZIPMAP`).
//!
//! ```text
//! <zmlen:1> (<len><key><len><free:1><value><free bytes>)* <0xFF>
//! len = 1 байт (< 254) или 0xFE + u32 LE
//! ```

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use rdbport_error::{RdbError, RdbResult};

const BIGLEN: u8 = 254;
const END: u8 = 255;

/// Читает все пары ключ/значение из zipmap.
pub fn zipmap_pairs(blob: &[u8]) -> RdbResult<Vec<(Bytes, Bytes)>> {
    let mut cur = Cursor { buf: blob, pos: 0 };
    // Первый байт это число пар, если оно меньше 254. Доверять ему нельзя.
    cur.take(1)?;

    let mut pairs = Vec::new();
    loop {
        let key_len = match cur.next_len()? {
            Some(n) => n,
            None => break,
        };
        let key = Bytes::copy_from_slice(cur.take(key_len)?);
        let val_len = cur.next_len()?.ok_or_else(|| RdbError::corrupt("zipmap key without value"))?;
        let free = cur.take(1)?[0] as usize;
        let val = Bytes::copy_from_slice(cur.take(val_len)?);
        cur.take(free)?;
        pairs.push((key, val));
    }

    if cur.pos != blob.len() {
        return Err(RdbError::corrupt("trailing bytes after zipmap end").into());
    }
    Ok(pairs)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(
        &mut self,
        n: usize,
    ) -> RdbResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| RdbError::corrupt("zipmap entry out of bounds"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// `None` на маркере конца.
    fn next_len(&mut self) -> RdbResult<Option<usize>> {
        match self.take(1)?[0] {
            END => Ok(None),
            BIGLEN => Ok(Some(LittleEndian::read_u32(self.take(4)?) as usize)),
            n => Ok(Some(n as usize)),
        }
    }
}
