//! Буферизованный адаптер потока с накопительной CRC-64.
//!
//! [`RdbReader`] читает из любого [`ByteSource`] только вперёд и считает
//! контрольную сумму по каждому выданному байту. [`RdbWriter`] делает то же
//! для записи.

use std::io::{self, Read, Write};

use crc::{Crc, Digest, CRC_64_REDIS};
use rdbport_error::{RdbError, RdbResult};

/// CRC-64 с полиномом Jones, как в формате снимка.
pub static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Ёмкость внутреннего буфера чтения.
pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Источник байтов.
///
/// `pull` заполняет начало `buf` и возвращает число записанных байт.
/// Ноль означает штатный конец потока, а не ошибку.
pub trait ByteSource {
    fn pull(
        &mut self,
        buf: &mut [u8],
    ) -> RdbResult<usize>;
}

impl<R: Read> ByteSource for R {
    fn pull(
        &mut self,
        buf: &mut [u8],
    ) -> RdbResult<usize> {
        loop {
            match self.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Источник на основе замыкания.
///
/// ```
/// use rdbport::{
///     engine::rdb::{PullFn, RdbReader},
///     RdbResult,
/// };
///
/// let mut chunks = vec![b"ab".to_vec(), b"cd".to_vec()].into_iter();
/// let src = PullFn(move |buf: &mut [u8]| -> RdbResult<usize> {
///     Ok(match chunks.next() {
///         Some(c) => {
///             buf[..c.len()].copy_from_slice(&c);
///             c.len()
///         }
///         None => 0,
///     })
/// });
/// let mut r = RdbReader::new(src);
/// let mut out = [0u8; 4];
/// r.read_exact(&mut out).unwrap();
/// assert_eq!(&out, b"abcd");
/// ```
pub struct PullFn<F>(pub F);

impl<F> ByteSource for PullFn<F>
where
    F: FnMut(&mut [u8]) -> RdbResult<usize>,
{
    fn pull(
        &mut self,
        buf: &mut [u8],
    ) -> RdbResult<usize> {
        (self.0)(buf)
    }
}

/// Читатель только вперёд с буфером и контрольной суммой.
pub struct RdbReader<S> {
    src: S,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    digest: Digest<'static, u64>,
    bytes_read: u64,
}

/// Писатель с накопительной контрольной суммой.
pub struct RdbWriter<W> {
    inner: W,
    digest: Digest<'static, u64>,
    bytes_written: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<S: ByteSource> RdbReader<S> {
    pub fn new(src: S) -> Self {
        Self::with_capacity(READ_BUFFER_SIZE, src)
    }

    pub fn with_capacity(
        capacity: usize,
        src: S,
    ) -> Self {
        Self {
            src,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            digest: CRC64.digest(),
            bytes_read: 0,
        }
    }

    /// Заполняет `out` целиком или возвращает `Truncated`.
    ///
    /// Запрос больше ёмкости буфера читается прямо в `out`, минуя буфер.
    pub fn read_exact(
        &mut self,
        out: &mut [u8],
    ) -> RdbResult<()> {
        let mut written = 0;
        while written < out.len() {
            if self.pos < self.filled {
                let n = (self.filled - self.pos).min(out.len() - written);
                out[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
                self.pos += n;
                written += n;
                continue;
            }

            let want = out.len() - written;
            if want >= self.buf.len() {
                let n = self.src.pull(&mut out[written..])?;
                if n == 0 {
                    return Err(RdbError::truncated("byte stream", out.len(), written).into());
                }
                written += n;
            } else {
                let n = self.src.pull(&mut self.buf)?;
                if n == 0 {
                    return Err(RdbError::truncated("byte stream", out.len(), written).into());
                }
                self.pos = 0;
                self.filled = n;
            }
        }
        self.digest.update(out);
        self.bytes_read += out.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> RdbResult<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_array<const N: usize>(&mut self) -> RdbResult<[u8; N]> {
        let mut b = [0u8; N];
        self.read_exact(&mut b)?;
        Ok(b)
    }

    pub fn read_vec(
        &mut self,
        len: usize,
    ) -> RdbResult<Vec<u8>> {
        let mut v = vec![0u8; len];
        self.read_exact(&mut v)?;
        Ok(v)
    }

    /// Контрольная сумма всех прочитанных байт.
    pub fn checksum(&self) -> u64 {
        self.digest.clone().finalize()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// `true`, если источник исчерпан и буфер пуст.
    pub fn at_eof(&mut self) -> RdbResult<bool> {
        if self.pos < self.filled {
            return Ok(false);
        }
        let n = self.src.pull(&mut self.buf)?;
        self.pos = 0;
        self.filled = n;
        Ok(n == 0)
    }

    /// Адаптер только для чтения.
    pub fn write(
        &mut self,
        _buf: &[u8],
    ) -> RdbResult<usize> {
        Err(RdbError::unsupported("write on a read-only stream").into())
    }

    /// Произвольный доступ не поддерживается.
    pub fn tell(&self) -> RdbResult<u64> {
        Err(RdbError::unsupported("tell on a forward-only stream").into())
    }

    pub fn into_inner(self) -> S {
        self.src
    }
}

impl<W: Write> RdbWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
            bytes_written: 0,
        }
    }

    pub fn checksum(&self) -> u64 {
        self.digest.clone().finalize()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<W: Write> Write for RdbWriter<W> {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
