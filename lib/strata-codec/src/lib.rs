//! Binary encoding primitives for the record wire format.
//!
//! All multi-byte integers are written in big-endian order, with two exceptions that mirror the in-memory layout of
//! packed column buffers: the elements of a `u32` slice are written in the platform's native byte order, and signed
//! 64-bit integers are zig-zag mapped before being written as a fixed 8-byte big-endian field.
//!
//! Encoding helpers write into any [`BufMut`], while [`Decoder`] reads from a borrowed byte slice and checks every read
//! against the remaining length so that truncated input surfaces as an error rather than a panic.
#![deny(missing_docs)]

use bytes::{Buf as _, BufMut, BytesMut};
use snafu::{ResultExt as _, Snafu};

/// Codec error.
#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(context(suffix(false)))]
pub enum CodecError {
    /// The input ended before a complete value could be read.
    #[snafu(display(
        "unexpected end of buffer (needed {} bytes, but only {} bytes remaining)",
        needed,
        remaining
    ))]
    UnexpectedEof {
        /// Number of bytes required to read the value.
        needed: usize,

        /// Number of bytes left in the input.
        remaining: usize,
    },

    /// A string was too long to be described by a `u16` length prefix.
    #[snafu(display("string of {} bytes exceeds maximum encodable length of {} bytes", len, u16::MAX))]
    StringTooLong {
        /// Length of the string, in bytes.
        len: usize,
    },

    /// A slice or entry was too long to be described by a `u32` length prefix.
    #[snafu(display("slice of {} elements exceeds maximum encodable length of {}", len, u32::MAX))]
    SliceTooLong {
        /// Number of elements in the slice.
        len: usize,
    },

    /// A decoded string was not valid UTF-8.
    #[snafu(display("string is not valid UTF-8: {}", source))]
    InvalidUtf8 {
        /// Underlying UTF-8 validation error.
        source: std::str::Utf8Error,
    },
}

/// Maps a signed integer to an unsigned integer such that values of small magnitude map to small values.
#[inline]
pub const fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub const fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Writes an unsigned 16-bit integer.
pub fn put_u16<B: BufMut>(buf: &mut B, v: u16) {
    buf.put_u16(v);
}

/// Writes an unsigned 32-bit integer.
pub fn put_u32<B: BufMut>(buf: &mut B, v: u32) {
    buf.put_u32(v);
}

/// Writes a signed 64-bit integer as a zig-zag mapped, fixed-width 8-byte field.
pub fn put_i64<B: BufMut>(buf: &mut B, v: i64) {
    buf.put_u64(zigzag_encode(v));
}

/// Writes a `u16` length-prefixed string.
///
/// # Errors
///
/// If the string is longer than `u16::MAX` bytes, an error is returned and nothing is written.
pub fn put_string<B: BufMut>(buf: &mut B, s: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(s.len()).map_err(|_| StringTooLong { len: s.len() }.build())?;
    buf.put_u16(len);
    buf.put_slice(s);
    Ok(())
}

/// Writes a `u32` length-prefixed byte slice.
///
/// # Errors
///
/// If the slice is longer than `u32::MAX` bytes, an error is returned and nothing is written.
pub fn put_bytes<B: BufMut>(buf: &mut B, b: &[u8]) -> Result<(), CodecError> {
    buf.put_u32(slice_len(b.len())?);
    buf.put_slice(b);
    Ok(())
}

/// Writes a `u32` length-prefixed slice of `u32` values.
///
/// The length prefix counts elements, not bytes. Elements are written in native byte order.
///
/// # Errors
///
/// If the slice has more than `u32::MAX` elements, an error is returned and nothing is written.
pub fn put_u32_slice<B: BufMut>(buf: &mut B, values: &[u32]) -> Result<(), CodecError> {
    buf.put_u32(slice_len(values.len())?);
    for v in values {
        buf.put_u32_ne(*v);
    }
    Ok(())
}

/// Writes a count as an unsigned 32-bit integer.
///
/// # Errors
///
/// If the count exceeds `u32::MAX`, an error is returned and nothing is written.
pub fn put_len<B: BufMut>(buf: &mut B, len: usize) -> Result<(), CodecError> {
    buf.put_u32(slice_len(len)?);
    Ok(())
}

/// Writes a self-delimiting entry: a `u32` size followed by whatever `f` writes.
///
/// The size is back-patched once `f` returns, so callers do not need to know the encoded length up front.
///
/// # Errors
///
/// If `f` fails, its error is returned and the buffer is truncated back to its original length. If the entry is larger
/// than `u32::MAX` bytes, an error is returned.
pub fn put_sized<F, E>(buf: &mut BytesMut, f: F) -> Result<(), E>
where
    F: FnOnce(&mut BytesMut) -> Result<(), E>,
    E: From<CodecError>,
{
    let start = buf.len();
    buf.put_u32(0);

    if let Err(e) = f(buf) {
        buf.truncate(start);
        return Err(e);
    }

    let size = match slice_len(buf.len() - start - 4) {
        Ok(size) => size,
        Err(e) => {
            buf.truncate(start);
            return Err(e.into());
        }
    };
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
    Ok(())
}

fn slice_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| SliceTooLong { len }.build())
}

/// A checked reader over an encoded byte slice.
///
/// Every read consumes bytes from the front of the slice. Reads that would run past the end of the slice fail with
/// [`CodecError::UnexpectedEof`] and leave the decoder untouched.
#[derive(Clone, Copy, Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a new `Decoder` over the given bytes.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if all bytes have been read.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.len() < needed {
            return UnexpectedEof {
                needed,
                remaining: self.buf.len(),
            }
            .fail();
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Reads an unsigned 16-bit integer.
    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    /// Reads an unsigned 32-bit integer.
    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Reads a zig-zag mapped, fixed-width signed 64-bit integer.
    pub fn i64(&mut self) -> Result<i64, CodecError> {
        self.ensure(8)?;
        Ok(zigzag_decode(self.buf.get_u64()))
    }

    /// Reads a `u16` length-prefixed string as raw bytes.
    pub fn string(&mut self) -> Result<&'a [u8], CodecError> {
        let mut peek = *self;
        let len = peek.u16()? as usize;
        let s = peek.take(len)?;
        *self = peek;
        Ok(s)
    }

    /// Reads a `u16` length-prefixed string, validating that it is UTF-8.
    pub fn str(&mut self) -> Result<&'a str, CodecError> {
        let mut peek = *self;
        let s = std::str::from_utf8(peek.string()?).context(InvalidUtf8)?;
        *self = peek;
        Ok(s)
    }

    /// Reads a `u32` length-prefixed byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let mut peek = *self;
        let len = peek.u32()? as usize;
        let b = peek.take(len)?;
        *self = peek;
        Ok(b)
    }

    /// Reads a `u32` length-prefixed slice of native byte order `u32` values.
    pub fn u32_slice(&mut self) -> Result<Vec<u32>, CodecError> {
        let mut peek = *self;
        let count = peek.u32()? as usize;
        let raw = peek.take(count.checked_mul(4).unwrap_or(usize::MAX))?;
        *self = peek;

        Ok(raw
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Reads a self-delimiting entry written by [`put_sized`], returning a decoder scoped to the entry's bytes.
    pub fn sized(&mut self) -> Result<Decoder<'a>, CodecError> {
        self.bytes().map(Decoder::new)
    }
}
