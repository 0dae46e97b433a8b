//! BIFF12 record framing used by `.bin` parts.
//!
//! Only the record envelope (id + length + payload) is decoded here; record payloads are left to
//! downstream parsers.

use std::io::{self, Read};

const MAX_RECORD_ID_BYTES: usize = 4;
const MAX_RECORD_LEN_BYTES: usize = 4;

fn unexpected_eof(context: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, context)
}

/// Decode the record id at the front of `r`.
///
/// Up to four bytes are consumed while the top bit is set. Unlike the length field, each byte is
/// kept whole (continuation bit included) and placed little-endian, so `[0x9F, 0x01]` is `0x019F`.
///
/// A clean end of input before the first byte yields `Ok(None)`.
pub fn read_record_id(r: &mut impl Read) -> io::Result<Option<u32>> {
    let mut v: u32 = 0;
    for i in 0..MAX_RECORD_ID_BYTES {
        let byte = match read_byte(r)? {
            Some(byte) => byte,
            None if i == 0 => return Ok(None),
            None => return Err(unexpected_eof("unexpected EOF while reading BIFF12 record id")),
        };
        v |= (byte as u32) << (8 * i);
        if byte & 0x80 == 0 {
            return Ok(Some(v));
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "invalid BIFF12 record id (more than 4 bytes)",
    ))
}

/// Read a BIFF12 record payload length from `r`.
///
/// Record lengths are encoded as a 7-bit varint (LEB128-like) using up to 4 bytes.
pub fn read_record_len(r: &mut impl Read) -> io::Result<u32> {
    let mut v: u32 = 0;
    for i in 0..MAX_RECORD_LEN_BYTES {
        let Some(byte) = read_byte(r)? else {
            return Err(unexpected_eof("unexpected EOF while reading BIFF12 record length"));
        };
        v |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(v);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "invalid BIFF12 record length (more than 4 bytes)",
    ))
}

fn read_byte(r: &mut impl Read) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Biff12Record<'a> {
    pub id: u32,
    pub data: &'a [u8],
}

/// Streaming reader over the records of a `.bin` part.
///
/// Reads byte-wise from `inner`, so pass an in-memory or buffered source. Nothing is read
/// ahead of the current record, and [`into_inner`](Self::into_inner) hands the source back
/// positioned right after the last record returned.
pub struct Biff12Reader<R: Read> {
    inner: R,
}

impl<R: Read> Biff12Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next record into `buf`, returning `None` at a clean end of stream.
    ///
    /// The declared payload length is not trusted for allocation: `buf` only grows as payload
    /// bytes actually arrive, and a payload shorter than declared is an `UnexpectedEof` error.
    pub fn read_record<'a>(
        &mut self,
        buf: &'a mut Vec<u8>,
    ) -> io::Result<Option<Biff12Record<'a>>> {
        let Some(id) = read_record_id(&mut self.inner)? else {
            return Ok(None);
        };
        let len = read_record_len(&mut self.inner)?;
        buf.clear();
        let read = self.inner.by_ref().take(u64::from(len)).read_to_end(buf)?;
        if read != len as usize {
            return Err(unexpected_eof("BIFF12 record payload is shorter than its length"));
        }
        Ok(Some(Biff12Record { id, data: buf }))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
