use std::io::{self, Read};

use byteordered::{ByteOrdered, Endianness};

/// A positioned, runtime-endian view over a block's decompressed bytes,
/// shared by both the BigBed and BigWig block codecs.
pub struct ByteReader<R> {
    inner: ByteOrdered<R, Endianness>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R, endianness: Endianness) -> Self {
        ByteReader {
            inner: ByteOrdered::runtime(inner, endianness),
        }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.inner.read_u16()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.inner.read_u32()
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.inner.read_u64()
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.inner.read_f32()
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        self.inner.read_f64()
    }

    /// Reads bytes up to (and consuming) a NUL terminator, returning the
    /// content before it. Used for a BigBed record's `rest` column and for
    /// the AutoSQL string.
    pub fn read_nul_terminated(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.inner.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }
}

/// Reads a NUL-terminated string directly from any `Read`, without the
/// endian wrapping (there is no multi-byte data in a NUL string).
pub fn read_nul_terminated<R: Read>(mut r: R) -> io::Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
