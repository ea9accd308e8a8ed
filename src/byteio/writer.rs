use std::io::{self, Seek, SeekFrom, Write};

use byteordered::{ByteOrdered, Endianness};

use super::compression::Compression;

/// A positioned writer over a seekable sink, tracking bytes produced and
/// honouring a fixed byte order for every primitive write.
///
/// Two regions of a BBI file are rewritten after the main pass (the fixed
/// header and the zoom-level table, once their contents are known); `seek_to`
/// supports reopening at those offsets without truncating the file.
pub struct ByteWriter<W> {
    inner: ByteOrdered<W, Endianness>,
}

impl<W: Write + Seek> ByteWriter<W> {
    pub fn new(inner: W, endianness: Endianness) -> Self {
        ByteWriter {
            inner: ByteOrdered::runtime(inner, endianness),
        }
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        self.inner.seek(SeekFrom::Current(0))
    }

    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.inner.write_u8(v)
    }

    pub fn write_u16(&mut self, v: u16) -> io::Result<()> {
        self.inner.write_u16(v)
    }

    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        self.inner.write_u32(v)
    }

    pub fn write_u64(&mut self, v: u64) -> io::Result<()> {
        self.inner.write_u64(v)
    }

    pub fn write_f32(&mut self, v: f32) -> io::Result<()> {
        self.inner.write_f32(v)
    }

    pub fn write_f64(&mut self, v: f64) -> io::Result<()> {
        self.inner.write_f64(v)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    /// Writes `len` bytes of `value`, for reserving header/zoom-level/summary
    /// slots ahead of the regions they describe.
    pub fn skip_bytes(&mut self, len: usize, value: u8) -> io::Result<()> {
        let buf = vec![value; len];
        self.inner.write_all(&buf)
    }

    /// Writes a chromosome-name key, NUL-padded to `key_size` bytes (the
    /// B+-tree's fixed key width).
    pub fn write_padded_key(&mut self, key: &str, key_size: usize) -> io::Result<()> {
        let mut buf = vec![0u8; key_size];
        let key_bytes = key.as_bytes();
        debug_assert!(key_bytes.len() <= key_size);
        buf[..key_bytes.len()].copy_from_slice(key_bytes);
        self.inner.write_all(&buf)
    }

    /// Writes `content`, NUL-terminated, after optionally compressing it.
    /// Returns the uncompressed length, which the caller folds into the
    /// running `uncompressBufSize`.
    pub fn write_compressed_block(
        &mut self,
        content: &[u8],
        compression: Compression,
    ) -> io::Result<usize> {
        let compressed = compression.compress(content)?;
        self.inner.write_all(&compressed)?;
        Ok(content.len())
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }
}
