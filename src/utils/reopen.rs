//! The independent-positioned-view abstraction that makes concurrent reads
//! safe without a shared-position lock.
//!
//! A `BigBedRead`/`BigWigRead` holds one `R`; querying it from several
//! threads means each thread needs its own file position. `Reopen` gives
//! each thread its own handle onto the same underlying file (or mapping)
//! rather than sharing one `Seek`-able cursor.

use std::fs::File;
use std::io::{self, Read, Seek};

/// A `Read + Seek` type that is also safe to move across threads, the bound
/// every read-path function in this crate needs.
pub trait SeekableRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> SeekableRead for T {}

/// Produces a fresh, independently-positioned handle onto the same
/// underlying data.
pub trait Reopen: Sized {
    fn reopen(&self) -> io::Result<Self>;
}

/// A `Reopen` implementation backed by re-opening the file at its path.
pub struct ReopenableFile {
    pub path: String,
    pub file: File,
}

impl Reopen for ReopenableFile {
    fn reopen(&self) -> io::Result<Self> {
        Ok(ReopenableFile {
            path: self.path.clone(),
            file: File::open(&self.path)?,
        })
    }
}

impl Read for ReopenableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ReopenableFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// A `Reopen` implementation backed by a read-only memory mapping, cloned
/// (cheaply, via `Arc`) on each reopen rather than touching the filesystem
/// again.
pub struct MmapReader {
    mmap: std::sync::Arc<memmap2::Mmap>,
    pos: u64,
}

impl MmapReader {
    pub fn open(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(MmapReader {
            mmap: std::sync::Arc::new(mmap),
            pos: 0,
        })
    }
}

impl Reopen for MmapReader {
    fn reopen(&self) -> io::Result<Self> {
        Ok(MmapReader {
            mmap: self.mmap.clone(),
            pos: 0,
        })
    }
}

impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos as usize;
        if start >= self.mmap.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.mmap.len() - start);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MmapReader {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(p) => p as i64,
            io::SeekFrom::End(p) => self.mmap.len() as i64 + p,
            io::SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of mapping",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reopenable_file_gives_independent_position() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let a = ReopenableFile {
            path: path.clone(),
            file: File::open(&path).unwrap(),
        };
        let mut b = a.reopen().unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
