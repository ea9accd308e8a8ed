use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression as DeflateLevel;

/// The block compression in effect for a BBI file, selected from the header's
/// `version` and `uncompressBufSize` fields at open time (version 5 uses
/// Snappy, versions 3-4 use DEFLATE, `uncompressBufSize == 0` means none).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Deflate,
    Snappy,
}

impl Compression {
    pub fn for_version(version: u16, uncompress_buf_size: u32) -> Self {
        if uncompress_buf_size == 0 {
            Compression::None
        } else if version >= 5 {
            Compression::Snappy
        } else {
            Compression::Deflate
        }
    }

    pub fn version(self) -> u16 {
        match self {
            Compression::None => 3,
            Compression::Deflate => 4,
            Compression::Snappy => 5,
        }
    }

    /// Compresses `data`, returning the bytes to place on disk.
    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), DeflateLevel::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Compression::Snappy => {
                let mut encoder = snap::raw::Encoder::new();
                encoder
                    .compress_vec(data)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }

    /// Decompresses `data`, which is assumed to inflate to no more than
    /// `uncompressed_size` bytes (the container's `uncompressBufSize`).
    pub fn decompress(self, data: &[u8], uncompressed_size: usize) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => {
                let mut decoder = ZlibDecoder::new(data);
                let mut out = Vec::with_capacity(uncompressed_size);
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Compression::Snappy => {
                let mut decoder = snap::raw::Decoder::new();
                decoder
                    .decompress_vec(data)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_identity_for_every_mode() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
        for mode in [Compression::None, Compression::Deflate, Compression::Snappy] {
            let compressed = mode.compress(&data).unwrap();
            let decompressed = mode.decompress(&compressed, data.len()).unwrap();
            assert_eq!(decompressed, data, "mode {:?} did not round-trip", mode);
        }
    }

    #[test]
    fn version_selection_matches_header_fields() {
        assert_eq!(Compression::for_version(3, 0), Compression::None);
        assert_eq!(Compression::for_version(3, 1024), Compression::Deflate);
        assert_eq!(Compression::for_version(4, 1024), Compression::Deflate);
        assert_eq!(Compression::for_version(5, 1024), Compression::Snappy);
    }
}
