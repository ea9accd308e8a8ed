//! The generic container read engine shared by `BigBedRead` and
//! `BigWigRead`: header parsing, endianness auto-detection, the chromosome
//! B+-tree, the R+-tree overlap query, and block decompression. Tree
//! traversal is delegated to [`crate::bplustree`]/[`crate::rtree`] rather
//! than inlined here.

use std::io::{self, Read, Seek, SeekFrom};

use byteordered::Endianness;
use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::bbi::{BBIFile, ZoomHeader, BIGBED_MAGIC, BIGWIG_MAGIC, CIR_TREE_MAGIC};
use crate::bed::BedValueError;
use crate::bplustree::{self, BPlusTreeError};
use crate::byteio::Compression;
use crate::interval::GenomicBox;
use crate::rtree::{self, RTreeError};
use crate::summary::{Summary, ZoomRecord};
use crate::utils::reopen::SeekableRead;

#[derive(Copy, Clone, Debug)]
pub(crate) struct Block {
    pub offset: u64,
    pub size: u64,
}

impl From<rtree::read::RTreeBlock> for Block {
    fn from(b: rtree::read::RTreeBlock) -> Self {
        Block {
            offset: b.offset,
            size: b.size,
        }
    }
}

/// Header info for a bbi file.
///
/// Internal file-offset fields are not public; reading data is available
/// through the higher-level functions on [`BBIRead`].
#[derive(Copy, Clone, Debug)]
pub struct BBIHeader {
    pub endianness: Endianness,
    pub version: u16,
    pub field_count: u16,
    pub defined_field_count: u16,

    pub(crate) zoom_levels: u16,
    pub(crate) chromosome_tree_offset: u64,
    pub(crate) full_data_offset: u64,
    pub(crate) full_index_offset: u64,
    pub(crate) auto_sql_offset: u64,
    pub(crate) total_summary_offset: u64,
    pub(crate) uncompress_buf_size: u32,
}

impl BBIHeader {
    pub(crate) fn compression(&self) -> Compression {
        Compression::for_version(self.version, self.uncompress_buf_size)
    }
}

/// Information on a chromosome in a bbi file.
#[derive(Clone, Debug)]
pub struct ChromInfo {
    pub name: String,
    pub length: u32,
    pub(crate) id: u32,
}

impl PartialEq for ChromInfo {
    fn eq(&self, other: &ChromInfo) -> bool {
        self.name == other.name
    }
}

/// Info on a bbi file.
#[derive(Clone, Debug)]
pub struct BBIFileInfo {
    /// The type of the bbi file - either a bigBed or a bigWig.
    pub filetype: BBIFile,
    pub header: BBIHeader,
    pub zoom_headers: Vec<ZoomHeader>,
    pub chrom_info: Vec<ChromInfo>,
}

impl BBIFileInfo {
    pub(crate) fn chrom_id(&self, chrom_name: &str) -> Result<u32, ChromIdNotFound> {
        self.chrom_info
            .iter()
            .find(|c| c.name == chrom_name)
            .map(|c| c.id)
            .ok_or_else(|| ChromIdNotFound(chrom_name.to_string()))
    }
}

#[derive(Error, Debug)]
#[error("chromosome {0:?} is not present in this file's chromosome index")]
pub struct ChromIdNotFound(pub String);

#[derive(Error, Debug)]
pub enum BBIFileReadInfoError {
    #[error("the first four bytes did not match a bigWig or bigBed magic number")]
    UnknownMagic,
    #[error("b+-tree error: {0}")]
    BPlusTree(#[from] BPlusTreeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum CirTreeSearchError {
    #[error(transparent)]
    ChromIdNotFound(#[from] ChromIdNotFound),
    #[error("r+-tree error: {0}")]
    RTree(#[from] RTreeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum BBIReadError {
    #[error(transparent)]
    CirTreeSearch(#[from] CirTreeSearchError),
    #[error(transparent)]
    BedValueError(#[from] BedValueError),
    #[error("invalid file: {0}")]
    InvalidFile(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ZoomIntervalError {
    #[error(transparent)]
    CirTreeSearch(#[from] CirTreeSearchError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("requested reduction level does not exist in this file's zoom table")]
    ReductionLevelNotFound,
}

fn detect_bbi_magic<R: Read>(read: &mut R) -> Result<(BBIFile, Endianness), BBIFileReadInfoError> {
    let mut buf = [0u8; 4];
    read.read_exact(&mut buf)?;
    let le = u32::from_le_bytes(buf);
    let be = u32::from_be_bytes(buf);
    if le == BIGWIG_MAGIC.0 {
        Ok((BBIFile::BigWig, Endianness::Little))
    } else if be == BIGWIG_MAGIC.0 {
        Ok((BBIFile::BigWig, Endianness::Big))
    } else if le == BIGBED_MAGIC.0 {
        Ok((BBIFile::BigBed, Endianness::Little))
    } else if be == BIGBED_MAGIC.0 {
        Ok((BBIFile::BigBed, Endianness::Big))
    } else {
        Err(BBIFileReadInfoError::UnknownMagic)
    }
}

fn get_u32(e: Endianness, b: &mut BytesMut) -> u32 {
    match e {
        Endianness::Little => b.get_u32_le(),
        Endianness::Big => b.get_u32(),
    }
}

fn get_u64(e: Endianness, b: &mut BytesMut) -> u64 {
    match e {
        Endianness::Little => b.get_u64_le(),
        Endianness::Big => b.get_u64(),
    }
}

fn get_u16(e: Endianness, b: &mut BytesMut) -> u16 {
    match e {
        Endianness::Little => b.get_u16_le(),
        Endianness::Big => b.get_u16(),
    }
}

/// Parses the fixed 64-byte header and the zoom-level table and chromosome
/// dictionary it points at, auto-detecting endianness from the magic bytes.
pub(crate) fn read_info<R: SeekableRead>(read: &mut R) -> Result<BBIFileInfo, BBIFileReadInfoError> {
    read.seek(SeekFrom::Start(0))?;
    let (filetype, endianness) = detect_bbi_magic(read)?;

    let mut rest = [0u8; 60];
    read.read_exact(&mut rest)?;
    let mut b = BytesMut::from(&rest[..]);

    let version = get_u16(endianness, &mut b);
    let zoom_levels = get_u16(endianness, &mut b);
    let chromosome_tree_offset = get_u64(endianness, &mut b);
    let full_data_offset = get_u64(endianness, &mut b);
    let full_index_offset = get_u64(endianness, &mut b);
    let field_count = get_u16(endianness, &mut b);
    let defined_field_count = get_u16(endianness, &mut b);
    let auto_sql_offset = get_u64(endianness, &mut b);
    let total_summary_offset = get_u64(endianness, &mut b);
    let uncompress_buf_size = get_u32(endianness, &mut b);
    let _reserved = get_u64(endianness, &mut b);

    let header = BBIHeader {
        endianness,
        version,
        field_count,
        defined_field_count,
        zoom_levels,
        chromosome_tree_offset,
        full_data_offset,
        full_index_offset,
        auto_sql_offset,
        total_summary_offset,
        uncompress_buf_size,
    };

    let zoom_headers = read_zoom_headers(read, &header)?;
    let chrom_info = read_chrom_tree_block(read, &header)?;

    Ok(BBIFileInfo {
        filetype,
        header,
        zoom_headers,
        chrom_info,
    })
}

fn read_zoom_headers<R: Read + Seek>(
    read: &mut R,
    header: &BBIHeader,
) -> Result<Vec<ZoomHeader>, BBIFileReadInfoError> {
    read.seek(SeekFrom::Start(64))?;
    let mut out = Vec::with_capacity(header.zoom_levels as usize);
    let mut buf = vec![0u8; 24 * header.zoom_levels as usize];
    read.read_exact(&mut buf)?;
    let mut b = BytesMut::from(&buf[..]);
    for _ in 0..header.zoom_levels {
        let reduction_level = get_u32(header.endianness, &mut b);
        let _reserved = get_u32(header.endianness, &mut b);
        let data_offset = get_u64(header.endianness, &mut b);
        let index_offset = get_u64(header.endianness, &mut b);
        out.push(ZoomHeader {
            reduction_level,
            data_offset,
            index_offset,
        });
    }
    Ok(out)
}

fn read_chrom_tree_block<R: Read + Seek>(
    read: &mut R,
    header: &BBIHeader,
) -> Result<Vec<ChromInfo>, BBIFileReadInfoError> {
    let items = bplustree::read_all(read, header.chromosome_tree_offset)?;
    Ok(items
        .into_iter()
        .map(|item| ChromInfo {
            name: item.name,
            length: item.size,
            id: item.id,
        })
        .collect())
}

/// Operations every bbi reader exposes regardless of record type.
pub trait BBIRead {
    type Read: SeekableRead;

    fn get_info(&self) -> &BBIFileInfo;
    fn reader(&mut self) -> &mut Self::Read;
    fn get_chroms(&self) -> Vec<ChromInfo>;
}

/// Internal helpers layered on [`BBIRead`]: tree descent and block
/// decompression common to both record types.
pub(crate) trait BBIReadInternal: BBIRead {
    fn chrom_id(&self, chrom_name: &str) -> Result<u32, ChromIdNotFound> {
        self.get_info().chrom_id(chrom_name)
    }

    fn search_cir_tree(
        &mut self,
        index_offset: u64,
        chrom_name: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<Block>, CirTreeSearchError> {
        let chrom_ix = self.chrom_id(chrom_name)?;
        let query = GenomicBox {
            start_chrom_ix: chrom_ix,
            start_base: start,
            end_chrom_ix: chrom_ix,
            end_base: end,
        };
        let blocks =
            rtree::search_overlapping_blocks(self.reader(), index_offset, &query)?;
        Ok(blocks.into_iter().map(Block::from).collect())
    }

    fn search_overlapping_blocks(
        &mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<Block>, CirTreeSearchError> {
        let full_index_offset = self.get_info().header.full_index_offset;
        self.search_cir_tree(full_index_offset, chrom_name, start, end)
    }

    fn get_block_data(&mut self, block: &Block) -> io::Result<Vec<u8>> {
        let header = self.get_info().header;
        let reader = self.reader();
        reader.seek(SeekFrom::Start(block.offset))?;
        let mut raw = vec![0u8; block.size as usize];
        reader.read_exact(&mut raw)?;
        header
            .compression()
            .decompress(&raw, header.uncompress_buf_size as usize)
    }

    fn get_zoom_block_values(
        &mut self,
        block: &Block,
        chrom_ix: u32,
        start: u32,
        end: u32,
    ) -> Result<Vec<ZoomRecord>, ZoomIntervalError> {
        let data = self.get_block_data(block)?;
        let endianness = self.get_info().header.endianness;
        let mut out = Vec::new();
        for chunk in data.chunks_exact(ZoomRecord::ENCODED_SIZE) {
            let mut b = BytesMut::from(chunk);
            let rec_chrom = get_u32(endianness, &mut b);
            let rec_start = get_u32(endianness, &mut b);
            let rec_end = get_u32(endianness, &mut b);
            let valid_count = get_u32(endianness, &mut b);
            let min_val = b.get_f32_ne_endian(endianness) as f64;
            let max_val = b.get_f32_ne_endian(endianness) as f64;
            let sum = b.get_f32_ne_endian(endianness) as f64;
            let sum_squares = b.get_f32_ne_endian(endianness) as f64;
            if rec_chrom == chrom_ix && rec_start < end && rec_end > start {
                out.push(ZoomRecord {
                    chrom: rec_chrom,
                    start: rec_start,
                    end: rec_end,
                    summary: Summary {
                        total_items: valid_count as u64,
                        bases_covered: valid_count as u64,
                        min_val,
                        max_val,
                        sum,
                        sum_squares,
                    },
                });
            }
        }
        Ok(out)
    }
}

impl<T: BBIRead> BBIReadInternal for T {}

trait GetF32NeEndian {
    fn get_f32_ne_endian(&mut self, e: Endianness) -> f32;
}

impl GetF32NeEndian for BytesMut {
    fn get_f32_ne_endian(&mut self, e: Endianness) -> f32 {
        match e {
            Endianness::Little => self.get_f32_le(),
            Endianness::Big => self.get_f32(),
        }
    }
}

/// Iterates zoom records across every block overlapping a query at a single
/// zoom level, re-filtering per record since a block's bounding box can span
/// more than the query interval.
pub struct ZoomIntervalIter<'a, R: SeekableRead, B: BBIRead<Read = R> + 'a> {
    read: &'a mut B,
    blocks: std::vec::IntoIter<Block>,
    current: std::vec::IntoIter<ZoomRecord>,
    chrom_ix: u32,
    start: u32,
    end: u32,
}

impl<'a, R: SeekableRead, B: BBIRead<Read = R> + 'a> ZoomIntervalIter<'a, R, B> {
    pub(crate) fn new(
        read: &'a mut B,
        blocks: Vec<Block>,
        chrom_ix: u32,
        start: u32,
        end: u32,
    ) -> Self {
        ZoomIntervalIter {
            read,
            blocks: blocks.into_iter(),
            current: Vec::new().into_iter(),
            chrom_ix,
            start,
            end,
        }
    }
}

impl<'a, R: SeekableRead, B: BBIRead<Read = R> + 'a> Iterator for ZoomIntervalIter<'a, R, B> {
    type Item = Result<ZoomRecord, ZoomIntervalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rec) = self.current.next() {
                return Some(Ok(rec));
            }
            let block = self.blocks.next()?;
            match self
                .read
                .get_zoom_block_values(&block, self.chrom_ix, self.start, self.end)
            {
                Ok(records) => self.current = records.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
