//! BigWig: reading WIG-section data blocks (bedGraph / varStep / fixedStep).
//!
//! The surrounding `Reopen`/`BBIRead`/iterator shape mirrors
//! `bigbedread.rs` so both record-type readers look the same to a caller.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};

use byteordered::ByteOrdered;
use thiserror::Error;

use crate::bbi::bbiread::{
    read_info, BBIFileInfo, BBIFileReadInfoError, BBIRead, BBIReadError, BBIReadInternal, Block,
    ChromInfo, ZoomIntervalError, ZoomIntervalIter,
};
use crate::bbi::{BBIFile, Value};
use crate::utils::reopen::{Reopen, ReopenableFile, SeekableRead};

const SECTION_BEDGRAPH: u8 = 1;
const SECTION_VAR_STEP: u8 = 2;
const SECTION_FIXED_STEP: u8 = 3;

#[derive(Error, Debug)]
pub enum BigWigReadOpenError {
    #[error("file is not a bigWig")]
    NotABigWig,
    #[error(transparent)]
    BBIFileReadInfo(#[from] BBIFileReadInfoError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub struct BigWigRead<R> {
    info: BBIFileInfo,
    read: R,
}

impl<R: Reopen> Reopen for BigWigRead<R> {
    fn reopen(&self) -> io::Result<Self> {
        Ok(BigWigRead {
            info: self.info.clone(),
            read: self.read.reopen()?,
        })
    }
}

impl<R: SeekableRead> BBIRead for BigWigRead<R> {
    type Read = R;

    fn get_info(&self) -> &BBIFileInfo {
        &self.info
    }

    fn reader(&mut self) -> &mut R {
        &mut self.read
    }

    fn get_chroms(&self) -> Vec<ChromInfo> {
        self.info.chrom_info.clone()
    }
}

impl BigWigRead<ReopenableFile> {
    pub fn open_file(path: &str) -> Result<Self, BigWigReadOpenError> {
        let reopen = ReopenableFile {
            path: path.to_string(),
            file: File::open(path)?,
        };
        let b = BigWigRead::open(reopen);
        if b.is_err() {
            eprintln!("Error when opening: {}", path);
        }
        b
    }
}

impl<R> BigWigRead<R>
where
    R: SeekableRead,
{
    pub fn open(mut read: R) -> Result<Self, BigWigReadOpenError> {
        let info = read_info(&mut read)?;
        match info.filetype {
            BBIFile::BigWig => {}
            _ => return Err(BigWigReadOpenError::NotABigWig),
        }
        Ok(BigWigRead { info, read })
    }

    /// Returns an iterator of the `Value`s on `chrom_name` matching
    /// `[start, end)` (decoded from whichever section type(s) cover that
    /// range): overlapping it when `overlaps` is true, or fully contained
    /// within it when `overlaps` is false. `end == 0` is normalised to the
    /// chromosome's length. A chromosome absent from this file yields an
    /// empty iterator rather than an error.
    pub fn get_interval<'a>(
        &'a mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        overlaps: bool,
    ) -> Result<ValueIter<'a, R>, BBIReadError> {
        let chrom_ix = match self.get_info().chrom_id(chrom_name) {
            Ok(ix) => ix,
            Err(_) => {
                return Ok(ValueIter {
                    bigwig: self,
                    blocks: Vec::new().into_iter(),
                    vals: None,
                    expected_chrom: 0,
                    start,
                    end,
                    overlaps,
                })
            }
        };
        let end = if end == 0 {
            self.get_info()
                .chrom_info
                .iter()
                .find(|c| c.id == chrom_ix)
                .map(|c| c.length)
                .unwrap_or(0)
        } else {
            end
        };
        let blocks = self.search_overlapping_blocks(chrom_name, start, end)?;
        Ok(ValueIter {
            bigwig: self,
            blocks: blocks.into_iter(),
            vals: None,
            expected_chrom: chrom_ix,
            start,
            end,
            overlaps,
        })
    }

    pub fn get_zoom_interval<'a>(
        &'a mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        reduction_level: u32,
    ) -> Result<ZoomIntervalIter<'a, R, BigWigRead<R>>, ZoomIntervalError> {
        let chrom_ix = self.get_info().chrom_id(chrom_name)?;
        let zoom_header = self
            .get_info()
            .zoom_headers
            .iter()
            .find(|h| h.reduction_level == reduction_level)
            .copied()
            .ok_or(ZoomIntervalError::ReductionLevelNotFound)?;
        let blocks = self.search_cir_tree(zoom_header.index_offset, chrom_name, start, end)?;
        Ok(ZoomIntervalIter::new(self, blocks, chrom_ix, start, end))
    }
}

pub struct ValueIter<'a, R: SeekableRead> {
    bigwig: &'a mut BigWigRead<R>,
    blocks: std::vec::IntoIter<Block>,
    vals: Option<std::vec::IntoIter<Value>>,
    expected_chrom: u32,
    start: u32,
    end: u32,
    overlaps: bool,
}

impl<'a, R: SeekableRead> Iterator for ValueIter<'a, R> {
    type Item = Result<Value, BBIReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(vals) = &mut self.vals {
                match vals.next() {
                    Some(v) => return Some(Ok(v)),
                    None => self.vals = None,
                }
            }
            let block = self.blocks.next()?;
            match get_block_values(
                self.bigwig,
                &block,
                self.expected_chrom,
                self.start,
                self.end,
                self.overlaps,
            ) {
                Ok(vals) => self.vals = Some(vals),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn get_block_values<R: SeekableRead>(
    bigwig: &mut BigWigRead<R>,
    block: &Block,
    expected_chrom: u32,
    start: u32,
    end: u32,
    overlaps: bool,
) -> Result<std::vec::IntoIter<Value>, BBIReadError> {
    let data = bigwig.get_block_data(block)?;
    let endianness = bigwig.info.header.endianness;
    let mut cursor = ByteOrdered::runtime(std::io::Cursor::new(data), endianness);

    let chrom_id = cursor.read_u32()?;
    let chrom_start = cursor.read_u32()?;
    let _chrom_end = cursor.read_u32()?;
    let item_step = cursor.read_u32()?;
    let item_span = cursor.read_u32()?;
    let section_type = cursor.read_u8()?;
    let _reserved = cursor.read_u8()?;
    let item_count = cursor.read_u16()?;

    if chrom_id != expected_chrom {
        return Err(BBIReadError::InvalidFile(
            "bigWig data block did not match the expected chromosome".to_owned(),
        ));
    }

    let matches = |s: u32, e: u32| {
        if overlaps {
            s < end && e > start
        } else {
            s >= start && e <= end
        }
    };

    let mut out = Vec::with_capacity(item_count as usize);
    match section_type {
        SECTION_BEDGRAPH => {
            for _ in 0..item_count {
                let s = cursor.read_u32()?;
                let e = cursor.read_u32()?;
                let v = cursor.read_f32()?;
                if matches(s, e) {
                    out.push(Value { start: s, end: e, value: v });
                }
            }
        }
        SECTION_VAR_STEP => {
            for _ in 0..item_count {
                let s = cursor.read_u32()?;
                let v = cursor.read_f32()?;
                let e = s + item_span;
                if matches(s, e) {
                    out.push(Value { start: s, end: e, value: v });
                }
            }
        }
        SECTION_FIXED_STEP => {
            // Realign to the query's step boundary: items are stored at
            // their true positions in the section, but reported at
            // positions counted from `start'` so a query starting
            // mid-section still sees step-aligned output.
            let start_prime = if item_step == 0 {
                chrom_start
            } else {
                let offset = (item_step - start % item_step) % item_step;
                chrom_start.max(start.saturating_add(offset))
            };
            let mut j: u32 = 0;
            for i in 0..item_count as u32 {
                let true_start = chrom_start + i * item_step;
                let v = cursor.read_f32()?;
                let true_end = true_start + item_span;
                if matches(true_start, true_end) {
                    let s = start_prime + j * item_step;
                    let e = s + item_span;
                    out.push(Value { start: s, end: e, value: v });
                    j += 1;
                }
            }
        }
        other => {
            return Err(BBIReadError::InvalidFile(format!(
                "unrecognized bigWig section type {other}"
            )));
        }
    }

    Ok(out.into_iter())
}
