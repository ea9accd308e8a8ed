//! BigBed: reading BED-record data blocks (`IntervalIter`,
//! `get_block_entries`'s NUL-terminated `rest` decode, the `Reopen`/
//! `BBIRead` impls), built on the shared [`BBIReadInternal`] tree/block
//! machinery.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use byteordered::ByteOrdered;
use thiserror::Error;

use crate::bbi::bbiread::{
    BBIFileInfo, BBIFileReadInfoError, BBIRead, BBIReadError, BBIReadInternal, Block, ChromInfo,
    ZoomIntervalError, ZoomIntervalIter,
};
use crate::bbi::bbiread::read_info;
use crate::bbi::{BBIFile, BedEntry, ZoomRecord};
use crate::utils::reopen::{Reopen, ReopenableFile, SeekableRead};

pub struct IntervalIter<'a, R: SeekableRead> {
    bigbed: &'a mut BigBedRead<R>,
    blocks: std::vec::IntoIter<Block>,
    vals: Option<std::vec::IntoIter<BedEntry>>,
    expected_chrom: u32,
    start: u32,
    end: u32,
    overlaps: bool,
}

impl<'a, R: SeekableRead> Iterator for IntervalIter<'a, R> {
    type Item = Result<BedEntry, BBIReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(vals) = &mut self.vals {
                match vals.next() {
                    Some(v) => return Some(Ok(v)),
                    None => self.vals = None,
                }
            }
            let current_block = self.blocks.next()?;
            match get_block_entries(
                self.bigbed,
                &current_block,
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

/// Possible errors encountered when opening a bigBed file to read.
#[derive(Error, Debug)]
pub enum BigBedReadOpenError {
    #[error("file is not a bigBed")]
    NotABigBed,
    #[error(transparent)]
    BBIFileReadInfo(#[from] BBIFileReadInfoError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Reads and queries a bigBed file: BED records, bounded by a genomic
/// interval, decoded from its compressed data blocks.
pub struct BigBedRead<R> {
    info: BBIFileInfo,
    read: R,
}

impl<R: Reopen> Reopen for BigBedRead<R> {
    fn reopen(&self) -> io::Result<Self> {
        Ok(BigBedRead {
            info: self.info.clone(),
            read: self.read.reopen()?,
        })
    }
}

impl<R: SeekableRead> BBIRead for BigBedRead<R> {
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

impl BigBedRead<ReopenableFile> {
    /// Opens a new `BigBedRead` from a given path as a file.
    pub fn open_file(path: &str) -> Result<Self, BigBedReadOpenError> {
        let reopen = ReopenableFile {
            path: path.to_string(),
            file: File::open(path)?,
        };
        let b = BigBedRead::open(reopen);
        if b.is_err() {
            eprintln!("Error when opening: {}", path);
        }
        b
    }
}

impl<R> BigBedRead<R>
where
    R: SeekableRead,
{
    /// Opens a new `BigBedRead` for a given type that implements both `Read`
    /// and `Seek`.
    pub fn open(mut read: R) -> Result<Self, BigBedReadOpenError> {
        let info = read_info(&mut read)?;
        match info.filetype {
            BBIFile::BigBed => {}
            _ => return Err(BigBedReadOpenError::NotABigBed),
        }
        Ok(BigBedRead { info, read })
    }

    /// Reads the AutoSql schema string stored alongside the data.
    pub fn autosql(&mut self) -> Result<String, BBIReadError> {
        let auto_sql_offset = self.info.header.auto_sql_offset;
        let mut reader = BufReader::new(self.reader());
        reader.seek(SeekFrom::Start(auto_sql_offset))?;
        let mut buffer = Vec::new();
        reader.read_until(b'\0', &mut buffer)?;
        buffer.pop();
        String::from_utf8(buffer)
            .map_err(|_| BBIReadError::InvalidFile("autosql is not valid UTF-8".to_owned()))
    }

    /// Returns an iterator of the `BedEntry`s on `chrom_name` matching
    /// `[start, end)`: overlapping it when `overlaps` is true, or fully
    /// contained within it when `overlaps` is false. `end == 0` is
    /// normalised to the chromosome's length. A chromosome absent from this
    /// file yields an empty iterator rather than an error.
    pub fn get_interval<'a>(
        &'a mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        overlaps: bool,
    ) -> Result<IntervalIter<'a, R>, BBIReadError> {
        let chrom_ix = match self.get_info().chrom_id(chrom_name) {
            Ok(ix) => ix,
            Err(_) => {
                return Ok(IntervalIter {
                    bigbed: self,
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
        Ok(IntervalIter {
            bigbed: self,
            blocks: blocks.into_iter(),
            vals: None,
            expected_chrom: chrom_ix,
            start,
            end,
            overlaps,
        })
    }

    /// Returns an iterator of the `ZoomRecord`s intersecting
    /// `[start, end)` at a given zoom level's reduction.
    pub fn get_zoom_interval<'a>(
        &'a mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        reduction_level: u32,
    ) -> Result<ZoomIntervalIter<'a, R, BigBedRead<R>>, ZoomIntervalError> {
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

fn get_block_entries<R: SeekableRead>(
    bigbed: &mut BigBedRead<R>,
    block: &Block,
    expected_chrom: u32,
    start: u32,
    end: u32,
    overlaps: bool,
) -> Result<std::vec::IntoIter<BedEntry>, BBIReadError> {
    let data = bigbed.get_block_data(block)?;
    let endianness = bigbed.info.header.endianness;
    let mut cursor = ByteOrdered::runtime(std::io::Cursor::new(data), endianness);
    let mut entries = Vec::new();

    loop {
        let chrom_id = match cursor.read_u32() {
            Ok(v) => v,
            Err(_) => break,
        };
        let chrom_start = cursor.read_u32()?;
        let chrom_end = cursor.read_u32()?;
        if chrom_id != expected_chrom {
            return Err(BBIReadError::InvalidFile(
                "bigBed data block contained records from more than one chromosome".to_owned(),
            ));
        }
        let rest_bytes: Vec<u8> = cursor
            .by_ref()
            .bytes()
            .take_while(|c| matches!(c, Ok(b) if *b != 0))
            .collect::<Result<_, _>>()?;
        let rest = String::from_utf8(rest_bytes)
            .map_err(|_| BBIReadError::InvalidFile("rest column is not valid UTF-8".to_owned()))?;
        let matches = if overlaps {
            chrom_start < end && chrom_end > start
        } else {
            chrom_start >= start && chrom_end <= end
        };
        if matches {
            entries.push(BedEntry {
                start: chrom_start,
                end: chrom_end,
                rest,
            });
        }
    }

    Ok(entries.into_iter())
}
