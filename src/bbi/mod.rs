//! Shared types and magic constants for the BBI container family: the four
//! magic numbers and the `BBIFile`/`ZoomHeader`/`BedEntry` shapes that
//! `bbiread`/`bigbedread`/`bigwigread` all build on.

pub mod bbiread;
pub mod bigbedread;
pub mod bigwigread;
pub mod bigbedwrite;
pub mod bigwigwrite;
pub mod zoom;

pub use bbiread::{
    BBIFileInfo, BBIFileReadInfoError, BBIHeader, BBIRead, BBIReadError, BBIReadInternal,
    ChromIdNotFound, ChromInfo, CirTreeSearchError, ZoomIntervalError,
};
pub use bigbedread::{BigBedRead, BigBedReadOpenError, IntervalIter};
pub use bigwigread::{BigWigRead, BigWigReadOpenError, ValueIter};
pub use bigbedwrite::{BigBedWrite, BigBedWriteOptions};
pub use bigwigwrite::{BigWigWrite, BigWigWriteError, BigWigWriteOptions, WigSection};
pub use zoom::{average_over_interval, summarize, IntervalAverage};

use crate::summary::Summary;

/// The little- and big-endian forms of each container's magic number, used
/// at open time to both identify the container and auto-detect its byte
/// order: try native order first, then the swapped form.
pub const BIGWIG_MAGIC_LTH: u32 = 0x888F_FC26;
pub const BIGWIG_MAGIC_HTL: u32 = 0x26FC_8F88;
pub const BIGBED_MAGIC_LTH: u32 = 0x8789_F2EB;
pub const BIGBED_MAGIC_HTL: u32 = 0xEBF2_8987;

pub const BIGWIG_MAGIC: (u32, u32) = (BIGWIG_MAGIC_LTH, BIGWIG_MAGIC_HTL);
pub const BIGBED_MAGIC: (u32, u32) = (BIGBED_MAGIC_LTH, BIGBED_MAGIC_HTL);

pub const CHROM_TREE_MAGIC: u32 = 0x78CA_8C91;
pub const CIR_TREE_MAGIC: u32 = 0x2468_ACE0;

/// Which of the two BBI container flavors a file is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BBIFile {
    BigWig,
    BigBed,
}

/// One row of the zoom-level table in the fixed header: the reduction level
/// (bases per summary bin) this zoom pyramid level was built at, and where
/// its R+-tree index and data blocks live.
#[derive(Copy, Clone, Debug)]
pub struct ZoomHeader {
    pub reduction_level: u32,
    pub(crate) data_offset: u64,
    pub(crate) index_offset: u64,
}

pub use crate::summary::ZoomRecord;

/// One decoded BigBed record: the half-open interval is carried separately
/// by the caller (block/overlap machinery), `rest` is the opaque
/// tab-separated text of any columns past chromStart/chromEnd.
#[derive(Clone, Debug, PartialEq)]
pub struct BedEntry {
    pub start: u32,
    pub end: u32,
    pub rest: String,
}

/// One decoded BigWig value: a half-open interval and the single numeric
/// value that applies across it (already expanded from whichever wig
/// section type it was encoded as).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Value {
    pub start: u32,
    pub end: u32,
    pub value: f32,
}

/// The whole-file summary stored at `totalSummaryOffset`, on-disk layout
/// `(validCount: u64, minVal: f64, maxVal: f64, sumData: f64, sumSquares: f64)`.
/// Distinct from [`Summary`] only in that it has no `total_items` bookkeeping
/// field; `From`/`Into` bridges the two.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TotalSummary {
    pub bases_covered: u64,
    pub min_val: f64,
    pub max_val: f64,
    pub sum: f64,
    pub sum_squares: f64,
}

impl From<Summary> for TotalSummary {
    fn from(s: Summary) -> Self {
        TotalSummary {
            bases_covered: s.bases_covered,
            min_val: if s.is_empty() { 0.0 } else { s.min_val },
            max_val: if s.is_empty() { 0.0 } else { s.max_val },
            sum: s.sum,
            sum_squares: s.sum_squares,
        }
    }
}
