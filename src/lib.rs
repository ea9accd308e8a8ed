//! Read and write UCSC BigWig and BigBed (BBI) genomic track files.
//!
//! A BBI file is a self-indexing binary container: a chromosome B+-tree for
//! name lookup, an R+-tree over genomic intervals for overlap queries, and a
//! pyramid of precomputed zoom-level summaries so a caller can request a
//! coarse view of a whole chromosome without decompressing every record.
//! [`BigBedRead`]/[`BigWigRead`] cover the read side, [`BigBedWrite`]/
//! [`BigWigWrite`] the write side.

pub mod bbi;
pub mod bed;
mod bplustree;
mod byteio;
mod interval;
mod rtree;
pub mod summary;
pub mod utils;

pub use bbi::{
    average_over_interval, summarize, BBIFile, BBIFileInfo, BBIRead, BBIReadError, BedEntry,
    BigBedRead, BigBedReadOpenError, BigBedWrite, BigBedWriteOptions, BigWigRead,
    BigWigReadOpenError, BigWigWrite, BigWigWriteError, BigWigWriteOptions, ChromInfo,
    IntervalAverage, TotalSummary, Value, WigSection, ZoomHeader, ZoomIntervalError,
};
pub use bed::{BedValueError, ExtendedBedFields, Strand};
pub use byteio::Compression;
pub use interval::{ChromosomeInterval, GenomicBox, IntervalError};
pub use summary::{Summary, ZoomRecord};
