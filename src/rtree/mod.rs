//! The R+-tree genomic interval index over data blocks.
//!
//! On-disk layout: a
//! 48-byte header (`magic, blockSize, itemCount, startChromIx, startBase,
//! endChromIx, endBase, endFileOffset, itemsPerSlot, reserved`) followed by
//! nodes, root first, each `(isLeaf, reserved, count, items...)` with each
//! item's bounding box `(startChromIx, startBase, endChromIx, endBase)`
//! paired with either `(dataOffset: u64, dataSize: u64)` for a leaf or a
//! `childOffset: u64` for a non-leaf.

pub mod build;
pub mod read;

pub use build::{write_r_tree, RTreeLeaf};
pub use read::search_overlapping_blocks;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RTreeError {
    #[error("r+-tree magic number does not match; not a valid interval index")]
    BadMagic,
    #[error("i/o error reading r+-tree: {0}")]
    Io(#[from] std::io::Error),
}
