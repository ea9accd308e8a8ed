//! The B+-tree chromosome dictionary: name -> (id, length).
//!
//! On disk: a 32-byte header (`magic, blockSize, keySize, valSize, itemCount,
//! reserved`) followed by nodes, root first, each node `(isLeaf, reserved,
//! count, items...)` with `count` fixed-width `keySize`-byte NUL-padded keys
//! paired with either `(chromId: u32, chromSize: u32)` leaf values or a
//! `childOffset: u64` non-leaf pointer.

pub mod build;
pub mod read;

pub use build::write_b_plus_tree;
pub use read::{find, read_all, ChromTreeItem};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BPlusTreeError {
    #[error("b+-tree magic number does not match; not a valid chromosome index")]
    BadMagic,
    #[error("i/o error reading b+-tree: {0}")]
    Io(#[from] std::io::Error),
    #[error("chromosome key is not valid UTF-8")]
    InvalidKey,
}

/// A single chromosome entry used to build the tree: name, numeric id, and
/// length in bases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BPlusTreeItem {
    pub name: String,
    pub id: u32,
    pub size: u32,
}
