use std::io::{self, Seek, Write};

use crate::bbi::CIR_TREE_MAGIC;
use crate::byteio::ByteWriter;
use crate::interval::GenomicBox;

const HEADER_SIZE: u64 = 48;
const NODE_HEADER_SIZE: u64 = 4;
const LEAF_ITEM_SIZE: u64 = 32; // 4 bbox fields (u32 each) + dataOffset(u64) + dataSize(u64)
const NONLEAF_ITEM_SIZE: u64 = 24; // 4 bbox fields (u32 each) + childOffset(u64)

/// One data block indexed by the tree: its genomic bounding box and where
/// its (possibly compressed) bytes live in the file.
#[derive(Copy, Clone, Debug)]
pub struct RTreeLeaf {
    pub bbox: GenomicBox,
    pub data_offset: u64,
    pub data_size: u64,
}

enum NodeBuild {
    Leaf(Vec<RTreeLeaf>),
    NonLeaf(Vec<(GenomicBox, usize)>),
}

impl NodeBuild {
    fn item_count(&self) -> usize {
        match self {
            NodeBuild::Leaf(v) => v.len(),
            NodeBuild::NonLeaf(v) => v.len(),
        }
    }

    fn bbox(&self) -> GenomicBox {
        match self {
            NodeBuild::Leaf(v) => v
                .iter()
                .map(|l| l.bbox)
                .reduce(|a, b| a.union(&b))
                .expect("node is never built with zero items"),
            NodeBuild::NonLeaf(v) => v
                .iter()
                .map(|(b, _)| *b)
                .reduce(|a, b| a.union(&b))
                .expect("node is never built with zero items"),
        }
    }

    /// Byte size of this node padded out to `slots` item slots. Every node
    /// in a level but the root is padded to `block_size` slots so all
    /// siblings in a level occupy the same number of bytes; the root level
    /// is sized to its real (possibly smaller) item count.
    fn encoded_size(&self, slots: usize) -> u64 {
        let item_size = match self {
            NodeBuild::Leaf(_) => LEAF_ITEM_SIZE,
            NodeBuild::NonLeaf(_) => NONLEAF_ITEM_SIZE,
        };
        NODE_HEADER_SIZE + slots as u64 * item_size
    }
}

/// Bulk-builds the levels bottom-up: leaves are grouped into runs of
/// `block_size`, then each level's nodes are grouped into runs of
/// `block_size` to form parents, repeating until a single root remains.
/// When there is only one leaf group to begin with, that group *is* the
/// root (the trivial single-leaf-level case is not wrapped in an
/// additional pointless non-leaf level).
fn build_levels(leaves: Vec<RTreeLeaf>, block_size: u32) -> Vec<Vec<NodeBuild>> {
    let bs = block_size.max(2) as usize;
    let leaf_nodes: Vec<NodeBuild> = leaves
        .chunks(bs)
        .map(|chunk| NodeBuild::Leaf(chunk.to_vec()))
        .collect();

    let mut levels = vec![leaf_nodes];
    while levels.last().unwrap().len() > 1 {
        let below = levels.last().unwrap();
        let mut parents = Vec::new();
        for (start, chunk) in below.chunks(bs).enumerate() {
            let children = chunk
                .iter()
                .enumerate()
                .map(|(i, node)| (node.bbox(), start * bs + i))
                .collect();
            parents.push(NodeBuild::NonLeaf(children));
        }
        levels.push(parents);
    }
    levels
}

/// Writes the full R+-tree (48-byte header + nodes, root first) at the
/// writer's current position. `end_file_offset` is the file offset one past
/// the last data block this tree indexes (the header's `endFileOffset`).
pub fn write_r_tree<W: Write + Seek>(
    writer: &mut ByteWriter<W>,
    leaves: Vec<RTreeLeaf>,
    block_size: u32,
    items_per_slot: u32,
    end_file_offset: u64,
) -> io::Result<()> {
    let item_count = leaves.len() as u64;
    let overall_bbox = leaves
        .iter()
        .map(|l| l.bbox)
        .reduce(|a, b| a.union(&b))
        .unwrap_or(GenomicBox {
            start_chrom_ix: 0,
            start_base: 0,
            end_chrom_ix: 0,
            end_base: 0,
        });

    writer.write_u32(CIR_TREE_MAGIC)?;
    writer.write_u32(block_size)?;
    writer.write_u64(item_count)?;
    writer.write_u32(overall_bbox.start_chrom_ix)?;
    writer.write_u32(overall_bbox.start_base)?;
    writer.write_u32(overall_bbox.end_chrom_ix)?;
    writer.write_u32(overall_bbox.end_base)?;
    writer.write_u64(end_file_offset)?;
    writer.write_u32(items_per_slot)?;
    writer.write_u32(0)?;

    if leaves.is_empty() {
        return Ok(());
    }

    let levels = build_levels(leaves, block_size);
    let index_start = writer.tell()?;
    let bs = block_size.max(2) as usize;
    let last_depth = levels.len() - 1;
    let slots_for = |depth: usize, node: &NodeBuild| -> usize {
        if depth == last_depth {
            node.item_count()
        } else {
            bs
        }
    };

    let mut level_offsets = vec![0u64; levels.len()];
    let mut offset = index_start;
    for (depth, level) in levels.iter().enumerate().rev() {
        level_offsets[depth] = offset;
        let level_size: u64 = level
            .iter()
            .map(|n| n.encoded_size(slots_for(depth, n)))
            .sum();
        offset += level_size;
    }

    let mut node_offsets_by_level: Vec<Vec<u64>> = Vec::with_capacity(levels.len());
    for (depth, level) in levels.iter().enumerate() {
        let mut offsets = Vec::with_capacity(level.len());
        let mut o = level_offsets[depth];
        for node in level {
            offsets.push(o);
            o += node.encoded_size(slots_for(depth, node));
        }
        node_offsets_by_level.push(offsets);
    }

    for depth in (0..levels.len()).rev() {
        let pad_slots = if depth == last_depth { None } else { Some(bs) };
        for node in &levels[depth] {
            match node {
                NodeBuild::Leaf(items) => {
                    writer.write_u8(1)?;
                    writer.write_u8(0)?;
                    writer.write_u16(items.len() as u16)?;
                    for item in items {
                        writer.write_u32(item.bbox.start_chrom_ix)?;
                        writer.write_u32(item.bbox.start_base)?;
                        writer.write_u32(item.bbox.end_chrom_ix)?;
                        writer.write_u32(item.bbox.end_base)?;
                        writer.write_u64(item.data_offset)?;
                        writer.write_u64(item.data_size)?;
                    }
                    if let Some(slots) = pad_slots {
                        writer.skip_bytes((slots - items.len()) * LEAF_ITEM_SIZE as usize, 0)?;
                    }
                }
                NodeBuild::NonLeaf(children) => {
                    writer.write_u8(0)?;
                    writer.write_u8(0)?;
                    writer.write_u16(children.len() as u16)?;
                    for (bbox, child_ix) in children {
                        writer.write_u32(bbox.start_chrom_ix)?;
                        writer.write_u32(bbox.start_base)?;
                        writer.write_u32(bbox.end_chrom_ix)?;
                        writer.write_u32(bbox.end_base)?;
                        let child_offset = node_offsets_by_level[depth - 1][*child_ix];
                        writer.write_u64(child_offset)?;
                    }
                    if let Some(slots) = pad_slots {
                        writer.skip_bytes((slots - children.len()) * NONLEAF_ITEM_SIZE as usize, 0)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Total on-disk size (header + all nodes) the tree built from `leaves` at
/// `block_size` will occupy.
pub fn r_tree_size(leaves: &[RTreeLeaf], block_size: u32) -> u64 {
    if leaves.is_empty() {
        return HEADER_SIZE;
    }
    let levels = build_levels(leaves.to_vec(), block_size);
    let bs = block_size.max(2) as usize;
    let last_depth = levels.len() - 1;
    let node_bytes: u64 = levels
        .iter()
        .enumerate()
        .flat_map(|(depth, level)| {
            level.iter().map(move |n| {
                let slots = if depth == last_depth { n.item_count() } else { bs };
                n.encoded_size(slots)
            })
        })
        .sum();
    HEADER_SIZE + node_bytes
}
