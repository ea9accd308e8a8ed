use std::io::{self, Seek, Write};

use crate::bbi::CHROM_TREE_MAGIC;
use crate::byteio::ByteWriter;

use super::BPlusTreeItem;

const HEADER_SIZE: u64 = 32;
const NODE_HEADER_SIZE: u64 = 4; // isLeaf: u8, reserved: u8, count: u16
const LEAF_VAL_SIZE: u64 = 8; // chromId: u32, chromSize: u32
const NONLEAF_VAL_SIZE: u64 = 8; // childOffset: u64

enum NodeBuild {
    Leaf(Vec<BPlusTreeItem>),
    NonLeaf {
        /// (key, child index within the level below)
        children: Vec<(String, usize)>,
    },
}

impl NodeBuild {
    fn item_count(&self) -> usize {
        match self {
            NodeBuild::Leaf(items) => items.len(),
            NodeBuild::NonLeaf { children } => children.len(),
        }
    }

    fn first_key(&self) -> &str {
        match self {
            NodeBuild::Leaf(items) => &items[0].name,
            NodeBuild::NonLeaf { children } => &children[0].0,
        }
    }

    /// Byte size of this node padded out to `slots` item slots. Every node
    /// in a level but the root is padded to `block_size` slots so all
    /// siblings in a level occupy the same number of bytes; the root level
    /// is sized to its real (possibly smaller) item count.
    fn encoded_size(&self, key_size: u64, slots: usize) -> u64 {
        let val_size = match self {
            NodeBuild::Leaf(_) => LEAF_VAL_SIZE,
            NodeBuild::NonLeaf { .. } => NONLEAF_VAL_SIZE,
        };
        NODE_HEADER_SIZE + slots as u64 * (key_size + val_size)
    }
}

/// Groups bulk-builds the B+-tree bottom-up: items chunked into leaves of at
/// most `block_size`, then each level's nodes chunked by `block_size` into
/// parents, repeating until a single root remains. The same grouping shape
/// the R+-tree build uses, one level of arity at a time.
fn build_levels(mut items: Vec<BPlusTreeItem>, block_size: u32) -> Vec<Vec<NodeBuild>> {
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let bs = block_size.max(2) as usize;

    let leaves: Vec<NodeBuild> = items
        .chunks(bs)
        .map(|chunk| NodeBuild::Leaf(chunk.to_vec()))
        .collect();

    let mut levels = vec![leaves];
    while levels.last().unwrap().len() > 1 {
        let below = levels.last().unwrap();
        let mut parents = Vec::new();
        for (start, chunk) in below.chunks(bs).enumerate() {
            let children = chunk
                .iter()
                .enumerate()
                .map(|(i, node)| (node.first_key().to_string(), start * bs + i))
                .collect();
            parents.push(NodeBuild::NonLeaf { children });
        }
        levels.push(parents);
    }
    levels
}

/// Writes the full chromosome B+-tree (32-byte header + nodes, root first)
/// at the writer's current position.
pub fn write_b_plus_tree<W: Write + Seek>(
    writer: &mut ByteWriter<W>,
    items: Vec<BPlusTreeItem>,
    block_size: u32,
) -> io::Result<()> {
    let item_count = items.len() as u64;
    let key_size = items
        .iter()
        .map(|i| i.name.as_bytes().len())
        .max()
        .unwrap_or(1) as u64;

    writer.write_u32(CHROM_TREE_MAGIC)?;
    writer.write_u32(block_size)?;
    writer.write_u32(key_size as u32)?;
    writer.write_u32(LEAF_VAL_SIZE as u32)?;
    writer.write_u64(item_count)?;
    writer.write_u64(0)?;

    if items.is_empty() {
        return Ok(());
    }

    // levels[0] = leaves .. levels[last] = root. Writing goes root-first, so
    // walk in reverse; level_offsets are absolute file offsets, computed as
    // a prefix sum over per-level total encoded size, root level first.
    let levels = build_levels(items, block_size);
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
            .map(|n| n.encoded_size(key_size, slots_for(depth, n)))
            .sum();
        offset += level_size;
    }

    // Per-node start offset within its level, for resolving a parent's
    // childOffset into an absolute file offset.
    let mut node_offsets_by_level: Vec<Vec<u64>> = Vec::with_capacity(levels.len());
    for (depth, level) in levels.iter().enumerate() {
        let mut offsets = Vec::with_capacity(level.len());
        let mut o = level_offsets[depth];
        for node in level {
            offsets.push(o);
            o += node.encoded_size(key_size, slots_for(depth, node));
        }
        node_offsets_by_level.push(offsets);
    }

    for depth in (0..levels.len()).rev() {
        let level = &levels[depth];
        let pad_slots = if depth == last_depth { None } else { Some(bs) };
        for node in level {
            match node {
                NodeBuild::Leaf(node_items) => {
                    writer.write_u8(1)?;
                    writer.write_u8(0)?;
                    writer.write_u16(node_items.len() as u16)?;
                    for item in node_items {
                        writer.write_padded_key(&item.name, key_size as usize)?;
                        writer.write_u32(item.id)?;
                        writer.write_u32(item.size)?;
                    }
                    if let Some(slots) = pad_slots {
                        let pad = slots - node_items.len();
                        writer.skip_bytes(pad * (key_size as usize + LEAF_VAL_SIZE as usize), 0)?;
                    }
                }
                NodeBuild::NonLeaf { children } => {
                    writer.write_u8(0)?;
                    writer.write_u8(0)?;
                    writer.write_u16(children.len() as u16)?;
                    for (key, child_ix) in children {
                        writer.write_padded_key(key, key_size as usize)?;
                        let child_offset = node_offsets_by_level[depth - 1][*child_ix];
                        writer.write_u64(child_offset)?;
                    }
                    if let Some(slots) = pad_slots {
                        let pad = slots - children.len();
                        writer.skip_bytes(pad * (key_size as usize + NONLEAF_VAL_SIZE as usize), 0)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Total on-disk size (header + all nodes) the tree built from `items` at
/// `block_size` will occupy, for reserving space during the writer's
/// forward pass without materializing the tree twice.
pub fn b_plus_tree_size(items: &[BPlusTreeItem], block_size: u32) -> u64 {
    if items.is_empty() {
        return HEADER_SIZE;
    }
    let key_size = items
        .iter()
        .map(|i| i.name.as_bytes().len())
        .max()
        .unwrap_or(1) as u64;
    let levels = build_levels(items.to_vec(), block_size);
    let bs = block_size.max(2) as usize;
    let last_depth = levels.len() - 1;
    let node_bytes: u64 = levels
        .iter()
        .enumerate()
        .flat_map(|(depth, level)| {
            level.iter().map(move |n| {
                let slots = if depth == last_depth { n.item_count() } else { bs };
                n.encoded_size(key_size, slots)
            })
        })
        .sum();
    HEADER_SIZE + node_bytes
}
