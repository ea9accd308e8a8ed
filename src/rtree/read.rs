use std::io::{Read, Seek, SeekFrom};

use byteordered::Endianness;

use crate::bbi::CIR_TREE_MAGIC;
use crate::interval::GenomicBox;

use super::RTreeError;

/// A data block found to overlap a query, as the raw file region it lives
/// in (still possibly compressed).
#[derive(Copy, Clone, Debug)]
pub struct RTreeBlock {
    pub offset: u64,
    pub size: u64,
}

struct TreeHeader {
    endianness: Endianness,
}

fn detect_endianness<R: Read>(data: &mut R) -> Result<Endianness, RTreeError> {
    let mut magic_buf = [0u8; 4];
    data.read_exact(&mut magic_buf)?;
    if u32::from_le_bytes(magic_buf) == CIR_TREE_MAGIC {
        Ok(Endianness::Little)
    } else if u32::from_be_bytes(magic_buf) == CIR_TREE_MAGIC {
        Ok(Endianness::Big)
    } else {
        Err(RTreeError::BadMagic)
    }
}

fn read_u32(e: Endianness, b: &[u8]) -> u32 {
    match e {
        Endianness::Little => u32::from_le_bytes(b.try_into().unwrap()),
        Endianness::Big => u32::from_be_bytes(b.try_into().unwrap()),
    }
}

fn read_u64(e: Endianness, b: &[u8]) -> u64 {
    match e {
        Endianness::Little => u64::from_le_bytes(b.try_into().unwrap()),
        Endianness::Big => u64::from_be_bytes(b.try_into().unwrap()),
    }
}

fn read_bbox(e: Endianness, buf: &[u8]) -> GenomicBox {
    GenomicBox {
        start_chrom_ix: read_u32(e, &buf[0..4]),
        start_base: read_u32(e, &buf[4..8]),
        end_chrom_ix: read_u32(e, &buf[8..12]),
        end_base: read_u32(e, &buf[12..16]),
    }
}

/// Depth-first overlap query: descend into any child whose bounding box
/// intersects `query`, collecting leaf data blocks, grounded on the
/// teacher's `search_cir_tree`/`search_overlapping_blocks` two-field
/// lexicographic overlap test.
pub fn search_overlapping_blocks<R: Read + Seek>(
    data: &mut R,
    tree_offset: u64,
    query: &GenomicBox,
) -> Result<Vec<RTreeBlock>, RTreeError> {
    data.seek(SeekFrom::Start(tree_offset))?;
    let endianness = detect_endianness(data)?;
    let header = TreeHeader { endianness };
    let root_offset = tree_offset + 48;
    let mut out = Vec::new();
    visit_node(data, &header, root_offset, query, &mut out)?;
    Ok(out)
}

fn visit_node<R: Read + Seek>(
    data: &mut R,
    header: &TreeHeader,
    node_offset: u64,
    query: &GenomicBox,
    out: &mut Vec<RTreeBlock>,
) -> Result<(), RTreeError> {
    data.seek(SeekFrom::Start(node_offset))?;
    let mut node_header = [0u8; 4];
    data.read_exact(&mut node_header)?;
    let is_leaf = node_header[0] == 1;
    let count = match header.endianness {
        Endianness::Little => u16::from_le_bytes([node_header[2], node_header[3]]),
        Endianness::Big => u16::from_be_bytes([node_header[2], node_header[3]]),
    };

    if is_leaf {
        let item_size = 32usize;
        let mut buf = vec![0u8; item_size * count as usize];
        data.read_exact(&mut buf)?;
        for item in buf.chunks(item_size) {
            let bbox = read_bbox(header.endianness, &item[0..16]);
            if bbox.intersects(query) {
                let offset = read_u64(header.endianness, &item[16..24]);
                let size = read_u64(header.endianness, &item[24..32]);
                out.push(RTreeBlock { offset, size });
            }
        }
    } else {
        let item_size = 24usize;
        let mut buf = vec![0u8; item_size * count as usize];
        data.read_exact(&mut buf)?;
        let mut children = Vec::with_capacity(count as usize);
        for item in buf.chunks(item_size) {
            let bbox = read_bbox(header.endianness, &item[0..16]);
            let child_offset = read_u64(header.endianness, &item[16..24]);
            children.push((bbox, child_offset));
        }
        for (bbox, child_offset) in children {
            if bbox.intersects(query) {
                visit_node(data, header, child_offset, query, out)?;
            }
        }
    }
    Ok(())
}
