use std::io::{Read, Seek, SeekFrom};

use byteordered::Endianness;
use bytes::{Buf, BytesMut};

use crate::bbi::CHROM_TREE_MAGIC;

use super::BPlusTreeError;

/// A decoded chromosome dictionary entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChromTreeItem {
    pub name: String,
    pub id: u32,
    pub size: u32,
}

struct TreeHeader {
    endianness: Endianness,
    block_size: u32,
    key_size: u32,
    item_count: u64,
}

fn read_header<R: Read>(data: &mut R) -> Result<TreeHeader, BPlusTreeError> {
    let mut buf = [0u8; 32];
    data.read_exact(&mut buf)?;
    let (endianness, magic) = {
        let le = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if le == CHROM_TREE_MAGIC {
            (Endianness::Little, le)
        } else {
            (Endianness::Big, u32::from_be_bytes(buf[0..4].try_into().unwrap()))
        }
    };
    if magic != CHROM_TREE_MAGIC {
        return Err(BPlusTreeError::BadMagic);
    }
    let mut bytes = BytesMut::from(&buf[4..][..]);
    let (block_size, key_size, _val_size, item_count) = match endianness {
        Endianness::Little => (
            bytes.get_u32_le(),
            bytes.get_u32_le(),
            bytes.get_u32_le(),
            bytes.get_u64_le(),
        ),
        Endianness::Big => (
            bytes.get_u32(),
            bytes.get_u32(),
            bytes.get_u32(),
            bytes.get_u64(),
        ),
    };
    Ok(TreeHeader {
        endianness,
        block_size,
        key_size,
        item_count,
    })
}

fn read_u32(endianness: Endianness, buf: &[u8]) -> u32 {
    match endianness {
        Endianness::Little => u32::from_le_bytes(buf.try_into().unwrap()),
        Endianness::Big => u32::from_be_bytes(buf.try_into().unwrap()),
    }
}

fn read_u64(endianness: Endianness, buf: &[u8]) -> u64 {
    match endianness {
        Endianness::Little => u64::from_le_bytes(buf.try_into().unwrap()),
        Endianness::Big => u64::from_be_bytes(buf.try_into().unwrap()),
    }
}

fn key_to_string(bytes: &[u8]) -> Result<String, BPlusTreeError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| BPlusTreeError::InvalidKey)
}

/// Reads every entry in the tree, in whatever order the leaves store them
/// (always key-sorted, since the tree was built from sorted input), via a
/// recursive descent through every internal level down to the leaves.
pub fn read_all<R: Read + Seek>(data: &mut R, tree_offset: u64) -> Result<Vec<ChromTreeItem>, BPlusTreeError> {
    data.seek(SeekFrom::Start(tree_offset))?;
    let header = read_header(data)?;
    let root_offset = tree_offset + 32;
    let mut out = Vec::with_capacity(header.item_count as usize);
    if header.item_count > 0 {
        collect_node(data, &header, root_offset, &mut out)?;
    }
    Ok(out)
}

fn collect_node<R: Read + Seek>(
    data: &mut R,
    header: &TreeHeader,
    node_offset: u64,
    out: &mut Vec<ChromTreeItem>,
) -> Result<(), BPlusTreeError> {
    data.seek(SeekFrom::Start(node_offset))?;
    let mut node_header = [0u8; 4];
    data.read_exact(&mut node_header)?;
    let is_leaf = node_header[0] == 1;
    let count = match header.endianness {
        Endianness::Little => u16::from_le_bytes([node_header[2], node_header[3]]),
        Endianness::Big => u16::from_be_bytes([node_header[2], node_header[3]]),
    };

    if is_leaf {
        let item_size = header.key_size as usize + 8;
        let mut buf = vec![0u8; item_size * count as usize];
        data.read_exact(&mut buf)?;
        for item in buf.chunks(item_size) {
            let key = key_to_string(&item[..header.key_size as usize])?;
            let id = read_u32(header.endianness, &item[header.key_size as usize..][..4]);
            let size = read_u32(header.endianness, &item[header.key_size as usize + 4..][..4]);
            out.push(ChromTreeItem { name: key, id, size });
        }
    } else {
        let item_size = header.key_size as usize + 8;
        let mut buf = vec![0u8; item_size * count as usize];
        data.read_exact(&mut buf)?;
        let mut child_offsets = Vec::with_capacity(count as usize);
        for item in buf.chunks(item_size) {
            let offset = read_u64(header.endianness, &item[header.key_size as usize..][..8]);
            child_offsets.push(offset);
        }
        for child in child_offsets {
            collect_node(data, header, child, out)?;
        }
    }
    Ok(())
}

/// Point lookup: descends by repeatedly following the child whose key is the
/// greatest one `<=` the query key, then exact-matches within the leaf.
pub fn find<R: Read + Seek>(
    data: &mut R,
    tree_offset: u64,
    name: &str,
) -> Result<Option<(u32, u32)>, BPlusTreeError> {
    data.seek(SeekFrom::Start(tree_offset))?;
    let header = read_header(data)?;
    if header.item_count == 0 {
        return Ok(None);
    }
    let root_offset = tree_offset + 32;
    find_in_node(data, &header, root_offset, name)
}

fn find_in_node<R: Read + Seek>(
    data: &mut R,
    header: &TreeHeader,
    node_offset: u64,
    name: &str,
) -> Result<Option<(u32, u32)>, BPlusTreeError> {
    data.seek(SeekFrom::Start(node_offset))?;
    let mut node_header = [0u8; 4];
    data.read_exact(&mut node_header)?;
    let is_leaf = node_header[0] == 1;
    let count = match header.endianness {
        Endianness::Little => u16::from_le_bytes([node_header[2], node_header[3]]),
        Endianness::Big => u16::from_be_bytes([node_header[2], node_header[3]]),
    };
    let item_size = header.key_size as usize + 8;
    let mut buf = vec![0u8; item_size * count as usize];
    data.read_exact(&mut buf)?;

    if is_leaf {
        for item in buf.chunks(item_size) {
            let key = key_to_string(&item[..header.key_size as usize])?;
            if key == name {
                let id = read_u32(header.endianness, &item[header.key_size as usize..][..4]);
                let size = read_u32(header.endianness, &item[header.key_size as usize + 4..][..4]);
                return Ok(Some((id, size)));
            }
        }
        return Ok(None);
    }

    let mut chosen: Option<u64> = None;
    for item in buf.chunks(item_size) {
        let key = key_to_string(&item[..header.key_size as usize])?;
        if key.as_str() <= name {
            chosen = Some(read_u64(header.endianness, &item[header.key_size as usize..][..8]));
        } else {
            break;
        }
    }
    match chosen {
        Some(child) => find_in_node(data, header, child, name),
        None => Ok(None),
    }
}
