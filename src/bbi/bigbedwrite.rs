//! The bigBed writer pipeline: one forward pass plus three fix-up passes.
//!
//! The chromosome B+-tree is a true multi-level build via
//! [`crate::bplustree`], and the zoom pyramid is built by re-summarizing the
//! file just written rather than accumulating reduction levels inline
//! during pass 1, so the pyramid builder goes through the same
//! `get_interval` surface any other caller would use.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use byteordered::{ByteOrdered, Endianness};
use thiserror::Error;

use crate::bbi::bigbedread::{BigBedRead, BigBedReadOpenError};
use crate::bbi::{BedEntry, ZoomHeader, BIGBED_MAGIC};
use crate::bplustree::{write_b_plus_tree, BPlusTreeItem};
use crate::byteio::{ByteWriter, Compression};
use crate::interval::GenomicBox;
use crate::rtree::{write_r_tree, RTreeLeaf};
use crate::summary::{Summary, ZoomRecord};

/// Tunables for a single bigBed write: compression, slot/block sizing, zoom
/// pyramid depth, explicit byte order, and a cooperative cancellation hook
/// checked between chromosomes.
#[derive(Clone)]
pub struct BigBedWriteOptions {
    pub compression: Compression,
    pub items_per_slot: u32,
    pub block_size: u32,
    pub zoom_level_count: u32,
    pub byte_order: Endianness,
    pub cancel: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Default for BigBedWriteOptions {
    fn default() -> Self {
        BigBedWriteOptions {
            compression: Compression::Deflate,
            items_per_slot: 512,
            block_size: 256,
            zoom_level_count: 10,
            byte_order: Endianness::Little,
            cancel: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum BigBedWriteError {
    #[error("chromosomes passed to write() must be a superset of every entry's chromosome")]
    UnknownChrom(String),
    #[error("entries for {chrom:?} are not sorted by start: {prev_start} appears before {start}")]
    Unsorted {
        chrom: String,
        prev_start: u32,
        start: u32,
    },
    #[error("write was cancelled")]
    Cancelled,
    #[error(transparent)]
    ReopenForZoom(#[from] BigBedReadOpenError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub struct BigBedWrite {
    path: PathBuf,
    pub options: BigBedWriteOptions,
}

impl BigBedWrite {
    pub fn create_file(path: impl Into<PathBuf>, options: BigBedWriteOptions) -> Self {
        BigBedWrite {
            path: path.into(),
            options,
        }
    }

    fn check_cancel(&self) -> Result<(), BigBedWriteError> {
        if let Some(cancel) = &self.options.cancel {
            if cancel() {
                return Err(BigBedWriteError::Cancelled);
            }
        }
        Ok(())
    }

    /// Writes a full bigBed file: chrom sizes (name -> length) and, per
    /// chromosome, the already-sorted `BedEntry`s for it. `chrom_sizes`
    /// must contain every chromosome appearing in `entries`.
    pub fn write(
        &self,
        chrom_sizes: BTreeMap<String, u32>,
        entries: BTreeMap<String, Vec<BedEntry>>,
    ) -> Result<(), BigBedWriteError> {
        for (chrom, chrom_entries) in &entries {
            if !chrom_sizes.contains_key(chrom) {
                return Err(BigBedWriteError::UnknownChrom(chrom.clone()));
            }
            for pair in chrom_entries.windows(2) {
                if pair[1].start < pair[0].start {
                    return Err(BigBedWriteError::Unsorted {
                        chrom: chrom.clone(),
                        prev_start: pair[0].start,
                        start: pair[1].start,
                    });
                }
            }
        }

        let mut chrom_ids: Vec<(String, u32, u32)> = chrom_sizes
            .iter()
            .enumerate()
            .map(|(ix, (name, size))| (name.clone(), ix as u32, *size))
            .collect();
        chrom_ids.sort_by(|a, b| a.0.cmp(&b.0));
        let chrom_id_of = |name: &str| -> u32 {
            chrom_ids.iter().find(|(n, ..)| n == name).unwrap().1
        };

        let file = File::create(&self.path)?;
        let mut writer = ByteWriter::new(file, self.options.byte_order);

        // Pass 1: reserve header + zoom-table slots, write the B+-tree,
        // then stream data blocks while collecting R+-tree leaves and a
        // running total summary.
        writer.skip_bytes(64, 0)?;
        let zoom_table_offset = writer.tell()?;
        writer.skip_bytes(24 * self.options.zoom_level_count as usize, 0)?;

        let chromosome_tree_offset = writer.tell()?;
        let tree_items: Vec<BPlusTreeItem> = chrom_ids
            .iter()
            .map(|(name, id, size)| BPlusTreeItem {
                name: name.clone(),
                id: *id,
                size: *size,
            })
            .collect();
        write_b_plus_tree(&mut writer, tree_items, self.options.block_size)?;

        let full_data_offset = writer.tell()?;
        let total_items: u64 = entries.values().map(|v| v.len() as u64).sum();
        writer.write_u64(total_items)?;

        let mut leaves = Vec::new();
        let mut total_summary = Summary::identity();
        let mut max_uncompressed: u32 = 0;
        for (chrom_name, chrom_entries) in &entries {
            self.check_cancel()?;
            let chrom_ix = chrom_id_of(chrom_name);
            for chunk in chrom_entries.chunks(self.options.items_per_slot.max(1) as usize) {
                let mut cursor = ByteOrdered::runtime(Vec::new(), self.options.byte_order);
                for entry in chunk {
                    cursor.write_u32(chrom_ix)?;
                    cursor.write_u32(entry.start)?;
                    cursor.write_u32(entry.end)?;
                    cursor.write_all(entry.rest.as_bytes())?;
                    cursor.write_u8(0)?;
                    total_summary = total_summary.merge(&Summary::single(
                        (entry.end - entry.start) as u64,
                        1.0,
                    ));
                }
                let raw = cursor.into_inner();
                let data_offset = writer.tell()?;
                writer.write_compressed_block(&raw, self.options.compression)?;
                let data_size = writer.tell()? - data_offset;
                max_uncompressed = max_uncompressed.max(raw.len() as u32);
                let first = &chunk[0];
                let last = &chunk[chunk.len() - 1];
                leaves.push(RTreeLeaf {
                    bbox: GenomicBox {
                        start_chrom_ix: chrom_ix,
                        start_base: first.start,
                        end_chrom_ix: chrom_ix,
                        end_base: last.end,
                    },
                    data_offset,
                    data_size,
                });
            }
        }

        let full_index_offset = writer.tell()?;
        write_r_tree(
            &mut writer,
            leaves,
            self.options.block_size,
            self.options.items_per_slot,
            full_index_offset,
        )?;

        let auto_sql_offset = 0u64;
        let total_summary_offset = writer.tell()?;
        writer.skip_bytes(40, 0)?;

        writer.get_mut().flush()?;

        // Pass 3: zoom pyramid, built by re-summarizing the file just
        // written rather than accumulating reduction levels inline above.
        let zoom_headers = self.build_zoom_pyramid(&mut writer, &chrom_ids, &total_summary)?;

        // Pass 2: header fixup.
        writer.seek_to(0)?;
        writer.write_u32(match self.options.byte_order {
            Endianness::Little => BIGBED_MAGIC.0,
            Endianness::Big => BIGBED_MAGIC.1,
        })?;
        writer.write_u16(self.options.compression.version())?;
        writer.write_u16(zoom_headers.len() as u16)?;
        writer.write_u64(chromosome_tree_offset)?;
        writer.write_u64(full_data_offset)?;
        writer.write_u64(full_index_offset)?;
        writer.write_u16(3)?;
        writer.write_u16(3)?;
        writer.write_u64(auto_sql_offset)?;
        writer.write_u64(total_summary_offset)?;
        writer.write_u32(if self.options.compression == Compression::None {
            0
        } else {
            max_uncompressed
        })?;
        writer.write_u64(0)?;

        writer.seek_to(zoom_table_offset)?;
        for header in &zoom_headers {
            writer.write_u32(header.reduction_level)?;
            writer.write_u32(0)?;
            writer.write_u64(header.data_offset)?;
            writer.write_u64(header.index_offset)?;
        }

        // Pass 4: total-summary fixup (already computed during pass 1;
        // this is where it lands on disk).
        writer.seek_to(total_summary_offset)?;
        writer.write_u64(total_summary.bases_covered)?;
        writer.write_f64(if total_summary.is_empty() { 0.0 } else { total_summary.min_val })?;
        writer.write_f64(if total_summary.is_empty() { 0.0 } else { total_summary.max_val })?;
        writer.write_f64(total_summary.sum)?;
        writer.write_f64(total_summary.sum_squares)?;

        writer.get_mut().flush()?;
        Ok(())
    }

    /// Builds each zoom level by reopening the file written so far and
    /// re-querying it window by window, rather than folding summaries
    /// inline during the main data pass. The initial reduction is
    /// `max(1, sum/count) * 10` per bigBed's coverage-depth convention;
    /// each subsequent level multiplies by a fixed step factor.
    fn build_zoom_pyramid<W: Write + Seek>(
        &self,
        writer: &mut ByteWriter<W>,
        chrom_ids: &[(String, u32, u32)],
        total_summary: &Summary,
    ) -> Result<Vec<ZoomHeader>, BigBedWriteError> {
        const STEP_FACTOR: u32 = 4;
        writer.get_mut().flush()?;

        let mean = if total_summary.bases_covered > 0 {
            (total_summary.sum / total_summary.bases_covered as f64).max(1.0)
        } else {
            1.0
        };
        let initial_reduction = (mean as u32).max(1) * 10;

        let mut headers = Vec::new();
        let mut reduction = initial_reduction;
        for _ in 0..self.options.zoom_level_count {
            self.check_cancel()?;
            let mut reader = BigBedRead::open(File::open(&self.path)?)?;
            let mut records: Vec<ZoomRecord> = Vec::new();

            for (name, id, size) in chrom_ids {
                let mut pos = 0u32;
                while pos < *size {
                    let window_end = (pos + reduction).min(*size);
                    let entries: Vec<_> = reader
                        .get_interval(name, pos, window_end, true)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                    let mut summary = Summary::identity();
                    for entry in &entries {
                        let s = entry.start.max(pos);
                        let e = entry.end.min(window_end);
                        if e > s {
                            summary = summary.merge(&Summary::single((e - s) as u64, 1.0));
                        }
                    }
                    if !summary.is_empty() {
                        records.push(ZoomRecord {
                            chrom: *id,
                            start: pos,
                            end: window_end,
                            summary,
                        });
                    }
                    pos = window_end;
                }
            }

            if records.is_empty() {
                break;
            }

            let mut leaves = Vec::new();
            for chunk in records.chunks(self.options.items_per_slot.max(1) as usize) {
                let mut cursor = ByteOrdered::runtime(
                    Vec::with_capacity(chunk.len() * ZoomRecord::ENCODED_SIZE),
                    self.options.byte_order,
                );
                for record in chunk {
                    cursor.write_u32(record.chrom)?;
                    cursor.write_u32(record.start)?;
                    cursor.write_u32(record.end)?;
                    cursor.write_u32(record.summary.bases_covered as u32)?;
                    cursor.write_f32(record.summary.min_val as f32)?;
                    cursor.write_f32(record.summary.max_val as f32)?;
                    cursor.write_f32(record.summary.sum as f32)?;
                    cursor.write_f32(record.summary.sum_squares as f32)?;
                }
                let raw = cursor.into_inner();
                let data_offset = writer.tell()?;
                writer.write_compressed_block(&raw, self.options.compression)?;
                let data_size = writer.tell()? - data_offset;
                let first = &chunk[0];
                let last = &chunk[chunk.len() - 1];
                leaves.push(RTreeLeaf {
                    bbox: GenomicBox {
                        start_chrom_ix: first.chrom,
                        start_base: first.start,
                        end_chrom_ix: last.chrom,
                        end_base: last.end,
                    },
                    data_offset,
                    data_size,
                });
            }

            let data_offset = leaves[0].data_offset;
            let index_offset = writer.tell()?;
            write_r_tree(
                writer,
                leaves,
                self.options.block_size,
                self.options.items_per_slot,
                index_offset,
            )?;
            headers.push(ZoomHeader {
                reduction_level: reduction,
                data_offset,
                index_offset,
            });
            reduction = reduction.saturating_mul(STEP_FACTOR);
        }

        Ok(headers)
    }
}
