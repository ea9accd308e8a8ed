//! The bigWig writer pipeline: the same forward-pass-plus-fixups shape as
//! [`crate::bbi::bigbedwrite`], writing `variableStep`/`fixedStep` sections
//! (`type = 2`/`3`) and a fixed initial zoom reduction of 8 (bigWig has no
//! natural "coverage depth" to derive one from, unlike bigBed).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use byteordered::{ByteOrdered, Endianness};
use thiserror::Error;

use crate::bbi::bigwigread::{BigWigRead, BigWigReadOpenError};
use crate::bbi::{Value, ZoomHeader, BIGWIG_MAGIC};
use crate::bplustree::{write_b_plus_tree, BPlusTreeItem};
use crate::byteio::{ByteWriter, Compression};
use crate::interval::GenomicBox;
use crate::rtree::{write_r_tree, RTreeLeaf};
use crate::summary::{Summary, ZoomRecord};

const SECTION_VAR_STEP: u8 = 2;
const SECTION_FIXED_STEP: u8 = 3;

/// A WIG section as submitted to the writer. `BedGraph` exists so the type
/// mirrors every section shape the reader can decode, but it is rejected at
/// write time (`BigWigWriteError::NotSupported`): the UCSC toolchain's own
/// bigWig writer never emits `type = 1` blocks.
#[derive(Clone, Debug, PartialEq)]
pub enum WigSection {
    BedGraph(Vec<Value>),
    VariableStep { span: u32, items: Vec<(u32, f32)> },
    FixedStep {
        start: u32,
        step: u32,
        span: u32,
        values: Vec<f32>,
    },
}

impl WigSection {
    /// The first genomic position this section covers, used to validate
    /// that a chromosome's sections are submitted in sorted order.
    fn start(&self) -> u32 {
        match self {
            WigSection::BedGraph(items) => items.first().map(|v| v.start).unwrap_or(0),
            WigSection::VariableStep { items, .. } => items.first().map(|(pos, _)| *pos).unwrap_or(0),
            WigSection::FixedStep { start, .. } => *start,
        }
    }
}

#[derive(Clone)]
pub struct BigWigWriteOptions {
    pub compression: Compression,
    pub items_per_slot: u32,
    pub block_size: u32,
    pub zoom_level_count: u32,
    pub byte_order: Endianness,
    pub cancel: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Default for BigWigWriteOptions {
    fn default() -> Self {
        BigWigWriteOptions {
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
pub enum BigWigWriteError {
    #[error("chromosomes passed to write() must be a superset of every section's chromosome")]
    UnknownChrom(String),
    #[error("sections for {chrom:?} are not sorted by start: {prev_start} appears before {start}")]
    Unsorted {
        chrom: String,
        prev_start: u32,
        start: u32,
    },
    #[error("bedGraph sections are not supported for write (chrom {0:?})")]
    NotSupported(String),
    #[error("write was cancelled")]
    Cancelled,
    #[error(transparent)]
    ReopenForZoom(#[from] BigWigReadOpenError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub struct BigWigWrite {
    path: PathBuf,
    pub options: BigWigWriteOptions,
}

impl BigWigWrite {
    pub fn create_file(path: impl Into<PathBuf>, options: BigWigWriteOptions) -> Self {
        BigWigWrite {
            path: path.into(),
            options,
        }
    }

    fn check_cancel(&self) -> Result<(), BigWigWriteError> {
        if let Some(cancel) = &self.options.cancel {
            if cancel() {
                return Err(BigWigWriteError::Cancelled);
            }
        }
        Ok(())
    }

    /// Writes a full bigWig file from per-chromosome, already-sorted WIG
    /// sections. `BedGraph` sections are rejected with `NotSupported`.
    pub fn write(
        &self,
        chrom_sizes: BTreeMap<String, u32>,
        sections: BTreeMap<String, Vec<WigSection>>,
    ) -> Result<(), BigWigWriteError> {
        for (chrom, chrom_sections) in &sections {
            if !chrom_sizes.contains_key(chrom) {
                return Err(BigWigWriteError::UnknownChrom(chrom.clone()));
            }
            for pair in chrom_sections.windows(2) {
                if pair[1].start() < pair[0].start() {
                    return Err(BigWigWriteError::Unsorted {
                        chrom: chrom.clone(),
                        prev_start: pair[0].start(),
                        start: pair[1].start(),
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
        let total_items: u64 = sections
            .values()
            .flat_map(|s| s.iter())
            .map(|section| match section {
                WigSection::BedGraph(items) => items.len() as u64,
                WigSection::VariableStep { items, .. } => items.len() as u64,
                WigSection::FixedStep { values, .. } => values.len() as u64,
            })
            .sum();
        writer.write_u64(total_items)?;

        // The on-disk section header's `count` field is a u16, so a single
        // caller-submitted section bigger than one slot is spliced across
        // several blocks, each with its own adjusted header.
        let max_items_per_block =
            (self.options.items_per_slot.max(1) as usize).min(u16::MAX as usize);

        let mut leaves = Vec::new();
        let mut total_summary = Summary::identity();
        let mut max_uncompressed: u32 = 0;
        for (chrom_name, chrom_sections) in &sections {
            self.check_cancel()?;
            let chrom_ix = chrom_id_of(chrom_name);
            for section in chrom_sections {
                self.check_cancel()?;
                match section {
                    WigSection::BedGraph(_) => {
                        return Err(BigWigWriteError::NotSupported(chrom_name.clone()));
                    }
                    WigSection::VariableStep { span, items } => {
                        for chunk in items.chunks(max_items_per_block) {
                            let chrom_start = chunk[0].0;
                            let chrom_end = chunk[chunk.len() - 1].0 + span;
                            let mut cursor = ByteOrdered::runtime(Vec::new(), self.options.byte_order);
                            cursor.write_u32(chrom_ix)?;
                            cursor.write_u32(chrom_start)?;
                            cursor.write_u32(chrom_end)?;
                            cursor.write_u32(0)?; // itemStep, unused for variableStep sections
                            cursor.write_u32(*span)?;
                            cursor.write_u8(SECTION_VAR_STEP)?;
                            cursor.write_u8(0)?;
                            cursor.write_u16(chunk.len() as u16)?;
                            for (pos, value) in chunk {
                                cursor.write_u32(*pos)?;
                                cursor.write_f32(*value)?;
                                total_summary = total_summary
                                    .merge(&Summary::single(*span as u64, *value as f64));
                            }
                            let raw = cursor.into_inner();
                            let data_offset = writer.tell()?;
                            writer.write_compressed_block(&raw, self.options.compression)?;
                            let data_size = writer.tell()? - data_offset;
                            max_uncompressed = max_uncompressed.max(raw.len() as u32);
                            leaves.push(RTreeLeaf {
                                bbox: GenomicBox {
                                    start_chrom_ix: chrom_ix,
                                    start_base: chrom_start,
                                    end_chrom_ix: chrom_ix,
                                    end_base: chrom_end,
                                },
                                data_offset,
                                data_size,
                            });
                        }
                    }
                    WigSection::FixedStep { start, step, span, values } => {
                        for (chunk_ix, chunk) in values.chunks(max_items_per_block).enumerate() {
                            let chunk_start = start + (chunk_ix * max_items_per_block) as u32 * step;
                            let chrom_start = chunk_start;
                            let chrom_end = chunk_start + (chunk.len() as u32 - 1) * step + span;
                            let mut cursor = ByteOrdered::runtime(Vec::new(), self.options.byte_order);
                            cursor.write_u32(chrom_ix)?;
                            cursor.write_u32(chrom_start)?;
                            cursor.write_u32(chrom_end)?;
                            cursor.write_u32(*step)?;
                            cursor.write_u32(*span)?;
                            cursor.write_u8(SECTION_FIXED_STEP)?;
                            cursor.write_u8(0)?;
                            cursor.write_u16(chunk.len() as u16)?;
                            for value in chunk {
                                cursor.write_f32(*value)?;
                                total_summary = total_summary
                                    .merge(&Summary::single(*span as u64, *value as f64));
                            }
                            let raw = cursor.into_inner();
                            let data_offset = writer.tell()?;
                            writer.write_compressed_block(&raw, self.options.compression)?;
                            let data_size = writer.tell()? - data_offset;
                            max_uncompressed = max_uncompressed.max(raw.len() as u32);
                            leaves.push(RTreeLeaf {
                                bbox: GenomicBox {
                                    start_chrom_ix: chrom_ix,
                                    start_base: chrom_start,
                                    end_chrom_ix: chrom_ix,
                                    end_base: chrom_end,
                                },
                                data_offset,
                                data_size,
                            });
                        }
                    }
                }
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

        let zoom_headers = self.build_zoom_pyramid(&mut writer, &chrom_ids)?;

        writer.seek_to(0)?;
        writer.write_u32(match self.options.byte_order {
            Endianness::Little => BIGWIG_MAGIC.0,
            Endianness::Big => BIGWIG_MAGIC.1,
        })?;
        writer.write_u16(self.options.compression.version())?;
        writer.write_u16(zoom_headers.len() as u16)?;
        writer.write_u64(chromosome_tree_offset)?;
        writer.write_u64(full_data_offset)?;
        writer.write_u64(full_index_offset)?;
        writer.write_u16(0)?;
        writer.write_u16(0)?;
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

        writer.seek_to(total_summary_offset)?;
        writer.write_u64(total_summary.bases_covered)?;
        writer.write_f64(if total_summary.is_empty() { 0.0 } else { total_summary.min_val })?;
        writer.write_f64(if total_summary.is_empty() { 0.0 } else { total_summary.max_val })?;
        writer.write_f64(total_summary.sum)?;
        writer.write_f64(total_summary.sum_squares)?;

        writer.get_mut().flush()?;
        Ok(())
    }

    /// Builds each zoom level from the file just written. The initial
    /// reduction is the fixed value 8 (bigWig has no coverage-depth signal
    /// to derive one from, unlike bigBed's `mean * 10`); each subsequent
    /// level multiplies by a fixed step factor.
    fn build_zoom_pyramid<W: Write + Seek>(
        &self,
        writer: &mut ByteWriter<W>,
        chrom_ids: &[(String, u32, u32)],
    ) -> Result<Vec<ZoomHeader>, BigWigWriteError> {
        const INITIAL_REDUCTION: u32 = 8;
        const STEP_FACTOR: u32 = 4;
        writer.get_mut().flush()?;

        let mut headers = Vec::new();
        let mut reduction = INITIAL_REDUCTION;
        for _ in 0..self.options.zoom_level_count {
            self.check_cancel()?;
            let mut reader = BigWigRead::open(File::open(&self.path)?)?;
            let mut records: Vec<ZoomRecord> = Vec::new();

            for (name, id, size) in chrom_ids {
                let mut pos = 0u32;
                while pos < *size {
                    let window_end = (pos + reduction).min(*size);
                    let vals: Vec<_> = reader
                        .get_interval(name, pos, window_end, true)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                    let mut summary = Summary::identity();
                    for value in &vals {
                        let s = value.start.max(pos);
                        let e = value.end.min(window_end);
                        if e > s {
                            summary = summary.merge(&Summary::single((e - s) as u64, value.value as f64));
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
