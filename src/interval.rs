//! Genomic interval arithmetic shared by the R+-tree and the query/summarize
//! engine.
//!
//! `compare_position`/`GenomicBox::intersects` below are a two-field
//! lexicographic comparison over `(chrom_ix, base)`, used to decide R+-tree
//! node overlap; collecting them into one type keeps the B+-tree, R+-tree,
//! and query engine agreeing on a single definition of "overlaps".

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval start ({start}) must be less than end ({end})")]
    Empty { start: u32, end: u32 },
}

/// A half-open range `[start, end)` on a single chromosome.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChromosomeInterval {
    pub chrom_ix: u32,
    pub start: u32,
    pub end: u32,
}

impl ChromosomeInterval {
    pub fn new(chrom_ix: u32, start: u32, end: u32) -> Result<Self, IntervalError> {
        if start >= end {
            return Err(IntervalError::Empty { start, end });
        }
        Ok(ChromosomeInterval {
            chrom_ix,
            start,
            end,
        })
    }

    pub fn length(&self) -> u32 {
        self.end - self.start
    }

    pub fn intersects(&self, other: &ChromosomeInterval) -> bool {
        self.chrom_ix == other.chrom_ix && self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: &ChromosomeInterval) -> Option<ChromosomeInterval> {
        if !self.intersects(other) {
            return None;
        }
        Some(ChromosomeInterval {
            chrom_ix: self.chrom_ix,
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    pub fn contains(&self, other: &ChromosomeInterval) -> bool {
        self.chrom_ix == other.chrom_ix && self.start <= other.start && other.end <= self.end
    }

    pub fn union(&self, other: &ChromosomeInterval) -> GenomicBox {
        GenomicBox::from(*self).union(&GenomicBox::from(*other))
    }

    /// Partitions `[start, end)` into `n` disjoint, covering sub-intervals of
    /// near-equal width. When `length % n == 0` the partition is exactly
    /// equal-width (integer division is exact in that case); otherwise each
    /// boundary is rounded, distributing the remainder across bins rather
    /// than concentrating it in the last one.
    pub fn slice(&self, n: u32) -> Vec<ChromosomeInterval> {
        assert!(n > 0, "slice count must be positive");
        let length = self.length() as u64;
        let n64 = n as u64;
        let mut out = Vec::with_capacity(n as usize);
        let mut prev_end = self.start;
        for i in 1..=n64 {
            let boundary = if length % n64 == 0 {
                self.start + ((length * i) / n64) as u32
            } else {
                let w = length as f64 / n64 as f64;
                (self.start as f64 + (i as f64 * w).round()) as u32
            };
            let boundary = boundary.min(self.end);
            let start = prev_end;
            let end = if i == n64 { self.end } else { boundary.max(start) };
            out.push(ChromosomeInterval {
                chrom_ix: self.chrom_ix,
                start,
                end,
            });
            prev_end = end;
        }
        out
    }
}

/// The bounding box stored in an R+-tree node: a position range that may
/// straddle a chromosome boundary. Ordering between two positions is
/// `(chrom_ix, base)` lexicographic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GenomicBox {
    pub start_chrom_ix: u32,
    pub start_base: u32,
    pub end_chrom_ix: u32,
    pub end_base: u32,
}

impl From<ChromosomeInterval> for GenomicBox {
    fn from(iv: ChromosomeInterval) -> Self {
        GenomicBox {
            start_chrom_ix: iv.chrom_ix,
            start_base: iv.start,
            end_chrom_ix: iv.chrom_ix,
            end_base: iv.end,
        }
    }
}

#[inline]
fn compare_position(chrom1: u32, base1: u32, chrom2: u32, base2: u32) -> std::cmp::Ordering {
    (chrom1, base1).cmp(&(chrom2, base2))
}

impl GenomicBox {
    /// True when `self` and `other` share at least one base: a two-sided
    /// lexicographic test equivalent to `self.start <= other.end &&
    /// self.end >= other.start`, compared position-wise rather than
    /// byte-wise.
    pub fn intersects(&self, other: &GenomicBox) -> bool {
        compare_position(
            self.start_chrom_ix,
            self.start_base,
            other.end_chrom_ix,
            other.end_base,
        ) != std::cmp::Ordering::Greater
            && compare_position(
                self.end_chrom_ix,
                self.end_base,
                other.start_chrom_ix,
                other.start_base,
            ) != std::cmp::Ordering::Less
    }

    pub fn union(&self, other: &GenomicBox) -> GenomicBox {
        let (start_chrom_ix, start_base) = if compare_position(
            self.start_chrom_ix,
            self.start_base,
            other.start_chrom_ix,
            other.start_base,
        ) == std::cmp::Ordering::Greater
        {
            (other.start_chrom_ix, other.start_base)
        } else {
            (self.start_chrom_ix, self.start_base)
        };
        let (end_chrom_ix, end_base) = if compare_position(
            self.end_chrom_ix,
            self.end_base,
            other.end_chrom_ix,
            other.end_base,
        ) == std::cmp::Ordering::Less
        {
            (other.end_chrom_ix, other.end_base)
        } else {
            (self.end_chrom_ix, self.end_base)
        };
        GenomicBox {
            start_chrom_ix,
            start_base,
            end_chrom_ix,
            end_base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_interval() {
        assert_eq!(
            ChromosomeInterval::new(0, 10, 10),
            Err(IntervalError::Empty { start: 10, end: 10 })
        );
    }

    #[test]
    fn intersects_is_symmetric_same_chrom_only() {
        let a = ChromosomeInterval::new(0, 100, 200).unwrap();
        let b = ChromosomeInterval::new(0, 150, 250).unwrap();
        let c = ChromosomeInterval::new(1, 150, 250).unwrap();
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn slice_exact_division_is_equal_width() {
        let iv = ChromosomeInterval::new(0, 0, 100).unwrap();
        let parts = iv.slice(4);
        assert_eq!(parts.len(), 4);
        for p in &parts {
            assert_eq!(p.length(), 25);
        }
    }

    #[test]
    fn slice_is_disjoint_and_covering() {
        let iv = ChromosomeInterval::new(0, 7, 103).unwrap();
        let parts = iv.slice(5);
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0].start, iv.start);
        assert_eq!(parts[parts.len() - 1].end, iv.end);
        for w in parts.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn genomic_box_intersects_across_chrom_boundary() {
        let a = GenomicBox {
            start_chrom_ix: 0,
            start_base: 900,
            end_chrom_ix: 1,
            end_base: 100,
        };
        let b = GenomicBox {
            start_chrom_ix: 1,
            start_base: 0,
            end_chrom_ix: 1,
            end_base: 50,
        };
        assert!(a.intersects(&b));
    }
}
