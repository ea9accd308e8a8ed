//! The query/summarize engine: binning a genomic interval into `n` summary
//! bins, preferring a zoom-pyramid level over raw data whenever one is
//! close enough to the requested resolution.
//!
//! [`average_over_interval`] computes `size/bases/sum/mean0/mean` over an
//! arbitrary interval from raw values; [`summarize`] is an n-bin version
//! built on the same [`Summary`] monoid the zoom pyramid uses.

use crate::bbi::bbiread::{BBIRead, BBIReadError, BBIReadInternal};
use crate::bbi::bigwigread::BigWigRead;
use crate::bbi::ZoomHeader;
use crate::interval::ChromosomeInterval;
use crate::summary::Summary;
use crate::utils::reopen::SeekableRead;

/// The result of averaging a bigWig's values over a single interval: the
/// interval's length, how many bases within it are covered by some value,
/// the sum of `value * overlap_length` across every intersecting record,
/// and the two means derived from it (`mean0` over the whole interval,
/// `mean` over only the covered bases).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntervalAverage {
    pub size: u32,
    pub bases_covered: u32,
    pub sum: f64,
    pub mean0: f64,
    pub mean: f64,
}

/// Picks the coarsest zoom level whose reduction is no larger than
/// `max_reduction`, or `None` if every level is coarser than that (in which
/// case the caller should fall back to raw data).
fn best_zoom_level(zoom_headers: &[ZoomHeader], max_reduction: u32) -> Option<ZoomHeader> {
    zoom_headers
        .iter()
        .filter(|h| h.reduction_level <= max_reduction)
        .max_by_key(|h| h.reduction_level)
        .copied()
}

/// Averages every value intersecting `interval` into a single
/// [`IntervalAverage`], always reading raw (non-zoom) data — appropriate for
/// a single interval rather than a dense track of bins, where the zoom
/// pyramid's coarser granularity wouldn't help.
pub fn average_over_interval<R: SeekableRead>(
    bigwig: &mut BigWigRead<R>,
    interval: &ChromosomeInterval,
) -> Result<IntervalAverage, BBIReadError> {
    let chrom_name = bigwig
        .get_info()
        .chrom_info
        .iter()
        .find(|c| c.id == interval.chrom_ix)
        .map(|c| c.name.clone())
        .ok_or_else(|| BBIReadError::InvalidFile("unknown chromosome id".to_owned()))?;

    let mut sum = 0.0f64;
    let mut bases_covered: u32 = 0;
    for value in bigwig.get_interval(&chrom_name, interval.start, interval.end, true)? {
        let value = value?;
        let overlap_start = value.start.max(interval.start);
        let overlap_end = value.end.min(interval.end);
        if overlap_end > overlap_start {
            let overlap_len = overlap_end - overlap_start;
            sum += value.value as f64 * overlap_len as f64;
            bases_covered += overlap_len;
        }
    }

    let size = interval.length();
    Ok(IntervalAverage {
        size,
        bases_covered,
        sum,
        mean0: if size > 0 { sum / size as f64 } else { 0.0 },
        mean: if bases_covered > 0 {
            sum / bases_covered as f64
        } else {
            0.0
        },
    })
}

/// Splits `[start, end)` on `chrom_name` into `n_bins` near-equal-width
/// sub-intervals and returns one [`Summary`] per bin, preferring the
/// coarsest zoom level no finer than `(end - start) / n_bins` and falling
/// back to raw values when no zoom level is coarse enough to help (or when
/// `exact` is requested).
pub fn summarize<R: SeekableRead>(
    bigwig: &mut BigWigRead<R>,
    chrom_name: &str,
    start: u32,
    end: u32,
    n_bins: u32,
    exact: bool,
) -> Result<Vec<Summary>, BBIReadError> {
    let chrom_ix = bigwig.get_info().chrom_id(chrom_name)?;
    let query = ChromosomeInterval::new(chrom_ix, start, end)
        .map_err(|e| BBIReadError::InvalidFile(e.to_string()))?;
    if n_bins as u64 > query.length() as u64 {
        return Err(BBIReadError::InvalidFile(format!(
            "n_bins ({n_bins}) must not exceed the interval length ({})",
            query.length()
        )));
    }
    let bins = query.slice(n_bins.max(1));

    // A zoom level is only coarse enough to help if at least two of its
    // records fall in a bin on average, so standard deviation stays defined.
    let desired_reduction = ((end - start) / (2 * n_bins.max(1))).max(1);
    let zoom_headers = bigwig.get_info().zoom_headers.clone();
    let zoom_header = if exact {
        None
    } else {
        best_zoom_level(&zoom_headers, desired_reduction)
    };

    let mut summaries = vec![Summary::identity(); bins.len()];

    match zoom_header {
        Some(zoom_header) => {
            for rec in bigwig.get_zoom_interval(chrom_name, start, end, zoom_header.reduction_level)? {
                let rec = rec?;
                accumulate_into_bins(&mut summaries, &bins, rec.start, rec.end, rec.summary);
            }
        }
        None => {
            for value in bigwig.get_interval(chrom_name, start, end, true)? {
                let value = value?;
                let summary = Summary::single(
                    (value.end - value.start) as u64,
                    value.value as f64,
                );
                accumulate_into_bins(&mut summaries, &bins, value.start, value.end, summary);
            }
        }
    }

    Ok(summaries)
}

/// Folds one source record's summary into every bin it overlaps, scaling
/// `bases_covered`/`sum`/`sum_squares` by the fraction of the record that
/// falls in each bin (min/max pass through unscaled, per the monoid's
/// definition).
fn accumulate_into_bins(
    summaries: &mut [Summary],
    bins: &[ChromosomeInterval],
    rec_start: u32,
    rec_end: u32,
    summary: Summary,
) {
    let rec_len = (rec_end - rec_start).max(1) as f64;
    for (bin, acc) in bins.iter().zip(summaries.iter_mut()) {
        let overlap_start = rec_start.max(bin.start);
        let overlap_end = rec_end.min(bin.end);
        if overlap_end <= overlap_start {
            continue;
        }
        let fraction = (overlap_end - overlap_start) as f64 / rec_len;
        let scaled = Summary {
            total_items: summary.total_items,
            bases_covered: ((overlap_end - overlap_start) as u64).max(0),
            min_val: summary.min_val,
            max_val: summary.max_val,
            sum: summary.sum * fraction,
            sum_squares: summary.sum_squares * fraction,
        };
        *acc = acc.merge(&scaled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_zoom_level_prefers_coarsest_within_budget() {
        let headers = vec![
            ZoomHeader {
                reduction_level: 10,
                data_offset: 0,
                index_offset: 0,
            },
            ZoomHeader {
                reduction_level: 100,
                data_offset: 0,
                index_offset: 0,
            },
            ZoomHeader {
                reduction_level: 1000,
                data_offset: 0,
                index_offset: 0,
            },
        ];
        let chosen = best_zoom_level(&headers, 500).unwrap();
        assert_eq!(chosen.reduction_level, 100);
    }

    #[test]
    fn best_zoom_level_none_when_all_too_coarse() {
        let headers = vec![ZoomHeader {
            reduction_level: 1000,
            data_offset: 0,
            index_offset: 0,
        }];
        assert!(best_zoom_level(&headers, 10).is_none());
    }
}
