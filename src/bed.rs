//! Interpretation of a BigBed record's `rest` column.
//!
//! The container only ever stores `rest` as an opaque tab-separated string
//! (see [`crate::bbi::BedEntry`]); this module is an optional "extended BED"
//! decode/validate layer for callers that want typed access to the standard
//! name/score/strand/thickStart/thickEnd/itemRgb columns, not a general BED
//! text parser.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BedValueError {
    #[error("score {0} is outside the valid range 0..=1000")]
    ScoreOutOfRange(i32),
    #[error("strand {0:?} is not one of '+', '-', '.'")]
    InvalidStrand(String),
    #[error("blockCount ({block_count}) does not match blockSizes.len() ({sizes}) or blockStarts.len() ({starts})")]
    MismatchedBlockArrays {
        block_count: usize,
        sizes: usize,
        starts: usize,
    },
    #[error("expected at least {expected} tab-separated fields in rest, found {found}")]
    TooFewFields { expected: usize, found: usize },
    #[error("field {0:?} is not a valid integer")]
    NotAnInteger(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
    None,
}

impl Strand {
    pub fn parse(s: &str) -> Result<Strand, BedValueError> {
        match s {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            "." => Ok(Strand::None),
            other => Err(BedValueError::InvalidStrand(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
            Strand::None => ".",
        }
    }
}

/// The BED3+ "rest" columns unpacked into their named fields, per the
/// spec's external-interfaces description of the extended representation.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedBedFields {
    pub name: String,
    pub score: u16,
    pub strand: Strand,
    pub thick_start: u32,
    pub thick_end: u32,
    pub item_rgb: String,
    pub block_sizes: Vec<u32>,
    pub block_starts: Vec<u32>,
    pub extra: Vec<String>,
}

fn parse_u32_field(field: &str) -> Result<u32, BedValueError> {
    field
        .parse::<u32>()
        .map_err(|_| BedValueError::NotAnInteger(field.to_string()))
}

/// Validates and unpacks `rest` (the tab-separated columns 4+ of a BED line)
/// into its named fields. Returns `Ok(None)` when `rest` is empty (a bare
/// BED3 record, which is valid and carries no extended fields).
pub fn parse_extended(rest: &str) -> Result<Option<ExtendedBedFields>, BedValueError> {
    if rest.is_empty() {
        return Ok(None);
    }
    let cols: Vec<&str> = rest.split('\t').collect();
    if cols.len() < 6 {
        return Err(BedValueError::TooFewFields {
            expected: 6,
            found: cols.len(),
        });
    }
    let name = cols[0].to_string();
    let score: i32 = cols[1]
        .parse()
        .map_err(|_| BedValueError::NotAnInteger(cols[1].to_string()))?;
    if !(0..=1000).contains(&score) {
        return Err(BedValueError::ScoreOutOfRange(score));
    }
    let strand = Strand::parse(cols[2])?;
    let thick_start = parse_u32_field(cols[3])?;
    let thick_end = parse_u32_field(cols[4])?;
    let item_rgb = cols[5].to_string();

    let (block_sizes, block_starts, extra_start) = if cols.len() >= 9 {
        let block_count: usize = cols[6]
            .parse()
            .map_err(|_| BedValueError::NotAnInteger(cols[6].to_string()))?;
        let sizes: Vec<u32> = cols[7]
            .trim_end_matches(',')
            .split(',')
            .filter(|s| !s.is_empty())
            .map(parse_u32_field)
            .collect::<Result<_, _>>()?;
        let starts: Vec<u32> = cols[8]
            .trim_end_matches(',')
            .split(',')
            .filter(|s| !s.is_empty())
            .map(parse_u32_field)
            .collect::<Result<_, _>>()?;
        if sizes.len() != block_count || starts.len() != block_count {
            return Err(BedValueError::MismatchedBlockArrays {
                block_count,
                sizes: sizes.len(),
                starts: starts.len(),
            });
        }
        (sizes, starts, 9)
    } else {
        (Vec::new(), Vec::new(), 6)
    };

    let extra = cols[extra_start..].iter().map(|s| s.to_string()).collect();

    Ok(Some(ExtendedBedFields {
        name,
        score: score as u16,
        strand,
        thick_start,
        thick_end,
        item_rgb,
        block_sizes,
        block_starts,
        extra,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_bed3_rest_is_none() {
        assert_eq!(parse_extended("").unwrap(), None);
    }

    #[test]
    fn rejects_score_out_of_range() {
        let rest = "name\t5000\t+\t0\t100\t0,0,0";
        assert_eq!(
            parse_extended(rest).unwrap_err(),
            BedValueError::ScoreOutOfRange(5000)
        );
    }

    #[test]
    fn rejects_invalid_strand() {
        let rest = "name\t500\t?\t0\t100\t0,0,0";
        assert!(matches!(
            parse_extended(rest).unwrap_err(),
            BedValueError::InvalidStrand(_)
        ));
    }

    #[test]
    fn parses_blocks_when_present() {
        let rest = "name\t500\t+\t0\t100\t0,0,0\t2\t10,20,\t0,50,";
        let fields = parse_extended(rest).unwrap().unwrap();
        assert_eq!(fields.block_sizes, vec![10, 20]);
        assert_eq!(fields.block_starts, vec![0, 50]);
    }

    #[test]
    fn rejects_mismatched_block_arrays() {
        let rest = "name\t500\t+\t0\t100\t0,0,0\t3\t10,20,\t0,50,";
        assert!(matches!(
            parse_extended(rest).unwrap_err(),
            BedValueError::MismatchedBlockArrays { .. }
        ));
    }
}
