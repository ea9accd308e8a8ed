//! End-to-end bigWig round trips: value decoding, interval averaging, the
//! n-bin summarize path (including its zoom-vs-raw fallback), and the
//! fixedStep query-boundary realignment.

use std::collections::BTreeMap;

use bigtools::{
    average_over_interval, summarize, BigWigRead, BigWigWrite, BigWigWriteOptions, Value,
    WigSection,
};

fn chrom_sizes() -> BTreeMap<String, u32> {
    let mut sizes = BTreeMap::new();
    sizes.insert("chr1".to_string(), 1_000);
    sizes
}

fn step_values() -> BTreeMap<String, Vec<WigSection>> {
    let mut sections = BTreeMap::new();
    sections.insert(
        "chr1".to_string(),
        vec![WigSection::VariableStep {
            span: 10,
            items: vec![(0, 1.0), (10, 2.0), (50, 5.0)],
        }],
    );
    sections
}

#[test]
fn roundtrips_values_with_deflate() {
    let file = tempfile::NamedTempFile::new().unwrap();
    BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), step_values())
        .unwrap();

    let mut reader = BigWigRead::open_file(file.path().to_str().unwrap()).unwrap();
    let values: Vec<Value> = reader
        .get_interval("chr1", 0, 0, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        values,
        vec![
            Value { start: 0, end: 10, value: 1.0 },
            Value { start: 10, end: 20, value: 2.0 },
            Value { start: 50, end: 60, value: 5.0 },
        ]
    );
}

#[test]
fn average_over_interval_matches_hand_computed_stats() {
    let file = tempfile::NamedTempFile::new().unwrap();
    BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), step_values())
        .unwrap();

    let mut reader = BigWigRead::open_file(file.path().to_str().unwrap()).unwrap();
    let interval = bigtools::ChromosomeInterval::new(0, 0, 100).unwrap();
    let avg = average_over_interval(&mut reader, &interval).unwrap();

    // sum = 10*1.0 + 10*2.0 + 10*5.0 = 80; bases_covered = 30; size = 100
    assert_eq!(avg.size, 100);
    assert_eq!(avg.bases_covered, 30);
    assert!((avg.sum - 80.0).abs() < 1e-6);
    assert!((avg.mean0 - 0.8).abs() < 1e-6);
    assert!((avg.mean - (80.0 / 30.0)).abs() < 1e-6);
}

#[test]
fn summarize_bins_cover_every_record_exactly_once() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut sections = BTreeMap::new();
    // One value per base over [0, 100) so any binning's bases_covered sums
    // to the bin width exactly, and the zoom pyramid has real data to use.
    let items: Vec<(u32, f32)> = (0..100u32).map(|i| (i, (i % 7) as f32)).collect();
    let expected_sum: f64 = items.iter().map(|(_, v)| *v as f64).sum();
    sections.insert(
        "chr1".to_string(),
        vec![WigSection::VariableStep { span: 1, items }],
    );

    BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), sections)
        .unwrap();

    let mut reader = BigWigRead::open_file(file.path().to_str().unwrap()).unwrap();
    let bins = summarize(&mut reader, "chr1", 0, 100, 10, true).unwrap();

    assert_eq!(bins.len(), 10);
    let total_bases: u64 = bins.iter().map(|b| b.bases_covered).sum();
    assert_eq!(total_bases, 100);
    for bin in &bins {
        assert_eq!(bin.bases_covered, 10);
    }

    let got_sum: f64 = bins.iter().map(|b| b.sum).sum();
    assert!((got_sum - expected_sum).abs() < 1e-3);
}

#[test]
fn summarize_rejects_more_bins_than_bases() {
    let file = tempfile::NamedTempFile::new().unwrap();
    BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), step_values())
        .unwrap();

    let mut reader = BigWigRead::open_file(file.path().to_str().unwrap()).unwrap();
    let result = summarize(&mut reader, "chr1", 0, 5, 10, true);
    assert!(result.is_err());
}

#[test]
fn write_rejects_unsorted_values() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut sections = BTreeMap::new();
    sections.insert(
        "chr1".to_string(),
        vec![WigSection::VariableStep {
            span: 10,
            items: vec![(50, 1.0), (10, 2.0)],
        }],
    );

    let result = BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), sections);
    assert!(matches!(
        result,
        Err(bigtools::BigWigWriteError::Unsorted { prev_start: 50, start: 10, .. })
    ));
}

#[test]
fn write_rejects_bedgraph_sections() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut sections = BTreeMap::new();
    sections.insert(
        "chr1".to_string(),
        vec![WigSection::BedGraph(vec![Value { start: 0, end: 10, value: 1.0 }])],
    );

    let result = BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(chrom_sizes(), sections);
    assert!(matches!(result, Err(bigtools::BigWigWriteError::NotSupported(_))));
}

#[test]
fn fixed_step_query_realigns_to_query_start() {
    // Matches the worked example: a fixedStep section starting at 400601
    // with step 100, span 1, values [11, 22, 33] covers [400601,400602),
    // [400701,400702), [400801,400802). A query starting at 400700 must
    // not report items at their true positions; it realigns so the first
    // surviving item is reported at the query-aligned boundary 400700.
    let mut sizes = BTreeMap::new();
    sizes.insert("chr3".to_string(), 1_000_000);

    let mut sections = BTreeMap::new();
    sections.insert(
        "chr3".to_string(),
        vec![WigSection::FixedStep {
            start: 400_601,
            step: 100,
            span: 1,
            values: vec![11.0, 22.0, 33.0],
        }],
    );

    let file = tempfile::NamedTempFile::new().unwrap();
    BigWigWrite::create_file(file.path(), BigWigWriteOptions::default())
        .write(sizes, sections)
        .unwrap();

    let mut reader = BigWigRead::open_file(file.path().to_str().unwrap()).unwrap();
    let values: Vec<Value> = reader
        .get_interval("chr3", 400_700, 410_000, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        values,
        vec![
            Value { start: 400_700, end: 400_701, value: 22.0 },
            Value { start: 400_800, end: 400_801, value: 33.0 },
        ]
    );
}
