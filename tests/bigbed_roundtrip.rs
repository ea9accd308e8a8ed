//! End-to-end bigBed round trips: write a file, then read it back and check
//! the decoded records, the overlap/containment query modes, and the
//! writer's validation of its inputs.

use std::collections::BTreeMap;

use byteordered::Endianness;

use bigtools::{BedEntry, BigBedRead, BigBedWrite, BigBedWriteOptions, Compression};

fn small_chrom_sizes() -> BTreeMap<String, u32> {
    let mut sizes = BTreeMap::new();
    sizes.insert("chr1".to_string(), 1_000);
    sizes.insert("chr2".to_string(), 500);
    sizes
}

fn small_entries() -> BTreeMap<String, Vec<BedEntry>> {
    let mut entries = BTreeMap::new();
    entries.insert(
        "chr1".to_string(),
        vec![
            BedEntry { start: 10, end: 20, rest: "geneA\t1\t+".to_string() },
            BedEntry { start: 30, end: 40, rest: "geneB\t2\t-".to_string() },
            BedEntry { start: 100, end: 200, rest: "geneC\t3\t+".to_string() },
        ],
    );
    entries
}

#[test]
fn roundtrips_with_snappy_and_little_endian() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let options = BigBedWriteOptions {
        compression: Compression::Snappy,
        items_per_slot: 2,
        block_size: 4,
        zoom_level_count: 2,
        byte_order: Endianness::Little,
        cancel: None,
    };
    BigBedWrite::create_file(file.path(), options)
        .write(small_chrom_sizes(), small_entries())
        .unwrap();

    let mut reader = BigBedRead::open_file(file.path().to_str().unwrap()).unwrap();
    let entries: Vec<BedEntry> = reader
        .get_interval("chr1", 0, 0, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        entries,
        vec![
            BedEntry { start: 10, end: 20, rest: "geneA\t1\t+".to_string() },
            BedEntry { start: 30, end: 40, rest: "geneB\t2\t-".to_string() },
            BedEntry { start: 100, end: 200, rest: "geneC\t3\t+".to_string() },
        ]
    );
}

#[test]
fn overlap_mode_and_containment_mode_disagree_at_the_boundary() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let options = BigBedWriteOptions {
        compression: Compression::None,
        ..BigBedWriteOptions::default()
    };
    let mut chrom_sizes = BTreeMap::new();
    chrom_sizes.insert("chr1".to_string(), 1_000);
    let mut entries = BTreeMap::new();
    entries.insert(
        "chr1".to_string(),
        vec![BedEntry { start: 100, end: 200, rest: "rec\t0\t+".to_string() }],
    );
    BigBedWrite::create_file(file.path(), options)
        .write(chrom_sizes, entries)
        .unwrap();

    let mut reader = BigBedRead::open_file(file.path().to_str().unwrap()).unwrap();

    // [150, 250) overlaps [100, 200) (100 < 250 && 200 > 150) but does not
    // contain it (100 < 150).
    let overlapping: Vec<_> = reader
        .get_interval("chr1", 150, 250, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(overlapping.len(), 1);

    let contained: Vec<BedEntry> = reader
        .get_interval("chr1", 150, 250, false)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(contained.is_empty());

    // A wider window that fully contains the record passes both modes.
    let contained_wide: Vec<BedEntry> = reader
        .get_interval("chr1", 50, 300, false)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(contained_wide.len(), 1);
}

#[test]
fn missing_chromosome_yields_empty_iterator_not_an_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    BigBedWrite::create_file(file.path(), BigBedWriteOptions::default())
        .write(small_chrom_sizes(), small_entries())
        .unwrap();

    let mut reader = BigBedRead::open_file(file.path().to_str().unwrap()).unwrap();
    let entries: Vec<BedEntry> = reader
        .get_interval("chrUnknown", 0, 100, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(entries.is_empty());
}

#[test]
fn write_rejects_unknown_chromosome() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut chrom_sizes = BTreeMap::new();
    chrom_sizes.insert("chr1".to_string(), 1_000);
    let mut entries = BTreeMap::new();
    entries.insert(
        "chr2".to_string(),
        vec![BedEntry { start: 0, end: 10, rest: String::new() }],
    );

    let result =
        BigBedWrite::create_file(file.path(), BigBedWriteOptions::default()).write(chrom_sizes, entries);
    assert!(matches!(
        result,
        Err(bigtools::bbi::bigbedwrite::BigBedWriteError::UnknownChrom(ref c)) if c == "chr2"
    ));
}

#[test]
fn write_rejects_unsorted_entries() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut chrom_sizes = BTreeMap::new();
    chrom_sizes.insert("chr1".to_string(), 1_000);
    let mut entries = BTreeMap::new();
    entries.insert(
        "chr1".to_string(),
        vec![
            BedEntry { start: 50, end: 60, rest: String::new() },
            BedEntry { start: 10, end: 20, rest: String::new() },
        ],
    );

    let result =
        BigBedWrite::create_file(file.path(), BigBedWriteOptions::default()).write(chrom_sizes, entries);
    assert!(matches!(
        result,
        Err(bigtools::bbi::bigbedwrite::BigBedWriteError::Unsorted { prev_start: 50, start: 10, .. })
    ));
}

#[test]
fn little_and_big_endian_files_decode_identically() {
    let le_file = tempfile::NamedTempFile::new().unwrap();
    let be_file = tempfile::NamedTempFile::new().unwrap();

    for (path, order) in [
        (le_file.path(), Endianness::Little),
        (be_file.path(), Endianness::Big),
    ] {
        let options = BigBedWriteOptions {
            byte_order: order,
            ..BigBedWriteOptions::default()
        };
        BigBedWrite::create_file(path, options)
            .write(small_chrom_sizes(), small_entries())
            .unwrap();
    }

    let mut le_reader = BigBedRead::open_file(le_file.path().to_str().unwrap()).unwrap();
    let mut be_reader = BigBedRead::open_file(be_file.path().to_str().unwrap()).unwrap();

    let le_entries: Vec<BedEntry> = le_reader
        .get_interval("chr1", 0, 0, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let be_entries: Vec<BedEntry> = be_reader
        .get_interval("chr1", 0, 0, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(le_entries, be_entries);
}
