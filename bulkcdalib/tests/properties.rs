use std::io::Cursor;

use bulkcdalib::data::{all_drives, ingest_stream, IngestOptions};
use bulkcdalib::{build_stoplist, rank_all_pairs, score, CorrelatorIndex, FeatureSink};
use proptest::prelude::*;

/// `(drive, feature, amount)` triples over a small alphabet so features repeat.
fn contributions() -> impl Strategy<Value = Vec<(u8, u8, u64)>> {
    prop::collection::vec((0u8..5, 0u8..12, 1u64..4), 0..60)
}

/// Render contributions as a feature file, with a drive header whenever the
/// drive changes.
fn feature_file(contributions: &[(u8, u8, u64)]) -> String {
    let mut text = String::from("\u{feff}# BULK_EXTRACTOR-Version: 1.4.0\n");
    let mut current = None;
    for (i, &(drive, feature, _)) in contributions.iter().enumerate() {
        if current != Some(drive) {
            text.push_str(&format!("# Filename: disk{drive}.raw\n"));
            current = Some(drive);
        }
        text.push_str(&format!("{}\tuser{feature}@x.com\tcontext\n", i * 512));
    }
    text
}

fn build_index(contributions: &[(u8, u8, u64)]) -> CorrelatorIndex {
    let mut index = CorrelatorIndex::new("email");
    for &(drive, feature, amount) in contributions {
        index
            .ingest(&format!("disk{drive}"), &format!("user{feature}@x.com"), amount)
            .unwrap();
    }
    index
}

fn ingest_text(index: &mut CorrelatorIndex, text: &str) {
    let mut reader = Cursor::new(text.as_bytes());
    ingest_stream(&mut reader, "email.txt", &IngestOptions::new(), index).unwrap();
}

proptest! {
    #[test]
    fn ingestion_is_idempotent_across_indices(c in contributions()) {
        let text = feature_file(&c);
        let mut first = CorrelatorIndex::new("email");
        let mut second = CorrelatorIndex::new("email");
        ingest_text(&mut first, &text);
        ingest_text(&mut second, &text);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn counts_never_decrease(a in contributions(), b in contributions()) {
        let mut index = CorrelatorIndex::new("email");
        ingest_text(&mut index, &feature_file(&a));
        let before = index.clone();
        ingest_text(&mut index, &feature_file(&b));

        for feature in before.features() {
            prop_assert!(index.drive_count_for(feature) >= before.drive_count_for(feature));
            for drive in before.drives() {
                prop_assert!(index.count(feature, drive) >= before.count(feature, drive));
            }
        }
    }

    #[test]
    fn more_drives_never_grow_the_stoplist(
        c in contributions(),
        extra in 0usize..10,
        threshold in 0.0f64..=1.0,
    ) {
        let index = build_index(&c);
        let total = index.drives().len();
        let small = build_stoplist(&index, total, threshold);
        let large = build_stoplist(&index, total + extra, threshold);
        prop_assert!(large.is_subset(&small));
    }

    #[test]
    fn affinity_is_symmetric(c in contributions(), a in 0u8..5, b in 0u8..5) {
        prop_assume!(a != b);
        let indices = vec![build_index(&c)];
        let (a, b) = (format!("disk{a}"), format!("disk{b}"));
        let ab = score(&indices, &a, &b).unwrap();
        let ba = score(&indices, &b, &a).unwrap();
        prop_assert_eq!(ab.score.to_bits(), ba.score.to_bits());
        prop_assert_eq!(ab.factors, ba.factors);
    }

    #[test]
    fn ranking_is_deterministic(c in contributions(), d in contributions()) {
        let mut ccn = CorrelatorIndex::new("ccn");
        for &(drive, feature, amount) in &d {
            ccn.ingest(&format!("disk{drive}"), &format!("4111{feature:012}"), amount).unwrap();
        }
        let indices = vec![build_index(&c), ccn];
        let drives = all_drives(&indices);

        let first = rank_all_pairs(&indices, &drives);
        let second = rank_all_pairs(&indices, &drives);
        prop_assert_eq!(&first, &second);

        let n = drives.len();
        prop_assert_eq!(first.len(), if n < 2 { 0 } else { n * (n - 1) });
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
