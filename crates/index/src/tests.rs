use crate::filter::{Combinator, Filter};
use crate::index::SeriesIndex;
use tsdb_core::series_key::series_key;
use tsdb_core::value::FieldType;
use tsdb_core::Tag;

fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
    pairs
        .iter()
        .map(|(k, v)| Tag::new(k.to_string(), v.to_string()))
        .collect()
}

fn add(index: &SeriesIndex, measurement: &str, pairs: &[(&str, &str)]) -> u32 {
    let tags = tags(pairs);
    let key = series_key(measurement, &tags);
    let tag_pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    index.series_id_for(measurement, key, tag_pairs)
}

#[test]
fn add_series_is_idempotent_on_repeated_key() {
    let index = SeriesIndex::new();
    let id1 = add(&index, "cpu", &[("host", "a")]);
    let id2 = add(&index, "cpu", &[("host", "a")]);
    assert_eq!(id1, id2);
    assert_eq!(index.series_ids("cpu"), vec![id1]);
}

#[test]
fn series_ids_are_never_reused_across_measurements() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "a")]);
    let b = add(&index, "mem", &[("host", "a")]);
    assert_ne!(a, b);
}

#[test]
fn equals_and_not_equals_partition_the_measurement() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "a")]);
    let b = add(&index, "cpu", &[("host", "b")]);
    let c = add(&index, "cpu", &[("host", "c")]);

    let eq = index.series_ids_by_filter("cpu", &Filter::equals("host", "a"));
    assert_eq!(eq, vec![a]);

    let mut not_eq = index.series_ids_by_filter("cpu", &Filter::not_equals("host", "a"));
    not_eq.sort();
    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(not_eq, expected);
}

#[test]
fn regex_and_not_regex_match_by_pattern() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "web-1")]);
    let b = add(&index, "cpu", &[("host", "web-2")]);
    let c = add(&index, "cpu", &[("host", "db-1")]);

    let web = Filter::regex("host", "^web-").unwrap();
    let mut matched = index.series_ids_by_filter("cpu", &web);
    matched.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(matched, expected);

    let not_web = Filter::not_regex("host", "^web-").unwrap();
    assert_eq!(index.series_ids_by_filter("cpu", &not_web), vec![c]);
}

#[test]
fn exists_returns_series_carrying_the_tag_key_at_all() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "a"), ("region", "us")]);
    let _b = add(&index, "cpu", &[("host", "b")]);

    let with_region = index.series_ids_by_filter("cpu", &Filter::exists("region"));
    assert_eq!(with_region, vec![a]);
}

#[test]
fn and_folds_with_intersect_or_folds_with_union() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "a"), ("region", "us")]);
    let _b = add(&index, "cpu", &[("host", "b"), ("region", "us")]);
    let _c = add(&index, "cpu", &[("host", "a"), ("region", "eu")]);

    let filters = vec![Filter::equals("host", "a"), Filter::equals("region", "us")];
    let and_result = index.series_ids_by_filters("cpu", &filters, Combinator::And);
    assert_eq!(and_result, vec![a]);

    let or_result = index.series_ids_by_filters("cpu", &filters, Combinator::Or);
    assert_eq!(or_result.len(), 3);
}

#[test]
fn series_index_round_trip_equals_union_of_inverted_sequences() {
    // Series-index round-trip property (spec.md §8): after adding N series
    // with random tags, seriesIDs equals the union of every inverted-index
    // sequence for that measurement.
    let index = SeriesIndex::new();
    let mut ids = Vec::new();
    for host in ["a", "b", "c", "d"] {
        for region in ["us", "eu"] {
            ids.push(add(&index, "cpu", &[("host", host), ("region", region)]));
        }
    }

    let all_by_host = index.series_ids_by_filters(
        "cpu",
        &[
            Filter::exists("host"),
        ],
        Combinator::Or,
    );
    let mut expected = ids.clone();
    expected.sort();
    expected.dedup();
    assert_eq!(all_by_host, expected);
    assert_eq!(index.series_ids("cpu"), expected);
}

#[test]
fn drop_series_removes_it_from_filters_too() {
    let index = SeriesIndex::new();
    let a = add(&index, "cpu", &[("host", "a")]);
    let b = add(&index, "cpu", &[("host", "b")]);

    index.drop_series("cpu", &[a]);

    assert_eq!(index.series_ids("cpu"), vec![b]);
    assert_eq!(
        index.series_ids_by_filter("cpu", &Filter::equals("host", "a")),
        Vec::<u32>::new()
    );
}

#[test]
fn create_field_enforces_type_stability() {
    let index = SeriesIndex::new();
    index.create_field("cpu", "value", FieldType::Float).unwrap();
    let again = index.create_field("cpu", "value", FieldType::Float).unwrap();
    assert_eq!(again.field_type, FieldType::Float);

    let err = index.create_field("cpu", "value", FieldType::Integer).unwrap_err();
    assert!(matches!(err, crate::error::IndexError::Field(_)));
}

#[test]
fn tag_keys_and_tag_values_are_sorted_and_distinct_across_measurements() {
    let index = SeriesIndex::new();
    add(&index, "cpu", &[("host", "b"), ("region", "us")]);
    add(&index, "cpu", &[("host", "a")]);
    add(&index, "mem", &[("host", "c")]);

    let keys = index.tag_keys(&["cpu".to_string(), "mem".to_string()]);
    assert_eq!(keys, vec!["host".to_string(), "region".to_string()]);

    let values = index.tag_values(&["cpu".to_string(), "mem".to_string()], "host", &[]);
    assert_eq!(values, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn seriesids_equals_union_of_all_inverted_sequences(
            hosts in proptest::collection::vec("[a-d]", 1..30),
        ) {
            let index = SeriesIndex::new();
            let mut expected_ids = BTreeSet::new();
            for host in &hosts {
                expected_ids.insert(add(&index, "cpu", &[("host", host.as_str())]));
            }

            let union_of_inverted = index.series_ids_by_filter("cpu", &Filter::exists("host"));
            let expected: Vec<u32> = expected_ids.into_iter().collect();
            prop_assert_eq!(index.series_ids("cpu"), expected.clone());
            prop_assert_eq!(union_of_inverted, expected);
        }
    }
}
