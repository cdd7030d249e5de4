//! Derivation of the displayed page from the stored records.
//!
//! `project` runs filter → sort → paginate and holds no state. The model calls it
//! after every store change.

use rayon::prelude::*;

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// One page of the filtered and sorted records.
#[derive(Debug, PartialEq)]
pub struct Projection<'a> {
    pub rows: Vec<&'a Record>,
    pub total_matches: usize,
}

pub fn project<'a>(
    records: &'a [Record],
    search_term: &str,
    sort: Option<&SortSpec>,
    page: usize,
    page_size: usize,
) -> Projection<'a> {
    let matches = matching(records, search_term, sort);
    let total_matches = matches.len();
    Projection {
        rows: paginate(&matches, page, page_size).to_vec(),
        total_matches,
    }
}

/// Filter and sort, without pagination.
pub fn matching<'a>(
    records: &'a [Record],
    search_term: &str,
    sort: Option<&SortSpec>,
) -> Vec<&'a Record> {
    let mut rows = filter(records, search_term);
    if let Some(spec) = sort {
        sort_rows(&mut rows, spec);
    }
    rows
}

/// Records with at least one value containing `search_term`, ignoring case. Keeps input order.
pub fn filter<'a>(records: &'a [Record], search_term: &str) -> Vec<&'a Record> {
    if search_term.is_empty() {
        return records.iter().collect();
    }
    let needle = search_term.to_lowercase();
    records
        .par_iter()
        .filter(|record| record.contains_lowercase(&needle))
        .collect()
}

/// Stable sort on the lowercased text of `spec.key`; missing values compare as "".
pub fn sort_rows(rows: &mut [&Record], spec: &SortSpec) {
    let key = |record: &Record| {
        record
            .field_text(&spec.key)
            .map(|v| v.to_lowercase())
            .unwrap_or_default()
    };
    let mut keyed: Vec<(String, &Record)> = rows.iter().map(|&r| (key(r), r)).collect();
    keyed.sort_by(|(a, _), (b, _)| match spec.direction {
        SortDirection::Ascending => a.cmp(b),
        SortDirection::Descending => b.cmp(a),
    });
    for (slot, (_, record)) in rows.iter_mut().zip(keyed) {
        *slot = record;
    }
}

/// The `page`-th (1-based) slice of `page_size` rows; empty when out of range.
pub fn paginate<'r, 'a>(rows: &'r [&'a Record], page: usize, page_size: usize) -> &'r [&'a Record] {
    if page_size == 0 {
        return &[];
    }
    let start = (page.max(1) - 1).saturating_mul(page_size);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

pub fn page_count(total_matches: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total_matches.div_ceil(page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::seed_records;

    fn ids<'a>(rows: &[&'a Record]) -> Vec<&'a str> {
        rows.iter().map(|r| r.id()).collect()
    }

    fn people(entries: &[(&str, &str, &str)]) -> Vec<Record> {
        entries
            .iter()
            .map(|(id, name, role)| {
                let mut r = Record::new(*id);
                r.name = name.to_string();
                r.role = role.to_string();
                r
            })
            .collect()
    }

    #[test]
    fn empty_search_matches_everything() {
        let records = seed_records();
        let page = project(&records, "", None, 1, 10);
        assert_eq!(page.total_matches, 5);
        assert_eq!(ids(&page.rows), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn filter_is_sound_and_complete() {
        let records = seed_records();
        for term in ["DEV", "son", "@example", "3", "zzz"] {
            let kept = filter(&records, term);
            let needle = term.to_lowercase();
            for record in &records {
                let expected = record.values().any(|v| v.to_lowercase().contains(&needle));
                let found = kept.iter().any(|k| k.id() == record.id());
                assert_eq!(expected, found, "term {term:?}, record {}", record.id());
            }
        }
    }

    #[test]
    fn filter_preserves_input_order() {
        let records = seed_records();
        let kept = filter(&records, "developer");
        assert_eq!(ids(&kept), vec!["1", "4"]);
    }

    #[test]
    fn sort_ascending_and_descending_by_text() {
        let records = seed_records();
        let asc = matching(&records, "", Some(&SortSpec::ascending("name")));
        assert_eq!(ids(&asc), vec!["2", "1", "3", "4", "5"]);

        let desc = matching(&records, "", Some(&SortSpec::descending("name")));
        assert_eq!(ids(&desc), vec!["5", "4", "3", "1", "2"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let records = people(&[
            ("a", "x", "Dev"),
            ("b", "y", "ops"),
            ("c", "z", "dev"),
            ("d", "w", "Ops"),
        ]);
        let asc = matching(&records, "", Some(&SortSpec::ascending("role")));
        assert_eq!(ids(&asc), vec!["a", "c", "b", "d"]);

        let desc = matching(&records, "", Some(&SortSpec::descending("role")));
        assert_eq!(ids(&desc), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn missing_values_sort_first() {
        let mut records = seed_records();
        records[3].department = Some("Sales".into());
        records[1].department = Some("Admin".into());
        let asc = matching(&records, "", Some(&SortSpec::ascending("department")));
        assert_eq!(ids(&asc), vec!["1", "3", "5", "2", "4"]);
    }

    #[test]
    fn numbers_sort_as_text() {
        let mut records = seed_records();
        records[0].age = 100;
        let asc = matching(&records, "", Some(&SortSpec::ascending("age")));
        assert_eq!(ids(&asc), vec!["1", "4", "2", "5", "3"]);
    }

    #[test]
    fn second_page_of_two() {
        let records = seed_records();
        let page = project(&records, "", None, 2, 2);
        assert_eq!(ids(&page.rows), vec!["3", "4"]);
        assert_eq!(page.total_matches, 5);
        assert_eq!(page_count(page.total_matches, 2), 3);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let records = seed_records();
        let page = project(&records, "", None, 4, 2);
        assert!(page.rows.is_empty());
        assert_eq!(page.total_matches, 5);

        let page = project(&records, "nobody", None, 1, 10);
        assert!(page.rows.is_empty());
        assert_eq!(page.total_matches, 0);
        assert_eq!(page_count(0, 10), 0);
    }

    #[test]
    fn project_is_deterministic_and_leaves_input_untouched() {
        let records = seed_records();
        let before = records.clone();
        let sort = SortSpec::descending("role");
        let first = project(&records, "e", Some(&sort), 1, 3);
        let second = project(&records, "e", Some(&sort), 1, 3);
        assert_eq!(first, second);
        assert_eq!(records, before);
    }
}
