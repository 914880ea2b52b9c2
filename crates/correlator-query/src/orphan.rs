//! Orphan & Pattern Detector (spec §4.8). An orphan is a dataset seen in a
//! test result but absent from every `output` lineage edge; for each one we
//! look for a produced dataset it's likely an alias of, first by exact
//! table-name match and, failing that, by fuzzy name similarity.

use std::collections::{BTreeMap, HashSet};

use correlator_core::{CoreError, LineageReader};
use correlator_domain::parse_dataset_urn;

use crate::model::{MatchReason, OrphanDataset, SuggestedMatch, SuggestedPattern};

const FUZZY_MATCH_THRESHOLD: f64 = 0.6;

pub fn find_orphans<R: LineageReader + ?Sized>(reader: &R) -> Result<Vec<OrphanDataset>, CoreError> {
    let (results, _total) = reader.test_results(None, i64::MAX, 0)?;
    let produced: HashSet<String> = reader.dataset_urns_with_output_edge()?.into_iter().collect();

    let mut seen = HashSet::new();
    let mut orphan_urns: Vec<String> = Vec::new();
    for (_, result) in &results {
        if !produced.contains(&result.dataset_urn) && seen.insert(result.dataset_urn.clone()) {
            orphan_urns.push(result.dataset_urn.clone());
        }
    }
    orphan_urns.sort();

    let mut candidates: Vec<String> = produced.into_iter().collect();
    candidates.sort();

    Ok(orphan_urns
        .into_iter()
        .map(|urn| {
            let name = dataset_name(&urn);
            let suggested_match = find_match(&urn, &name, &candidates);
            OrphanDataset { dataset_urn: urn, name, suggested_match }
        })
        .collect())
}

/// Groups orphans that resolved to the same canonical dataset. `pattern`
/// names the namespace substitution that reconciles them, e.g.
/// `postgres://raw -> postgresql://warehouse`.
pub fn suggest_patterns(orphans: &[OrphanDataset]) -> Vec<SuggestedPattern> {
    let mut groups: BTreeMap<String, Vec<&OrphanDataset>> = BTreeMap::new();
    for orphan in orphans {
        if let Some(m) = &orphan.suggested_match {
            groups.entry(m.canonical_urn.clone()).or_default().push(orphan);
        }
    }

    groups
        .into_iter()
        .map(|(canonical, group)| {
            let pattern = describe_pattern(&group[0].dataset_urn, &canonical);
            SuggestedPattern {
                pattern,
                canonical,
                resolves_count: group.len(),
                orphans_resolved: group.iter().map(|o| o.dataset_urn.clone()).collect(),
            }
        })
        .collect()
}

fn dataset_name(urn: &str) -> String {
    parse_dataset_urn(urn).map(|(_, name)| name).unwrap_or_else(|_| urn.to_string())
}

fn last_path_segment(name: &str) -> &str {
    name.rsplit(['/', '.']).next().unwrap_or(name)
}

fn find_match(orphan_urn: &str, orphan_name: &str, candidates: &[String]) -> Option<SuggestedMatch> {
    let orphan_table = last_path_segment(orphan_name);

    for candidate in candidates {
        if candidate == orphan_urn {
            continue;
        }
        if last_path_segment(&dataset_name(candidate)).eq_ignore_ascii_case(orphan_table) {
            return Some(SuggestedMatch { canonical_urn: candidate.clone(), match_reason: MatchReason::ExactTableName, confidence: 1.0 });
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        if candidate == orphan_urn {
            continue;
        }
        let score = name_similarity(orphan_table, last_path_segment(&dataset_name(candidate)));
        if score >= FUZZY_MATCH_THRESHOLD && best.as_ref().map(|(_, b)| score > *b).unwrap_or(true) {
            best = Some((candidate.as_str(), score));
        }
    }
    best.map(|(canonical_urn, confidence)| {
        SuggestedMatch { canonical_urn: canonical_urn.to_string(), match_reason: MatchReason::FuzzyStructural, confidence }
    })
}

fn describe_pattern(orphan_urn: &str, canonical_urn: &str) -> String {
    match (parse_dataset_urn(orphan_urn), parse_dataset_urn(canonical_urn)) {
        (Ok((orphan_ns, _)), Ok((canonical_ns, _))) if orphan_ns != canonical_ns => format!("{orphan_ns} -> {canonical_ns}"),
        _ => format!("alias -> {canonical_urn}"),
    }
}

fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = levenshtein(&a, &b) as f64;
    let longer = a.chars().count().max(b.chars().count()) as f64;
    1.0 - (distance / longer)
}

/// Plain iterative Levenshtein distance; the corpus is small enough (one
/// pass per orphan over the produced-dataset set) that a crate dependency
/// isn't worth it here.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for i in 1..=a.len() {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let tmp = row[j];
            row[j] = if a[i - 1] == b[j - 1] { prev_diag } else { 1 + prev_diag.min(row[j]).min(row[j - 1]) };
            prev_diag = tmp;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_table_name_beats_fuzzy() {
        let orphans = vec![OrphanDataset {
            dataset_urn: "postgresql://raw/orders".into(),
            name: "orders".into(),
            suggested_match: find_match("postgresql://raw/orders", "orders", &["postgresql://warehouse/orders".to_string(), "postgresql://warehouse/ordrs".to_string()]),
        }];
        let m = orphans[0].suggested_match.as_ref().unwrap();
        assert_eq!(m.match_reason, MatchReason::ExactTableName);
        assert_eq!(m.canonical_urn, "postgresql://warehouse/orders");
    }

    #[test]
    fn fuzzy_match_requires_threshold() {
        let candidates = vec!["postgresql://warehouse/ordrs".to_string()];
        let m = find_match("postgresql://raw/orders", "orders", &candidates);
        assert!(m.is_some());
        assert_eq!(m.unwrap().match_reason, MatchReason::FuzzyStructural);

        let no_match = find_match("postgresql://raw/customers", "customers", &candidates);
        assert!(no_match.is_none());
    }

    #[test]
    fn patterns_group_by_canonical_and_are_ordered() {
        let orphans = vec![
            OrphanDataset {
                dataset_urn: "postgres://raw/orders".into(),
                name: "orders".into(),
                suggested_match: Some(SuggestedMatch { canonical_urn: "postgresql://warehouse/orders".into(), match_reason: MatchReason::ExactTableName, confidence: 1.0 }),
            },
            OrphanDataset {
                dataset_urn: "postgres://staging/orders".into(),
                name: "orders".into(),
                suggested_match: Some(SuggestedMatch { canonical_urn: "postgresql://warehouse/orders".into(), match_reason: MatchReason::ExactTableName, confidence: 1.0 }),
            },
        ];
        let patterns = suggest_patterns(&orphans);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].resolves_count, 2);
        assert_eq!(patterns[0].canonical, "postgresql://warehouse/orders");
    }
}
