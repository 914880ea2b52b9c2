//! Dataset URN canonicalization.
//!
//! A dataset URN is derived from a `(namespace, name)` pair emitted by a
//! lineage producer. Two producers naming the same physical object with
//! equivalent-modulo-aliases coordinates must collide on the same URN; the
//! normalization table below is the only thing that may change a namespace
//! string, and it is applied uniformly whether the string arrives via
//! [`generate_dataset_urn`] or is re-derived from [`parse_dataset_urn`].

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::DomainError;

/// Scheme aliases folded to one canonical spelling. Closed table — no other
/// scheme rewriting happens anywhere in the canonicalizer.
static SCHEME_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("postgres", "postgresql"), ("s3a", "s3"), ("s3n", "s3")])
});

/// Default ports stripped from the host portion, keyed by the *canonical*
/// (post-alias) scheme.
static DEFAULT_PORTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("postgresql", "5432"),
        ("mysql", "3306"),
        ("kafka", "9092"),
        ("redis", "6379"),
        ("mongodb", "27017"),
        ("elasticsearch", "9200"),
    ])
});

/// Collapses any run of `/` characters into a single `/`.
fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Normalizes a namespace string: lowercase, trim, apply the scheme alias
/// table, strip a well-known default port, collapse duplicate path
/// separators. The name portion of a dataset is never touched by this
/// function — no URL decoding, no case folding.
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().to_lowercase();
    let Some(idx) = trimmed.find("://") else {
        return collapse_slashes(&trimmed);
    };
    let (scheme, rest) = trimmed.split_at(idx);
    let rest = &rest[3..]; // skip "://"
    let canonical_scheme = SCHEME_ALIASES.get(scheme).copied().unwrap_or(scheme);

    let (host_and_port, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let host = match (host_and_port.rfind(':'), DEFAULT_PORTS.get(canonical_scheme)) {
        (Some(i), Some(default_port)) if &host_and_port[i + 1..] == *default_port => {
            &host_and_port[..i]
        }
        _ => host_and_port,
    };

    let collapsed_path = collapse_slashes(path);
    format!("{canonical_scheme}://{host}{collapsed_path}")
}

/// Mints the canonical dataset URN for a `(namespace, name)` pair.
///
/// The name portion is carried through unmodified (no case folding, no
/// trimming) — scalar trimming is a concern of the ingestion mapping stage,
/// not the canonicalizer.
pub fn generate_dataset_urn(namespace: &str, name: &str) -> String {
    format!("{}/{}", normalize_namespace(namespace), name)
}

/// Splits a canonical dataset URN back into its `(namespace, name)` pair.
///
/// The split point is the *last* `/` in the URN: a dataset name is always
/// what follows it, and everything before it is the namespace. This is
/// deterministic and idempotent under repeated `generate`/`parse` round
/// trips even when a name itself contains slashes, because the split
/// procedure is stable once applied — it does not need to recover the
/// producer's original `(namespace, name)` pair, only a fixed point of
/// normalization (see the URN contract in the component spec).
pub fn parse_dataset_urn(urn: &str) -> Result<(String, String), DomainError> {
    let idx = urn.rfind('/').ok_or_else(|| DomainError::MissingUrnSeparator(urn.to_string()))?;
    let (namespace, name) = (&urn[..idx], &urn[idx + 1..]);
    if namespace.is_empty() {
        return Err(DomainError::EmptyNamespace);
    }
    if name.is_empty() {
        return Err(DomainError::EmptyName);
    }
    let renormalized = normalize_namespace(namespace);
    if renormalized != namespace {
        return Err(DomainError::UnstableUrnNamespace(namespace.to_string()));
    }
    Ok((namespace.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_port_and_aliases_scheme() {
        assert_eq!(normalize_namespace("Postgres://DB-Host:5432"), "postgresql://db-host");
    }

    #[test]
    fn leaves_non_default_port_untouched() {
        assert_eq!(normalize_namespace("postgres://db-host:5433"), "postgresql://db-host:5433");
    }

    #[test]
    fn collapses_duplicate_separators() {
        assert_eq!(normalize_namespace("s3a://bucket//dir///sub"), "s3://bucket/dir/sub");
    }

    #[test]
    fn namespace_without_scheme_is_lowercased_and_trimmed() {
        assert_eq!(normalize_namespace("  dbt://Analytics  "), "dbt://analytics");
        assert_eq!(normalize_namespace("  Analytics  "), "analytics");
    }

    #[test]
    fn round_trip_is_a_fixed_point() {
        let urn = generate_dataset_urn("Postgres://Host:5432", "public.orders");
        let (ns1, name1) = parse_dataset_urn(&urn).unwrap();
        let urn2 = generate_dataset_urn(&ns1, &name1);
        let (ns2, name2) = parse_dataset_urn(&urn2).unwrap();
        assert_eq!((ns1, name1), (ns2, name2));
        assert_eq!(urn, urn2);
    }

    #[test]
    fn two_producers_same_physical_object_collide() {
        let a = generate_dataset_urn("postgres://db:5432", "orders");
        let b = generate_dataset_urn("POSTGRESQL://DB", "orders");
        assert_eq!(a, b);
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert_eq!(parse_dataset_urn("no-separator-here"), Err(DomainError::MissingUrnSeparator("no-separator-here".into())));
    }

    #[test]
    fn parse_rejects_unnormalized_namespace() {
        // Uppercase namespace embedded directly in a URN was never produced by
        // `generate_dataset_urn`, so `parse` must reject it.
        let err = parse_dataset_urn("Postgres://Host/orders").unwrap_err();
        assert!(matches!(err, DomainError::UnstableUrnNamespace(_)));
    }
}
