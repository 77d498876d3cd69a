//! Collection-name normalization.

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 63;
const FALLBACK_NAME: &str = "collection";
const SHORT_SUFFIX: &str = "-col";

/// Normalize arbitrary input into a valid vector-index collection name.
///
/// The result is 3 to 63 characters long, starts and ends with an ASCII alphanumeric, and
/// contains only alphanumerics, `_` and `-`. Periods are never emitted, so the result can
/// neither contain consecutive periods nor parse as an IPv4 address. Valid names pass
/// through unchanged, which makes the function idempotent.
pub fn sanitize_collection_name(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut name = trim_to_alphanumeric(&replaced).to_string();
    if name.len() > MAX_LEN {
        name.truncate(MAX_LEN);
        name = trim_to_alphanumeric(&name).to_string();
    }

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else if name.len() < MIN_LEN {
        format!("{name}{SHORT_SUFFIX}")
    } else {
        name
    }
}

fn trim_to_alphanumeric(value: &str) -> &str {
    value.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn assert_valid(name: &str) {
        assert!((MIN_LEN..=MAX_LEN).contains(&name.len()), "length of {name:?}");
        let first = name.chars().next().expect("non-empty");
        let last = name.chars().last().expect("non-empty");
        assert!(first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric(), "{name:?}");
        assert!(
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "{name:?}"
        );
        assert!(!name.contains(".."));
        assert!(name.parse::<Ipv4Addr>().is_err(), "{name:?}");
    }

    #[test]
    fn edge_inputs_produce_valid_idempotent_names() {
        let long = "a".repeat(100);
        for input in ["", "12", "...", "1.2.3.4", long.as_str(), "!@#$%^&*()", "pdf-3f2a"] {
            let once = sanitize_collection_name(input);
            assert_valid(&once);
            assert_eq!(sanitize_collection_name(&once), once, "idempotent for {input:?}");
        }
    }

    #[test]
    fn specific_normalizations() {
        assert_eq!(sanitize_collection_name(""), "collection");
        assert_eq!(sanitize_collection_name("12"), "12-col");
        assert_eq!(sanitize_collection_name("..."), "collection");
        assert_eq!(sanitize_collection_name("1.2.3.4"), "1-2-3-4");
        assert_eq!(sanitize_collection_name(&"a".repeat(100)).len(), MAX_LEN);
        assert_eq!(sanitize_collection_name("my report (v2).pdf"), "my-report--v2--pdf");
    }

    #[test]
    fn truncation_does_not_leave_separator_at_the_end() {
        let input = format!("{}-{}", "a".repeat(62), "b".repeat(10));
        let name = sanitize_collection_name(&input);
        assert_eq!(name, "a".repeat(62));
    }

    #[test]
    fn non_ascii_is_replaced() {
        let name = sanitize_collection_name("résumé");
        assert_valid(&name);
        assert_eq!(name, "r-sum");
    }
}
