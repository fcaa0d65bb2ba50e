//! Pairwise similarity on normalized keys.

use strsim::jaro_winkler;

/// Jaro-Winkler similarity in `[0, 1]`.
///
/// Arguments are put in a fixed order before scoring so `similarity(a, b)`
/// and `similarity(b, a)` are bit-identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    jaro_winkler(first, second).clamp(0.0, 1.0)
}

/// True when one non-empty key contains the other. Catches heavy
/// abbreviation ("acme" inside "acmeholding") that similarity alone misses.
pub fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_is_one() {
        assert_eq!(similarity("acme", "acme"), 1.0);
    }

    #[test]
    fn disjoint_is_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn transposition_scores_high() {
        let swapped = similarity("martha", "marhta");
        assert!(swapped > 0.95, "got {swapped}");
    }

    #[test]
    fn shared_prefix_beats_shared_suffix() {
        let prefix = similarity("acmeberlin", "acmebremen");
        let suffix = similarity("berlinacme", "bremenacme");
        assert!(prefix > suffix, "{prefix} <= {suffix}");
    }

    #[test]
    fn containment_requires_non_empty_keys() {
        assert!(contains_either("acme", "acmeholding"));
        assert!(contains_either("acmeholding", "acme"));
        assert!(!contains_either("", "acme"));
        assert!(!contains_either("acme", "globex"));
    }

    proptest! {
        #[test]
        fn symmetric(a in "[a-z0-9]{0,12}", b in "[a-z0-9]{0,12}") {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn bounded(a in "[a-z0-9]{0,12}", b in "[a-z0-9]{0,12}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn reflexive(a in "[a-z0-9]{1,12}") {
            prop_assert_eq!(similarity(&a, &a), 1.0);
        }
    }
}
