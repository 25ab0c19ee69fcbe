use std::collections::HashSet;

/// Three-tier similarity in `[0.0, 1.0]`: equal ignoring case → 1.0, one
/// contains the other → 0.8, otherwise the share of whitespace-separated words
/// in common relative to the larger word set.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }

    let a_words: HashSet<&str> = a.split_whitespace().collect();
    let b_words: HashSet<&str> = b.split_whitespace().collect();
    let shared = a_words.intersection(&b_words).count();
    if shared == 0 {
        return 0.0;
    }
    shared as f32 / a_words.len().max(b_words.len()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_ignoring_case_and_padding() {
        assert_eq!(similarity("  Jane Doe ", "JANE DOE"), 1.0);
    }

    #[test]
    fn containment_scores_point_eight() {
        assert_eq!(similarity("NIKE", "Nike Inc"), 0.8);
        assert_eq!(similarity("Nike Inc", "nike"), 0.8);
    }

    #[test]
    fn word_overlap_ratio() {
        assert_eq!(similarity("JANE A DOE", "JANE DOE SMITH"), 2.0 / 3.0);
        assert_eq!(similarity("KAI MORGAN", "KAI LEE"), 0.5);
    }

    #[test]
    fn disjoint_is_zero() {
        assert_eq!(similarity("ADOBE", "GLOSSIER"), 0.0);
    }

    #[test]
    fn symmetric() {
        let pairs = [("JANE A DOE", "JANE DOE SMITH"), ("NIKE", "NIKE INC"), ("A B", "C D")];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn always_in_unit_interval() {
        for (a, b) in [("", ""), ("", "x"), ("a b c", "c"), ("x y", "y z")] {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{a:?} vs {b:?} gave {s}");
        }
    }
}
