//! First-occurrence ordered union of reference lists.

use std::collections::HashSet;

/// Concatenate `sequences` in order, keeping only the first occurrence of
/// each entry.
pub fn ordered_union<'a, I, S>(sequences: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for sequence in sequences {
        for item in sequence {
            if seen.insert(item) {
                out.push(item.to_string());
            }
        }
    }
    out
}

/// Keep candidates for which `keep` holds, then drop repeats.
pub fn filtered_union<'a, I, F>(candidates: I, mut keep: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> bool,
{
    let kept: Vec<&str> = candidates.into_iter().filter(|c| keep(c)).collect();
    ordered_union([kept])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_occurrence_order() {
        let out = ordered_union([vec!["b", "a"], vec!["a", "c", "b", "d"]]);
        assert_eq!(out, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn empty_inputs() {
        let out = ordered_union(Vec::<Vec<&str>>::new());
        assert!(out.is_empty());
        let out = ordered_union([Vec::<&str>::new(), vec![]]);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_string_is_a_member() {
        let out = ordered_union([vec!["", "x", ""]]);
        assert_eq!(out, vec!["", "x"]);
    }

    #[test]
    fn filtered_union_drops_rejected_and_repeats() {
        let out = filtered_union(["a", "skip", "b", "a", "skip"], |c| c != "skip");
        assert_eq!(out, vec!["a", "b"]);
    }
}
