//! Filename heuristic grouping sorted stems into primary/continuation volumes.
//!
//! Scanned multi-part books arrive as a primary file plus short-suffixed
//! companions (`Song2.pdf`, `Song2a.pdf`). Grouping runs over the
//! case-insensitively sorted stems of one folder in a single forward pass, so
//! every group is contiguous under the sort order.

use crate::constants::{MAX_CONTINUATION_SUFFIX, VOLUME_MARKERS};
use crate::text::strip_prefix_ci;

/// One logical document inferred from the file stems of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationGroup {
    pub primary: String,
    /// Continuation stems in sort order.
    pub continuations: Vec<String>,
}

/// Base name of a primary stem with one trailing volume marker stripped.
#[must_use]
pub fn base_stem(stem: &str) -> &str {
    stem.strip_suffix(VOLUME_MARKERS).unwrap_or(stem)
}

/// True when `candidate` extends the current primary with a volume suffix.
///
/// The remainder after the primary's base name must be a short alphanumeric
/// suffix that is not purely numeric: `Song2a` continues `Song2`, while
/// `Song2` is an independent sibling of `Song1` and `Songbird` is unrelated
/// to `Song`.
fn is_continuation(primary: &str, candidate: &str) -> bool {
    let base = base_stem(primary);
    let Some(suffix) = strip_prefix_ci(candidate, base) else {
        return false;
    };
    if suffix.is_empty() || suffix.chars().count() > MAX_CONTINUATION_SUFFIX {
        return false;
    }
    if !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    // A purely numeric remainder names a sibling piece, not a volume.
    !suffix.chars().all(|c| c.is_ascii_digit())
}

/// Partition case-insensitively sorted stems into contiguous volume groups.
///
/// Each stem either continues the current group's primary or starts a new
/// group; a stem is never its own continuation.
#[must_use]
pub fn group_stems<S: AsRef<str>>(sorted_stems: &[S]) -> Vec<ContinuationGroup> {
    let mut groups: Vec<ContinuationGroup> = Vec::new();
    for stem in sorted_stems {
        let stem = stem.as_ref();
        if let Some(current) = groups.last_mut() {
            if is_continuation(&current.primary, stem) {
                current.continuations.push(stem.to_string());
                continue;
            }
        }
        groups.push(ContinuationGroup {
            primary: stem.to_string(),
            continuations: Vec::new(),
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped(stems: &[&str]) -> Vec<(String, Vec<String>)> {
        group_stems(stems)
            .into_iter()
            .map(|group| (group.primary, group.continuations))
            .collect()
    }

    #[test]
    fn numbered_siblings_stay_separate() {
        // Scenario: Song1 and Song2 are independent pieces; Song2a extends Song2.
        let groups = grouped(&["Song1", "Song2", "Song2a"]);
        assert_eq!(
            groups,
            vec![
                ("Song1".to_string(), vec![]),
                ("Song2".to_string(), vec!["Song2a".to_string()]),
            ]
        );
    }

    #[test]
    fn volume_marker_is_stripped_from_the_primary() {
        let groups = grouped(&["Nocturne1", "Nocturne1a", "Nocturne1b"]);
        assert_eq!(
            groups,
            vec![(
                "Nocturne1".to_string(),
                vec!["Nocturne1a".to_string(), "Nocturne1b".to_string()]
            )]
        );
    }

    #[test]
    fn long_shared_prefixes_never_merge() {
        let groups = grouped(&["Song", "Songbird"]);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|group| group.continuations.is_empty()));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let groups = grouped(&["suite2", "Suite2A"]);
        assert_eq!(
            groups,
            vec![("suite2".to_string(), vec!["Suite2A".to_string()])]
        );
    }

    #[test]
    fn a_stem_is_never_its_own_continuation() {
        for stem in ["Song", "Song1", "x", ""] {
            assert!(!is_continuation(stem, stem), "{stem:?} continued itself");
        }
    }

    #[test]
    fn groups_are_contiguous_and_preserve_input_order() {
        let stems = ["Adagio", "Adagioa", "Ballade", "Etude1", "Etude1a", "Waltz"];
        let groups = group_stems(&stems);
        let flattened: Vec<&str> = groups
            .iter()
            .flat_map(|group| {
                std::iter::once(group.primary.as_str())
                    .chain(group.continuations.iter().map(String::as_str))
            })
            .collect();
        assert_eq!(flattened, stems);
    }
}
