//! Name and text helpers shared by the scanner, repair rules, and migrator.

use std::cmp::Ordering;

use crate::constants::{HIDDEN_DIR_NAME, MACOS_ARTIFACT_DIR};

/// Derive a display title from a file stem.
///
/// Splits on the usual separators and capitalizes each word, so
/// `clair_de_lune` becomes `Clair De Lune`. Falls back to the raw stem when
/// nothing word-like survives.
#[must_use]
pub fn title_from_stem(stem: &str) -> String {
    let words: Vec<String> = stem
        .split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let first = first.to_ascii_uppercase();
                    let rest: String = chars.map(|c| c.to_ascii_lowercase()).collect();
                    if rest.is_empty() {
                        first.to_string()
                    } else {
                        format!("{first}{rest}")
                    }
                }
                None => String::new(),
            }
        })
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        stem.to_string()
    } else {
        words.join(" ")
    }
}

/// Case-insensitive ordering used wherever file names are sorted.
#[must_use]
pub fn cmp_ci(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase()
        .cmp(&b.to_ascii_lowercase())
        .then_with(|| a.cmp(b))
}

/// Strip `prefix` from the front of `s`, ignoring ASCII case.
///
/// Returns the remainder, or `None` when `prefix` does not match or splits a
/// multi-byte character.
#[must_use]
pub fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let (head, tail) = s.split_at_checked(prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}

/// File stem without the final extension.
#[must_use]
pub fn stem_of(file_name: &str) -> &str {
    file_name.rsplit_once('.').map_or(file_name, |x| x.0)
}

/// Final extension of a file name, if any.
#[must_use]
pub fn ext_of(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|x| x.1)
}

/// Directory names excluded from every sweep.
pub(crate) fn is_excluded_dir(name: &str) -> bool {
    name.eq_ignore_ascii_case(HIDDEN_DIR_NAME) || name == MACOS_ARTIFACT_DIR
}

/// OS artifact files such as AppleDouble headers.
pub(crate) fn is_os_artifact(name: &str) -> bool {
    name.starts_with("._")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_capitalize_words() {
        assert_eq!(title_from_stem("clair_de_lune"), "Clair De Lune");
        assert_eq!(title_from_stem("moonlight-sonata"), "Moonlight Sonata");
        assert_eq!(title_from_stem("OPUS 9"), "Opus 9");
    }

    #[test]
    fn titles_fall_back_to_raw_stem() {
        assert_eq!(title_from_stem("___"), "___");
        assert_eq!(title_from_stem(""), "");
    }

    #[test]
    fn ci_ordering_ignores_case_but_stays_total() {
        assert_eq!(cmp_ci("Alpha", "alpha"), Ordering::Less);
        assert_eq!(cmp_ci("beta", "ALPHA"), Ordering::Greater);
        assert_eq!(cmp_ci("same", "same"), Ordering::Equal);
    }

    #[test]
    fn prefix_stripping_is_case_insensitive() {
        assert_eq!(strip_prefix_ci("Song2a", "song2"), Some("a"));
        assert_eq!(strip_prefix_ci("Song", "Song"), Some(""));
        assert_eq!(strip_prefix_ci("Sonata", "Song"), None);
        assert_eq!(strip_prefix_ci("ab", "abc"), None);
    }

    #[test]
    fn stems_and_extensions() {
        assert_eq!(stem_of("Song2a.pdf"), "Song2a");
        assert_eq!(stem_of("no_extension"), "no_extension");
        assert_eq!(ext_of("Song.SBX"), Some("SBX"));
        assert_eq!(ext_of("plain"), None);
    }

    #[test]
    fn sweep_exclusions() {
        assert!(is_excluded_dir("Hidden"));
        assert!(is_excluded_dir("__MACOSX"));
        assert!(!is_excluded_dir("hideout"));
        assert!(is_os_artifact("._Song1.pdf"));
        assert!(!is_os_artifact("Song1.pdf"));
    }
}
