//! Root extraction from the text left of the caret
//!
//! A root is the maximal run of ASCII letters that ends exactly at the caret.
//! Lines mix Latin roots with ideographic expansions (`更bon`), so a generic
//! word-boundary pattern would over-capture across the script boundary; the
//! scan here only ever walks over `[A-Za-z]`.
//!
//! Columns are zero-based character indices. A caret past the end of the
//! line is treated as being at the end of the line.

/// Whether `ch` belongs to the root alphabet
pub fn is_root_char(ch: char) -> bool {
    ch.is_ascii_alphabetic()
}

/// Location of a root inside a line, in character columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootSpan {
    pub text: String,
    /// Column of the first root character
    pub start: usize,
    /// Caret column (exclusive end of the root)
    pub end: usize,
}

impl RootSpan {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Locate the root ending at `caret`.
///
/// Returns an empty span at the caret when the character immediately left of
/// the caret is not a root character.
pub fn locate_root(line: &str, caret: usize) -> RootSpan {
    let chars: Vec<char> = line.chars().collect();
    let end = caret.min(chars.len());

    let start = chars[..end]
        .iter()
        .rposition(|&ch| !is_root_char(ch))
        .map_or(0, |idx| idx + 1);

    RootSpan {
        text: chars[start..end].iter().collect(),
        start,
        end,
    }
}

/// Extract the root immediately left of `caret`
pub fn extract_root(line: &str, caret: usize) -> String {
    locate_root(line, caret).text
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    #[test]
    fn test_root_after_ideograph() {
        assert_eq!(extract_root("更bon", 4), "bon");
        // caret past the end clamps to the end of the line
        assert_eq!(extract_root("更bon", 5), "bon");
    }

    #[test]
    fn test_caret_after_space_has_no_root() {
        assert_eq!(extract_root("更 bon", 2), "");
        assert_eq!(extract_root("更 bon", 3), "b");
    }

    #[test]
    fn test_root_stops_at_caret() {
        assert_eq!(extract_root("abX", 2), "ab");
        assert_eq!(extract_root("abX", 3), "abX");
    }

    #[test]
    fn test_empty_and_start_of_line() {
        assert_eq!(extract_root("", 0), "");
        assert_eq!(extract_root("bon", 0), "");
        assert_eq!(extract_root("bon.", 4), "");
    }

    #[test]
    fn test_locate_root_span() {
        let span = locate_root("何时 西o", 5);
        assert_eq!(span.text, "o");
        assert_eq!(span.start, 4);
        assert_eq!(span.end, 5);

        let span = locate_root("x bona", 99);
        assert_eq!(span, RootSpan { text: "bona".to_string(), start: 2, end: 6 });
    }

    #[test]
    fn test_extracted_root_is_letters_touching_caret() {
        fn prop(line: String, caret: usize) -> TestResult {
            let len = line.chars().count();
            let caret = if len == 0 { 0 } else { caret % (len + 1) };
            let span = locate_root(&line, caret);

            if !span.text.chars().all(is_root_char) {
                return TestResult::failed();
            }
            if span.end != caret || span.end - span.start != span.text.chars().count() {
                return TestResult::failed();
            }
            // maximal: the character before the root is not a root character
            if span.start > 0 {
                let before = line.chars().nth(span.start - 1);
                if before.map_or(false, is_root_char) {
                    return TestResult::failed();
                }
            }
            // idempotent: extracting twice from the same state agrees
            if extract_root(&line, caret) != span.text {
                return TestResult::failed();
            }
            TestResult::passed()
        }

        QuickCheck::new()
            .tests(500)
            .quickcheck(prop as fn(String, usize) -> TestResult);
    }
}
