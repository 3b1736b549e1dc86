//! Source text → tagged string.
//! Scans left to right; at each position the first dictionary key (in load
//! order) that matches is replaced by `[tag]`, otherwise one char is copied
//! through literally.

use std::sync::Arc;

use super::dictionary::Dictionary;

/// Curly apostrophe typed by most editors.
const RIGHT_SINGLE_QUOTE: char = '\u{2019}';
/// CJK wave dash, rendered like a tilde.
const WAVE_DASH: char = '\u{301C}';

/// How dictionary keys are compared against the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseMode {
    pub fn from_flag(case_sensitive: bool) -> Self {
        if case_sensitive {
            CaseMode::Sensitive
        } else {
            CaseMode::Insensitive
        }
    }
}

/// One unit of tagger output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    /// A dictionary match; `consumed` is the number of input chars it covers.
    Tag { name: &'a str, consumed: usize },
    Literal(char),
}

impl Span<'_> {
    pub fn consumed(&self) -> usize {
        match self {
            Span::Tag { consumed, .. } => *consumed,
            Span::Literal(_) => 1,
        }
    }
}

pub struct Tagger {
    dictionary: Arc<Dictionary>,
}

impl Tagger {
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self { dictionary }
    }

    /// Tag `text` and render the result as a tagged string.
    pub fn tag(&self, text: &str, mode: CaseMode) -> String {
        let normalized = normalize(text);
        let mut out = String::with_capacity(normalized.len() * 2);
        for span in self.spans_normalized(&normalized, mode) {
            match span {
                Span::Tag { name, .. } => {
                    out.push('[');
                    out.push_str(name);
                    out.push(']');
                }
                Span::Literal(c) => out.push(c),
            }
        }
        out
    }

    /// Tag `text` into spans (after normalization).
    pub fn spans(&self, text: &str, mode: CaseMode) -> Vec<Span<'_>> {
        self.spans_normalized(&normalize(text), mode)
    }

    fn spans_normalized(&self, text: &str, mode: CaseMode) -> Vec<Span<'_>> {
        let mut spans = Vec::new();
        let mut cursor = 0;

        while cursor < text.len() {
            let rest = &text[cursor..];
            let matched = self.dictionary.entries().iter().find_map(|entry| {
                match_prefix(rest, &entry.key, mode).map(|len| (entry, len))
            });

            match matched {
                Some((entry, len)) => {
                    spans.push(Span::Tag {
                        name: &entry.value,
                        consumed: entry.key.chars().count(),
                    });
                    cursor += len;
                }
                None => {
                    // `cursor` is always on a char boundary and `rest` is non-empty.
                    if let Some(c) = rest.chars().next() {
                        spans.push(Span::Literal(c));
                        cursor += c.len_utf8();
                    }
                }
            }
        }

        spans
    }
}

/// Replace the curly apostrophe and the wave dash with their ASCII forms.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            RIGHT_SINGLE_QUOTE => '\'',
            WAVE_DASH => '~',
            c => c,
        })
        .collect()
}

/// Byte length of `rest` covered by `key` if `rest` starts with it.
/// Insensitive matching compares char by char, so a match always consumes
/// exactly as many input chars as the key has.
fn match_prefix(rest: &str, key: &str, mode: CaseMode) -> Option<usize> {
    match mode {
        CaseMode::Sensitive => rest.starts_with(key).then_some(key.len()),
        CaseMode::Insensitive => {
            let mut input = rest.char_indices();
            let mut end = 0;
            for k in key.chars() {
                let (i, c) = input.next()?;
                if !chars_eq_ignore_case(c, k) {
                    return None;
                }
                end = i + c.len_utf8();
            }
            Some(end)
        }
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::dictionary::DictionaryEntry;

    fn tagger(pairs: &[(&str, &str)]) -> Tagger {
        let entries = pairs.iter().map(|(k, v)| DictionaryEntry {
            key: k.to_string(),
            value: v.to_string(),
        });
        Tagger::new(Arc::new(Dictionary::from_entries(entries)))
    }

    #[test]
    fn tags_known_token_and_passes_rest_through() {
        let t = tagger(&[("hi", "greet")]);
        assert_eq!(t.tag("hi there", CaseMode::Sensitive), "[greet] there");
    }

    #[test]
    fn empty_input() {
        let t = tagger(&[("hi", "greet")]);
        assert_eq!(t.tag("", CaseMode::Sensitive), "");
        assert!(t.spans("", CaseMode::Sensitive).is_empty());
    }

    #[test]
    fn declaration_order_wins_over_length() {
        let short_first = tagger(&[("a", "one"), ("ab", "two")]);
        assert_eq!(short_first.tag("ab", CaseMode::Sensitive), "[one]b");

        let long_first = tagger(&[("ab", "two"), ("a", "one")]);
        assert_eq!(long_first.tag("ab", CaseMode::Sensitive), "[two]");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let t = tagger(&[("mi", "me"), ("toki", "talk"), (" ", "sp")]);
        let first = t.tag("mi toki ala", CaseMode::Sensitive);
        for _ in 0..5 {
            assert_eq!(t.tag("mi toki ala", CaseMode::Sensitive), first);
        }
        assert_eq!(first, "[me][sp][talk][sp]ala");
    }

    #[test]
    fn normalizes_apostrophe_and_wave_dash() {
        let t = tagger(&[("don't", "neg"), ("~", "tilde")]);
        assert_eq!(t.tag("don\u{2019}t", CaseMode::Sensitive), "[neg]");
        assert_eq!(t.tag("\u{301C}", CaseMode::Sensitive), "[tilde]");
        assert_eq!(normalize("a\u{2019}b\u{301C}"), "a'b~");
    }

    #[test]
    fn every_input_char_is_consumed_once() {
        let t = tagger(&[("hé", "word"), ("llo", "tail"), ("日本", "japan")]);
        for input in ["héllo", "xx日本語yy", "", "llollo", "HÉLLO wörld"] {
            let spans = t.spans(input, CaseMode::Sensitive);
            let consumed: usize = spans.iter().map(Span::consumed).sum();
            assert_eq!(consumed, normalize(input).chars().count(), "input {input:?}");
        }
    }

    #[test]
    fn insensitive_mode_folds_case() {
        let t = tagger(&[("hi", "greet")]);
        assert_eq!(t.tag("HI", CaseMode::Sensitive), "HI");
        assert_eq!(t.tag("HI", CaseMode::Insensitive), "[greet]");
        assert_eq!(t.tag("Hi hI", CaseMode::Insensitive), "[greet] [greet]");
    }

    #[test]
    fn insensitive_coverage_holds_for_non_ascii() {
        let t = tagger(&[("ÉCOLE", "school")]);
        let spans = t.spans("école!", CaseMode::Insensitive);
        assert_eq!(
            spans,
            vec![
                Span::Tag {
                    name: "school",
                    consumed: 5
                },
                Span::Literal('!'),
            ]
        );
    }

    #[test]
    fn multibyte_literals_survive() {
        let t = tagger(&[]);
        assert_eq!(t.tag("ünï", CaseMode::Sensitive), "ünï");
    }
}
