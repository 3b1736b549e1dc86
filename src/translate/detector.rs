//! Unknown-token detection over tagged strings.
//! Only `[name]` pairs whose name is a dictionary tag count as recognised.
//! Everything between two recognised tags is one literal run, brackets
//! included; a run of three or more chars means part of the input was not
//! understood, and so does any run carrying a bracket.

use std::collections::HashSet;

use regex::Regex;

use super::dictionary::Dictionary;

/// Minimum run length (in chars, before trimming) reported as unknown.
pub const MIN_UNKNOWN_RUN: usize = 3;

pub struct UnknownDetector {
    /// Candidate `[name]` pairs; the name is checked against `tag_names`.
    tags: Regex,
    tag_names: HashSet<String>,
}

impl UnknownDetector {
    pub fn new(tag_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            tags: Regex::new(r"\[([^\[\]]*)\]").unwrap(),
            tag_names: tag_names.into_iter().collect(),
        }
    }

    pub fn for_dictionary(dictionary: &Dictionary) -> Self {
        Self::new(dictionary.entries().iter().map(|e| e.value.clone()))
    }

    /// Trimmed unknown runs in order of appearance.
    pub fn find_unknown(&self, tagged: &str) -> Vec<String> {
        let mut unknown = Vec::new();
        let mut run_start = 0;

        for caps in self.tags.captures_iter(tagged) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !self.tag_names.contains(name.as_str()) {
                continue;
            }
            push_run(&tagged[run_start..whole.start()], &mut unknown);
            run_start = whole.end();
        }
        push_run(&tagged[run_start..], &mut unknown);

        unknown
    }
}

fn push_run(run: &str, unknown: &mut Vec<String>) {
    let has_bracket = run.contains(['[', ']']);
    if !has_bracket && run.chars().count() < MIN_UNKNOWN_RUN {
        return;
    }
    let trimmed = run.trim();
    if !trimmed.is_empty() {
        unknown.push(trimmed.to_string());
    }
}
