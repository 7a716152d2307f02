//! GitHub-compatible heading slugs.
//!
//! A [`Slugger`] remembers every slug it has produced, so repeated headings
//! within one document get `-1`, `-2`, ... suffixes. Each document gets its
//! own slugger; identical headings in different files share a slug.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // letters, marks, numbers, connector punctuation, space, hyphen
        Regex::new(r"[^\p{L}\p{M}\p{N}\p{Pc} -]").expect("slug regex is valid")
    })
}

/// Lowercase, drop punctuation and symbols, turn spaces into hyphens.
///
/// Stateless: `slugify("Hello World!") == "hello-world"`.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    disallowed().replace_all(&lowered, "").replace(' ', "-")
}

/// Stateful slug generator with per-instance collision tracking.
#[derive(Debug, Default, Clone)]
pub struct Slugger {
    occurrences: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slug for `value`, unique among all slugs this instance has produced.
    pub fn slug(&mut self, value: &str) -> String {
        let original = slugify(value);
        let mut result = original.clone();

        while self.occurrences.contains_key(&result) {
            let count = self.occurrences.entry(original.clone()).or_insert(0);
            *count += 1;
            result = format!("{}-{}", original, count);
        }

        self.occurrences.insert(result.clone(), 0);
        result
    }
}
