//! Section classifier. Buckets resume lines under the most recent recognized header.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Matches a header line: one section keyword, optional colon, nothing else.
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(contact|experience|education|skills|projects|awards)\s*:?\s*$")
        .expect("section header pattern is valid")
});

/// The closed set of resume sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Contact,
    Experience,
    Education,
    Skills,
    Projects,
    Awards,
}

impl SectionKey {
    pub const ALL: [SectionKey; 6] = [
        SectionKey::Contact,
        SectionKey::Experience,
        SectionKey::Education,
        SectionKey::Skills,
        SectionKey::Projects,
        SectionKey::Awards,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::Contact => "contact",
            SectionKey::Experience => "experience",
            SectionKey::Education => "education",
            SectionKey::Skills => "skills",
            SectionKey::Projects => "projects",
            SectionKey::Awards => "awards",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn parse(name: &str) -> Option<SectionKey> {
        let name = name.trim();
        SectionKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name))
    }

    /// Returns the section a line introduces, if the whole line is a header.
    pub fn from_header_line(line: &str) -> Option<SectionKey> {
        HEADER_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| SectionKey::parse(m.as_str()))
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered section-to-text mapping. Keys are unique and keep first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    entries: Vec<(SectionKey, String)>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a section's text. An existing key is overwritten in place.
    pub fn insert(&mut self, key: SectionKey, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: SectionKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = SectionKey> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

/// Splits resume text into sections.
///
/// Lines are trimmed and blank lines skipped. Anything before the first header is dropped.
/// A repeated header discards what was collected for it so far but keeps its position.
pub fn classify_sections(text: &str) -> SectionMap {
    let mut order: Vec<SectionKey> = Vec::new();
    let mut buckets: Vec<Vec<&str>> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(key) = SectionKey::from_header_line(line) {
            let idx = match order.iter().position(|k| *k == key) {
                Some(idx) => {
                    buckets[idx].clear();
                    idx
                }
                None => {
                    order.push(key);
                    buckets.push(Vec::new());
                    order.len() - 1
                }
            };
            current = Some(idx);
            continue;
        }

        if let Some(idx) = current {
            buckets[idx].push(line);
        }
    }

    let mut sections = SectionMap::new();
    for (key, lines) in order.into_iter().zip(buckets) {
        sections.insert(key, lines.join("\n"));
    }
    sections
}
