//! Output sanitizer for generated text.
//!
//! Three passes, in order:
//! 1. collapse immediately repeated words or word runs into one occurrence,
//! 2. turn U+2019 into an ASCII apostrophe,
//! 3. squeeze every whitespace run (newlines included) to one space and trim.
//!
//! Pass 3 flattens line breaks, so bulleted model output comes back on a single line.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Longest word run considered when looking for repeats.
const MAX_REPEAT_WORDS: usize = 32;

/// Runs all sanitization passes. Idempotent.
pub fn sanitize(text: &str) -> String {
    let deduped = collapse_repeats(text);
    let quoted = normalize_quotes(&deduped);
    collapse_whitespace(&quoted)
}

pub fn normalize_quotes(text: &str) -> String {
    text.replace('\u{2019}', "'")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text split into words and the separators around them.
///
/// `gaps[i]` sits between `words[i]` and `words[i + 1]`.
struct Tokens {
    prefix: String,
    words: Vec<String>,
    gaps: Vec<String>,
    suffix: String,
}

impl Tokens {
    fn parse(text: &str) -> Self {
        let matches: Vec<_> = WORD_RE.find_iter(text).collect();
        let Some(first) = matches.first() else {
            return Tokens {
                prefix: text.to_string(),
                words: Vec::new(),
                gaps: Vec::new(),
                suffix: String::new(),
            };
        };

        let prefix = text[..first.start()].to_string();
        let words = matches.iter().map(|m| m.as_str().to_string()).collect();
        let gaps = matches
            .windows(2)
            .map(|pair| text[pair[0].end()..pair[1].start()].to_string())
            .collect();
        let suffix = matches
            .last()
            .map(|m| text[m.end()..].to_string())
            .unwrap_or_default();

        Tokens {
            prefix,
            words,
            gaps,
            suffix,
        }
    }

    fn render(&self) -> String {
        let mut out = self.prefix.clone();
        for (i, word) in self.words.iter().enumerate() {
            out.push_str(word);
            if let Some(gap) = self.gaps.get(i) {
                out.push_str(gap);
            }
        }
        out.push_str(&self.suffix);
        out
    }

    /// Whether words `[a, a+len)` and `[b, b+len)` form the same run.
    ///
    /// Separators inside the run are compared after quote and whitespace normalization,
    /// so the later passes cannot produce a repeat this pass missed.
    fn same_run(&self, a: usize, b: usize, len: usize) -> bool {
        (0..len).all(|k| self.words[a + k] == self.words[b + k])
            && (0..len.saturating_sub(1))
                .all(|k| gap_key(&self.gaps[a + k]) == gap_key(&self.gaps[b + k]))
    }

    /// Finds the leftmost, shortest run at or after `from` immediately followed by a copy
    /// of itself.
    fn find_repeat(&self, from: usize) -> Option<(usize, usize)> {
        let n = self.words.len();
        for start in from..n {
            let max_len = ((n - start) / 2).min(MAX_REPEAT_WORDS);
            for len in 1..=max_len {
                let join = &self.gaps[start + len - 1];
                if is_blank_gap(join) && self.same_run(start, start + len, len) {
                    return Some((start, len));
                }
            }
        }
        None
    }

    /// Drops the second copy of the run at `start` together with the gap that joined them.
    fn remove_copy(&mut self, start: usize, len: usize) {
        let copy = start + len;
        self.words.drain(copy..copy + len);
        // Gaps `copy-1 ..copy+len-1` belong to the joint and the copy's interior;
        // the gap after the copy (if any) becomes the run's trailing gap.
        self.gaps.drain(copy - 1..copy + len - 1);
    }
}

fn is_blank_gap(gap: &str) -> bool {
    !gap.is_empty() && gap.chars().all(char::is_whitespace)
}

fn gap_key(gap: &str) -> String {
    collapse_whitespace_inner(&normalize_quotes(gap))
}

/// Whitespace squeeze that keeps a single leading/trailing space, used for comparing gaps.
fn collapse_whitespace_inner(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Collapses `X X X` into `X` where `X` is a word or a run of words.
pub fn collapse_repeats(text: &str) -> String {
    let mut tokens = Tokens::parse(text);
    let mut from = 0;
    while let Some((start, len)) = tokens.find_repeat(from) {
        tokens.remove_copy(start, len);
        // A removal changes nothing before gap `start + len - 1`, and a doubled run spans
        // at most 2 * MAX_REPEAT_WORDS words, so no earlier start can have become a repeat.
        from = start.saturating_sub(2 * MAX_REPEAT_WORDS);
    }
    tokens.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_repeated_phrase() {
        assert_eq!(sanitize("Did X Did X"), "Did X");
    }

    #[test]
    fn test_collapses_repeated_word_runs_of_any_count() {
        assert_eq!(sanitize("the the the cache"), "the cache");
        assert_eq!(sanitize("Led Led"), "Led");
    }

    #[test]
    fn test_repeat_detection_is_word_boundary_based() {
        // "the theory" is not a repeat of "the".
        assert_eq!(sanitize("the theory holds"), "the theory holds");
        assert_eq!(sanitize("go go."), "go.");
    }

    #[test]
    fn test_repeats_are_case_sensitive() {
        assert_eq!(sanitize("The the end"), "The the end");
    }

    #[test]
    fn test_repeat_must_be_whitespace_separated() {
        assert_eq!(sanitize("Rust, Rust"), "Rust, Rust");
        assert_eq!(sanitize("Rust\n\tRust"), "Rust");
    }

    #[test]
    fn test_normalizes_right_single_quote() {
        assert_eq!(sanitize("Jane\u{2019}s team didn\u{2019}t stop"), "Jane's team didn't stop");
    }

    #[test]
    fn test_collapses_whitespace_and_trims() {
        assert_eq!(sanitize("  Built   a\n\ncache \t "), "Built a cache");
    }

    #[test]
    fn test_multiline_bullets_are_flattened() {
        let input = "- Company: Acme\n- Position: Engineer\n  * Built a cache\n  * Built a cache\n";
        assert_eq!(
            sanitize(input),
            "- Company: Acme - Position: Engineer * Built a cache * Built a cache"
        );
    }

    #[test]
    fn test_multiline_duplicate_lines_collapse() {
        assert_eq!(sanitize("Did X\nDid X\nEducation"), "Did X Education");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "Did X Did X",
            "don\u{2019}t don't stop",
            "a  b\n\na  b c c c",
            "- Led team\n- Led team\n",
            "x, y x, y x,  y",
            "",
            "   ",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_quote_variants_of_same_phrase_collapse_in_one_pass() {
        assert_eq!(sanitize("don\u{2019}t don't stop"), "don't stop");
    }

    #[test]
    fn test_text_without_words_is_only_whitespace_collapsed() {
        assert_eq!(sanitize(" -- \n * "), "-- *");
    }

    /// Reference collapse that rescans from the first word after every removal.
    fn collapse_repeats_full_rescan(text: &str) -> String {
        let mut tokens = Tokens::parse(text);
        while let Some((start, len)) = tokens.find_repeat(0) {
            tokens.remove_copy(start, len);
        }
        tokens.render()
    }

    #[test]
    fn test_resumed_scan_matches_full_rescan() {
        let inputs = [
            "x y x y y",
            "a b c a b c c c d",
            "one two one two one two three three",
            "Led  Led\nteams teams of of five",
            "alpha beta alpha beta gamma alpha beta alpha beta",
        ];
        for input in inputs {
            assert_eq!(collapse_repeats(input), collapse_repeats_full_rescan(input), "{input}");
        }

        // Removals that expose a repeat starting well before the removed copy.
        let long_run: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let run = long_run.join(" ");
        let input = format!("{run} {run} tail tail {run}");
        assert_eq!(collapse_repeats(&input), collapse_repeats_full_rescan(&input));
    }

    #[test]
    fn test_long_text_with_many_trailing_repeats() {
        let mut words: Vec<String> = (0..3000).map(|i| format!("word{i}")).collect();
        words.extend(std::iter::repeat("again".to_string()).take(1500));
        let out = collapse_repeats(&words.join(" "));

        assert!(out.starts_with("word0 word1 word2"));
        assert!(out.ends_with("word2999 again"));
        assert_eq!(out.split(' ').count(), 3001);
    }
}
