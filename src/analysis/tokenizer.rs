use std::collections::HashSet;
use std::str::CharIndices;

use crate::analysis::hash::{HashGenerator, SipHashGenerator};
use crate::core::error::{Error, Result};

/// Byte range of one token inside the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub offset: usize,
    pub len: usize,
}

impl TokenSpan {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.offset..self.offset + self.len]
    }
}

/// Splits text into token spans. Implementations yield a finite,
/// non-restartable lazy sequence over the given buffer.
pub trait WordTokenizer: Send + Sync {
    fn spans<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = TokenSpan> + 'a>;

    fn clone_box(&self) -> Box<dyn WordTokenizer>;
}

/// Default tokenizer: contiguous runs of letters (and digits when
/// enabled) separated by anything else. Tokens shorter than the minimum
/// character count and hashed stop words are dropped.
pub struct SliceTokenizer {
    min_token_length: usize,
    include_digits: bool,
    stop_words: HashSet<u64>,
    hasher: Box<dyn HashGenerator>,
}

impl SliceTokenizer {
    pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 3;

    /// `min_token_length` is signed so that a negative minimum is
    /// rejected rather than silently wrapped.
    pub fn new(min_token_length: i64, include_digits: bool) -> Result<Self> {
        if min_token_length < 0 {
            return Err(Error::invalid_configuration(format!(
                "minimum token length must not be negative, got {}",
                min_token_length
            )));
        }
        Ok(SliceTokenizer {
            min_token_length: min_token_length as usize,
            include_digits,
            stop_words: HashSet::new(),
            hasher: Box::new(SipHashGenerator::default()),
        })
    }

    pub fn with_hasher(mut self, hasher: Box<dyn HashGenerator>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Registers stop words by their hashes; matching tokens are dropped
    /// from the output stream.
    pub fn with_stop_words<'a, I: IntoIterator<Item = &'a str>>(mut self, words: I) -> Self {
        for word in words {
            self.stop_words.insert(self.hasher.hash(word));
        }
        self
    }

    fn is_word_char(&self, ch: char) -> bool {
        ch.is_alphabetic() || (self.include_digits && ch.is_numeric())
    }
}

impl Default for SliceTokenizer {
    fn default() -> Self {
        SliceTokenizer {
            min_token_length: Self::DEFAULT_MIN_TOKEN_LENGTH,
            include_digits: false,
            stop_words: HashSet::new(),
            hasher: Box::new(SipHashGenerator::default()),
        }
    }
}

impl WordTokenizer for SliceTokenizer {
    fn spans<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = TokenSpan> + 'a> {
        Box::new(SpanIter {
            tokenizer: self,
            text,
            chars: text.char_indices(),
        })
    }

    fn clone_box(&self) -> Box<dyn WordTokenizer> {
        Box::new(SliceTokenizer {
            min_token_length: self.min_token_length,
            include_digits: self.include_digits,
            stop_words: self.stop_words.clone(),
            hasher: self.hasher.clone_box(),
        })
    }
}

struct SpanIter<'a> {
    tokenizer: &'a SliceTokenizer,
    text: &'a str,
    chars: CharIndices<'a>,
}

impl Iterator for SpanIter<'_> {
    type Item = TokenSpan;

    fn next(&mut self) -> Option<TokenSpan> {
        loop {
            // Skip separators to the start of the next run.
            let (start, first) = loop {
                let (idx, ch) = self.chars.next()?;
                if self.tokenizer.is_word_char(ch) {
                    break (idx, ch);
                }
            };

            let mut end = start + first.len_utf8();
            let mut char_count = 1usize;
            for (idx, ch) in self.chars.by_ref() {
                if !self.tokenizer.is_word_char(ch) {
                    break;
                }
                end = idx + ch.len_utf8();
                char_count += 1;
            }

            if char_count < self.tokenizer.min_token_length {
                continue;
            }
            let span = TokenSpan {
                offset: start,
                len: end - start,
            };
            if !self.tokenizer.stop_words.is_empty() {
                let hash = self.tokenizer.hasher.hash(span.slice(self.text));
                if self.tokenizer.stop_words.contains(&hash) {
                    continue;
                }
            }
            return Some(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokenizer: &SliceTokenizer, text: &str) -> Vec<String> {
        tokenizer
            .spans(text)
            .map(|span| span.slice(text).to_string())
            .collect()
    }

    #[test]
    fn splits_on_non_word_characters() {
        let tokenizer = SliceTokenizer::default();
        assert_eq!(
            words(&tokenizer, "quick brown-fox,jumps!"),
            vec!["quick", "brown", "fox", "jumps"]
        );
    }

    #[test]
    fn default_minimum_length_is_three() {
        let tokenizer = SliceTokenizer::default();
        assert_eq!(words(&tokenizer, "an ox ran far"), vec!["ran", "far"]);
    }

    #[test]
    fn digits_excluded_by_default() {
        let tokenizer = SliceTokenizer::default();
        assert_eq!(words(&tokenizer, "abc123def"), vec!["abc", "def"]);
    }

    #[test]
    fn digits_included_when_enabled() {
        let tokenizer = SliceTokenizer::new(3, true).unwrap();
        assert_eq!(words(&tokenizer, "abc123def"), vec!["abc123def"]);
    }

    #[test]
    fn negative_minimum_rejected() {
        assert!(SliceTokenizer::new(-1, false).is_err());
    }

    #[test]
    fn stop_words_dropped() {
        let tokenizer = SliceTokenizer::new(1, false)
            .unwrap()
            .with_stop_words(["the", "and"]);
        assert_eq!(
            words(&tokenizer, "the cat and the dog"),
            vec!["cat", "dog"]
        );
    }

    #[test]
    fn unicode_runs() {
        let tokenizer = SliceTokenizer::new(1, false).unwrap();
        assert_eq!(
            words(&tokenizer, "こんにちは 世界"),
            vec!["こんにちは", "世界"]
        );
    }

    #[test]
    fn empty_and_separator_only_inputs() {
        let tokenizer = SliceTokenizer::default();
        assert!(words(&tokenizer, "").is_empty());
        assert!(words(&tokenizer, " ,;- ").is_empty());
    }
}
