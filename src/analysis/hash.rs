use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::analysis::normalize::CharNormalizer;

// Fixed keys: token hashes are persisted, so they must be stable across
// processes and platforms.
const HASH_KEY_0: u64 = 0x6c65_7873_746f_6e65;
const HASH_KEY_1: u64 = 0x0123_4567_89ab_cdef;

/// Maps a piece of text to a `u64` token. Deterministic, and
/// case-insensitive unless configured otherwise. Whitespace-only input
/// hashes to `0`, the reserved "no previous token" sentinel.
pub trait HashGenerator: Send + Sync {
    fn hash(&self, text: &str) -> u64;

    fn clone_box(&self) -> Box<dyn HashGenerator>;
}

/// Default keyed SipHash generator.
#[derive(Debug, Clone, Copy)]
pub struct SipHashGenerator {
    pub case_sensitive: bool,
}

impl Default for SipHashGenerator {
    fn default() -> Self {
        SipHashGenerator {
            case_sensitive: false,
        }
    }
}

fn hash_chars<I: Iterator<Item = char>>(chars: I, case_sensitive: bool) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(HASH_KEY_0, HASH_KEY_1);
    for ch in chars {
        if case_sensitive {
            hasher.write_u32(ch as u32);
        } else {
            for folded in ch.to_lowercase() {
                hasher.write_u32(folded as u32);
            }
        }
    }
    hasher.finish()
}

impl HashGenerator for SipHashGenerator {
    fn hash(&self, text: &str) -> u64 {
        if text.chars().all(char::is_whitespace) {
            return 0;
        }
        hash_chars(text.chars(), self.case_sensitive)
    }

    fn clone_box(&self) -> Box<dyn HashGenerator> {
        Box::new(*self)
    }
}

/// Hash generator that applies a per-character normalization (diacritic
/// folding and the like) before hashing.
pub struct NormalizingHashGenerator {
    normalizer: Box<dyn CharNormalizer>,
    case_sensitive: bool,
}

impl NormalizingHashGenerator {
    pub fn new(normalizer: Box<dyn CharNormalizer>) -> Self {
        NormalizingHashGenerator {
            normalizer,
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }
}

impl HashGenerator for NormalizingHashGenerator {
    fn hash(&self, text: &str) -> u64 {
        if text.chars().all(char::is_whitespace) {
            return 0;
        }
        hash_chars(
            text.chars().map(|c| self.normalizer.normalize(c)),
            self.case_sensitive,
        )
    }

    fn clone_box(&self) -> Box<dyn HashGenerator> {
        Box::new(NormalizingHashGenerator {
            normalizer: self.normalizer.clone_box(),
            case_sensitive: self.case_sensitive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::normalize::LatinFoldingNormalizer;

    #[test]
    fn deterministic() {
        let hasher = SipHashGenerator::default();
        assert_eq!(hasher.hash("fox"), hasher.hash("fox"));
    }

    #[test]
    fn case_insensitive_by_default() {
        let hasher = SipHashGenerator::default();
        assert_eq!(hasher.hash("Fox"), hasher.hash("fOX"));
    }

    #[test]
    fn case_sensitive_when_configured() {
        let hasher = SipHashGenerator {
            case_sensitive: true,
        };
        assert_ne!(hasher.hash("Fox"), hasher.hash("fox"));
    }

    #[test]
    fn whitespace_only_is_zero() {
        let hasher = SipHashGenerator::default();
        assert_eq!(hasher.hash(""), 0);
        assert_eq!(hasher.hash(" \t\n"), 0);
        assert_ne!(hasher.hash("a"), 0);
    }

    #[test]
    fn normalizing_variant_folds_diacritics() {
        let plain = SipHashGenerator::default();
        let folding = NormalizingHashGenerator::new(Box::new(LatinFoldingNormalizer));
        assert_eq!(folding.hash("café"), plain.hash("cafe"));
    }
}
