use std::hash::Hash;

use crate::storage::key::{KeyComponent, StoreKey};

/// Primary index key. Encodes both "record contains token" and "the
/// token immediately before it is `prev`" in one composite key; the
/// derived ordering is lexicographic on `(token, record, prev)`, which
/// clusters all postings of a token, and within them all entries of a
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionalKey<T, R> {
    pub token: T,
    pub record: R,
    pub prev: T,
}

impl<T: KeyComponent, R: KeyComponent> PositionalKey<T, R> {
    pub fn new(token: T, record: R, prev: T) -> Self {
        PositionalKey {
            token,
            record,
            prev,
        }
    }

    /// Smallest key with the given token; seek target for posting
    /// enumeration.
    pub fn token_start(token: T) -> Self {
        PositionalKey {
            token,
            record: R::MIN,
            prev: T::MIN,
        }
    }

    /// Smallest key with the given token and record; seek target for
    /// verification.
    pub fn record_start(token: T, record: R) -> Self {
        PositionalKey {
            token,
            record,
            prev: T::MIN,
        }
    }
}

impl<T: KeyComponent, R: KeyComponent> StoreKey for PositionalKey<T, R> {
    const ENCODED_LEN: usize = 2 * T::ENCODED_LEN + R::ENCODED_LEN;

    fn encode_into(&self, out: &mut Vec<u8>) {
        self.token.encode_into(out);
        self.record.encode_into(out);
        self.prev.encode_into(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        let token = T::decode(&bytes[..T::ENCODED_LEN]);
        let record = R::decode(&bytes[T::ENCODED_LEN..T::ENCODED_LEN + R::ENCODED_LEN]);
        let prev = T::decode(&bytes[T::ENCODED_LEN + R::ENCODED_LEN..]);
        PositionalKey {
            token,
            record,
            prev,
        }
    }
}

/// Reverse index key `(record, token)`: clusters every distinct token of
/// a record so deletion can walk just that record's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReverseKey<R, T> {
    pub record: R,
    pub token: T,
}

impl<R: KeyComponent, T: KeyComponent> ReverseKey<R, T> {
    pub fn new(record: R, token: T) -> Self {
        ReverseKey { record, token }
    }

    pub fn record_start(record: R) -> Self {
        ReverseKey {
            record,
            token: T::MIN,
        }
    }
}

impl<R: KeyComponent, T: KeyComponent> StoreKey for ReverseKey<R, T> {
    const ENCODED_LEN: usize = R::ENCODED_LEN + T::ENCODED_LEN;

    fn encode_into(&self, out: &mut Vec<u8>) {
        self.record.encode_into(out);
        self.token.encode_into(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        let record = R::decode(&bytes[..R::ENCODED_LEN]);
        let token = T::decode(&bytes[R::ENCODED_LEN..]);
        ReverseKey { record, token }
    }
}
