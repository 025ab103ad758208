use crate::core::error::Result;
use crate::index::key::PositionalKey;
use crate::storage::iter::StoreIter;
use crate::storage::key::KeyComponent;
use crate::storage::store::KvStore;

/// Candidate verification against the primary index. Owns its own
/// iterator so the enumerating iterator never loses its position to a
/// nested seek.
pub(crate) struct Verifier<'a, T: KeyComponent, R: KeyComponent> {
    iter: StoreIter<'a, PositionalKey<T, R>>,
}

impl<'a, T: KeyComponent, R: KeyComponent> Verifier<'a, T, R> {
    pub fn new(store: &'a KvStore<PositionalKey<T, R>>) -> Self {
        Verifier { iter: store.iter() }
    }

    /// Whether the record contains every token. With `respect_order`,
    /// each token after the first must be immediately preceded by the
    /// previously verified one; the first accepts any predecessor. The
    /// facet variant checks each token's self-referential triple.
    pub fn contains_all(
        &mut self,
        tokens: &[T],
        record: R,
        respect_order: bool,
        is_facet: bool,
    ) -> Result<bool> {
        if is_facet {
            for &token in tokens {
                if !self.has_facet(token, record)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        let mut prev: Option<T> = None;
        for &token in tokens {
            let seek_prev = prev.unwrap_or(T::MIN);
            self.iter
                .seek(&PositionalKey::new(token, record, seek_prev));
            let Some((key, _)) = self.iter.next()? else {
                return Ok(false);
            };
            if key.token != token || key.record != record {
                return Ok(false);
            }
            if respect_order {
                if let Some(prev) = prev {
                    if key.prev != prev {
                        return Ok(false);
                    }
                }
                prev = Some(token);
            }
        }
        Ok(true)
    }

    /// Whether the record contains at least one of the tokens.
    pub fn contains_any(&mut self, tokens: &[T], record: R, is_facet: bool) -> Result<bool> {
        for &token in tokens {
            let hit = if is_facet {
                self.has_facet(token, record)?
            } else {
                self.has_token(token, record)?
            };
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn has_token(&mut self, token: T, record: R) -> Result<bool> {
        self.iter.seek(&PositionalKey::record_start(token, record));
        match self.iter.next()? {
            Some((key, _)) => Ok(key.token == token && key.record == record),
            None => Ok(false),
        }
    }

    /// A facet is present only as its exact self-referential triple.
    fn has_facet(&mut self, token: T, record: R) -> Result<bool> {
        let target = PositionalKey::new(token, record, token);
        self.iter.seek(&target);
        match self.iter.next()? {
            Some((key, _)) => Ok(key == target),
            None => Ok(false),
        }
    }
}
