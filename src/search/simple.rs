use std::collections::HashSet;

use crate::core::cancel::CancellationToken;
use crate::core::error::Result;
use crate::index::key::PositionalKey;
use crate::search::verify::Verifier;
use crate::storage::key::KeyComponent;
use crate::storage::store::KvStore;

/// Inputs of a conjunctive search: an AND group of tokens, an optional
/// probe override, an OR group of facet tokens and pagination.
/// `limit == 0` means unlimited.
#[derive(Debug, Clone)]
pub struct SimpleSearchRequest<'a, T> {
    pub tokens: &'a [T],
    pub first_look_at: Option<T>,
    pub respect_token_order: bool,
    pub facets: &'a [T],
    pub skip: usize,
    pub limit: usize,
}

impl<'a, T> SimpleSearchRequest<'a, T> {
    pub fn new(tokens: &'a [T]) -> Self {
        SimpleSearchRequest {
            tokens,
            first_look_at: None,
            respect_token_order: false,
            facets: &[],
            skip: 0,
            limit: 0,
        }
    }
}

/// Probe-and-verify executor: enumerates the postings of one probe
/// token and verifies every candidate record against the remaining
/// constraints with a second iterator.
pub(crate) struct SimpleSearchExecutor<'a, T: KeyComponent, R: KeyComponent> {
    store: &'a KvStore<PositionalKey<T, R>>,
}

impl<'a, T: KeyComponent, R: KeyComponent> SimpleSearchExecutor<'a, T, R> {
    pub fn new(store: &'a KvStore<PositionalKey<T, R>>) -> Self {
        SimpleSearchExecutor { store }
    }

    pub fn execute(
        &self,
        request: &SimpleSearchRequest<'_, T>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        if request.tokens.is_empty() && request.facets.is_empty() {
            return Ok(Vec::new());
        }
        let facet_only = request.tokens.is_empty();
        let Some(probe) = request
            .first_look_at
            .or_else(|| request.tokens.first().copied())
            .or_else(|| request.facets.first().copied())
        else {
            return Ok(Vec::new());
        };

        let mut postings = self.store.iter();
        let mut verifier = Verifier::new(self.store);

        let mut results: Vec<R> = Vec::new();
        let mut accepted: HashSet<R> = HashSet::new();
        // A record rejected by pagination's skip; duplicates of the same
        // record under other `prev` values arrive consecutively, so one
        // slot suffices to keep them out.
        let mut skip_record: Option<R> = None;
        let mut off = 0usize;

        postings.seek(&PositionalKey::token_start(probe));
        while let Some((key, _)) = postings.next()? {
            if key.token != probe {
                break;
            }
            if cancellation.is_cancelled() {
                break;
            }
            let record = key.record;
            if skip_record == Some(record) || accepted.contains(&record) {
                continue;
            }

            if facet_only {
                if key.prev != probe {
                    continue;
                }
            } else {
                if !verifier.contains_all(
                    request.tokens,
                    record,
                    request.respect_token_order,
                    false,
                )? {
                    continue;
                }
                if !request.facets.is_empty()
                    && !verifier.contains_any(request.facets, record, true)?
                {
                    continue;
                }
            }

            if off >= request.skip {
                accepted.insert(record);
                results.push(record);
            } else {
                skip_record = Some(record);
            }
            off += 1;
            if request.limit > 0 && off == request.skip + request.limit {
                break;
            }
        }
        Ok(results)
    }
}
