use std::collections::HashSet;

use crate::analysis::hash::{HashGenerator, SipHashGenerator};
use crate::analysis::tokenizer::{SliceTokenizer, WordTokenizer};
use crate::core::cancel::CancellationToken;
use crate::core::config::IndexOptions;
use crate::core::error::Result;
use crate::index::positional::{IndexStats, PositionalIndex};
use crate::query::ast::SearchQuery;
use crate::query::lower::QueryLowerer;
use crate::query::parser::parse;
use crate::search::simple::SimpleSearchRequest;
use crate::storage::key::KeyComponent;

/// Start-of-document sentinel: the first token of a record has no
/// previous token.
const START_SENTINEL: u64 = 0;

/// Glues the tokenizer, hash generator and positional index into the
/// public add/update/delete/search surface. Records are caller-chosen
/// fixed-size identifiers; tokens are `u64` hashes of the text.
pub struct SearchEngine<R: KeyComponent> {
    index: PositionalIndex<u64, R>,
    tokenizer: Box<dyn WordTokenizer>,
    hasher: Box<dyn HashGenerator>,
}

impl<R: KeyComponent> SearchEngine<R> {
    /// Opens an engine with the default tokenizer and hash generator.
    pub fn open(options: IndexOptions) -> Result<Self> {
        Self::with_components(
            options,
            Box::new(SliceTokenizer::default()),
            Box::new(SipHashGenerator::default()),
        )
    }

    pub fn with_components(
        options: IndexOptions,
        tokenizer: Box<dyn WordTokenizer>,
        hasher: Box<dyn HashGenerator>,
    ) -> Result<Self> {
        Ok(SearchEngine {
            index: PositionalIndex::open(options)?,
            tokenizer,
            hasher,
        })
    }

    pub fn index(&self) -> &PositionalIndex<u64, R> {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// `(token, prev)` chain of a text, starting at the zero sentinel.
    fn triples(&self, text: &str) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut prev = START_SENTINEL;
        for span in self.tokenizer.spans(text) {
            let token = self.hasher.hash(span.slice(text));
            out.push((token, prev));
            prev = token;
        }
        out
    }

    fn hashed_tokens(&self, text: &str) -> Vec<u64> {
        self.tokenizer
            .spans(text)
            .map(|span| self.hasher.hash(span.slice(text)))
            .collect()
    }

    fn facet_token(&self, name: &str, value: &str) -> u64 {
        self.hasher.hash(&format!("{}:{}", name, value))
    }

    /// Indexes the text under the record identifier.
    pub fn add_record(&self, record: R, text: &str) -> Result<()> {
        for (token, prev) in self.triples(text) {
            self.index.upsert(token, record, prev)?;
        }
        Ok(())
    }

    /// Replaces the record's text, writing only the difference between
    /// the two token chains.
    pub fn update_record(&self, record: R, old_text: &str, new_text: &str) -> Result<()> {
        let old: HashSet<(u64, u64)> = self.triples(old_text).into_iter().collect();
        let new: HashSet<(u64, u64)> = self.triples(new_text).into_iter().collect();
        for &(token, prev) in old.difference(&new) {
            self.index.delete(token, record, prev)?;
        }
        for &(token, prev) in new.difference(&old) {
            self.index.upsert(token, record, prev)?;
        }
        Ok(())
    }

    /// Removes the triples derivable from the text. Returns how many
    /// were targeted.
    pub fn delete_tokens(&self, record: R, text: &str) -> Result<usize> {
        let triples: HashSet<(u64, u64)> = self.triples(text).into_iter().collect();
        for &(token, prev) in &triples {
            self.index.delete(token, record, prev)?;
        }
        Ok(triples.len())
    }

    /// Removes every triple of the record. Returns how many were
    /// removed.
    pub fn delete_record(&self, record: R) -> Result<usize> {
        self.index.delete_record(record)
    }

    /// Attaches a `(name, value)` facet as its self-referential triple.
    pub fn add_facet(&self, record: R, name: &str, value: &str) -> Result<()> {
        let token = self.facet_token(name, value);
        self.index.upsert(token, record, token)
    }

    pub fn delete_facet(&self, record: R, name: &str, value: &str) -> Result<()> {
        let token = self.facet_token(name, value);
        self.index.delete(token, record, token)
    }

    /// Conjunctive search over the words of `text`, optionally filtered
    /// to records carrying at least one of the facets. Blank text with
    /// no facets is an empty result, not an error.
    pub fn simple_search(
        &self,
        text: &str,
        facets: &[(&str, &str)],
        respect_token_order: bool,
        skip: usize,
        limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        let tokens = self.hashed_tokens(text);
        let facet_tokens: Vec<u64> = facets
            .iter()
            .map(|(name, value)| self.facet_token(name, value))
            .collect();
        let request = SimpleSearchRequest {
            tokens: &tokens,
            first_look_at: None,
            respect_token_order,
            facets: &facet_tokens,
            skip,
            limit,
        };
        self.index.simple_search(&request, cancellation)
    }

    /// Parses, lowers and executes a query string.
    pub fn search(
        &self,
        query_text: &str,
        skip: usize,
        limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed = parse(query_text)?;
        let lowerer = QueryLowerer::new(self.tokenizer.as_ref(), self.hasher.as_ref());
        let query = SearchQuery::new(lowerer.lower(&parsed))
            .with_skip(skip)
            .with_limit(limit);
        self.index.search(&query, cancellation)
    }

    /// Lowers and executes an already-built string query.
    pub fn search_query(
        &self,
        query: &SearchQuery<String>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        let lowerer = QueryLowerer::new(self.tokenizer.as_ref(), self.hasher.as_ref());
        self.index.search(&lowerer.lower_query(query), cancellation)
    }

    pub fn evict_to_disk(&self) -> Result<()> {
        self.index.evict_to_disk()
    }

    pub fn try_cancel_background_threads(&self) {
        self.index.try_cancel_background_threads();
    }

    pub fn wait_for_background_threads(&self) {
        self.index.wait_for_background_threads();
    }

    pub fn is_read_only(&self) -> bool {
        self.index.is_read_only()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.index.set_read_only(read_only);
    }

    pub fn is_index_dropped(&self) -> bool {
        self.index.is_dropped()
    }

    /// Destroys the index irreversibly.
    pub fn drop_index(&self) -> Result<()> {
        self.index.drop_index()
    }
}
