use std::collections::HashSet;

use crate::core::cancel::CancellationToken;
use crate::core::error::Result;
use crate::index::key::PositionalKey;
use crate::query::ast::{NodeKind, QueryNode, SearchQuery};
use crate::search::verify::Verifier;
use crate::storage::key::KeyComponent;
use crate::storage::store::KvStore;

/// Evaluates arbitrary Boolean/facet query trees. Candidate records are
/// enumerated through probe tokens chosen from the positive parts of
/// the tree; queries with no positive criteria fall back to a scan of
/// every key in the primary index.
pub(crate) struct AdvancedSearchExecutor<'a, T: KeyComponent, R: KeyComponent> {
    store: &'a KvStore<PositionalKey<T, R>>,
}

impl<'a, T: KeyComponent, R: KeyComponent> AdvancedSearchExecutor<'a, T, R> {
    pub fn new(store: &'a KvStore<PositionalKey<T, R>>) -> Self {
        AdvancedSearchExecutor { store }
    }

    pub fn execute(
        &self,
        query: &SearchQuery<T>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<R>> {
        let node = &query.node;
        if node.is_empty() {
            return Ok(Vec::new());
        }
        let mut verifier = Verifier::new(self.store);

        if !node.has_any_positive_criteria() {
            return self.full_scan(node, query.skip, query.limit, cancellation, &mut verifier);
        }

        let probes = find_probe_tokens(node);
        if probes.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<R> = Vec::new();
        let mut accepted: HashSet<R> = HashSet::new();
        // Records consumed by pagination's skip; unlike the simple
        // executor there can be several probes, so duplicates are not
        // necessarily consecutive and a set is needed.
        let mut skip_records: HashSet<R> = HashSet::new();
        let mut off = 0usize;

        'probes: for (probe, is_facet) in probes {
            let mut postings = self.store.iter();
            postings.seek(&PositionalKey::token_start(probe));
            while let Some((key, _)) = postings.next()? {
                if key.token != probe {
                    break;
                }
                if cancellation.is_cancelled() {
                    break 'probes;
                }
                let record = key.record;
                if is_facet && key.prev != probe {
                    continue;
                }
                if accepted.contains(&record) || skip_records.contains(&record) {
                    continue;
                }
                if !matches(&mut verifier, node, record)? {
                    continue;
                }

                if off >= query.skip {
                    accepted.insert(record);
                    results.push(record);
                } else {
                    skip_records.insert(record);
                }
                off += 1;
                if query.limit > 0 && off == query.skip + query.limit {
                    break 'probes;
                }
            }
        }
        Ok(results)
    }

    /// Applies the query to every record of the index. Only reachable
    /// for queries without positive criteria (pure negations).
    fn full_scan(
        &self,
        node: &QueryNode<T>,
        skip: usize,
        limit: usize,
        cancellation: &CancellationToken,
        verifier: &mut Verifier<'a, T, R>,
    ) -> Result<Vec<R>> {
        let mut results: Vec<R> = Vec::new();
        let mut checked: HashSet<R> = HashSet::new();
        let mut off = 0usize;

        let mut iter = self.store.iter();
        while let Some((key, _)) = iter.next()? {
            if cancellation.is_cancelled() {
                break;
            }
            let record = key.record;
            if !checked.insert(record) {
                continue;
            }
            if !matches(verifier, node, record)? {
                continue;
            }
            if off >= skip {
                results.push(record);
            }
            off += 1;
            if limit > 0 && off == skip + limit {
                break;
            }
        }
        Ok(results)
    }
}

/// Probe tokens for the positive parts of the tree, paired with their
/// facet flag. An empty result signals that the query cannot be driven
/// by postings enumeration.
pub(crate) fn find_probe_tokens<T: KeyComponent>(node: &QueryNode<T>) -> Vec<(T, bool)> {
    match node.kind {
        NodeKind::Not => Vec::new(),
        NodeKind::And => {
            if !node.tokens.is_empty() {
                let probe = node.first_look_at.unwrap_or(node.tokens[0]);
                vec![(probe, node.is_facet)]
            } else {
                // One satisfied child is enough to enumerate candidates;
                // take the cheapest (fewest probes).
                node.children
                    .iter()
                    .map(find_probe_tokens)
                    .filter(|list| !list.is_empty())
                    .min_by_key(|list| list.len())
                    .unwrap_or_default()
            }
        }
        NodeKind::Or => {
            if !node.tokens.is_empty() {
                node.tokens.iter().map(|&t| (t, node.is_facet)).collect()
            } else if node.children.iter().any(|c| c.kind == NodeKind::Not) {
                Vec::new()
            } else {
                // Every alternative must contribute probes, otherwise
                // enumeration would miss its matches.
                let mut out = Vec::new();
                for child in &node.children {
                    let list = find_probe_tokens(child);
                    if list.is_empty() {
                        return Vec::new();
                    }
                    out.extend(list);
                }
                out
            }
        }
    }
}

/// Structural match of one record against the tree.
fn matches<T: KeyComponent, R: KeyComponent>(
    verifier: &mut Verifier<'_, T, R>,
    node: &QueryNode<T>,
    record: R,
) -> Result<bool> {
    if !node.tokens.is_empty() {
        return match node.kind {
            NodeKind::And => verifier.contains_all(
                &node.tokens,
                record,
                node.respect_token_order,
                node.is_facet,
            ),
            NodeKind::Or => verifier.contains_any(&node.tokens, record, node.is_facet),
            NodeKind::Not => {
                let contained = if node.is_facet {
                    verifier.contains_any(&node.tokens, record, true)?
                } else if node.respect_token_order {
                    verifier.contains_all(&node.tokens, record, true, false)?
                } else {
                    verifier.contains_any(&node.tokens, record, false)?
                };
                Ok(!contained)
            }
        };
    }

    if !node.children.is_empty() {
        return match node.kind {
            NodeKind::And => {
                for child in &node.children {
                    if !matches(verifier, child, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeKind::Or => {
                for child in &node.children {
                    if matches(verifier, child, record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Not => {
                for child in &node.children {
                    if matches(verifier, child, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        };
    }

    Ok(false)
}
