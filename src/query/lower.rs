//! Lowering from string queries to hashed-token queries.
//!
//! The executors work on hashed tokens, so every string leaf is run
//! through the word tokenizer and hash generator. Multi-word strings
//! (quoted phrases) become ordered per-string leaves so that phrase
//! semantics survive the split.

use crate::analysis::hash::HashGenerator;
use crate::analysis::tokenizer::WordTokenizer;
use crate::query::ast::{NodeKind, QueryNode, SearchQuery};

pub struct QueryLowerer<'a> {
    tokenizer: &'a dyn WordTokenizer,
    hasher: &'a dyn HashGenerator,
}

impl<'a> QueryLowerer<'a> {
    pub fn new(tokenizer: &'a dyn WordTokenizer, hasher: &'a dyn HashGenerator) -> Self {
        QueryLowerer { tokenizer, hasher }
    }

    pub fn lower_query(&self, query: &SearchQuery<String>) -> SearchQuery<u64> {
        SearchQuery {
            node: self.lower(&query.node),
            skip: query.skip,
            limit: query.limit,
        }
    }

    pub fn lower(&self, node: &QueryNode<String>) -> QueryNode<u64> {
        if !node.children.is_empty() {
            return QueryNode {
                kind: node.kind,
                tokens: Vec::new(),
                children: node.children.iter().map(|c| self.lower(c)).collect(),
                respect_token_order: node.respect_token_order,
                is_facet: node.is_facet,
                first_look_at: self.lower_probe(node),
            };
        }
        self.lower_leaf(node)
    }

    fn lower_probe(&self, node: &QueryNode<String>) -> Option<u64> {
        node.first_look_at.as_deref().map(|s| self.hasher.hash(s))
    }

    fn lower_leaf(&self, node: &QueryNode<String>) -> QueryNode<u64> {
        // Facet strings are atomic: "name:value" hashes as one token,
        // never word-split.
        if node.is_facet {
            return QueryNode {
                kind: node.kind,
                tokens: node.tokens.iter().map(|s| self.hasher.hash(s)).collect(),
                children: Vec::new(),
                respect_token_order: node.respect_token_order,
                is_facet: true,
                first_look_at: self.lower_probe(node),
            };
        }

        let groups: Vec<Vec<u64>> = node
            .tokens
            .iter()
            .map(|s| {
                self.tokenizer
                    .spans(s)
                    .map(|span| self.hasher.hash(span.slice(s)))
                    .collect::<Vec<u64>>()
            })
            .filter(|group| !group.is_empty())
            .collect();
        let multi = groups.iter().any(|group| group.len() > 1);
        let probe = self.lower_probe(node);

        match node.kind {
            NodeKind::And | NodeKind::Not => {
                if !multi || node.respect_token_order {
                    QueryNode {
                        kind: node.kind,
                        tokens: groups.into_iter().flatten().collect(),
                        children: Vec::new(),
                        respect_token_order: node.respect_token_order,
                        is_facet: false,
                        first_look_at: probe,
                    }
                } else {
                    // Each multi-word string keeps its internal order;
                    // the strings themselves stay unordered.
                    let children: Vec<QueryNode<u64>> = groups
                        .into_iter()
                        .map(|group| {
                            QueryNode::with_tokens(node.kind, group).ordered(true)
                        })
                        .collect();
                    collapse(NodeKind::And, children, probe)
                }
            }
            NodeKind::Or => {
                if !multi {
                    QueryNode {
                        kind: NodeKind::Or,
                        tokens: groups.into_iter().flatten().collect(),
                        children: Vec::new(),
                        respect_token_order: false,
                        is_facet: false,
                        first_look_at: probe,
                    }
                } else {
                    let children: Vec<QueryNode<u64>> = groups
                        .into_iter()
                        .map(|group| {
                            QueryNode::with_tokens(NodeKind::And, group).ordered(true)
                        })
                        .collect();
                    collapse(NodeKind::Or, children, probe)
                }
            }
        }
    }
}

fn collapse(
    outer: NodeKind,
    mut children: Vec<QueryNode<u64>>,
    probe: Option<u64>,
) -> QueryNode<u64> {
    if children.len() == 1 {
        let mut child = children.pop().expect("len checked");
        child.first_look_at = probe;
        child
    } else {
        let mut node = QueryNode::with_children(outer, children);
        node.first_look_at = probe;
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::hash::SipHashGenerator;
    use crate::analysis::tokenizer::SliceTokenizer;
    use crate::query::parser::parse;

    fn lowered(input: &str) -> QueryNode<u64> {
        let tokenizer = SliceTokenizer::default();
        let hasher = SipHashGenerator::default();
        let lowerer = QueryLowerer::new(&tokenizer, &hasher);
        lowerer.lower(&parse(input).unwrap())
    }

    fn hash(text: &str) -> u64 {
        SipHashGenerator::default().hash(text)
    }

    #[test]
    fn single_words_lower_shape_preservingly() {
        let node = lowered("cat dog");
        assert_eq!(node.kind, NodeKind::And);
        assert_eq!(node.tokens, vec![hash("cat"), hash("dog")]);
        assert!(node.children.is_empty());
        assert!(!node.respect_token_order);
    }

    #[test]
    fn phrase_becomes_ordered_leaf() {
        // One multi-word string in an unordered And leaf: the per-string
        // child is ordered, and the single child collapses.
        let node = lowered("'cat cow'");
        assert_eq!(node.kind, NodeKind::And);
        assert_eq!(node.tokens, vec![hash("cat"), hash("cow")]);
        assert!(node.respect_token_order);
    }

    #[test]
    fn phrase_next_to_word_splits_into_children() {
        let node = lowered("'quick fox' lazy");
        assert_eq!(node.kind, NodeKind::And);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].tokens, vec![hash("quick"), hash("fox")]);
        assert!(node.children[0].respect_token_order);
        assert_eq!(node.children[1].tokens, vec![hash("lazy")]);
        assert!(node.children[1].respect_token_order);
    }

    #[test]
    fn facet_strings_are_not_word_split() {
        let node = lowered("category:red");
        assert!(node.is_facet);
        assert_eq!(node.tokens, vec![hash("category:red")]);
    }

    #[test]
    fn or_leaf_with_phrases_becomes_ordered_alternatives() {
        let node = lowered("IN ['cat cow', 'dog fox']");
        assert_eq!(node.kind, NodeKind::Or);
        assert_eq!(node.children.len(), 2);
        for child in &node.children {
            assert_eq!(child.kind, NodeKind::And);
            assert!(child.respect_token_order);
        }
    }

    #[test]
    fn or_leaf_with_single_words_flattens() {
        let node = lowered("IN [cat, dog]");
        assert_eq!(node.kind, NodeKind::Or);
        assert_eq!(node.tokens, vec![hash("cat"), hash("dog")]);
    }

    #[test]
    fn negated_phrase_keeps_not_kind() {
        let node = lowered("NOT 'cat cow'");
        assert_eq!(node.kind, NodeKind::Not);
        assert_eq!(node.tokens, vec![hash("cat"), hash("cow")]);
        assert!(node.respect_token_order);
    }

    #[test]
    fn inner_nodes_recurse() {
        let node = lowered("(cat OR cow) AND fox");
        assert_eq!(node.kind, NodeKind::And);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].kind, NodeKind::Or);
        assert_eq!(node.children[1].tokens, vec![hash("fox")]);
    }

    #[test]
    fn short_words_drop_out_under_minimum_length() {
        // Default minimum token length is 3; "ox" disappears.
        let node = lowered("ox fox");
        assert_eq!(node.tokens, vec![hash("fox")]);
    }
}
