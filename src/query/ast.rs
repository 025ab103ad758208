use serde::{Deserialize, Serialize};

/// Node operator of the query tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    And,
    Or,
    Not,
}

/// One node of a Boolean/facet query tree. A node carries either a
/// token list (a leaf) or child nodes; both empty is the empty node,
/// which matches nothing.
///
/// `T` is `String` for freshly parsed queries and the hashed token type
/// (`u64` by default) after lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode<T> {
    pub kind: NodeKind,
    pub tokens: Vec<T>,
    pub children: Vec<QueryNode<T>>,
    /// On a multi-token And/Not leaf: each token must be immediately
    /// preceded by the previously verified one.
    pub respect_token_order: bool,
    /// The tokens are facet entries (`name:value`), verified against
    /// their self-referential triples.
    pub is_facet: bool,
    /// Caller override for the probe token the executor enumerates.
    pub first_look_at: Option<T>,
}

impl<T> QueryNode<T> {
    pub fn empty(kind: NodeKind) -> Self {
        QueryNode {
            kind,
            tokens: Vec::new(),
            children: Vec::new(),
            respect_token_order: false,
            is_facet: false,
            first_look_at: None,
        }
    }

    pub fn with_tokens(kind: NodeKind, tokens: Vec<T>) -> Self {
        QueryNode {
            tokens,
            ..QueryNode::empty(kind)
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<QueryNode<T>>) -> Self {
        QueryNode {
            children,
            ..QueryNode::empty(kind)
        }
    }

    pub fn facet(mut self) -> Self {
        self.is_facet = true;
        self
    }

    pub fn ordered(mut self, respect_token_order: bool) -> Self {
        self.respect_token_order = respect_token_order;
        self
    }

    pub fn probe(mut self, first_look_at: T) -> Self {
        self.first_look_at = Some(first_look_at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.children.is_empty()
    }

    /// Whether the tree contains at least one non-empty positive
    /// sub-tree the executor can probe. `Not` sub-trees are never
    /// positive, and an `Or` containing a `Not` child is not either
    /// (matching it would require enumerating the whole index).
    pub fn has_any_positive_criteria(&self) -> bool {
        if self.kind == NodeKind::Not {
            return false;
        }
        if !self.tokens.is_empty() {
            return true;
        }
        match self.kind {
            NodeKind::And => self
                .children
                .iter()
                .any(QueryNode::has_any_positive_criteria),
            NodeKind::Or => {
                !self.children.is_empty()
                    && !self.children.iter().any(|c| c.kind == NodeKind::Not)
                    && self
                        .children
                        .iter()
                        .any(QueryNode::has_any_positive_criteria)
            }
            NodeKind::Not => false,
        }
    }
}

/// A query tree plus pagination. `limit == 0` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery<T> {
    pub node: QueryNode<T>,
    pub skip: usize,
    pub limit: usize,
}

impl<T> SearchQuery<T> {
    pub fn new(node: QueryNode<T>) -> Self {
        SearchQuery {
            node,
            skip: 0,
            limit: 0,
        }
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
