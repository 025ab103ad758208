//! Query parser.
//!
//! Parses a token stream into a `QueryNode<String>` tree by precedence
//! climbing (`AND` binds tighter than `OR`; `NOT` is a prefix operator
//! at term level).
//!
//! ```text
//! query      := expression
//! expression := term (( AND | OR ) term)*
//! term       := IN list | NOT (IN list | factor) | factor
//! factor     := "(" expression ")"
//!             | facet_in | facet_not_in | facet_expr
//!             | (word|phrase)+
//!             | list
//! facet_expr   := (word|phrase) ":" (word|phrase)
//! facet_in     := (word|phrase) IN list
//! facet_not_in := (word|phrase) NOT IN list
//! list         := "[" (word|phrase) ("," (word|phrase))* "]"
//! ```
//!
//! A trailing operator, an unclosed parenthesis or an unclosed bracket
//! terminates gracefully, as if the missing token closed there. Other
//! grammar violations fail with `UnexpectedToken`.

use crate::core::error::{Error, Result};
use crate::query::ast::{NodeKind, QueryNode};
use crate::query::lexer::{tokenize, Token};

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses a query string. Empty or whitespace-only input yields the
/// empty node, which matches nothing.
pub fn parse(input: &str) -> Result<QueryNode<String>> {
    let tokens = tokenize(input);
    let mut parser = Parser { tokens, pos: 0 };
    if parser.at_end() {
        return Ok(QueryNode::empty(NodeKind::And));
    }
    let node = parser.parse_expression(PREC_OR)?;
    if let Some(token) = parser.peek() {
        return Err(Error::unexpected_token(format!(
            "unexpected {:?} after expression",
            token
        )));
    }
    Ok(node)
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self, min_prec: u8) -> Result<QueryNode<String>> {
        let mut left = self.parse_term()?;
        loop {
            let (kind, prec) = match self.peek() {
                Some(Token::And) => (NodeKind::And, PREC_AND),
                Some(Token::Or) => (NodeKind::Or, PREC_OR),
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            if self.at_end() {
                // Trailing operator: terminate as if the query ended
                // before it.
                break;
            }
            let right = self.parse_expression(prec + 1)?;
            if right.is_empty() {
                break;
            }
            left = QueryNode::with_children(kind, vec![left, right]);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<QueryNode<String>> {
        match self.peek() {
            Some(Token::In) => {
                self.advance();
                let items = self.parse_list()?;
                Ok(QueryNode::with_tokens(NodeKind::Or, items))
            }
            Some(Token::Not) => {
                self.advance();
                if self.at_end() {
                    return Ok(QueryNode::empty(NodeKind::Not));
                }
                if matches!(self.peek(), Some(Token::In)) {
                    self.advance();
                    let items = self.parse_list()?;
                    let inner = QueryNode::with_tokens(NodeKind::Or, items);
                    return Ok(QueryNode::with_children(NodeKind::Not, vec![inner]));
                }
                let factor = self.parse_factor()?;
                Ok(negate(factor))
            }
            _ => self.parse_factor(),
        }
    }

    fn parse_factor(&mut self) -> Result<QueryNode<String>> {
        match self.peek() {
            Some(Token::LParen) => {
                self.advance();
                if self.at_end() {
                    return Ok(QueryNode::empty(NodeKind::And));
                }
                let inner = self.parse_expression(PREC_OR)?;
                // A missing closing parenthesis is tolerated.
                if matches!(self.peek(), Some(Token::RParen)) {
                    self.advance();
                }
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_list()?;
                Ok(QueryNode::with_tokens(NodeKind::Or, items))
            }
            Some(Token::Word(_)) | Some(Token::Phrase(_)) => self.parse_keywords(),
            Some(token) => Err(Error::unexpected_token(format!(
                "unexpected {:?} in factor",
                token
            ))),
            None => Err(Error::unexpected_token("unexpected end of query")),
        }
    }

    /// Parses a run of adjacent keywords, with facet forms bound to the
    /// word immediately before `:`, `IN` or `NOT IN`. Plain adjacent
    /// keywords collapse into a single And leaf without token order.
    fn parse_keywords(&mut self) -> Result<QueryNode<String>> {
        let mut units: Vec<QueryNode<String>> = Vec::new();
        let mut words: Vec<String> = Vec::new();

        loop {
            let text = match self.peek() {
                Some(Token::Word(word)) => word.clone(),
                Some(Token::Phrase(phrase)) => phrase.clone(),
                _ => break,
            };
            match self.peek_at(self.pos + 1) {
                Some(Token::Colon) => {
                    self.advance();
                    self.advance();
                    let value = self.expect_keyword("facet value after ':'")?;
                    flush_words(&mut units, &mut words);
                    units.push(
                        QueryNode::with_tokens(
                            NodeKind::And,
                            vec![format!("{}:{}", text, value)],
                        )
                        .facet(),
                    );
                }
                Some(Token::In) => {
                    self.advance();
                    self.advance();
                    let items = self.parse_list()?;
                    flush_words(&mut units, &mut words);
                    units.push(facet_list(&text, items));
                }
                Some(Token::Not) if matches!(self.peek_at(self.pos + 2), Some(Token::In)) => {
                    self.advance();
                    self.advance();
                    self.advance();
                    let items = self.parse_list()?;
                    flush_words(&mut units, &mut words);
                    units.push(QueryNode::with_children(
                        NodeKind::Not,
                        vec![facet_list(&text, items)],
                    ));
                }
                _ => {
                    words.push(text);
                    self.advance();
                }
            }
        }
        flush_words(&mut units, &mut words);

        match units.len() {
            0 => Err(Error::unexpected_token("expected keyword")),
            1 => Ok(units.pop().expect("len checked")),
            _ => Ok(QueryNode::with_children(NodeKind::And, units)),
        }
    }

    fn expect_keyword(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Some(Token::Word(word)) => Ok(word.clone()),
            Some(Token::Phrase(phrase)) => Ok(phrase.clone()),
            Some(token) => Err(Error::unexpected_token(format!(
                "expected {}, found {:?}",
                what, token
            ))),
            None => Err(Error::unexpected_token(format!(
                "expected {}, found end of query",
                what
            ))),
        }
    }

    /// Parses `[ item (, item)* ]`. An unclosed bracket (or a bare `IN`
    /// at the end of input) is tolerated as an empty remainder.
    fn parse_list(&mut self) -> Result<Vec<String>> {
        match self.peek() {
            Some(Token::LBracket) => {
                self.advance();
            }
            Some(token) => {
                return Err(Error::unexpected_token(format!(
                    "expected '[', found {:?}",
                    token
                )));
            }
            None => return Ok(Vec::new()),
        }

        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Word(word)) => {
                    items.push(word.clone());
                    self.advance();
                }
                Some(Token::Phrase(phrase)) => {
                    items.push(phrase.clone());
                    self.advance();
                }
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RBracket) => {
                    self.advance();
                    break;
                }
                Some(token) => {
                    return Err(Error::unexpected_token(format!(
                        "unexpected {:?} in list",
                        token
                    )));
                }
                None => break,
            }
        }
        Ok(items)
    }
}

fn flush_words(units: &mut Vec<QueryNode<String>>, words: &mut Vec<String>) {
    if !words.is_empty() {
        units.push(QueryNode::with_tokens(
            NodeKind::And,
            std::mem::take(words),
        ));
    }
}

fn facet_list(name: &str, values: Vec<String>) -> QueryNode<String> {
    let tokens = values
        .into_iter()
        .map(|value| format!("{}:{}", name, value))
        .collect();
    QueryNode::with_tokens(NodeKind::Or, tokens).facet()
}

/// Negation of a parsed factor. A plain And leaf becomes a Not leaf so
/// the executor can verify it directly; anything else is wrapped.
fn negate(node: QueryNode<String>) -> QueryNode<String> {
    if node.children.is_empty() && node.kind == NodeKind::And {
        QueryNode {
            kind: NodeKind::Not,
            ..node
        }
    } else {
        QueryNode::with_children(NodeKind::Not, vec![node])
    }
}
