use crate::{
    ast::{BinaryOperator, LiteralValue, Node, NodeKind, Token, TokenKind, UnaryOperator},
    lexer::{LexError, Lexer},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Deepest expression nesting the parser will recurse into.
pub const MAX_NESTING: usize = 256;

/// A syntax error with the character position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (position {position})")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::new(e.to_string(), e.position())
    }
}

/// Result of parsing a formula.
///
/// Parsing never fails with an `Err`: a formula that cannot be parsed yields
/// `success: false`, no tree and a single error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub ast: Option<Arc<Node>>,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn ok(ast: Node) -> Self {
        ParseOutcome {
            success: true,
            ast: Some(Arc::new(ast)),
            errors: Vec::new(),
        }
    }

    pub fn failed(error: ParseError) -> Self {
        ParseOutcome {
            success: false,
            ast: None,
            errors: vec![error],
        }
    }

    /// First error, the one editors underline.
    pub fn first_error(&self) -> Option<&ParseError> {
        self.errors.first()
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    /// Creates a parser over an already tokenized formula.
    ///
    /// The token list must end with [`TokenKind::Eof`]; one is appended if it
    /// does not.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map(Token::end).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, end, 0));
        }
        Parser {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    /// Tokenizes `text` and creates a parser over it.
    pub fn from_source(text: &str) -> Result<Self, LexError> {
        Ok(Parser::new(Lexer::new(text).tokenize()?))
    }

    fn current(&self) -> &Token {
        // `new` guarantees a trailing Eof and `advance` never moves past it.
        &self.tokens[self.index]
    }

    fn peek(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current().position)
    }

    /// Parses a complete formula; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let expr = self.parse_expression(0)?;
        if !self.check(&TokenKind::Eof) {
            let found = self.current().kind.describe();
            return Err(self.error_here(format!("Unexpected {} after end of formula", found)));
        }
        Ok(expr)
    }

    /// Precedence climbing: parse a primary, then fold in every binary
    /// operator binding at least as tightly as `min_prec`. The right operand
    /// is parsed at `precedence + 1`, which makes equal-precedence chains
    /// associate to the left.
    pub fn parse_expression(&mut self, min_prec: u8) -> Result<Node, ParseError> {
        self.parse_operand(min_prec).map(|(node, _)| node)
    }

    /// Like [`Parser::parse_expression`], but also returns the source extent
    /// including any parentheses around the expression. Parents span from
    /// the extents of their operands, not from the operand nodes.
    fn parse_operand(&mut self, min_prec: u8) -> Result<(Node, Range<usize>), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here(format!(
                "Formula is nested more than {} levels deep",
                MAX_NESTING
            )));
        }

        let (mut left, mut extent) = self.parse_primary()?;

        while let Some(operator) = binary_operator(&self.current().kind) {
            let prec = operator.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let (right, right_extent) = self.parse_operand(prec + 1)?;

            extent = extent.start..right_extent.end;
            left = Node::new(
                NodeKind::BinaryOp {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                extent.start,
                extent.len(),
            );
        }

        self.depth -= 1;
        Ok((left, extent))
    }

    /// Parse primary expressions: prefix operators, parenthesized
    /// sub-expressions, function calls, fields and literals.
    fn parse_primary(&mut self) -> Result<(Node, Range<usize>), ParseError> {
        let token = self.current().clone();

        let node = match token.kind {
            TokenKind::Minus => self.parse_unary(UnaryOperator::Minus),
            TokenKind::Not => self.parse_unary(UnaryOperator::Not),

            // The inner node keeps its own span; only the extent covers the parens.
            TokenKind::LParen => {
                self.advance();
                let (expr, _) = self.parse_operand(0)?;
                if !self.check(&TokenKind::RParen) {
                    let found = self.current().kind.describe();
                    return Err(self.error_here(format!(
                        "Expected ')' to close '(' at position {}, found {}",
                        token.position, found
                    )));
                }
                let close = self.advance();
                return Ok((expr, token.position..close.end()));
            }

            TokenKind::Function(name) => self.parse_call(name, token.position),

            TokenKind::Field(field) => {
                self.advance();
                Ok(Node::new(
                    NodeKind::FieldRef { field },
                    token.position,
                    token.length,
                ))
            }

            // Literals
            TokenKind::Number(n) => self.literal(LiteralValue::Number(n)),
            TokenKind::String(s) => self.literal(LiteralValue::String(s)),
            TokenKind::Boolean(b) => self.literal(LiteralValue::Boolean(b)),

            TokenKind::Shift | TokenKind::Kql => Err(self.error_here(format!(
                "Keyword '{}' can only be used as a named argument",
                token.kind.symbol()
            ))),

            TokenKind::Eof => Err(self.error_here("Unexpected end of input")),

            other => Err(self.error_here(format!("Unexpected {}", other.describe()))),
        }?;

        let extent = node.position..node.end();
        Ok((node, extent))
    }

    fn literal(&mut self, value: LiteralValue) -> Result<Node, ParseError> {
        let token = self.advance();
        Ok(Node::new(
            NodeKind::Literal { value },
            token.position,
            token.length,
        ))
    }

    fn parse_unary(&mut self, operator: UnaryOperator) -> Result<Node, ParseError> {
        let token = self.advance();
        let (operand, extent) = self.parse_operand(operator.precedence())?;
        let length = extent.end - token.position;
        Ok(Node::new(
            NodeKind::UnaryOp {
                operator,
                operand: Box::new(operand),
            },
            token.position,
            length,
        ))
    }

    /// Parses `name '(' [arg (',' arg)*] ')'`.
    fn parse_call(&mut self, name: String, position: usize) -> Result<Node, ParseError> {
        self.advance(); // function name
        if !self.check(&TokenKind::LParen) {
            let found = self.current().kind.describe();
            return Err(self.error_here(format!("Expected '(' after '{}', found {}", name, found)));
        }
        self.advance();

        let mut positional_args = Vec::new();
        let mut named_args = BTreeMap::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                if self.check(&TokenKind::Eof) {
                    return Err(self.error_here(format!(
                        "Expected ')' to close call to '{}', found end of input",
                        name
                    )));
                }

                match self.parse_argument()? {
                    Argument::Positional(node) => positional_args.push(node),
                    Argument::Named(key, key_position, node) => {
                        if named_args.contains_key(&key) {
                            return Err(ParseError::new(
                                format!("Duplicate argument '{}' in call to '{}'", key, name),
                                key_position,
                            ));
                        }
                        named_args.insert(key, node);
                    }
                }

                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else if self.check(&TokenKind::RParen) {
                    break;
                } else if self.check(&TokenKind::Eof) {
                    return Err(self.error_here(format!(
                        "Expected ')' to close call to '{}', found end of input",
                        name
                    )));
                } else {
                    let found = self.current().kind.describe();
                    return Err(self.error_here(format!(
                        "Expected ',' or ')' in call to '{}', found {}",
                        name, found
                    )));
                }
            }
        }

        let close = self.advance();
        Ok(Node::new(
            NodeKind::FunctionCall {
                name,
                positional_args,
                named_args,
            },
            position,
            close.end() - position,
        ))
    }

    /// One-token lookahead decides between `name=value` / `name:value` and a
    /// positional expression.
    fn parse_argument(&mut self) -> Result<Argument, ParseError> {
        let key = match &self.current().kind {
            TokenKind::Field(name) => Some(name.clone()),
            TokenKind::Kql => Some("kql".to_string()),
            TokenKind::Shift => Some("shift".to_string()),
            _ => None,
        };

        if let Some(key) = key
            && matches!(self.peek(1), TokenKind::Assign | TokenKind::Colon)
        {
            let key_position = self.current().position;
            self.advance(); // name
            self.advance(); // '=' or ':'
            let value = self.parse_expression(0)?;
            return Ok(Argument::Named(key, key_position, value));
        }

        Ok(Argument::Positional(self.parse_expression(0)?))
    }
}

enum Argument {
    Positional(Node),
    Named(String, usize, Node),
}

fn binary_operator(kind: &TokenKind) -> Option<BinaryOperator> {
    Some(match kind {
        TokenKind::Or => BinaryOperator::Or,
        TokenKind::And => BinaryOperator::And,
        TokenKind::Equals => BinaryOperator::Equals,
        TokenKind::NotEquals => BinaryOperator::NotEquals,
        TokenKind::Greater => BinaryOperator::Greater,
        TokenKind::Less => BinaryOperator::Less,
        TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
        TokenKind::LessEqual => BinaryOperator::LessEqual,
        TokenKind::Plus => BinaryOperator::Plus,
        TokenKind::Minus => BinaryOperator::Minus,
        TokenKind::Multiply => BinaryOperator::Multiply,
        TokenKind::Divide => BinaryOperator::Divide,
        TokenKind::Modulo => BinaryOperator::Modulo,
        TokenKind::Power => BinaryOperator::Power,
        _ => return None,
    })
}

/// Parses a formula without consulting any cache.
pub fn parse(text: &str) -> ParseOutcome {
    let outcome = Parser::from_source(text)
        .map_err(ParseError::from)
        .and_then(|mut parser| parser.parse());

    match outcome {
        Ok(ast) => ParseOutcome::ok(ast),
        Err(error) => {
            tracing::trace!(position = error.position, "parse failed: {}", error.message);
            ParseOutcome::failed(error)
        }
    }
}
