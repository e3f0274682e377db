use crate::ast::{Token, TokenKind};
use thiserror::Error;

/// Errors raised while splitting a formula into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// A character that cannot start any token
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    /// A string literal without its closing quote
    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// A backslash followed by a character that is not a known escape
    #[error("Invalid escape sequence '\\{ch}' at position {position}")]
    InvalidEscape { ch: char, position: usize },
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { position, .. }
            | LexError::UnterminatedString { position }
            | LexError::InvalidEscape { position, .. } => *position,
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `true` when the next non-whitespace character is `(`.
    fn followed_by_paren(&self) -> bool {
        self.input[self.position..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|&c| c == '(')
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if is_identifier_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    let escape_at = self.position;
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('\\') => result.push('\\'),
                        Some(c) if c == quote => result.push(c),
                        Some(c) => {
                            return Err(LexError::InvalidEscape {
                                ch: c,
                                position: escape_at,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> TokenKind {
        let mut number = String::new();
        let mut seen_dot = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !seen_dot
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Only ASCII digits and a single interior dot were collected.
        TokenKind::Number(number.parse::<f64>().unwrap_or(f64::NAN))
    }

    /// Consumes `width` characters and produces `kind`.
    fn symbol(&mut self, kind: TokenKind, width: usize) -> TokenKind {
        for _ in 0..width {
            self.advance();
        }
        kind
    }

    /// Reads the next token, skipping any leading whitespace.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position;

        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some('+') => self.symbol(TokenKind::Plus, 1),
            Some('-') => self.symbol(TokenKind::Minus, 1),
            Some('*') => self.symbol(TokenKind::Multiply, 1),
            Some('/') => self.symbol(TokenKind::Divide, 1),
            Some('%') => self.symbol(TokenKind::Modulo, 1),
            Some('^') => self.symbol(TokenKind::Power, 1),
            Some('(') => self.symbol(TokenKind::LParen, 1),
            Some(')') => self.symbol(TokenKind::RParen, 1),
            Some(',') => self.symbol(TokenKind::Comma, 1),
            Some(':') => self.symbol(TokenKind::Colon, 1),
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::Equals, 2)
                } else {
                    self.symbol(TokenKind::Assign, 1)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::NotEquals, 2)
                } else {
                    self.symbol(TokenKind::Not, 1)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::GreaterEqual, 2)
                } else {
                    self.symbol(TokenKind::Greater, 1)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.symbol(TokenKind::LessEqual, 2)
                } else {
                    self.symbol(TokenKind::Less, 1)
                }
            }
            Some(q @ ('"' | '\'')) => TokenKind::String(self.read_string(q)?),
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) if is_identifier_start(ch) => {
                let ident = self.read_identifier();

                match ident.to_ascii_lowercase().as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    "shift" => TokenKind::Shift,
                    "kql" => TokenKind::Kql,
                    _ if self.followed_by_paren() => TokenKind::Function(ident),
                    _ => TokenKind::Field(ident),
                }
            }
            Some(ch) => {
                return Err(LexError::UnexpectedCharacter {
                    ch,
                    position: start,
                });
            }
        };

        Ok(Token::new(kind, start, self.position - start))
    }

    /// Reads every remaining token, ending with [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '@'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '@')
}

/// Splits `text` into tokens terminated by an EOF token.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).tokenize()
}

#[test]
fn test_keywords() {
    let kinds: Vec<TokenKind> = tokenize("AND or Not TRUE false Shift kql")
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
            TokenKind::Boolean(true),
            TokenKind::Boolean(false),
            TokenKind::Shift,
            TokenKind::Kql,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_function_lookahead() {
    let mut lexer = Lexer::new("sum  (bytes)");
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Function("sum".to_string())
    );
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::LParen);
    assert_eq!(
        lexer.next_token().unwrap().kind,
        TokenKind::Field("bytes".to_string())
    );
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::RParen);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
}
