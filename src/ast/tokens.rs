use std::fmt;

/// Lexical category of a token.
///
/// Identifiers are split into [`TokenKind::Function`] and [`TokenKind::Field`]
/// by the lexer: an identifier is a function name only when the next
/// non-whitespace character is `(`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Number with at most one decimal point
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0.95
    /// ```
    Number(f64),

    /// String literal in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// '1d'
    /// "status: 200"
    /// ```
    String(String),

    /// Boolean values (`true`, `false`, any case)
    Boolean(bool),

    // Identifiers
    /// Field reference
    ///
    /// # Examples
    /// ```text
    /// bytes
    /// host.name
    /// @timestamp
    /// ```
    Field(String),

    /// Function name, always followed by `(`
    ///
    /// # Examples
    /// ```text
    /// sum(bytes)
    /// count()
    /// ```
    Function(String),

    // Arithmetic
    /// Addition (`+`)
    Plus,
    /// Subtraction or unary negation (`-`)
    Minus,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,
    /// Exponentiation (`^`)
    Power,

    // Comparison
    /// Equality (`==`)
    Equals,
    /// Inequality (`!=`)
    NotEquals,
    /// Greater than (`>`)
    Greater,
    /// Less than (`<`)
    Less,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Less than or equal (`<=`)
    LessEqual,

    // Logical
    /// Logical AND (`and`)
    And,
    /// Logical OR (`or`)
    Or,
    /// Logical negation (`not` or `!`)
    Not,

    // Delimiters
    /// Named argument binding (`=`)
    Assign,
    /// Left parenthesis
    LParen,
    /// Right parenthesis
    RParen,
    /// Argument separator
    Comma,
    /// Named argument binding (`:`)
    Colon,

    // Reserved argument names
    /// `shift`, the time offset argument
    ///
    /// # Examples
    /// ```text
    /// count(shift='1w')
    /// ```
    Shift,

    /// `kql`, the embedded filter argument
    ///
    /// # Examples
    /// ```text
    /// sum(bytes, kql='status: 500')
    /// ```
    Kql,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Short description used in parser error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::String(s) => format!("string '{}'", s),
            TokenKind::Boolean(b) => format!("boolean {}", b),
            TokenKind::Field(name) => format!("field '{}'", name),
            TokenKind::Function(name) => format!("function '{}'", name),
            TokenKind::Shift => "keyword 'shift'".to_string(),
            TokenKind::Kql => "keyword 'kql'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    /// Source spelling of operator and delimiter tokens.
    pub fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Multiply => "*",
            TokenKind::Divide => "/",
            TokenKind::Modulo => "%",
            TokenKind::Power => "^",
            TokenKind::Equals => "==",
            TokenKind::NotEquals => "!=",
            TokenKind::Greater => ">",
            TokenKind::Less => "<",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LessEqual => "<=",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Assign => "=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Shift => "shift",
            TokenKind::Kql => "kql",
            TokenKind::Eof => "",
            TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Boolean(_)
            | TokenKind::Field(_)
            | TokenKind::Function(_) => "",
        }
    }
}

/// A token together with the span of source text it was read from.
///
/// `position` and `length` count characters, not bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub length: usize,
}

impl Token {
    pub fn new(kind: TokenKind, position: usize, length: usize) -> Self {
        Token {
            kind,
            position,
            length,
        }
    }

    /// Offset one past the last character of the token.
    pub fn end(&self) -> usize {
        self.position + self.length
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.kind.describe(), self.position)
    }
}
