use std::fmt::Display;

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens.
    LEFT_PAREN, RIGHT_PAREN, LEFT_BRACE, RIGHT_BRACE,
    COMMA, DOT, SEMICOLON, COLON, SLASH, PERCENT,

    // One or two character tokens.
    PLUS, PLUS_PLUS,
    MINUS, MINUS_MINUS,
    STAR, STAR_STAR,
    BANG, BANG_EQUAL,
    EQUAL, EQUAL_EQUAL,
    GREATER, GREATER_EQUAL,
    LESS, LESS_EQUAL,
    AMP_AMP, PIPE_PIPE,

    // Literals.
    IDENTIFIER, STRING, NUMBER,

    // Keywords.
    CLASS, ELSE, FALSE, FUN, IF, NULL,
    PRINT, RETURN, TRUE, VAR, WHILE,

    EOF,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Tokens are the identity of name sites. Name lookup throughout the
/// analysis passes keys on `lexeme`; `line` feeds diagnostics.
#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: Option<String>,
    pub line: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let l = self.literal.clone().unwrap_or("null".to_string());
        write!(f, "{} {} {}", self.token_type, self.lexeme, l)
    }
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, literal: Option<String>, line: usize) -> Self {
        Token {
            token_type,
            lexeme,
            literal,
            line,
        }
    }
}
