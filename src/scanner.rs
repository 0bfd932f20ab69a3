use std::collections::HashMap;

use crate::error::Diagnostic;
use crate::token::TokenType::*;
use crate::token::{Token, TokenType};

/// The scanner takes raw source and groups it into tokens. Errors are
/// collected, not thrown: an invalid character is reported and scanning
/// continues, so one run surfaces as many problems as possible.
pub struct Scanner {
    source: Vec<char>,

    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,

    /// 'start' points at the first character of the lexeme being scanned,
    /// 'current' at the character under consideration, 'line' at the
    /// source line 'current' is on.
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: vec![],
            diagnostics: vec![],
            current: 0,
            start: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            // We are at the beginning of the next lexeme.
            self.start = self.current;
            self.scan_token();
        }
        self.tokens.push(Token::new(EOF, String::new(), None, self.line));
        self.tokens.clone()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) {
        let ln = self.line;
        let c = *self.advance().expect("scan_token called at end of input");
        match c {
            // --------Single-character lexemes ----------------------
            '(' => self.add_token(LEFT_PAREN),
            ')' => self.add_token(RIGHT_PAREN),
            '{' => self.add_token(LEFT_BRACE),
            '}' => self.add_token(RIGHT_BRACE),
            ',' => self.add_token(COMMA),
            '.' => self.add_token(DOT),
            ';' => self.add_token(SEMICOLON),
            ':' => self.add_token(COLON),
            '%' => self.add_token(PERCENT),

            // --------One or two character operators ----------------
            // We look at the next character to decide whether we are on
            // a '++' or merely a '+', and so on.
            '+' => match self.match_next('+') {
                true => self.add_token(PLUS_PLUS),
                false => self.add_token(PLUS),
            },
            '-' => match self.match_next('-') {
                true => self.add_token(MINUS_MINUS),
                false => self.add_token(MINUS),
            },
            '*' => match self.match_next('*') {
                true => self.add_token(STAR_STAR),
                false => self.add_token(STAR),
            },
            '!' => match self.match_next('=') {
                true => self.add_token(BANG_EQUAL),
                false => self.add_token(BANG),
            },
            '=' => match self.match_next('=') {
                true => self.add_token(EQUAL_EQUAL),
                false => self.add_token(EQUAL),
            },
            '<' => match self.match_next('=') {
                true => self.add_token(LESS_EQUAL),
                false => self.add_token(LESS),
            },
            '>' => match self.match_next('=') {
                true => self.add_token(GREATER_EQUAL),
                false => self.add_token(GREATER),
            },

            // '&' and '|' only exist doubled.
            '&' => match self.match_next('&') {
                true => self.add_token(AMP_AMP),
                false => self.report(ln, format!("Unexpected character: {}", c)),
            },
            '|' => match self.match_next('|') {
                true => self.add_token(PIPE_PIPE),
                false => self.report(ln, format!("Unexpected character: {}", c)),
            },

            // --------Newline and whitespace ------------------------
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,

            // --------Longer lexemes --------------------------------
            '/' => self.comment(),
            '"' => self.string(),
            d if is_digit(d) => self.number(),
            a if is_alpha(a) => self.identifier(),

            _ => self.report(ln, format!("Unexpected character: {}", c)),
        }
    }

    fn report(&mut self, line: usize, message: String) {
        self.diagnostics.push(Diagnostic::Scan { line, message });
    }

    fn comment(&mut self) {
        // A comment runs to the end of the line and produces no token.
        if self.match_next('/') {
            while self.peek() != '\n' && !self.is_at_end() {
                self.advance();
            }
        } else {
            self.add_token(SLASH)
        }
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            // Strings may span lines.
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.report(self.line, "Unterminated string.".to_string());
            return;
        }

        // The closing ".
        self.advance();

        // Trim the surrounding quotes to produce the value the
        // interpreter will use.
        let value: String = self.source[self.start + 1..self.current - 1].iter().collect();
        self.add_token_with_literal(STRING, Some(value));
    }

    fn number(&mut self) {
        while is_digit(self.peek()) {
            self.advance();
        }

        // Look for a fractional part.
        if self.peek() == '.' && is_digit(self.peek_next()) {
            // Consume the ".".
            self.advance();

            while is_digit(self.peek()) {
                self.advance();
            }
        }

        // The raw text is kept; the parser decides the numeric kind.
        let value: String = self.source[self.start..self.current].iter().collect();
        self.add_token_with_literal(NUMBER, Some(value));
    }

    fn identifier(&mut self) {
        while is_alpha_numeric(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let token_type: TokenType = keywords().get(&*text).copied().unwrap_or(IDENTIFIER);
        self.add_token(token_type);
    }

    /// Consumes the next character in the source and returns it.
    fn advance(&mut self) -> Option<&char> {
        let res = self.source.get(self.current);
        self.current += 1;
        res
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_with_literal(token_type, None);
    }

    fn add_token_with_literal(&mut self, token_type: TokenType, literal: Option<String>) {
        let text = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(token_type, text, literal, self.line));
    }

    /// A conditional advance: the current character is consumed only if
    /// it is the one we are looking for.
    fn match_next(&mut self, expected: char) -> bool {
        if self.is_at_end() {
            return false;
        }
        if self.source[self.current] != expected {
            return false;
        }

        self.current += 1;
        true
    }

    /// One character of lookahead.
    fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        self.source[self.current]
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            return '\0';
        }
        self.source[self.current + 1]
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alpha_numeric(c: char) -> bool {
    is_alpha(c) || is_digit(c)
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn keywords() -> HashMap<&'static str, TokenType> {
    HashMap::from([
        ("class", CLASS),
        ("else", ELSE),
        ("false", FALSE),
        ("fun", FUN),
        ("if", IF),
        ("null", NULL),
        ("print", PRINT),
        ("return", RETURN),
        ("true", TRUE),
        ("var", VAR),
        ("while", WHILE),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(source);
        scanner.scan_tokens().iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn doubled_operators_win_over_single_ones() {
        assert_eq!(
            kinds("+ ++ - -- * ** && ||"),
            vec![PLUS, PLUS_PLUS, MINUS, MINUS_MINUS, STAR, STAR_STAR, AMP_AMP, PIPE_PIPE, EOF]
        );
    }

    #[test]
    fn numbers_keep_their_raw_text() {
        let mut scanner = Scanner::new("42 103.1");
        let tokens = scanner.scan_tokens();
        assert_eq!(tokens[0].literal.as_deref(), Some("42"));
        assert_eq!(tokens[1].literal.as_deref(), Some("103.1"));
    }

    #[test]
    fn lone_ampersand_is_reported_and_scanning_continues() {
        let mut scanner = Scanner::new("1 & 2");
        let tokens = scanner.scan_tokens();
        let diagnostics = scanner.take_diagnostics();
        assert_eq!(tokens.len(), 3); // two numbers and EOF
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].to_string(),
            "[line 1] Error: Unexpected character: &"
        );
    }
}
