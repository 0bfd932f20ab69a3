use thiserror::Error;

use crate::token::Token;
use crate::token::TokenType;

/// One reported problem, tagged with the pass that found it. Analysis
/// passes collect these and keep going; the pipeline halts between passes
/// as soon as any were reported, so downstream passes never see a tree
/// their predecessors rejected.
#[derive(Debug, Clone, Error)]
pub enum Diagnostic {
    #[error("[line {line}] Error: {message}")]
    Scan { line: usize, message: String },

    #[error("[line {}] Error{}: {}", .token.line, at_location(.token), .message)]
    Parse { token: Token, message: String },

    #[error("[line {}] Error{}: {}", .token.line, at_location(.token), .message)]
    Resolve { token: Token, message: String },

    #[error("[line {}] Error: {}", .token.line, .message)]
    NameResolution { token: Token, message: String },

    #[error("[line {}] Error: {}", .token.line, .message)]
    TypeValidation { token: Token, message: String },

    #[error("[line {}] Error: {}", .token.line, .message)]
    Immutability { token: Token, message: String },

    #[error("[line {}] {}", .token.line, .message)]
    Runtime { token: Token, message: String },

    /// A consistency check failed; never fires on well-formed input.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Scan,
    Parse,
    Resolve,
    NameResolution,
    TypeValidation,
    Immutability,
    Runtime,
    Internal,
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::Scan { .. } => DiagnosticKind::Scan,
            Diagnostic::Parse { .. } => DiagnosticKind::Parse,
            Diagnostic::Resolve { .. } => DiagnosticKind::Resolve,
            Diagnostic::NameResolution { .. } => DiagnosticKind::NameResolution,
            Diagnostic::TypeValidation { .. } => DiagnosticKind::TypeValidation,
            Diagnostic::Immutability { .. } => DiagnosticKind::Immutability,
            Diagnostic::Runtime { .. } => DiagnosticKind::Runtime,
            Diagnostic::Internal { .. } => DiagnosticKind::Internal,
        }
    }
}

fn at_location(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// The evaluator's failure carrier. Stops execution at the first failure;
/// the interpreter reports it through the runtime handler and answers the
/// void marker.
#[derive(Debug, Clone, Error)]
#[error("[line {}] {}", .token.line, .message)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        RuntimeError {
            token,
            message: message.into(),
        }
    }
}

impl From<RuntimeError> for Diagnostic {
    fn from(error: RuntimeError) -> Self {
        Diagnostic::Runtime {
            token: error.token,
            message: error.message,
        }
    }
}

/// Injected at interpreter construction; called once per reported
/// diagnostic, possibly many times per `eval`.
pub type Reporter = Box<dyn FnMut(&Diagnostic)>;

/// The default reporter used by the CLI: render to stderr.
pub fn stderr_reporter() -> Reporter {
    Box::new(|diagnostic| eprintln!("{diagnostic}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(lexeme: &str, line: usize) -> Token {
        Token::new(TokenType::IDENTIFIER, lexeme.to_string(), None, line)
    }

    #[test]
    fn rendering_carries_the_line_and_location() {
        let resolve = Diagnostic::Resolve {
            token: token("a", 3),
            message: "Variable with this name already declared in this scope.".to_string(),
        };
        assert_eq!(
            resolve.to_string(),
            "[line 3] Error at 'a': Variable with this name already declared in this scope."
        );

        let runtime = Diagnostic::Runtime {
            token: token("pop", 7),
            message: "No arguments left".to_string(),
        };
        assert_eq!(runtime.to_string(), "[line 7] No arguments left");
    }

    #[test]
    fn parse_errors_at_eof_point_at_end() {
        let eof = Token::new(TokenType::EOF, String::new(), None, 2);
        let parse = Diagnostic::Parse {
            token: eof,
            message: "Expect expression.".to_string(),
        };
        assert_eq!(parse.to_string(), "[line 2] Error at end: Expect expression.");
    }

    #[test]
    fn runtime_errors_convert_into_the_runtime_kind() {
        let error = RuntimeError::new(token("x", 1), "Attempted to divide by zero");
        let diagnostic = Diagnostic::from(error);
        assert_eq!(diagnostic.kind(), DiagnosticKind::Runtime);
        assert_eq!(diagnostic.to_string(), "[line 1] Attempted to divide by zero");
    }
}
