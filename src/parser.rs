use std::rc::Rc;

use num_bigint::BigInt;

use crate::error::Diagnostic;
use crate::expr::Expr;
use crate::function::{FunctionDecl, Parameter};
use crate::object::Object;
use crate::stmt::Stmt;
use crate::token::TokenType::*;
use crate::token::{Token, TokenType};
use crate::types::TypeReference;

/// Marker for an aborted production; the diagnostic itself has already
/// been recorded on the parser.
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over the scanned tokens. Statement-level
/// errors synchronize at the next statement boundary so one run reports
/// as many problems as possible. In REPL mode the final semicolon of the
/// last statement may be omitted.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    repl_mode: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            repl_mode: false,
            diagnostics: vec![],
        }
    }

    pub fn new_repl(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            repl_mode: true,
            diagnostics: vec![],
        }
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Parses a program: a list of declarations up to EOF.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = vec![];
        while !self.is_at_end() {
            match self.declaration() {
                Ok(statement) => statements.push(statement),
                Err(ParseError) => self.synchronize(),
            }
        }
        statements
    }

    /// Parses a single expression, for tree printing.
    pub fn parse_expression(&mut self) -> Option<Expr> {
        self.expression().ok()
    }

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_types(&[CLASS]) {
            return self.class_declaration();
        }
        if self.match_types(&[FUN]) {
            return self.function_declaration();
        }
        if self.match_types(&[VAR]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(IDENTIFIER, "Expect class name.")?;
        self.consume(LEFT_BRACE, "Expect '{' before class body.")?;
        self.consume(RIGHT_BRACE, "Expect '}' after class body.")?;
        Ok(Stmt::Class { name })
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(IDENTIFIER, "Expect function name.")?;
        self.consume(LEFT_PAREN, "Expect '(' after function name.")?;

        let mut params = vec![];
        if !self.check(RIGHT_PAREN) {
            loop {
                let param_name = self.consume(IDENTIFIER, "Expect parameter name.")?;
                let specifier = self.type_annotation()?;
                params.push(Parameter::new(param_name, specifier));
                if !self.match_types(&[COMMA]) {
                    break;
                }
            }
        }
        self.consume(RIGHT_PAREN, "Expect ')' after parameters.")?;

        let return_type = match self.type_annotation()? {
            Some(specifier) => TypeReference::from_specifier(specifier),
            None => TypeReference::inferred(),
        };

        self.consume(LEFT_BRACE, "Expect '{' before function body.")?;
        let body = self.block_statements()?;
        Ok(Stmt::Function {
            declaration: Rc::new(FunctionDecl {
                name,
                params,
                return_type,
                body,
            }),
        })
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(IDENTIFIER, "Expect variable name.")?;
        let type_ref = match self.type_annotation()? {
            Some(specifier) => TypeReference::from_specifier(specifier),
            None => TypeReference::inferred(),
        };

        let mut initializer = None;
        if self.match_types(&[EQUAL]) {
            initializer = Some(self.expression()?);
        }

        self.end_statement("Expect ';' after variable declaration.")?;
        Ok(Stmt::Var {
            name,
            type_ref,
            initializer,
        })
    }

    /// An optional `: typename` suffix on declarations.
    fn type_annotation(&mut self) -> ParseResult<Option<Token>> {
        if self.match_types(&[COLON]) {
            return Ok(Some(self.consume(IDENTIFIER, "Expect type name after ':'.")?));
        }
        Ok(None)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_types(&[IF]) {
            return self.if_statement();
        }
        if self.match_types(&[WHILE]) {
            return self.while_statement();
        }
        if self.match_types(&[PRINT]) {
            return self.print_statement();
        }
        if self.match_types(&[RETURN]) {
            return self.return_statement();
        }
        if self.match_types(&[LEFT_BRACE]) {
            return Ok(Stmt::Block {
                statements: self.block_statements()?,
            });
        }
        self.expression_statement()
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let mut else_branch = None;
        if self.match_types(&[ELSE]) {
            else_branch = Some(Box::new(self.statement()?));
        }
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(RIGHT_PAREN, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.end_statement("Expect ';' after value.")?;
        Ok(Stmt::Print { expression })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous();
        let mut value = None;
        if !self.check(SEMICOLON) && !self.is_at_end() {
            value = Some(self.expression()?);
        }
        self.end_statement("Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = vec![];
        while !self.check(RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        // A bare ';' is an empty statement.
        if self.match_types(&[SEMICOLON]) {
            return Ok(Stmt::Expression {
                expression: Expr::Empty {
                    type_ref: TypeReference::inferred(),
                },
            });
        }
        let expression = self.expression()?;
        self.end_statement("Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression })
    }

    /// Consumes the statement terminator. In REPL mode a statement may
    /// end at EOF instead.
    fn end_statement(&mut self, message: &str) -> ParseResult<()> {
        if self.check(SEMICOLON) {
            self.advance();
            return Ok(());
        }
        if self.repl_mode && self.is_at_end() {
            return Ok(());
        }
        Err(self.error(self.peek(), message))
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_types(&[EQUAL]) {
            let equals = self.previous();
            let value = self.assignment()?;

            // The left side must turn out to be a plain name; anything
            // else is reported but parsing carries on with the value.
            if let Expr::Variable { name, .. } = expr {
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    type_ref: TypeReference::inferred(),
                });
            }
            self.error(equals, "Invalid assignment target.");
            return Ok(value);
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.match_types(&[PIPE_PIPE]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Expr::Logical {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_types(&[AMP_AMP]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Expr::Logical {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_types(&[BANG_EQUAL, EQUAL_EQUAL]) {
            let operator = self.previous();
            let right = self.comparison()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_types(&[GREATER, GREATER_EQUAL, LESS, LESS_EQUAL]) {
            let operator = self.previous();
            let right = self.term()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_types(&[MINUS, PLUS]) {
            let operator = self.previous();
            let right = self.factor()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.power()?;

        while self.match_types(&[SLASH, STAR, PERCENT]) {
            let operator = self.previous();
            let right = self.power()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            };
        }

        Ok(expr)
    }

    /// `**` is right-associative.
    fn power(&mut self) -> ParseResult<Expr> {
        let expr = self.unary()?;

        if self.match_types(&[STAR_STAR]) {
            let operator = self.previous();
            let right = self.power()?;
            return Ok(Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_types(&[BANG, MINUS]) {
            let operator = self.previous();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
                type_ref: TypeReference::inferred(),
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.call()?;

        if self.match_types(&[PLUS_PLUS, MINUS_MINUS]) {
            let operator = self.previous();
            return match expr {
                Expr::Variable { name, type_ref } => Ok(Expr::Postfix {
                    name: name.clone(),
                    left: Box::new(Expr::Variable { name, type_ref }),
                    operator,
                    type_ref: TypeReference::inferred(),
                }),
                _ => Err(self.error(operator, "Invalid increment target.")),
            };
        }

        Ok(expr)
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_types(&[DOT]) {
                let name = self.consume(IDENTIFIER, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                    type_ref: TypeReference::inferred(),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];
        if !self.check(RIGHT_PAREN) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_types(&[COMMA]) {
                    break;
                }
            }
        }

        let paren = self.consume(RIGHT_PAREN, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
            type_ref: TypeReference::inferred(),
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_types(&[FALSE]) {
            return Ok(self.literal(Object::Bool(false)));
        }
        if self.match_types(&[TRUE]) {
            return Ok(self.literal(Object::Bool(true)));
        }
        if self.match_types(&[NULL]) {
            return Ok(self.literal(Object::Null));
        }

        if self.match_types(&[NUMBER]) {
            let token = self.previous();
            return Ok(self.literal(number_literal(&token)));
        }
        if self.match_types(&[STRING]) {
            let string = self.previous().literal.clone().unwrap_or_default();
            return Ok(self.literal(Object::Str(string)));
        }

        if self.match_types(&[IDENTIFIER]) {
            return Ok(Expr::Variable {
                name: self.previous(),
                type_ref: TypeReference::inferred(),
            });
        }

        if self.match_types(&[LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                expression: Box::new(expr),
                type_ref: TypeReference::inferred(),
            });
        }

        Err(self.error(self.peek(), "Expect expression."))
    }

    fn literal(&self, value: Object) -> Expr {
        Expr::Literal {
            value,
            type_ref: TypeReference::inferred(),
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance());
        }

        Err(self.error(self.peek(), message))
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(*token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return token_type == EOF;
        }
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        };
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == EOF
    }

    fn peek(&self) -> Token {
        self.tokens[self.current].clone()
    }

    fn previous(&mut self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    fn error(&mut self, token: Token, message: &str) -> ParseError {
        self.diagnostics.push(Diagnostic::Parse {
            token,
            message: message.to_string(),
        });
        ParseError
    }

    /// Discards tokens until a likely statement boundary, so one bad
    /// statement produces one diagnostic instead of a cascade.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == SEMICOLON {
                return;
            }

            match self.peek().token_type {
                CLASS | FUN | VAR | IF | WHILE | PRINT | RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}

/// Integer literals take the narrowest kind that holds the value; a
/// decimal point makes the literal a float.
fn number_literal(token: &Token) -> Object {
    let text = token.literal.as_deref().unwrap_or(&token.lexeme);
    if text.contains('.') {
        return Object::Float(text.parse().unwrap_or(f32::INFINITY));
    }
    if let Ok(n) = text.parse::<i32>() {
        return Object::Int(n);
    }
    if let Ok(n) = text.parse::<i64>() {
        return Object::Long(n);
    }
    match text.parse::<BigInt>() {
        Ok(n) => Object::BigInt(n),
        Err(_) => Object::Null,
    }
}
