use std::fmt::Display;

use crate::object::Object;
use crate::token::Token;
use crate::types::TypeRef;

/// Expression nodes. Every variant carries a shared [`TypeRef`] slot that
/// the type resolver fills in bottom-up; the slot is the only mutable part
/// of the tree.
#[derive(Debug)]
pub enum Expr {
    Literal {
        value: Object,
        type_ref: TypeRef,
    },
    Grouping {
        expression: Box<Expr>,
        type_ref: TypeRef,
    },
    /// Prefix `-` and `!`.
    Unary {
        operator: Token,
        right: Box<Expr>,
        type_ref: TypeRef,
    },
    /// Postfix `++` and `--`. `name` is the incremented variable; the
    /// resolver emits the slot binding keyed by this node.
    Postfix {
        left: Box<Expr>,
        operator: Token,
        name: Token,
        type_ref: TypeRef,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
        type_ref: TypeRef,
    },
    /// Short-circuiting `&&` and `||`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
        type_ref: TypeRef,
    },
    Assign {
        name: Token,
        value: Box<Expr>,
        type_ref: TypeRef,
    },
    /// A name read. The resolver's verdict for it is keyed by this node's
    /// address, not by the name text.
    Variable {
        name: Token,
        type_ref: TypeRef,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
        type_ref: TypeRef,
    },
    /// Property access, only meaningful on host-provided objects.
    Get {
        object: Box<Expr>,
        name: Token,
        type_ref: TypeRef,
    },
    /// A bare `;` statement body.
    Empty {
        type_ref: TypeRef,
    },
}

impl Expr {
    pub fn type_ref(&self) -> &TypeRef {
        match self {
            Expr::Literal { type_ref, .. }
            | Expr::Grouping { type_ref, .. }
            | Expr::Unary { type_ref, .. }
            | Expr::Postfix { type_ref, .. }
            | Expr::Binary { type_ref, .. }
            | Expr::Logical { type_ref, .. }
            | Expr::Assign { type_ref, .. }
            | Expr::Variable { type_ref, .. }
            | Expr::Call { type_ref, .. }
            | Expr::Get { type_ref, .. }
            | Expr::Empty { type_ref } => type_ref,
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal { value, .. } => write!(f, "{value}"),
            Expr::Grouping { expression, .. } => write!(f, "(group {expression})"),
            Expr::Unary { operator, right, .. } => write!(f, "({} {right})", operator.lexeme),
            Expr::Postfix { left, operator, .. } => write!(f, "({left} {})", operator.lexeme),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {left} {right})", operator.lexeme),
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {left} {right})", operator.lexeme),
            Expr::Assign { name, value, .. } => write!(f, "(= {} {value})", name.lexeme),
            Expr::Variable { name, .. } => f.write_str(&name.lexeme),
            Expr::Call {
                callee, arguments, ..
            } => {
                write!(f, "(call {callee}")?;
                for argument in arguments {
                    write!(f, " {argument}")?;
                }
                f.write_str(")")
            }
            Expr::Get { object, name, .. } => write!(f, "(. {object} {})", name.lexeme),
            Expr::Empty { .. } => f.write_str("(empty)"),
        }
    }
}
