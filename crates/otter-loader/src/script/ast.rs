//! Syntax tree of a module script body.

use std::collections::HashMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Const,
    Let,
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Declare {
        name: String,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Throw(Expr),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Add(Box<Expr>, Box<Expr>),
    New(String, Vec<Expr>),
    TypeOf(Box<Expr>),
    ImportMeta,
}

/// Executable statements plus the module's top-level declarations
#[derive(Debug, Default)]
pub(crate) struct Program {
    pub(crate) body: Vec<Stmt>,
    pub(crate) declarations: HashMap<String, DeclKind>,
}
