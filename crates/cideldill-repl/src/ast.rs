/// An evaluable expression in the REPL's small arithmetic/identifier
/// language. Parsed as an expression first; a parse failure there falls
/// back to statement mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Neg(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// An assignment statement — the only statement form the namespace needs.
/// Assignments made in statement mode persist in the namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatementBlock {
    pub assignments: Vec<Assignment>,
}
