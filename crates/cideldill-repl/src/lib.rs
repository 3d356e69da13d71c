//! Per-session expression/statement evaluator, grounded on the `dsl-core`
//! parser's `all_consuming`/`VerboseError`/incomplete-input discipline but
//! evaluating a small arithmetic language instead of a DSL.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod session;

pub use ast::{Assignment, BinOp, Expr, StatementBlock};
pub use eval::{evaluate, execute, Namespace, RuntimeError};
pub use parser::{parse_expression, parse_statement_block, ParseOutcome};
pub use session::{eval, render_value, EvalOutcome};
