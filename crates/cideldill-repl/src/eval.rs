use std::collections::HashMap;

use crate::ast::{Assignment, BinOp, Expr, StatementBlock};

pub type Namespace = HashMap<String, serde_json::Value>;

/// A runtime failure during evaluation, formatted on the wire as
/// `"<ExceptionTypeFQN>: <message>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub type_fqn: String,
    pub message: String,
}

impl RuntimeError {
    fn name_error(name: &str) -> Self {
        Self {
            type_fqn: "NameError".to_string(),
            message: format!("name '{name}' is not defined"),
        }
    }

    fn zero_division() -> Self {
        Self {
            type_fqn: "ZeroDivisionError".to_string(),
            message: "division by zero".to_string(),
        }
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self {
            type_fqn: "TypeError".to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_fqn, self.message)
    }
}

pub fn evaluate(expr: &Expr, ns: &Namespace) -> Result<serde_json::Value, RuntimeError> {
    match expr {
        Expr::Number(n) => Ok(serde_json::json!(n)),
        Expr::Str(s) => Ok(serde_json::Value::String(s.clone())),
        Expr::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Expr::Null => Ok(serde_json::Value::Null),
        Expr::Ident(name) => ns.get(name).cloned().ok_or_else(|| RuntimeError::name_error(name)),
        Expr::Neg(inner) => {
            let value = evaluate(inner, ns)?;
            let n = as_number(&value)?;
            Ok(serde_json::json!(-n))
        }
        Expr::BinOp(lhs, op, rhs) => {
            let lhs = evaluate(lhs, ns)?;
            let rhs = evaluate(rhs, ns)?;
            apply_binop(*op, lhs, rhs)
        }
    }
}

fn apply_binop(op: BinOp, lhs: serde_json::Value, rhs: serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
    if op == BinOp::Add {
        if let (serde_json::Value::String(a), serde_json::Value::String(b)) = (&lhs, &rhs) {
            return Ok(serde_json::Value::String(format!("{a}{b}")));
        }
    }

    let a = as_number(&lhs)?;
    let b = as_number(&rhs)?;
    match op {
        BinOp::Add => Ok(serde_json::json!(a + b)),
        BinOp::Sub => Ok(serde_json::json!(a - b)),
        BinOp::Mul => Ok(serde_json::json!(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                Err(RuntimeError::zero_division())
            } else {
                Ok(serde_json::json!(a / b))
            }
        }
    }
}

fn as_number(value: &serde_json::Value) -> Result<f64, RuntimeError> {
    value
        .as_f64()
        .ok_or_else(|| RuntimeError::type_error(format!("unsupported operand type for arithmetic: {value}")))
}

/// Runs every assignment in order, mutating `ns` in place. Re-reading the
/// same name in a later eval must see the assigned value.
pub fn execute(block: &StatementBlock, ns: &mut Namespace) -> Result<(), RuntimeError> {
    for Assignment { name, value } in &block.assignments {
        let evaluated = evaluate(value, ns)?;
        ns.insert(name.clone(), evaluated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn evaluates_arithmetic() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(evaluate(&expr, &Namespace::new()).unwrap(), serde_json::json!(7.0));
    }

    #[test]
    fn looks_up_identifiers_from_namespace() {
        let mut ns = Namespace::new();
        ns.insert("x".to_string(), serde_json::json!(10.0));
        let expr = parse_expression("x + 1").unwrap();
        assert_eq!(evaluate(&expr, &ns).unwrap(), serde_json::json!(11.0));
    }

    #[test]
    fn undefined_identifier_is_a_name_error() {
        let expr = parse_expression("missing").unwrap();
        let err = evaluate(&expr, &Namespace::new()).unwrap_err();
        assert_eq!(err.type_fqn, "NameError");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let expr = parse_expression("1 / 0").unwrap();
        let err = evaluate(&expr, &Namespace::new()).unwrap_err();
        assert_eq!(err.type_fqn, "ZeroDivisionError");
    }
}
