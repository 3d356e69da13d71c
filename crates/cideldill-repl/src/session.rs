use cideldill_types::Format;

use crate::eval::{evaluate, execute, Namespace};
use crate::parser::{parse_expression, parse_statement_block, ParseOutcome};

/// The rendered result of one `eval` call (wire shape `{output, is_error}`).
/// `result_cid` is only set for successful expression evaluation —
/// statement execution and errors carry none.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub output: String,
    pub is_error: bool,
    pub result_cid: Option<String>,
}

/// Runs a full eval against `namespace`, mutating it for persisted
/// assignments.
pub fn eval(namespace: &mut Namespace, expr_text: &str, preferred_format: Format) -> EvalOutcome {
    match parse_expression(expr_text) {
        Ok(expr) => match evaluate(&expr, namespace) {
            Ok(value) => {
                let payload = cideldill_codec::serialize(&value, preferred_format);
                EvalOutcome {
                    output: render_value(&value),
                    is_error: false,
                    result_cid: Some(payload.cid),
                }
            }
            Err(err) => EvalOutcome {
                output: err.to_string(),
                is_error: true,
                result_cid: None,
            },
        },
        Err(expr_failure) => match parse_statement_block(expr_text) {
            Ok(block) => match execute(&block, namespace) {
                Ok(()) => EvalOutcome {
                    output: String::new(),
                    is_error: false,
                    result_cid: None,
                },
                Err(err) => EvalOutcome {
                    output: err.to_string(),
                    is_error: true,
                    result_cid: None,
                },
            },
            Err(_) => EvalOutcome {
                output: syntax_message(expr_failure),
                is_error: true,
                result_cid: None,
            },
        },
    }
}

fn syntax_message(outcome: ParseOutcome) -> String {
    match outcome {
        ParseOutcome::Incomplete => "SyntaxError: incomplete input".to_string(),
        ParseOutcome::Syntax(detail) => format!("SyntaxError: {detail}"),
    }
}

/// Renders an eval result the way a REPL echoes a value: whole-valued
/// numbers print without a trailing `.0` (`42`, not `42.0`) since this
/// language has no separate integer/float literal syntax to track the
/// distinction through.
pub fn render_value(value: &serde_json::Value) -> String {
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => (n as i64).to_string(),
        _ => serde_json::to_string(value).expect("serde_json::Value always serializes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_expression_and_returns_cid() {
        let mut ns = Namespace::new();
        let outcome = eval(&mut ns, "1 + 2", Format::Json);
        assert_eq!(outcome.output, "3");
        assert!(!outcome.is_error);
        assert!(outcome.result_cid.is_some());
    }

    #[test]
    fn assignment_persists_across_evals() {
        let mut ns = Namespace::new();
        let first = eval(&mut ns, "x = 41 + 1", Format::Json);
        assert!(!first.is_error);
        assert_eq!(first.output, "");

        let second = eval(&mut ns, "x", Format::Json);
        assert_eq!(second.output, "42");
    }

    #[test]
    fn fractional_results_keep_their_decimal() {
        let mut ns = Namespace::new();
        let outcome = eval(&mut ns, "1 / 2", Format::Json);
        assert_eq!(outcome.output, "0.5");
    }

    #[test]
    fn incomplete_input_is_reported_distinctly() {
        let mut ns = Namespace::new();
        let outcome = eval(&mut ns, "(1 + 2", Format::Json);
        assert!(outcome.is_error);
        assert_eq!(outcome.output, "SyntaxError: incomplete input");
    }

    #[test]
    fn garbage_input_is_a_plain_syntax_error() {
        let mut ns = Namespace::new();
        let outcome = eval(&mut ns, "1 2 3", Format::Json);
        assert!(outcome.is_error);
        assert!(outcome.output.starts_with("SyntaxError:"));
        assert_ne!(outcome.output, "SyntaxError: incomplete input");
    }

    #[test]
    fn runtime_exception_formats_as_type_colon_message() {
        let mut ns = Namespace::new();
        let outcome = eval(&mut ns, "1 / 0", Format::Json);
        assert!(outcome.is_error);
        assert_eq!(outcome.output, "ZeroDivisionError: division by zero");
    }
}
