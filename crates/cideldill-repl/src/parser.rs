use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of, one_of},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    error::{context, ContextError, ParseError as NomParseError, VerboseError},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{Assignment, BinOp, Expr, StatementBlock};

/// How a parse attempt failed: distinguish input that is merely unfinished
/// from input that is outright malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Incomplete,
    Syntax(String),
}

pub fn parse_expression(input: &str) -> Result<Expr, ParseOutcome> {
    let trimmed = input.trim();
    match all_consuming(delimited(multispace0::<_, VerboseError<&str>>, expr, multispace0))(trimmed) {
        Ok((_, e)) => Ok(e),
        Err(_) => Err(classify_failure(trimmed)),
    }
}

pub fn parse_statement_block(input: &str) -> Result<StatementBlock, ParseOutcome> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(StatementBlock::default());
    }
    match all_consuming(delimited(multispace0::<_, VerboseError<&str>>, statement_block, multispace0))(trimmed) {
        Ok((_, block)) => Ok(block),
        Err(_) => Err(classify_failure(trimmed)),
    }
}

/// Complete nom combinators never return `Err::Incomplete` the way a
/// streaming parser would, so "incomplete input" is detected with the same
/// heuristic a line-buffered REPL uses: the text looks like a well-formed
/// prefix of something bigger — an unterminated string, an unbalanced
/// delimiter, or a trailing binary operator with no right-hand side.
fn classify_failure(input: &str) -> ParseOutcome {
    if looks_incomplete(input) {
        ParseOutcome::Incomplete
    } else {
        ParseOutcome::Syntax(format!("invalid syntax: {input:?}"))
    }
}

fn looks_incomplete(input: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant = None;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c.is_whitespace() => continue,
            _ => {}
        }
        last_significant = Some(ch);
    }

    if in_string || depth > 0 {
        return true;
    }
    matches!(last_significant, Some('+') | Some('-') | Some('*') | Some('/') | Some('='))
}

fn expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(delimited(multispace0, alt((char('+'), char('-'))), multispace0), term))(input)?;
    Ok((input, fold_binops(first, rest)))
}

fn term<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(delimited(multispace0, alt((char('*'), char('/'))), multispace0), factor))(input)?;
    Ok((input, fold_binops(first, rest)))
}

fn fold_binops(first: Expr, rest: Vec<(char, Expr)>) -> Expr {
    rest.into_iter().fold(first, |acc, (op_char, rhs)| {
        let op = match op_char {
            '+' => BinOp::Add,
            '-' => BinOp::Sub,
            '*' => BinOp::Mul,
            '/' => BinOp::Div,
            _ => unreachable!(),
        };
        Expr::BinOp(Box::new(acc), op, Box::new(rhs))
    })
}

fn factor<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    alt((
        map(preceded(pair(char('-'), multispace0), factor), |e| Expr::Neg(Box::new(e))),
        delimited(char('('), delimited(multispace0, expr, multispace0), cut(context("closing parenthesis", char(')')))),
        map(number, Expr::Number),
        map(string_literal, Expr::Str),
        map(tag("true"), |_| Expr::Bool(true)),
        map(tag("false"), |_| Expr::Bool(false)),
        map(tag("null"), |_| Expr::Null),
        map(identifier, |s: &str| Expr::Ident(s.to_string())),
    ))(input)
}

fn number<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, f64, E> {
    map(recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))), |s: &str| {
        s.parse().expect("validated by the digit1/char('.')/digit1 grammar above")
    })(input)
}

fn string_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    delimited(
        char('"'),
        alt((escaped_transform(none_of("\"\\"), '\\', one_of("\"\\n")), map(tag(""), |_: &str| String::new()))),
        char('"'),
    )(input)
}

fn identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(alt((alpha1, tag("_"))), many0(alt((alphanumeric1, tag("_"))))))(input)
}

fn assignment<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, Assignment, E> {
    let (input, name) = identifier(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0)(input)?;
    let (input, value) = cut(context("assignment right-hand side", expr))(input)?;
    Ok((input, Assignment { name: name.to_string(), value }))
}

fn statement_block<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(input: &'a str) -> IResult<&'a str, StatementBlock, E> {
    let separator = delimited(multispace0, alt((value((), char(';')), value((), char('\n')))), multispace0);
    let (input, assignments) = separated_list1(separator, assignment)(input)?;
    let (input, _) = many0(alt((char(';'), char('\n'))))(input)?;
    Ok((input, StatementBlock { assignments }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_with_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::BinOp(Box::new(Expr::Number(1.0)), BinOp::Add, Box::new(Expr::BinOp(Box::new(Expr::Number(2.0)), BinOp::Mul, Box::new(Expr::Number(3.0)))))
        );
    }

    #[test]
    fn parses_parenthesized_expressions() {
        let expr = parse_expression("(1 + 2) * 3").unwrap();
        assert_eq!(
            expr,
            Expr::BinOp(Box::new(Expr::BinOp(Box::new(Expr::Number(1.0)), BinOp::Add, Box::new(Expr::Number(2.0)))), BinOp::Mul, Box::new(Expr::Number(3.0)))
        );
    }

    #[test]
    fn parses_string_and_identifier() {
        assert_eq!(parse_expression("\"hi\"").unwrap(), Expr::Str("hi".to_string()));
        assert_eq!(parse_expression("total").unwrap(), Expr::Ident("total".to_string()));
    }

    #[test]
    fn unclosed_paren_is_incomplete_not_syntax_error() {
        assert_eq!(parse_expression("(1 + 2").unwrap_err(), ParseOutcome::Incomplete);
    }

    #[test]
    fn trailing_operator_is_incomplete() {
        assert_eq!(parse_expression("1 +").unwrap_err(), ParseOutcome::Incomplete);
    }

    #[test]
    fn garbage_is_a_syntax_error_not_incomplete() {
        assert!(matches!(parse_expression("1 2 3").unwrap_err(), ParseOutcome::Syntax(_)));
    }

    #[test]
    fn parses_single_assignment_statement() {
        let block = parse_statement_block("x = 1 + 2").unwrap();
        assert_eq!(block.assignments.len(), 1);
        assert_eq!(block.assignments[0].name, "x");
    }

    #[test]
    fn parses_multiple_assignments_separated_by_semicolons() {
        let block = parse_statement_block("x = 1; y = 2").unwrap();
        assert_eq!(block.assignments.len(), 2);
    }
}
