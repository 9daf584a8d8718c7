//! Recursive-descent expression grammar on nom.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := '-' unary | atom
//! atom   := number | string | ident '(' args ')' | ident | '(' expr ')'
//! ```

use crate::ast::{BinOp, Expr};
use crate::error::LangError;
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, digit1, multispace0, one_of};
use nom::combinator::{map, opt, recognize};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    let parsed = if text.contains('.') {
        text.parse::<f64>().map(Expr::Float).ok()
    } else {
        text.parse::<i64>().map(Expr::Int).ok()
    };
    match parsed {
        Some(expr) => Ok((rest, expr)),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn string_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        |s: &str| Expr::Str(s.to_string()),
    )(input)
}

fn call_or_name(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_args, args) = opt(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr),
        char(')'),
    ))(rest)?;
    match args {
        Some(args) => Ok((
            after_args,
            Expr::Call {
                func: name.to_string(),
                args,
            },
        )),
        None => Ok((rest, Expr::Name(name.to_string()))),
    }
}

fn atom(input: &str) -> IResult<&str, Expr> {
    alt((
        number,
        string_literal,
        call_or_name,
        delimited(char('('), expr, char(')')),
    ))(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        ws(atom),
    ))(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, init) = unary(input)?;
    let (input, rest) = many0(pair(ws(one_of("*/%")), unary))(input)?;
    Ok((input, fold_binary(init, rest)))
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, init) = term(input)?;
    let (input, rest) = many0(pair(ws(one_of("+-")), term))(input)?;
    Ok((input, fold_binary(init, rest)))
}

fn fold_binary(init: Expr, rest: Vec<(char, Expr)>) -> Expr {
    rest.into_iter().fold(init, |lhs, (op, rhs)| Expr::Binary {
        op: match op {
            '+' => BinOp::Add,
            '-' => BinOp::Sub,
            '*' => BinOp::Mul,
            '/' => BinOp::Div,
            _ => BinOp::Rem,
        },
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

/// Parses a complete source text; trailing garbage is an error.
pub fn parse(source: &str) -> Result<Expr, LangError> {
    match expr(source) {
        Ok((rest, parsed)) => {
            if rest.trim().is_empty() {
                Ok(parsed)
            } else {
                Err(LangError::Parse(format!(
                    "unexpected trailing input: '{}'",
                    rest.trim()
                )))
            }
        }
        Err(err) => Err(LangError::Parse(err.to_string())),
    }
}
