use crate::ast::{BinOp, Expr};
use crate::error::LangError;
use crate::parser;
use serde_json::Value;

/// A compiled callable: normalized source plus its parse tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Program, LangError> {
        let root = parser::parse(source)?;
        Ok(Program {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the program with `arg` bound as the single argument.
    pub fn eval(&self, arg: &Value) -> Result<Value, LangError> {
        eval_expr(&self.root, arg)
    }
}

/// Internal numeric model: integers stay integers until a float enters.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Value::from(f),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn as_num(value: &Value) -> Result<Num, LangError> {
    if let Some(i) = value.as_i64() {
        return Ok(Num::Int(i));
    }
    if let Some(f) = value.as_f64() {
        return Ok(Num::Float(f));
    }
    Err(LangError::Type(format!("{} is not a number", value)))
}

fn eval_expr(expr: &Expr, arg: &Value) -> Result<Value, LangError> {
    match expr {
        Expr::Int(i) => Ok(Value::from(*i)),
        Expr::Float(f) => Ok(Value::from(*f)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Name(name) => match name.as_str() {
            "x" | "input" | "results" => Ok(arg.clone()),
            other => Err(LangError::UnknownName(other.to_string())),
        },
        Expr::Neg(inner) => match as_num(&eval_expr(inner, arg)?)? {
            Num::Int(i) => Ok(Value::from(-i)),
            Num::Float(f) => Ok(Value::from(-f)),
        },
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, arg)?;
            let rhs = eval_expr(rhs, arg)?;
            apply_binop(*op, &lhs, &rhs)
        }
        Expr::Call { func, args } => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval_expr(a, arg)?);
            }
            call_builtin(func, values)
        }
    }
}

fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, LangError> {
    let l = as_num(lhs)?;
    let r = as_num(rhs)?;
    match (l, r) {
        (Num::Int(a), Num::Int(b)) => match op {
            BinOp::Add => Ok(Value::from(a.wrapping_add(b))),
            BinOp::Sub => Ok(Value::from(a.wrapping_sub(b))),
            BinOp::Mul => Ok(Value::from(a.wrapping_mul(b))),
            BinOp::Div => {
                if b == 0 {
                    Err(LangError::DivisionByZero)
                } else {
                    Ok(Value::from(a / b))
                }
            }
            BinOp::Rem => {
                if b == 0 {
                    Err(LangError::DivisionByZero)
                } else {
                    Ok(Value::from(a % b))
                }
            }
        },
        (l, r) => {
            let a = l.as_f64();
            let b = r.as_f64();
            match op {
                BinOp::Add => Ok(Value::from(a + b)),
                BinOp::Sub => Ok(Value::from(a - b)),
                BinOp::Mul => Ok(Value::from(a * b)),
                BinOp::Div => {
                    if b == 0.0 {
                        Err(LangError::DivisionByZero)
                    } else {
                        Ok(Value::from(a / b))
                    }
                }
                BinOp::Rem => {
                    if b == 0.0 {
                        Err(LangError::DivisionByZero)
                    } else {
                        Ok(Value::from(a % b))
                    }
                }
            }
        }
    }
}

fn one_arg(func: &'static str, mut args: Vec<Value>) -> Result<Value, LangError> {
    if args.len() != 1 {
        return Err(LangError::Arity {
            func,
            expected: 1,
            got: args.len(),
        });
    }
    Ok(args.remove(0))
}

fn call_builtin(func: &str, args: Vec<Value>) -> Result<Value, LangError> {
    match func {
        "int" => builtin_int(one_arg("int", args)?),
        "float" => builtin_float(one_arg("float", args)?),
        "str" => builtin_str(one_arg("str", args)?),
        "len" => builtin_len(one_arg("len", args)?),
        "lines" => builtin_lines(one_arg("lines", args)?),
        "chunks" => builtin_chunks(args),
        "sum" => builtin_sum(one_arg("sum", args)?),
        "min" => builtin_extremum("min", one_arg("min", args)?),
        "max" => builtin_extremum("max", one_arg("max", args)?),
        "abs" => match as_num(&one_arg("abs", args)?)? {
            Num::Int(i) => Ok(Value::from(i.abs())),
            Num::Float(f) => Ok(Value::from(f.abs())),
        },
        other => Err(LangError::UnknownFunction(other.to_string())),
    }
}

fn builtin_int(value: Value) -> Result<Value, LangError> {
    match &value {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| LangError::Cast(format!("\"{}\"", s))),
        Value::Number(_) => {
            let n = as_num(&value)?;
            Ok(Value::from(match n {
                Num::Int(i) => i,
                Num::Float(f) => f.trunc() as i64,
            }))
        }
        other => Err(LangError::Cast(other.to_string())),
    }
}

fn builtin_float(value: Value) -> Result<Value, LangError> {
    match &value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| LangError::Cast(format!("\"{}\"", s))),
        Value::Number(_) => Ok(Value::from(as_num(&value)?.as_f64())),
        other => Err(LangError::Cast(other.to_string())),
    }
}

fn builtin_str(value: Value) -> Result<Value, LangError> {
    let rendered = match value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(Value::String(rendered))
}

fn builtin_len(value: Value) -> Result<Value, LangError> {
    let len = match &value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(LangError::Type(format!("{} has no length", other))),
    };
    Ok(Value::from(len as i64))
}

fn builtin_lines(value: Value) -> Result<Value, LangError> {
    match value {
        Value::String(s) => Ok(Value::Array(
            s.lines().map(|line| Value::String(line.to_string())).collect(),
        )),
        other => Err(LangError::Type(format!("lines() wants a string, got {}", other))),
    }
}

fn builtin_chunks(mut args: Vec<Value>) -> Result<Value, LangError> {
    if args.len() != 2 {
        return Err(LangError::Arity {
            func: "chunks",
            expected: 2,
            got: args.len(),
        });
    }
    let size = args.pop().and_then(|v| v.as_i64().map(|i| i.max(0) as usize));
    let text = args.pop();
    match (text, size) {
        (Some(Value::String(s)), Some(size)) if size > 0 => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Array(
                chars
                    .chunks(size)
                    .map(|chunk| Value::String(chunk.iter().collect()))
                    .collect(),
            ))
        }
        _ => Err(LangError::Type(
            "chunks() wants a string and a positive size".to_string(),
        )),
    }
}

fn builtin_sum(value: Value) -> Result<Value, LangError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(LangError::Type(format!("sum() wants an array, got {}", other))),
    };
    let mut acc = Num::Int(0);
    for item in &items {
        let n = as_num(item)?;
        acc = match (acc, n) {
            (Num::Int(a), Num::Int(b)) => Num::Int(a.wrapping_add(b)),
            (a, b) => Num::Float(a.as_f64() + b.as_f64()),
        };
    }
    Ok(acc.to_value())
}

fn builtin_extremum(which: &'static str, value: Value) -> Result<Value, LangError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(LangError::Type(format!(
                "{}() wants an array, got {}",
                which, other
            )))
        }
    };
    if items.is_empty() {
        return Err(LangError::Type(format!("{}() of an empty array", which)));
    }
    let mut best = as_num(&items[0])?;
    for item in &items[1..] {
        let n = as_num(item)?;
        let replace = if which == "min" {
            n.as_f64() < best.as_f64()
        } else {
            n.as_f64() > best.as_f64()
        };
        if replace {
            best = n;
        }
    }
    Ok(best.to_value())
}
