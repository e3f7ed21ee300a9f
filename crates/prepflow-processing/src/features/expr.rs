//! Restricted arithmetic expressions over column names.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "%") unary)*
//! unary   := ("-" | "+") unary | power
//! power   := atom ("**" unary)?
//! atom    := number | identifier | `quoted name` | "(" expr ")"
//! ```
//!
//! `**` is right-associative and binds tighter than unary minus, so
//! `-a ** 2` is `-(a ** 2)`. `%` takes the sign of the divisor. There are
//! no function calls or attribute access.

use once_cell::sync::Lazy;
use polars::prelude::DataFrame;
use regex::Regex;

use crate::error::{PreprocessingError, Result};
use crate::utils::{column_f64, has_column};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?P<num>(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)|`(?P<quoted>[^`]+)`|(?P<op>\*\*|[-+*/%()]))",
    )
    .expect("Invalid regex: expression token")
});

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Op(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => {
                if b == 0.0 {
                    f64::NAN
                } else {
                    a - b * (a / b).floor()
                }
            }
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Column(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

enum Value {
    Scalar(f64),
    Column(Vec<Option<f64>>),
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(PreprocessingError::Expression(format!(
                "unexpected {:?} in '{}'",
                token, source
            ))),
        }
    }

    /// Column names referenced, in first-use order.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary(_, a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }

    /// Evaluate row-wise. Nulls propagate; a constant expression is broadcast.
    pub fn evaluate(&self, df: &DataFrame) -> Result<Vec<Option<f64>>> {
        Ok(match self.eval(df)? {
            Value::Scalar(v) => vec![Some(v); df.height()],
            Value::Column(values) => values,
        })
    }

    fn eval(&self, df: &DataFrame) -> Result<Value> {
        match self {
            Expr::Number(v) => Ok(Value::Scalar(*v)),
            Expr::Column(name) => {
                if !has_column(df, name) {
                    return Err(PreprocessingError::Expression(format!(
                        "unknown column '{}'",
                        name
                    )));
                }
                Ok(Value::Column(column_f64(df, name)?))
            }
            Expr::Neg(inner) => Ok(match inner.eval(df)? {
                Value::Scalar(v) => Value::Scalar(-v),
                Value::Column(values) => {
                    Value::Column(values.into_iter().map(|v| v.map(|x| -x)).collect())
                }
            }),
            Expr::Binary(op, a, b) => Ok(match (a.eval(df)?, b.eval(df)?) {
                (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(op.apply(x, y)),
                (Value::Column(xs), Value::Scalar(y)) => {
                    Value::Column(xs.into_iter().map(|x| x.map(|x| op.apply(x, y))).collect())
                }
                (Value::Scalar(x), Value::Column(ys)) => {
                    Value::Column(ys.into_iter().map(|y| y.map(|y| op.apply(x, y))).collect())
                }
                (Value::Column(xs), Value::Column(ys)) => Value::Column(
                    xs.into_iter()
                        .zip(ys)
                        .map(|(x, y)| Some(op.apply(x?, y?)))
                        .collect(),
                ),
            }),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.trim_start().is_empty() {
        let caps = TOKEN.captures(rest).ok_or_else(|| {
            PreprocessingError::Expression(format!(
                "unexpected input '{}' in '{}'",
                rest.trim_start(),
                source
            ))
        })?;
        let token = if let Some(m) = caps.name("num") {
            let value = m.as_str().parse::<f64>().map_err(|e| {
                PreprocessingError::Expression(format!("bad number '{}': {}", m.as_str(), e))
            })?;
            Token::Number(value)
        } else if let Some(m) = caps.name("ident").or_else(|| caps.name("quoted")) {
            Token::Name(m.as_str().to_string())
        } else {
            match caps.name("op").map(|m| m.as_str()) {
                Some("**") => Token::Op("**"),
                Some("+") => Token::Op("+"),
                Some("-") => Token::Op("-"),
                Some("*") => Token::Op("*"),
                Some("/") => Token::Op("/"),
                Some("%") => Token::Op("%"),
                Some("(") => Token::Op("("),
                _ => Token::Op(")"),
            }
        };
        tokens.push(token);
        rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat("*") {
                BinaryOp::Mul
            } else if self.eat("/") {
                BinaryOp::Div
            } else if self.eat("%") {
                BinaryOp::Mod
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat("+") {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.eat("**") {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Number(v)) => {
                self.pos += 1;
                Ok(Expr::Number(v))
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if matches!(self.peek(), Some(Token::Op("("))) {
                    return Err(PreprocessingError::Expression(format!(
                        "function calls are not allowed ('{}')",
                        name
                    )));
                }
                Ok(Expr::Column(name))
            }
            Some(Token::Op("(")) => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(")") {
                    return Err(PreprocessingError::Expression("missing ')'".to_string()));
                }
                Ok(inner)
            }
            Some(token) => Err(PreprocessingError::Expression(format!(
                "unexpected {:?}",
                token
            ))),
            None => Err(PreprocessingError::Expression(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "age" => [Some(40.0), Some(60.0), None],
            "trestbps" => [Some(120.0), Some(150.0), Some(130.0)],
            "max hr" => [Some(2.0), Some(3.0), Some(4.0)],
        ]
        .unwrap()
    }

    fn eval(source: &str) -> Vec<Option<f64>> {
        Expr::parse(source).unwrap().evaluate(&frame()).unwrap()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), vec![Some(7.0); 3]);
        assert_eq!(eval("2 ** 3 ** 2"), vec![Some(512.0); 3]);
        assert_eq!(eval("-2 ** 2"), vec![Some(-4.0); 3]);
        assert_eq!(eval("2 ** -1"), vec![Some(0.5); 3]);
        assert_eq!(eval("(1 + 2) * 3"), vec![Some(9.0); 3]);
    }

    #[test]
    fn test_modulo_follows_divisor_sign() {
        assert_eq!(eval("-7 % 3"), vec![Some(2.0); 3]);
        assert_eq!(eval("7 % -3"), vec![Some(-2.0); 3]);
    }

    #[test]
    fn test_columns_and_nulls() {
        assert_eq!(eval("age / (trestbps + 10)"), vec![Some(40.0 / 130.0), Some(60.0 / 160.0), None]);
        assert_eq!(eval("`max hr` * 2"), vec![Some(4.0), Some(6.0), Some(8.0)]);
        assert_eq!(
            Expr::parse("age + trestbps * age").unwrap().columns(),
            vec!["age", "trestbps"]
        );
    }

    #[test]
    fn test_rejected_inputs() {
        for source in ["__import__('os')", "age.mean", "age +", "(age", "age $ 2"] {
            let result = Expr::parse(source).and_then(|e| e.evaluate(&frame()));
            assert!(result.is_err(), "{source} should fail");
        }
        let unknown = Expr::parse("missing + 1").unwrap().evaluate(&frame());
        assert!(matches!(unknown, Err(PreprocessingError::Expression(_))));
    }
}
