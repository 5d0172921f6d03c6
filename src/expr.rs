//! Pixel-wise image expressions such as `(IM0 + IM1)` or `(IM0 * convert_factor + IM1)`.

use std::collections::HashMap;

use ndarray::{Array2, Zip};
use pest::{iterators::Pair, Parser};

use crate::{
    error::{RestoreError, Result},
    parser::{RestoreParser, Rule},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Image(usize),
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

enum Value {
    Scalar(f64),
    Pixels(Array2<f64>),
}

fn syntax_error(pair: &Pair<Rule>) -> RestoreError {
    RestoreError::Expression(format!("unexpected '{}'", pair.as_str()))
}

fn build(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expression => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| RestoreError::Expression("empty expression".to_string()))?;
            build(inner)
        }
        Rule::sum | Rule::product => {
            let mut inner = pair.into_inner();
            let mut lhs = match inner.next() {
                Some(first) => build(first)?,
                None => return Err(RestoreError::Expression("missing operand".to_string())),
            };
            while let Some(op) = inner.next() {
                let op = match op.as_rule() {
                    Rule::add => BinOp::Add,
                    Rule::sub => BinOp::Sub,
                    Rule::mul => BinOp::Mul,
                    Rule::div => BinOp::Div,
                    _ => return Err(syntax_error(&op)),
                };
                let rhs = match inner.next() {
                    Some(rhs) => build(rhs)?,
                    None => return Err(RestoreError::Expression("missing operand".to_string())),
                };
                lhs = Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
            }
            Ok(lhs)
        }
        Rule::unary => {
            let mut negations = 0;
            let mut operand = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::neg => negations += 1,
                    _ => operand = Some(build(p)?),
                }
            }
            let mut expr =
                operand.ok_or_else(|| RestoreError::Expression("missing operand".to_string()))?;
            for _ in 0..negations {
                expr = Expr::Neg(Box::new(expr));
            }
            Ok(expr)
        }
        Rule::image_ref => pair.as_str()[2..]
            .parse()
            .map(Expr::Image)
            .map_err(|_| syntax_error(&pair)),
        Rule::unsigned => pair
            .as_str()
            .parse()
            .map(Expr::Number)
            .map_err(|_| syntax_error(&pair)),
        Rule::ident => Ok(Expr::Var(pair.as_str().to_string())),
        _ => Err(syntax_error(&pair)),
    }
}

fn combine(op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    Ok(match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(op.apply(a, b)),
        (Value::Pixels(a), Value::Scalar(b)) => Value::Pixels(a.mapv(|x| op.apply(x, b))),
        (Value::Scalar(a), Value::Pixels(b)) => Value::Pixels(b.mapv(|x| op.apply(a, x))),
        (Value::Pixels(a), Value::Pixels(b)) => {
            if a.dim() != b.dim() {
                return Err(RestoreError::ShapeMismatch {
                    expected: vec![a.ncols(), a.nrows()],
                    found: vec![b.ncols(), b.nrows()],
                });
            }
            Value::Pixels(Zip::from(&a).and(&b).map_collect(|&x, &y| op.apply(x, y)))
        }
    })
}

impl Expr {
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = RestoreParser::parse(Rule::expression, text)
            .map_err(|e| RestoreError::Expression(e.to_string()))?;
        let expression = pairs
            .next()
            .ok_or_else(|| RestoreError::Expression("empty expression".to_string()))?;
        build(expression)
    }

    /// Highest `IMn` index referenced, if any.
    pub fn max_image_index(&self) -> Option<usize> {
        match self {
            Expr::Image(i) => Some(*i),
            Expr::Number(_) | Expr::Var(_) => None,
            Expr::Neg(e) => e.max_image_index(),
            Expr::Binary { lhs, rhs, .. } => lhs.max_image_index().max(rhs.max_image_index()),
        }
    }

    fn eval(&self, images: &[&Array2<f64>], bindings: &HashMap<String, f64>) -> Result<Value> {
        match self {
            Expr::Image(i) => images
                .get(*i)
                .map(|&img| Value::Pixels(img.clone()))
                .ok_or_else(|| {
                    RestoreError::Expression(format!(
                        "IM{} referenced but only {} images given",
                        i,
                        images.len()
                    ))
                }),
            Expr::Number(v) => Ok(Value::Scalar(*v)),
            Expr::Var(name) => bindings
                .get(name)
                .map(|&v| Value::Scalar(v))
                .ok_or_else(|| RestoreError::Expression(format!("unbound name '{}'", name))),
            Expr::Neg(e) => Ok(match e.eval(images, bindings)? {
                Value::Scalar(v) => Value::Scalar(-v),
                Value::Pixels(p) => Value::Pixels(p.mapv(|x| -x)),
            }),
            Expr::Binary { op, lhs, rhs } => combine(
                *op,
                lhs.eval(images, bindings)?,
                rhs.eval(images, bindings)?,
            ),
        }
    }

    /// Evaluates pixel by pixel; `IMn` is `images[n]`, other names come from `bindings`.
    pub fn evaluate(
        &self,
        images: &[&Array2<f64>],
        bindings: &HashMap<String, f64>,
    ) -> Result<Array2<f64>> {
        if let Some(i) = self.max_image_index() {
            if i >= images.len() {
                return Err(RestoreError::Expression(format!(
                    "IM{} referenced but only {} images given",
                    i,
                    images.len()
                )));
            }
        }
        match self.eval(images, bindings)? {
            Value::Pixels(p) => Ok(p),
            Value::Scalar(_) => Err(RestoreError::Expression(
                "expression does not reference any image".to_string(),
            )),
        }
    }
}
