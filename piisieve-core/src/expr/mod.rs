//! Typed expression trees for rule predicates and redactions.
//!
//! Rule tables are written in a small SQL-flavoured notation (the same one the
//! rule templates have always used), for example
//!
//! ```text
//! CAST(`card` AS STRING) NOT REGEXP("^4[0-9]{12}(?:[0-9]{3})?$") AS result
//! concat('XXXXXXXXXXXXXXXX', substr(`card`, -3, 3)) AS `card`
//! ```
//!
//! The parser turns that text into [`Predicate`] and [`Redaction`] values that
//! are interpreted directly against a [`Record`]; nothing is handed to an
//! external SQL engine. The language is flat on purpose: one subject, one
//! pattern, no boolean connectives.
//!
//! NULL handling follows SQL: functions propagate NULL, and a predicate whose
//! subject evaluates to NULL *passes* (a missing value cannot match a pattern).

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::errors::ExprError;
use crate::record::{value_as_string, Record};

pub mod functions;
pub mod parser;

pub use parser::{parse_predicate, parse_redaction};

/// A value-producing expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Column(String),
    Literal(Value),
    CastString(Box<Expr>),
    Call(Call),
}

/// Built-in function applications. Regex arguments are compiled at parse time.
#[derive(Debug, Clone)]
pub enum Call {
    Concat(Vec<Expr>),
    Substr {
        subject: Box<Expr>,
        pos: Box<Expr>,
        len: Option<Box<Expr>>,
    },
    RegexpReplace {
        subject: Box<Expr>,
        pattern: Arc<Regex>,
        replacement: Box<Expr>,
    },
    RegexpExtract {
        subject: Box<Expr>,
        pattern: Arc<Regex>,
        group: Box<Expr>,
    },
    Upper(Box<Expr>),
    Lower(Box<Expr>),
    Sha2 {
        subject: Box<Expr>,
        bits: Box<Expr>,
    },
}

impl Expr {
    /// Evaluates the expression against a record.
    pub fn eval(&self, record: &Record) -> Result<Value, ExprError> {
        match self {
            Expr::Column(name) => record
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::MissingColumn(name.clone())),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::CastString(inner) => {
                let v = inner.eval(record)?;
                Ok(value_as_string(&v).map(Value::String).unwrap_or(Value::Null))
            }
            Expr::Call(call) => functions::eval_call(call, record),
        }
    }

    /// Collects every column this expression reads, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::CastString(inner) => inner.collect_columns(out),
            Expr::Call(call) => {
                for arg in call.args() {
                    arg.collect_columns(out);
                }
            }
        }
    }
}

impl Call {
    fn args(&self) -> Vec<&Expr> {
        match self {
            Call::Concat(args) => args.iter().collect(),
            Call::Substr { subject, pos, len } => {
                let mut v = vec![subject.as_ref(), pos.as_ref()];
                if let Some(len) = len {
                    v.push(len.as_ref());
                }
                v
            }
            Call::RegexpReplace { subject, replacement, .. } => vec![&**subject, &**replacement],
            Call::RegexpExtract { subject, group, .. } => vec![&**subject, &**group],
            Call::Upper(e) | Call::Lower(e) => vec![&**e],
            Call::Sha2 { subject, bits } => vec![&**subject, &**bits],
        }
    }
}

/// `<subject> [NOT] REGEXP '<pattern>'`: true means the record passes the rule.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub subject: Expr,
    pub pattern: Arc<Regex>,
    pub negated: bool,
}

impl Predicate {
    /// Returns whether the record satisfies the constraint. NULL subjects pass.
    pub fn holds(&self, record: &Record) -> Result<bool, ExprError> {
        let value = self.subject.eval(record)?;
        let Some(text) = value_as_string(&value) else {
            return Ok(true);
        };
        let matched = self.pattern.is_match(&text);
        Ok(matched != self.negated)
    }
}

/// `<expr> AS <target>`: rewrites the target column with the expression's value.
#[derive(Debug, Clone)]
pub struct Redaction {
    pub expr: Expr,
    pub target: String,
}

impl Redaction {
    /// Computes the replacement value for `target`. The record itself is untouched.
    pub fn evaluate(&self, record: &Record) -> Result<Value, ExprError> {
        if !record.contains_key(&self.target) {
            return Err(ExprError::MissingColumn(self.target.clone()));
        }
        self.expr.eval(record)
    }
}
