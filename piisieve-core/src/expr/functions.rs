//! Built-in functions available to rule expressions and the shared regex cache.
//!
//! Semantics follow the SQL dialect the rule tables were first written for:
//! `substr` is 1-based and accepts negative positions, `regexp_extract` yields
//! an empty string when the pattern does not match, and every function returns
//! NULL when its subject is NULL.
//!
//! License: MIT OR APACHE 2.0

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::errors::ExprError;
use crate::expr::{Call, Expr};
use crate::record::{value_as_string, Record};

/// Upper bound for a single compiled pattern.
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

lazy_static! {
    /// Patterns are shared by every column a template expands to, so each one is
    /// compiled once per process.
    static ref PATTERN_CACHE: RwLock<HashMap<String, Arc<Regex>>> = RwLock::new(HashMap::new());
}

/// Compiles a pattern, or returns the cached compilation.
pub fn cached_regex(pattern: &str) -> Result<Arc<Regex>, ExprError> {
    {
        let cache = PATTERN_CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = cache.get(pattern) {
            return Ok(Arc::clone(re));
        }
    }

    let regex = RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| ExprError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
    let regex = Arc::new(regex);

    debug!(target: "piisieve_core::expr", "Compiled and cached pattern '{}'", pattern);
    PATTERN_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Resolves a function name and argument list into a typed [`Call`].
pub fn build_call(name: &str, mut args: Vec<Expr>) -> Result<Call, ExprError> {
    let lname = name.to_ascii_lowercase();
    match lname.as_str() {
        "concat" => {
            if args.is_empty() {
                return Err(arity(&lname, "at least 1", 0));
            }
            Ok(Call::Concat(args))
        }
        "substr" | "substring" => {
            if !(2..=3).contains(&args.len()) {
                return Err(arity(&lname, "2 or 3", args.len()));
            }
            let len = if args.len() == 3 { args.pop().map(Box::new) } else { None };
            let pos = Box::new(args.remove(1));
            let subject = Box::new(args.remove(0));
            Ok(Call::Substr { subject, pos, len })
        }
        "regexp_replace" => {
            if args.len() != 3 {
                return Err(arity(&lname, "3", args.len()));
            }
            let replacement = Box::new(args.remove(2));
            let pattern = literal_pattern(&lname, args.remove(1))?;
            let subject = Box::new(args.remove(0));
            Ok(Call::RegexpReplace { subject, pattern, replacement })
        }
        "regexp_extract" => {
            if !(2..=3).contains(&args.len()) {
                return Err(arity(&lname, "2 or 3", args.len()));
            }
            let group = if args.len() == 3 {
                Box::new(args.remove(2))
            } else {
                Box::new(Expr::Literal(Value::from(1)))
            };
            let pattern = literal_pattern(&lname, args.remove(1))?;
            let subject = Box::new(args.remove(0));
            Ok(Call::RegexpExtract { subject, pattern, group })
        }
        "upper" | "lower" => {
            if args.len() != 1 {
                return Err(arity(&lname, "1", args.len()));
            }
            let subject = Box::new(args.remove(0));
            Ok(if lname == "upper" { Call::Upper(subject) } else { Call::Lower(subject) })
        }
        "sha2" => {
            if args.len() != 2 {
                return Err(arity(&lname, "2", args.len()));
            }
            let bits = Box::new(args.remove(1));
            let subject = Box::new(args.remove(0));
            Ok(Call::Sha2 { subject, bits })
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn arity(name: &str, expected: &str, actual: usize) -> ExprError {
    ExprError::Arity { name: name.to_string(), expected: expected.to_string(), actual }
}

fn literal_pattern(func: &str, arg: Expr) -> Result<Arc<Regex>, ExprError> {
    match arg {
        Expr::Literal(Value::String(p)) => cached_regex(&p),
        _ => Err(ExprError::TypeMismatch(format!(
            "{} requires a string literal pattern",
            func
        ))),
    }
}

/// Evaluates a function application.
pub fn eval_call(call: &Call, record: &Record) -> Result<Value, ExprError> {
    match call {
        Call::Concat(args) => {
            let mut out = String::new();
            for arg in args {
                match string_arg(arg, record)? {
                    Some(s) => out.push_str(&s),
                    None => return Ok(Value::Null),
                }
            }
            Ok(Value::String(out))
        }
        Call::Substr { subject, pos, len } => {
            let Some(s) = string_arg(subject, record)? else { return Ok(Value::Null) };
            let Some(pos) = int_arg(pos, record)? else { return Ok(Value::Null) };
            let len = match len {
                Some(len) => match int_arg(len, record)? {
                    Some(l) => l,
                    None => return Ok(Value::Null),
                },
                None => i64::from(i32::MAX),
            };
            Ok(Value::String(substr(&s, pos, len)))
        }
        Call::RegexpReplace { subject, pattern, replacement } => {
            let Some(s) = string_arg(subject, record)? else { return Ok(Value::Null) };
            let Some(rep) = string_arg(replacement, record)? else { return Ok(Value::Null) };
            Ok(Value::String(pattern.replace_all(&s, rep.as_str()).into_owned()))
        }
        Call::RegexpExtract { subject, pattern, group } => {
            let Some(s) = string_arg(subject, record)? else { return Ok(Value::Null) };
            let Some(idx) = int_arg(group, record)? else { return Ok(Value::Null) };
            let groups = pattern.captures_len() as i64 - 1;
            if idx < 0 || idx > groups {
                return Err(ExprError::TypeMismatch(format!(
                    "regexp_extract group {} out of range, pattern has {} group(s)",
                    idx, groups
                )));
            }
            let extracted = pattern
                .captures(&s)
                .and_then(|caps| caps.get(idx as usize).map(|m| m.as_str().to_string()))
                .unwrap_or_default();
            Ok(Value::String(extracted))
        }
        Call::Upper(e) => Ok(string_arg(e, record)?
            .map(|s| Value::String(s.to_uppercase()))
            .unwrap_or(Value::Null)),
        Call::Lower(e) => Ok(string_arg(e, record)?
            .map(|s| Value::String(s.to_lowercase()))
            .unwrap_or(Value::Null)),
        Call::Sha2 { subject, bits } => {
            let Some(s) = string_arg(subject, record)? else { return Ok(Value::Null) };
            let Some(bits) = int_arg(bits, record)? else { return Ok(Value::Null) };
            let digest = match bits {
                0 | 256 => hex::encode(Sha256::digest(s.as_bytes())),
                224 => hex::encode(Sha224::digest(s.as_bytes())),
                384 => hex::encode(Sha384::digest(s.as_bytes())),
                512 => hex::encode(Sha512::digest(s.as_bytes())),
                other => {
                    return Err(ExprError::TypeMismatch(format!(
                        "sha2 bit length must be 224, 256, 384 or 512, got {}",
                        other
                    )))
                }
            };
            Ok(Value::String(digest))
        }
    }
}

fn string_arg(e: &Expr, record: &Record) -> Result<Option<String>, ExprError> {
    Ok(value_as_string(&e.eval(record)?))
}

fn int_arg(e: &Expr, record: &Record) -> Result<Option<i64>, ExprError> {
    match e.eval(record)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ExprError::TypeMismatch(format!("expected an integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ExprError::TypeMismatch(format!("expected an integer, got '{}'", s))),
        other => Err(ExprError::TypeMismatch(format!("expected an integer, got {}", other))),
    }
}

/// 1-based, character-indexed substring. Negative positions count from the end;
/// position 0 behaves like 1.
pub fn substr(s: &str, pos: i64, len: i64) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let start = if pos > 0 {
        pos - 1
    } else if pos < 0 {
        n + pos
    } else {
        0
    };
    let end = start.saturating_add(len);
    let start = start.max(0);
    if start >= end {
        return String::new();
    }
    let end = end.min(n);
    if start >= end {
        return String::new();
    }
    chars[start as usize..end as usize].iter().collect()
}
