//! Compiles a parsed expression into a closure tree evaluated per record.
//! Compilation resolves field names and operator/type combinations once, so
//! evaluation over a large record set does no string matching on the query.

use thiserror::Error;

use crate::storage::entities::{DailyRecord, Unit};

use super::{parse, BinaryOp, Expr, Literal};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unexpected character '{0}' in filter")]
    UnexpectedChar(char),
    #[error("filter ended unexpectedly")]
    UnexpectedEnd,
    #[error("unexpected token {0} in filter")]
    UnexpectedToken(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),
}

/// Value an expression node produces for one record.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Num(i64),
    Bool(bool),
}

type Eval = Box<dyn Fn(&DailyRecord) -> Value + Send + Sync>;

/// A compiled filter. Evaluates to a boolean for each record; non-boolean
/// results at the root count as a match when truthy (nonzero, nonempty).
pub struct Predicate {
    eval: Eval,
}

impl Predicate {
    /// A predicate that keeps every record.
    pub fn match_all() -> Self {
        Predicate {
            eval: Box::new(|_| Value::Bool(true)),
        }
    }

    pub fn matches(&self, record: &DailyRecord) -> bool {
        match (self.eval)(record) {
            Value::Bool(b) => b,
            Value::Num(n) => n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

/// Parses and compiles filter text in one step.
pub fn compile(text: &str) -> Result<Predicate, CompileError> {
    let expr = parse(text)?;
    Ok(Predicate {
        eval: compile_expr(&expr)?,
    })
}

fn compile_expr(expr: &Expr) -> Result<Eval, CompileError> {
    match expr {
        Expr::Literal(Literal::Str(s)) => {
            let s = normalize_path_literal(s);
            Ok(Box::new(move |_| Value::Str(s.clone())))
        }
        Expr::Literal(Literal::Num(n)) => {
            let n = *n;
            Ok(Box::new(move |_| Value::Num(n)))
        }
        Expr::Ident(name) => compile_field(name),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = compile_expr(lhs)?;
            let rhs = compile_expr(rhs)?;
            Ok(compile_op(*op, lhs, rhs))
        }
    }
}

fn compile_field(name: &str) -> Result<Eval, CompileError> {
    match name {
        "filePath" | "file_path" => Ok(Box::new(|r| Value::Str(r.file_path.to_string()))),
        // ISO date string, so == and starts_with work on year or month prefixes.
        "date" => Ok(Box::new(|r| Value::Str(r.date.to_string()))),
        "words" => Ok(Box::new(|r| Value::Num(r.total_delta(Unit::Words)))),
        "chars" => Ok(Box::new(|r| Value::Num(r.total_delta(Unit::Chars)))),
        _ => Err(CompileError::UnknownField(name.to_string())),
    }
}

fn compile_op(op: BinaryOp, lhs: Eval, rhs: Eval) -> Eval {
    match op {
        BinaryOp::And => Box::new(move |r| {
            Value::Bool(truthy(&lhs(r)) && truthy(&rhs(r)))
        }),
        BinaryOp::Or => Box::new(move |r| {
            Value::Bool(truthy(&lhs(r)) || truthy(&rhs(r)))
        }),
        BinaryOp::Eq => Box::new(move |r| Value::Bool(value_eq(&lhs(r), &rhs(r)))),
        BinaryOp::Ne => Box::new(move |r| Value::Bool(!value_eq(&lhs(r), &rhs(r)))),
        BinaryOp::Gt => Box::new(move |r| Value::Bool(as_num(&lhs(r)) > as_num(&rhs(r)))),
        BinaryOp::Lt => Box::new(move |r| Value::Bool(as_num(&lhs(r)) < as_num(&rhs(r)))),
        BinaryOp::Contains => Box::new(move |r| {
            Value::Bool(as_str(&lhs(r)).contains(&as_str(&rhs(r))))
        }),
        BinaryOp::StartsWith => Box::new(move |r| {
            let path = as_str(&lhs(r));
            let prefix = as_str(&rhs(r));
            Value::Bool(
                path.starts_with(&prefix) || path.trim_start_matches('/').starts_with(&prefix),
            )
        }),
    }
}

/// Path literals are written with a leading slash for readability but match
/// against relative paths as recorded.
fn normalize_path_literal(s: &str) -> String {
    s.strip_prefix('/').unwrap_or(s).to_string()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0,
        Value::Str(s) => !s.is_empty(),
    }
}

fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        // mixed numeric/string comparisons fall back to string form
        _ => as_str(lhs) == as_str(rhs),
    }
}

fn as_num(value: &Value) -> i64 {
    match value {
        Value::Num(n) => *n,
        Value::Str(s) => s.parse().unwrap_or(0),
        Value::Bool(b) => *b as i64,
    }
}

fn as_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Num(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::storage::entities::{DailyRecord, TimeKey};

    use super::compile;

    const DATE: NaiveDate = match NaiveDate::from_ymd_opt(2024, 3, 7) {
        Some(v) => v,
        None => panic!("invalid date"),
    };

    fn record(path: &str, words: i64) -> DailyRecord {
        let mut record = DailyRecord::new(DATE, path.into(), 0, 0);
        record.set_entry("10:00".parse::<TimeKey>().unwrap(), words, words * 5);
        record
    }

    #[test]
    fn numeric_comparisons() {
        let p = compile("words > 100").unwrap();
        assert!(p.matches(&record("a.md", 150)));
        assert!(!p.matches(&record("a.md", 100)));

        let p = compile("words == 100").unwrap();
        assert!(p.matches(&record("a.md", 100)));
        assert!(!p.matches(&record("a.md", 99)));
    }

    #[test]
    fn path_contains_and_starts_with() {
        let p = compile("filePath contains drafts").unwrap();
        assert!(p.matches(&record("drafts/ch1.md", 10)));
        assert!(!p.matches(&record("notes/ch1.md", 10)));

        let p = compile("filePath starts_with /journal").unwrap();
        assert!(p.matches(&record("journal/day.md", 10)));
        assert!(!p.matches(&record("my-journal/day.md", 10)));
    }

    #[test]
    fn date_compares_as_iso_string() {
        let p = compile("date == 2024-03-07").unwrap();
        assert!(p.matches(&record("a.md", 1)));

        let p = compile("date starts_with 2024-03").unwrap();
        assert!(p.matches(&record("a.md", 1)));

        let p = compile("date != 2024-03-07").unwrap();
        assert!(!p.matches(&record("a.md", 1)));
    }

    #[test]
    fn logical_composition() {
        let p = compile("filePath contains drafts && words > 100").unwrap();
        assert!(p.matches(&record("drafts/a.md", 150)));
        assert!(!p.matches(&record("drafts/a.md", 50)));
        assert!(!p.matches(&record("notes/a.md", 150)));

        let p = compile("words > 100 OR filePath contains notes").unwrap();
        assert!(p.matches(&record("notes/a.md", 1)));
        assert!(p.matches(&record("drafts/a.md", 200)));
        assert!(!p.matches(&record("drafts/a.md", 1)));
    }

    #[test]
    fn quoted_strings_allow_spaces() {
        let p = compile("filePath contains 'my story'").unwrap();
        assert!(p.matches(&record("my story/ch1.md", 1)));
    }

    #[test]
    fn match_all_matches_everything() {
        let p = super::Predicate::match_all();
        assert!(p.matches(&record("anything.md", 0)));
    }

    #[test]
    fn unknown_words_fall_back_to_string_literals() {
        // "lines" is not a field, so it evaluates as the string "lines",
        // which is numerically zero.
        let p = compile("lines > 5").unwrap();
        assert!(!p.matches(&record("a.md", 100)));
    }
}
