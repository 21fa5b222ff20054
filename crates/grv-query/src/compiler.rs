//! Compiler: folds a validated `TypedExpr` into a predicate closure over an
//! abstract record type (spec.md §4.3). The same compiler is used for
//! commit rows and reference rows; only the `FieldValueProvider` differs.

use crate::parser::CmpOp;
use crate::typer::TypedExpr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Invalid,
    String(String),
    Number(f64),
    /// Seconds since epoch.
    Date(i64),
}

pub trait FieldValueProvider<R>: Send + Sync {
    fn field_value(&self, record: &R, name: &str) -> FieldValue;
}

type Predicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;
type ValueFn<R> = Box<dyn Fn(&R) -> FieldValue + Send + Sync>;

/// Compile `expr` into a predicate closure, resolving identifiers through
/// `provider`.
pub fn compile<R: 'static>(
    expr: &TypedExpr,
    provider: Arc<dyn FieldValueProvider<R>>,
) -> Predicate<R> {
    match expr {
        TypedExpr::Paren(inner) => compile(inner, provider),
        TypedExpr::Not(inner) => {
            let f = compile(inner, provider);
            Box::new(move |r| !f(r))
        }
        TypedExpr::And(a, b) => {
            let fa = compile(a, provider.clone());
            let fb = compile(b, provider);
            Box::new(move |r| fa(r) && fb(r))
        }
        TypedExpr::Or(a, b) => {
            let fa = compile(a, provider.clone());
            let fb = compile(b, provider);
            Box::new(move |r| fa(r) || fb(r))
        }
        TypedExpr::Cmp(op, left, right) => compile_cmp(*op, left, right, provider),
        _ => Box::new(|_| false),
    }
}

fn compile_cmp<R: 'static>(
    op: CmpOp,
    left: &TypedExpr,
    right: &TypedExpr,
    provider: Arc<dyn FieldValueProvider<R>>,
) -> Predicate<R> {
    match op {
        CmpOp::Glob => {
            if let TypedExpr::GlobLit { pattern, .. } = right {
                let pattern = pattern.clone();
                let lv = compile_value(left, provider);
                Box::new(move |r| matches!(lv(r), FieldValue::String(s) if pattern.matches(&s)))
            } else {
                Box::new(|_| false)
            }
        }
        CmpOp::Regexp => {
            if let TypedExpr::RegexLit { regex, .. } = right {
                let regex = regex.clone();
                let lv = compile_value(left, provider);
                Box::new(move |r| matches!(lv(r), FieldValue::String(s) if regex.is_match(&s)))
            } else {
                Box::new(|_| false)
            }
        }
        _ => {
            let lv = compile_value(left, provider.clone());
            let rv = compile_value(right, provider);
            Box::new(move |r| compare(op, &lv(r), &rv(r)))
        }
    }
}

fn compile_value<R: 'static>(
    expr: &TypedExpr,
    provider: Arc<dyn FieldValueProvider<R>>,
) -> ValueFn<R> {
    match expr {
        TypedExpr::Identifier(name, _) => {
            let name = name.clone();
            Box::new(move |r: &R| provider.field_value(r, &name))
        }
        TypedExpr::StringLit(s) => {
            let s = s.clone();
            Box::new(move |_: &R| FieldValue::String(s.clone()))
        }
        TypedExpr::NumberLit(n) => {
            let n = *n;
            Box::new(move |_: &R| FieldValue::Number(n))
        }
        TypedExpr::DateLit(t) => {
            let t = *t;
            Box::new(move |_: &R| FieldValue::Date(t))
        }
        TypedExpr::Paren(inner) => compile_value(inner, provider),
        _ => Box::new(|_: &R| FieldValue::Invalid),
    }
}

/// Numeric comparisons are IEEE-754 (`PartialOrd`, no NaN special-casing);
/// string comparisons are byte-lexicographic; Date comparisons compare
/// second-granularity timestamps (DESIGN.md Open Question 2).
fn compare(op: CmpOp, a: &FieldValue, b: &FieldValue) -> bool {
    use FieldValue::*;
    match (a, b) {
        (Number(x), Number(y)) => match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            _ => false,
        },
        (String(x), String(y)) => match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            _ => false,
        },
        (Date(x), Date(y)) => match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typer::{convert, validate, FieldType, FieldTypeDescriptor};

    struct Record {
        author_name: String,
        author_date: i64,
        parent_count: f64,
    }

    struct Descriptor;
    impl FieldTypeDescriptor for Descriptor {
        fn field_type(&self, name: &str) -> FieldType {
            match name {
                "AuthorDate" => FieldType::Date,
                "AuthorName" => FieldType::String,
                "ParentCount" => FieldType::Number,
                _ => FieldType::Invalid,
            }
        }
    }

    struct Provider;
    impl FieldValueProvider<Record> for Provider {
        fn field_value(&self, record: &Record, name: &str) -> FieldValue {
            match name {
                "AuthorName" => FieldValue::String(record.author_name.clone()),
                "AuthorDate" => FieldValue::Date(record.author_date),
                "ParentCount" => FieldValue::Number(record.parent_count),
                _ => FieldValue::Invalid,
            }
        }
    }

    fn build(query: &str) -> Predicate<Record> {
        let expr = parse(query).unwrap();
        let typed = convert(&expr, &Descriptor);
        assert!(validate(&typed).is_empty(), "query should validate: {query}");
        compile(&typed, Arc::new(Provider))
    }

    #[test]
    fn date_equality_matches_exact_day() {
        let pred = build("AuthorDate = \"2017-07-16\"");
        let midnight = Record {
            author_name: String::new(),
            author_date: 1_500_163_200,
            parent_count: 0.0,
        };
        let ten_am = Record {
            author_name: String::new(),
            author_date: 1_500_163_200 + 36_000,
            parent_count: 0.0,
        };
        assert!(pred(&midnight));
        assert!(!pred(&ten_am));
    }

    #[test]
    fn glob_matches_prefix() {
        let pred = build("AuthorName GLOB \"Added*\"");
        assert!(pred(&Record {
            author_name: "Added feature".into(),
            author_date: 0,
            parent_count: 0.0
        }));
        assert!(!pred(&Record {
            author_name: "Fix bug".into(),
            author_date: 0,
            parent_count: 0.0
        }));
    }

    #[test]
    fn regexp_matches_anchored_pattern() {
        let pred = build("AuthorName REGEXP \"^Added\\\\s+.*$\"");
        assert!(pred(&Record {
            author_name: "Added feature".into(),
            author_date: 0,
            parent_count: 0.0
        }));
        assert!(!pred(&Record {
            author_name: "fix Added".into(),
            author_date: 0,
            parent_count: 0.0
        }));
    }

    #[test]
    fn boolean_laws_hold() {
        let p = build("ParentCount = 1");
        let q = build("ParentCount = 2");
        let not_not_p = build("NOT NOT ParentCount = 1");
        let r = Record {
            author_name: String::new(),
            author_date: 0,
            parent_count: 1.0,
        };
        assert_eq!(p(&r), not_not_p(&r));
        let _ = q;
    }
}
