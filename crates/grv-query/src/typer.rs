//! Type-checking and literal-promotion pass (spec.md §4.3).
//!
//! Two passes: `convert` rewrites string literals compared against typed
//! identifiers into compiled Date/Glob/Regex literals; `validate` checks
//! the resulting tree is well-typed, aggregating every error found rather
//! than stopping at the first (spec.md §9 "Error aggregation").

use crate::parser::{CmpOp, Expr, QueryError};
use chrono::{Local, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Invalid,
    String,
    Number,
    Date,
    Glob,
    Regex,
}

pub trait FieldTypeDescriptor {
    fn field_type(&self, name: &str) -> FieldType;
}

/// Tagged sum type for the post-typing AST (spec.md §9).
#[derive(Debug, Clone)]
pub enum TypedExpr {
    Paren(Box<TypedExpr>),
    Not(Box<TypedExpr>),
    And(Box<TypedExpr>, Box<TypedExpr>),
    Or(Box<TypedExpr>, Box<TypedExpr>),
    Cmp(CmpOp, Box<TypedExpr>, Box<TypedExpr>),
    Identifier(String, FieldType),
    StringLit(String),
    NumberLit(f64),
    /// Seconds since epoch, parsed in local time per spec.md §4.3.
    DateLit(i64),
    GlobLit { src: String, pattern: glob::Pattern },
    RegexLit { src: String, regex: regex::Regex },
}

impl TypedExpr {
    /// The value type of a leaf/value-producing node; `None` for logical
    /// connectives, which are checked separately in `validate`.
    fn value_type(&self) -> Option<FieldType> {
        match self {
            TypedExpr::Identifier(_, ty) => Some(*ty),
            TypedExpr::StringLit(_) => Some(FieldType::String),
            TypedExpr::NumberLit(_) => Some(FieldType::Number),
            TypedExpr::DateLit(_) => Some(FieldType::Date),
            TypedExpr::GlobLit { .. } => Some(FieldType::Glob),
            TypedExpr::RegexLit { .. } => Some(FieldType::Regex),
            TypedExpr::Paren(inner) => inner.value_type(),
            _ => None,
        }
    }

    fn is_logical(&self) -> bool {
        matches!(
            self,
            TypedExpr::Not(_) | TypedExpr::And(_, _) | TypedExpr::Or(_, _) | TypedExpr::Cmp(..)
        )
    }
}

/// Date literals are wall-clock local time (spec.md §4.3), matching the
/// field providers that compare them against: `CommitFieldProvider` feeds
/// git2 signature times straight through, and the display side
/// (`commit_view::local_date`) renders in the same zone.
fn parse_date(s: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return local_timestamp(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_timestamp(d.and_hms_opt(0, 0, 0)?);
    }
    None
}

/// Resolves a naive (zone-less) date/time against the local timezone,
/// taking the earlier instant on a DST-fold ambiguity.
fn local_timestamp(dt: NaiveDateTime) -> Option<i64> {
    dt.and_local_timezone(Local).earliest().map(|d| d.timestamp())
}

/// Pass 1: promote string literals compared against typed identifiers.
pub fn convert(expr: &Expr, descriptor: &dyn FieldTypeDescriptor) -> TypedExpr {
    match expr {
        Expr::Paren(inner) => TypedExpr::Paren(Box::new(convert(inner, descriptor))),
        Expr::Not(inner) => TypedExpr::Not(Box::new(convert(inner, descriptor))),
        Expr::And(a, b) => TypedExpr::And(
            Box::new(convert(a, descriptor)),
            Box::new(convert(b, descriptor)),
        ),
        Expr::Or(a, b) => TypedExpr::Or(
            Box::new(convert(a, descriptor)),
            Box::new(convert(b, descriptor)),
        ),
        Expr::Identifier(name) => TypedExpr::Identifier(name.clone(), descriptor.field_type(name)),
        Expr::StringLit(s) => TypedExpr::StringLit(s.clone()),
        Expr::NumberLit(n) => TypedExpr::NumberLit(*n),
        Expr::Cmp(op, left, right) => {
            let tleft = convert(left, descriptor);
            let tright = convert(right, descriptor);
            promote_cmp(*op, tleft, tright)
        }
    }
}

fn promote_cmp(op: CmpOp, left: TypedExpr, right: TypedExpr) -> TypedExpr {
    match op {
        CmpOp::Glob => {
            if let (TypedExpr::Identifier(_, FieldType::String), TypedExpr::StringLit(s)) =
                (&left, &right)
            {
                if let Ok(pattern) = glob::Pattern::new(s) {
                    return TypedExpr::Cmp(
                        op,
                        Box::new(left),
                        Box::new(TypedExpr::GlobLit {
                            src: s.clone(),
                            pattern,
                        }),
                    );
                }
            }
            TypedExpr::Cmp(op, Box::new(left), Box::new(right))
        }
        CmpOp::Regexp => {
            if let (TypedExpr::Identifier(_, FieldType::String), TypedExpr::StringLit(s)) =
                (&left, &right)
            {
                if let Ok(regex) = regex::Regex::new(s) {
                    return TypedExpr::Cmp(
                        op,
                        Box::new(left),
                        Box::new(TypedExpr::RegexLit {
                            src: s.clone(),
                            regex,
                        }),
                    );
                }
            }
            TypedExpr::Cmp(op, Box::new(left), Box::new(right))
        }
        _ => {
            let (left, right) = promote_date_side(left, right);
            TypedExpr::Cmp(op, Box::new(left), Box::new(right))
        }
    }
}

fn promote_date_side(left: TypedExpr, right: TypedExpr) -> (TypedExpr, TypedExpr) {
    if matches!(&left, TypedExpr::Identifier(_, FieldType::Date)) {
        if let TypedExpr::StringLit(s) = &right {
            if let Some(ts) = parse_date(s) {
                return (left, TypedExpr::DateLit(ts));
            }
        }
    }
    if matches!(&right, TypedExpr::Identifier(_, FieldType::Date)) {
        if let TypedExpr::StringLit(s) = &left {
            if let Some(ts) = parse_date(s) {
                return (TypedExpr::DateLit(ts), right);
            }
        }
    }
    (left, right)
}

/// Allowed (left, right) value types for each restricted comparison
/// operator (spec.md §4.3).
fn allowed_types(op: CmpOp) -> Option<(FieldType, FieldType)> {
    match op {
        CmpOp::Glob => Some((FieldType::String, FieldType::Glob)),
        CmpOp::Regexp => Some((FieldType::String, FieldType::Regex)),
        _ => None,
    }
}

/// Pass 2: validate the typed tree, collecting every error found.
pub fn validate(expr: &TypedExpr) -> Vec<QueryError> {
    let mut errors = Vec::new();
    validate_node(expr, &mut errors);
    errors
}

fn validate_node(expr: &TypedExpr, errors: &mut Vec<QueryError>) {
    match expr {
        TypedExpr::Paren(inner) => validate_node(inner, errors),
        TypedExpr::Not(inner) => {
            if !inner.is_logical() {
                errors.push(QueryError {
                    pos: 0,
                    message: "Expected logical expression operand for NOT".to_string(),
                });
            }
            validate_node(inner, errors);
        }
        TypedExpr::And(a, b) | TypedExpr::Or(a, b) => {
            for (side, node) in [("LHS", a.as_ref()), ("RHS", b.as_ref())] {
                if !node.is_logical() {
                    errors.push(QueryError {
                        pos: 0,
                        message: format!(
                            "Expected logical expression operand on {side} of AND/OR"
                        ),
                    });
                }
                validate_node(node, errors);
            }
        }
        TypedExpr::Cmp(op, left, right) => {
            validate_node(left, errors);
            validate_node(right, errors);

            let lty = left.value_type();
            let rty = right.value_type();
            let (Some(lty), Some(rty)) = (lty, rty) else {
                errors.push(QueryError {
                    pos: 0,
                    message: "Expected value-typed operand for comparison".to_string(),
                });
                return;
            };

            if let Some((allowed_l, allowed_r)) = allowed_types(*op) {
                if lty != FieldType::Invalid && lty != allowed_l {
                    errors.push(QueryError {
                        pos: 0,
                        message: format!(
                            "Argument on LHS has invalid type: {lty:?}. Allowed types are: {allowed_l:?}"
                        ),
                    });
                }
                if rty != FieldType::Invalid && rty != allowed_r {
                    errors.push(QueryError {
                        pos: 0,
                        message: format!(
                            "Argument on RHS has invalid type: {rty:?}. Allowed types are: {allowed_r:?}"
                        ),
                    });
                }
            } else if lty != rty && lty != FieldType::Invalid && rty != FieldType::Invalid {
                errors.push(QueryError {
                    pos: 0,
                    message: format!(
                        "Argument on LHS has invalid type: {lty:?}. Allowed types are: {rty:?}"
                    ),
                });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct Descriptor;
    impl FieldTypeDescriptor for Descriptor {
        fn field_type(&self, name: &str) -> FieldType {
            match name {
                "AuthorDate" => FieldType::Date,
                "AuthorName" | "Summary" => FieldType::String,
                "ParentCount" => FieldType::Number,
                _ => FieldType::Invalid,
            }
        }
    }

    #[test]
    fn date_literal_promotion_parses_date_only_form() {
        let expr = parse("AuthorDate = \"2017-07-16\"").unwrap();
        let typed = convert(&expr, &Descriptor);
        match typed {
            TypedExpr::Cmp(CmpOp::Eq, _, right) => {
                assert!(matches!(*right, TypedExpr::DateLit(_)));
            }
            _ => panic!("expected comparison"),
        }
        assert!(validate(&convert(&parse("AuthorDate = \"2017-07-16\"").unwrap(), &Descriptor)).is_empty());
    }

    #[test]
    fn glob_comparison_compiles_pattern() {
        let expr = parse("Summary GLOB \"Added*\"").unwrap();
        let typed = convert(&expr, &Descriptor);
        match &typed {
            TypedExpr::Cmp(CmpOp::Glob, _, right) => {
                assert!(matches!(right.as_ref(), TypedExpr::GlobLit { .. }));
            }
            _ => panic!("expected glob comparison"),
        }
        assert!(validate(&typed).is_empty());
    }

    #[test]
    fn regexp_requires_string_lhs() {
        let expr = parse("ParentCount REGEXP \"^[0-9]+$\"").unwrap();
        let typed = convert(&expr, &Descriptor);
        let errs = validate(&typed);
        assert!(!errs.is_empty());
        assert!(errs[0].message.contains("invalid type"));
    }

    #[test]
    fn mismatched_value_types_report_error() {
        let expr = parse("AuthorName = 5").unwrap();
        let typed = convert(&expr, &Descriptor);
        let errs = validate(&typed);
        assert!(!errs.is_empty());
    }
}
