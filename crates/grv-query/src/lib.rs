//! Filter-query pipeline (spec.md §4.3): scanner → parser → typer →
//! compiler, shared between commit rows and reference rows. Callers build
//! a predicate once per `AddFilter` action and apply it per row, skipping
//! non-row-like entries themselves (group headers etc., per spec.md §4.3).

pub mod compiler;
pub mod parser;
pub mod scanner;
pub mod typer;

pub use compiler::{compile, FieldValue, FieldValueProvider};
pub use parser::{parse, CmpOp, Expr, QueryError};
pub use typer::{convert, validate, FieldType, FieldTypeDescriptor, TypedExpr};

use std::sync::Arc;

/// Run the whole pipeline, returning either a ready predicate or the
/// aggregated list of validation errors (spec.md §9 error aggregation).
pub fn build_filter<R: 'static>(
    query: &str,
    descriptor: &dyn FieldTypeDescriptor,
    provider: Arc<dyn FieldValueProvider<R>>,
) -> Result<Box<dyn Fn(&R) -> bool + Send + Sync>, Vec<QueryError>> {
    let expr = parser::parse(query).map_err(|e| vec![e])?;
    let typed = typer::convert(&expr, descriptor);
    let errors = typer::validate(&typed);
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(compiler::compile(&typed, provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Descriptor;
    impl FieldTypeDescriptor for Descriptor {
        fn field_type(&self, name: &str) -> FieldType {
            match name {
                "Summary" => FieldType::String,
                _ => FieldType::Invalid,
            }
        }
    }

    struct Provider;
    impl FieldValueProvider<String> for Provider {
        fn field_value(&self, record: &String, name: &str) -> FieldValue {
            match name {
                "Summary" => FieldValue::String(record.clone()),
                _ => FieldValue::Invalid,
            }
        }
    }

    #[test]
    fn end_to_end_builds_and_evaluates_predicate() {
        let pred =
            build_filter::<String>("Summary GLOB \"Added*\"", &Descriptor, Arc::new(Provider))
                .unwrap();
        assert!(pred(&"Added feature".to_string()));
        assert!(!pred(&"Fix bug".to_string()));
    }

    #[test]
    fn invalid_comparison_reports_errors_instead_of_panicking() {
        let result =
            build_filter::<String>("Summary REGEXP 5", &Descriptor, Arc::new(Provider));
        assert!(result.is_err());
    }
}
