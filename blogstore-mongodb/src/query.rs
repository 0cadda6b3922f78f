//! Query translation from blogstore expressions to MongoDB query syntax.
//!
//! This module translates the abstract query expressions of `blogstore-core` into
//! MongoDB BSON filter documents for execution by the MongoDB query engine.

use bson::{Document, Bson, doc};

use blogstore_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};

use crate::sanitizer::ValueSanitizer;


/// Escapes regex metacharacters so string operators match literally.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

fn string_operand<'a>(op: &str, value: &'a Bson) -> Result<&'a str, DocumentStoreError> {
    value
        .as_str()
        .ok_or_else(|| DocumentStoreError::Backend(format!("{op} operator requires a string value")))
}


/// Translates query expressions into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // MongoDB rejects an empty `$and`; an empty conjunction matches everything.
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! { "$and": self.visit_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::sanitize_string(field);

        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_text(&mut self, terms: &str) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$text": { "$search": terms } })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::sanitize_string(field);
        let value = &ValueSanitizer::sanitize_value(value);

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    other => doc! { "$not": { "$elemMatch": { "$eq": other } } },
                },
                FieldOp::StartsWith => {
                    doc! { "$regex": format!("^{}", escape_regex(string_operand("StartsWith", value)?)) }
                },
                FieldOp::EndsWith => {
                    doc! { "$regex": format!("{}$", escape_regex(string_operand("EndsWith", value)?)) }
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(values) => doc! { "$in": values },
                    single => doc! { "$in": [single] },
                },
                FieldOp::NoneOf => match value {
                    Bson::Array(values) => doc! { "$nin": values },
                    single => doc! { "$nin": [single] },
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogstore_core::query::Filter;
    use rstest::rstest;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator.visit_expr(&expr).unwrap()
    }

    #[test]
    fn empty_conjunction_matches_everything() {
        assert_eq!(translate(Filter::all()), doc! {});
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            translate(Filter::eq("status", "draft").not()),
            doc! { "$nor": [{ "status": { "$eq": "draft" } }] }
        );
    }

    #[test]
    fn text_search_uses_text_operator() {
        assert_eq!(
            translate(Filter::text("rust async")),
            doc! { "$text": { "$search": "rust async" } }
        );
    }

    #[rstest]
    #[case(Filter::starts_with("title", "C++"), doc! { "title": { "$regex": "^C\\+\\+" } })]
    #[case(Filter::contains("email", "a.b"), doc! { "email": { "$regex": "a\\.b" } })]
    #[case(Filter::contains("tags", 1), doc! { "tags": { "$elemMatch": { "$eq": 1 } } })]
    #[case(Filter::any_of("status", vec!["draft", "archived"]), doc! { "status": { "$in": ["draft", "archived"] } })]
    #[case(Filter::gte("age", 18), doc! { "age": { "$gte": 18 } })]
    fn field_operators(#[case] expr: Expr, #[case] expected: Document) {
        assert_eq!(translate(expr), expected);
    }

    #[test]
    fn string_operators_reject_other_values() {
        assert!(MongoQueryTranslator.visit_expr(&Filter::ends_with("age", 3)).is_err());
    }
}
