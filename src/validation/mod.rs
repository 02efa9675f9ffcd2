//! Input validation against declared schemas.
//!
//! # Responsibilities
//! - Turn a parsed request body into validated, typed data
//! - Report failures as a field → message map for the client
//!
//! # Design Decisions
//! - serde does the shape check, garde the declarative field rules; both
//!   funnel into the same `FieldErrors` payload
//! - Schemas are trait objects so endpoints declare them without generics

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FieldErrors;
use crate::http::BodyData;

/// A declared input schema.
pub trait Schema: Send + Sync {
    /// Validate a parsed body, returning the validated structure as JSON.
    fn validate(&self, data: &BodyData) -> Result<serde_json::Value, FieldErrors>;
}

/// Schema backed by a serde-deserializable, garde-validated type.
pub struct JsonSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchema<T>
where
    T: DeserializeOwned + Serialize + garde::Validate + Send + Sync + 'static,
    T::Context: Default,
{
    pub fn new() -> Arc<dyn Schema> {
        Arc::new(Self { _marker: PhantomData })
    }
}

impl<T> Schema for JsonSchema<T>
where
    T: DeserializeOwned + Serialize + garde::Validate + Send + Sync,
    T::Context: Default,
{
    fn validate(&self, data: &BodyData) -> Result<serde_json::Value, FieldErrors> {
        let value = match data {
            BodyData::Empty => serde_json::json!({}),
            BodyData::Json(value) => value.clone(),
            BodyData::Form(fields) => serde_json::json!(fields),
            BodyData::Raw(_) => {
                return Err(single("body", "content type is not supported for validation"));
            }
        };

        let parsed: T = serde_json::from_value(value).map_err(|e| decode_errors(&e))?;
        parsed.validate().map_err(report_errors)?;
        serde_json::to_value(&parsed).map_err(|_| single("body", "could not serialize validated data"))
    }
}

fn single(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), message.to_string());
    errors
}

/// Attribute a serde decode error to the field it names, falling back to the
/// whole body when the message carries no field.
fn decode_errors(error: &serde_json::Error) -> FieldErrors {
    let message = error.to_string();
    let field = message
        .split('`')
        .nth(1)
        .filter(|name| !name.is_empty())
        .unwrap_or("body");
    single(field, &message)
}

fn report_errors(report: garde::Report) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (path, error) in report.iter() {
        let field = path.to_string();
        let field = if field.is_empty() { "body".to_string() } else { field };
        errors.insert(field, error.to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize, serde::Serialize, garde::Validate)]
    struct CreateUser {
        #[garde(length(min = 3))]
        username: String,
        #[garde(range(min = 0, max = 150))]
        age: u32,
    }

    #[test]
    fn test_valid_body() {
        let schema = JsonSchema::<CreateUser>::new();
        let data = BodyData::Json(serde_json::json!({"username": "ali", "age": 30}));
        let validated = schema.validate(&data).unwrap();
        assert_eq!(validated, serde_json::json!({"username": "ali", "age": 30}));
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let schema = JsonSchema::<CreateUser>::new();
        let data = BodyData::Json(serde_json::json!({"age": 30}));
        let errors = schema.validate(&data).unwrap_err();
        assert!(errors.contains_key("username"));
    }

    #[test]
    fn test_rule_violation_maps_to_field() {
        let schema = JsonSchema::<CreateUser>::new();
        let data = BodyData::Json(serde_json::json!({"username": "ab", "age": 30}));
        let errors = schema.validate(&data).unwrap_err();
        assert!(errors.get("username").unwrap().contains("length"));
    }

    #[test]
    fn test_raw_body_is_rejected() {
        let schema = JsonSchema::<CreateUser>::new();
        let data = BodyData::Raw(axum::body::Bytes::from_static(b"\x00"));
        let errors = schema.validate(&data).unwrap_err();
        assert!(errors.contains_key("body"));
    }
}
