use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FieldError, PaymentsError};
use crate::types::Validate;

/// JSON body extractor that reports every missing or invalid field as a 422.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = PaymentsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = match Json::<Value>::from_request(req, state).await {
            Ok(v) => v,
            Err(rejection) => {
                return Err(PaymentsError::Validation(vec![FieldError {
                    loc: vec!["body".to_string()],
                    msg: rejection.body_text(),
                    kind: "json_invalid".to_string(),
                }]));
            }
        };
        decode(value).map(ValidatedJson)
    }
}

/// Check required keys and JSON types, deserialize, then run the type's field rules.
pub fn decode<T>(value: Value) -> Result<T, PaymentsError>
where
    T: DeserializeOwned + Validate,
{
    let Some(object) = value.as_object() else {
        return Err(PaymentsError::Validation(vec![FieldError {
            loc: vec!["body".to_string()],
            msg: "Input should be a valid dictionary or object to extract fields from".to_string(),
            kind: "model_attributes_type".to_string(),
        }]));
    };

    let missing: Vec<FieldError> = T::REQUIRED_FIELDS
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| FieldError::body(field, "missing", "Field required"))
        .collect();
    if !missing.is_empty() {
        return Err(PaymentsError::Validation(missing));
    }

    let mistyped = T::type_errors(object);
    if !mistyped.is_empty() {
        return Err(PaymentsError::Validation(mistyped));
    }

    let parsed: T = serde_json::from_value(value).map_err(|e| {
        PaymentsError::Validation(vec![FieldError {
            loc: vec!["body".to_string()],
            msg: e.to_string(),
            kind: "type_error".to_string(),
        }])
    })?;

    let errors = parsed.validate();
    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(PaymentsError::Validation(errors))
    }
}
