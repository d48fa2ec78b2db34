//! GraphQL response envelope decoding

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
}

/// Standard `{ data, errors }` envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

impl GraphQlResponse {
    /// `data` when the response carries no errors
    pub fn into_data(self) -> Result<Value, ApiError> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            return Err(ApiError::Query {
                messages: errors.into_iter().map(|e| e.message).collect(),
            });
        }

        match self.data {
            Some(Value::Null) | None => Err(ApiError::Parse(
                "response contains neither data nor errors".to_string(),
            )),
            Some(data) => Ok(data),
        }
    }
}

/// Decode a raw response body into its `data` member
pub fn parse_graphql_response(body: &[u8]) -> Result<Value, ApiError> {
    let response: GraphQlResponse = serde_json::from_slice(body)?;
    response.into_data()
}
