//! Proptest strategies shared by the property-based tests

use companion_core::error::ApiError;
use proptest::prelude::*;

/// Cache-key parameter names as they might arrive from UI state
pub fn param_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["level", "faction", "edition", "gameMode", "trader", "map"])
        .prop_map(str::to_string)
}

pub fn param_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,12}"
}

/// Distinct-name parameter lists
pub fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map(param_name_strategy(), param_value_strategy(), 0..6)
        .prop_map(|map| map.into_iter().collect())
}

pub fn http_status_strategy() -> impl Strategy<Value = u16> {
    100u16..600
}

/// Any error the executor can produce
pub fn api_error_strategy() -> impl Strategy<Value = ApiError> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(ApiError::network),
        (http_status_strategy(), "[a-z ]{0,20}")
            .prop_map(|(status, message)| ApiError::http_status(status, message)),
        prop::collection::vec("[a-z ]{1,20}", 1..3).prop_map(|messages| ApiError::Query { messages }),
        "[a-z ]{0,20}".prop_map(ApiError::Parse),
        (1u64..10_000).prop_map(|ms| ApiError::timeout(
            "graphql_request",
            std::time::Duration::from_millis(ms)
        )),
    ]
}

/// (hit_count, stored_at offset in seconds) per cache entry
pub fn entry_usage_strategy() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((0u64..20, 0u64..600), 2..30)
}
