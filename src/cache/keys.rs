//! Deterministic cache keys
//!
//! A key is `"{namespace}:{digest}"` where the digest is the first 16 hex
//! characters of a SHA-256 over the normalized parameters. Parameter order,
//! surrounding whitespace and letter case do not change the key.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const DIGEST_HEX_LEN: usize = 16;

/// Build the cache key for `namespace` and its query parameters
pub fn cache_key<I, K, V>(namespace: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let normalized: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (normalize(k.as_ref()), normalize(v.as_ref())))
        .filter(|(k, _)| !k.is_empty())
        .collect();

    if normalized.is_empty() {
        return format!("{namespace}:default");
    }

    let canonical = normalized
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{namespace}:{}", &digest[..DIGEST_HEX_LEN])
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}
