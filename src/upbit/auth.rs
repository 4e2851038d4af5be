// =============================================================================
// Upbit request authentication — HS256 JWT with SHA-512 query hash
// =============================================================================
//
// Every private endpoint expects `Authorization: Bearer <jwt>` where the JWT
// payload carries:
//   access_key      — the API access key
//   nonce           — a fresh UUID per request
//   query_hash      — hex SHA-512 of the *unescaped* query string (only when
//                     the request has parameters)
//   query_hash_alg  — "SHA512"
//
// The token is signed with HMAC-SHA256 keyed by the secret key.
//
// SECURITY: the secret key never leaves this module and is never logged.
// =============================================================================

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::config::ExchangeKeys;

type HmacSha256 = Hmac<Sha256>;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    access_key: &'a str,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// Build the url-encoded query string for `params`, preserving order.
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `k=v&k=v` without percent-encoding; this is the form Upbit hashes.
pub fn raw_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex SHA-512 of `query`.
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha512::digest(query.as_bytes()))
}

/// Produce a signed JWT for a request whose unescaped query string is `query`
/// (empty for parameterless requests).
pub fn sign_token(keys: &ExchangeKeys, query: &str) -> String {
    sign_token_with_nonce(keys, query, Uuid::new_v4().to_string())
}

fn sign_token_with_nonce(keys: &ExchangeKeys, query: &str, nonce: String) -> String {
    let claims = if query.is_empty() {
        Claims {
            access_key: &keys.access_key,
            nonce,
            query_hash: None,
            query_hash_alg: None,
        }
    } else {
        Claims {
            access_key: &keys.access_key,
            nonce,
            query_hash: Some(query_hash(query)),
            query_hash_alg: Some("SHA512"),
        }
    };

    let payload = serde_json::to_vec(&claims).expect("JWT claims are plain strings");

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWT_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let mut mac = HmacSha256::new_from_slice(keys.secret_key.as_bytes())
        .expect("HMAC accepts any key size");
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{signing_input}.{signature}")
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
