//! Access token extraction.
//!
//! Clients present their access key in one of three places, checked in
//! order:
//!
//! 1. the `auth` query parameter;
//! 2. the `apikey` query parameter;
//! 3. an `Authorization: Bearer <key>` header.
//!
//! The token is only extracted here. Resolving it to an identity is the
//! request processor's job.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::convert::Infallible;

/// Query parameters that may carry the token.
pub const TOKEN_PARAMS: [&str; 2] = ["auth", "apikey"];

const BEARER_PREFIX: &str = "Bearer ";

/// The access token of a request, if one was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthToken(pub Option<String>);

impl AuthToken {
    /// Returns the token as a string slice.
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Consumes the extractor, returning the token.
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        Ok(Self(extract_token(&query, &parts.headers)))
    }
}

/// Finds the token in decoded query parameters or the headers.
pub fn extract_token(query: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    TOKEN_PARAMS
        .iter()
        .filter_map(|name| query.get(*name))
        .find(|token| !token.is_empty())
        .cloned()
        .or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn auth_param_wins() {
        let q = query(&[("auth", "a"), ("apikey", "b")]);
        assert_eq!(extract_token(&q, &bearer("c")), Some("a".into()));
    }

    #[test]
    fn apikey_param() {
        let q = query(&[("apikey", "b")]);
        assert_eq!(extract_token(&q, &HeaderMap::new()), Some("b".into()));
    }

    #[test]
    fn bearer_header() {
        assert_eq!(
            extract_token(&HashMap::new(), &bearer("c")),
            Some("c".into())
        );
    }

    #[test]
    fn empty_param_falls_through() {
        let q = query(&[("auth", "")]);
        assert_eq!(extract_token(&q, &bearer("c")), Some("c".into()));
    }

    #[test]
    fn no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&HashMap::new(), &headers), None);
    }

    #[tokio::test]
    async fn extractor_decodes_query() {
        let request = axum::http::Request::builder()
            .uri("/io/app/a.json?auth=key%20one")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        let token = AuthToken::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(token.as_deref(), Some("key one"));
    }
}
