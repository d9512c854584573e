//! Authentication strategies and the chain that orders them.
//!
//! Each strategy inspects the request for its own credential family and
//! returns:
//! - `None`: the credential family is absent, consult the next strategy
//! - `Some(Ok(principal))`: resolved, chain short-circuits
//! - `Some(Err(e))`: the credential is present but rejected or the identity
//!   store failed; the chain aborts rather than falling through to a weaker
//!   strategy
//!
//! The chain re-resolves on every request. Nothing is cached.

use axum::http::{HeaderMap, header};
use base64::Engine;
use tracing::{debug, instrument, trace};

use crate::auth::principal::Principal;
use crate::config::{AuthConfig, BasicAuthConfig, BearerTokenAuthConfig, ClientCertAuthConfig, StrategyKind, TrustedHeaderAuthConfig};
use crate::errors::{Error, Result};
use crate::identity::IdentityAdapter;

/// Extract a principal from trusted identity headers if present.
/// Returns:
/// - None: No trusted user header present
/// - Some(Ok(principal)): Header present; full access, or scoped roles when
///   the lookup-permissions header is affirmative
/// - Some(Err(error)): Header vouched for a user the identity store does not
///   know, or the lookup itself failed
#[instrument(skip(headers, config, identity))]
pub async fn try_trusted_header_auth(
    headers: &HeaderMap,
    config: &TrustedHeaderAuthConfig,
    identity: &dyn IdentityAdapter,
) -> Option<Result<Principal>> {
    let username = headers.get(&config.user_header).and_then(|h| h.to_str().ok())?;

    let lookup = headers
        .get(&config.lookup_header)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    if !lookup {
        debug!("Trusted header principal without role lookup: {username}");
        return Some(Ok(Principal::Trusted {
            username: username.to_string(),
        }));
    }

    match identity.find_by_login(username).await {
        Ok(Some(record)) => Some(Ok(Principal::scoped(&record))),
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some(format!("user {username} not found")),
        })),
        Err(e) => Some(Err(e.into())),
    }
}

/// Extract a principal from HTTP Basic credentials if present.
/// Returns:
/// - None: No Basic authorization header, or the credentials were rejected
///   (a later strategy may still resolve the caller)
/// - Some(Ok(principal)): Credentials validated, roles loaded
/// - Some(Err(error)): Header present but not decodable as user:pass, or the
///   identity store failed
#[instrument(skip(headers, _config, identity))]
pub async fn try_basic_auth(
    headers: &HeaderMap,
    _config: &BasicAuthConfig,
    identity: &dyn IdentityAdapter,
) -> Option<Result<Principal>> {
    let auth_value = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok())?;
    let encoded = auth_value.strip_prefix("Basic ")?;

    let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(_) => {
            return Some(Err(Error::BadRequest {
                message: "Basic authorization header is not valid base64".to_string(),
            }));
        }
    };
    let decoded = match String::from_utf8(decoded) {
        Ok(s) => s,
        Err(_) => {
            return Some(Err(Error::BadRequest {
                message: "Basic authorization header is not valid UTF-8".to_string(),
            }));
        }
    };
    let Some((username, password)) = decoded.split_once(':') else {
        return Some(Err(Error::BadRequest {
            message: "Basic authorization header is missing a ':' separator".to_string(),
        }));
    };

    match identity.validate_user(username, password).await {
        Ok(true) => {}
        Ok(false) => {
            trace!("Basic credentials rejected for {username}");
            return None;
        }
        Err(e) => return Some(Err(e.into())),
    }

    match identity.find_by_login(username).await {
        Ok(Some(record)) => Some(Ok(Principal::scoped(&record))),
        // Validated a moment ago but gone now; treat as rejected credentials.
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some(format!("user {username} not found")),
        })),
        Err(e) => Some(Err(e.into())),
    }
}

/// Extract a principal from the TLS client certificate common name forwarded
/// by the terminator.
/// Returns:
/// - None: No CN header, or the CN does not match a known user
/// - Some(Ok(principal)): CN matched a user, roles loaded
/// - Some(Err(error)): CN header present but empty, or the identity store
///   failed
#[instrument(skip(headers, config, identity))]
pub async fn try_client_cert_auth(
    headers: &HeaderMap,
    config: &ClientCertAuthConfig,
    identity: &dyn IdentityAdapter,
) -> Option<Result<Principal>> {
    let common_name = headers.get(&config.common_name_header).and_then(|h| h.to_str().ok())?;

    if common_name.is_empty() {
        return Some(Err(Error::BadRequest {
            message: format!("{} header must not be empty", config.common_name_header),
        }));
    }

    match identity.find_by_login(common_name).await {
        Ok(Some(record)) => Some(Ok(Principal::scoped(&record))),
        Ok(None) => {
            trace!("Client certificate CN {common_name} does not match a user");
            None
        }
        Err(e) => Some(Err(e.into())),
    }
}

/// Extract a principal from a bearer access token if present.
/// Returns:
/// - None: No Bearer authorization header
/// - Some(Ok(principal)): Token resolved to a user
/// - Some(Err(error)): Token presented but unknown, or the identity store
///   failed. A failed token is decisive; the chain does not continue.
#[instrument(skip(headers, _config, identity))]
pub async fn try_bearer_token_auth(
    headers: &HeaderMap,
    _config: &BearerTokenAuthConfig,
    identity: &dyn IdentityAdapter,
) -> Option<Result<Principal>> {
    let auth_value = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok())?;
    let token = auth_value.strip_prefix("Bearer ")?;

    match identity.find_by_token(token).await {
        Ok(Some(record)) => Some(Ok(Principal::scoped(&record))),
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some("invalid access token".to_string()),
        })),
        Err(e) => Some(Err(e.into())),
    }
}

/// Run the configured strategies in order against one request.
///
/// Returns `Ok(Some(principal))` on the first strategy that resolves,
/// `Ok(None)` when no strategy was applicable, and `Err` as soon as any
/// strategy rejects a presented credential.
pub async fn authenticate(headers: &HeaderMap, config: &AuthConfig, identity: &dyn IdentityAdapter) -> Result<Option<Principal>> {
    for kind in &config.strategy_order {
        let attempt = match kind {
            StrategyKind::TrustedHeader if config.trusted_header.enabled => {
                try_trusted_header_auth(headers, &config.trusted_header, identity).await
            }
            StrategyKind::ClientCert if config.client_cert.enabled => {
                try_client_cert_auth(headers, &config.client_cert, identity).await
            }
            StrategyKind::BearerToken if config.bearer_token.enabled => {
                try_bearer_token_auth(headers, &config.bearer_token, identity).await
            }
            StrategyKind::Basic if config.basic.enabled => try_basic_auth(headers, &config.basic, identity).await,
            _ => None,
        };

        match attempt {
            Some(Ok(principal)) => {
                debug!("Authenticated {} via {kind:?}", principal.username());
                return Ok(Some(principal));
            }
            Some(Err(e)) => {
                trace!("{kind:?} authentication failed: {e:?}");
                return Err(e);
            }
            None => continue,
        }
    }

    trace!("No authentication credentials found in request");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;
    use crate::test_utils::MemoryIdentityAdapter;
    use axum::http::HeaderValue;

    fn auth_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.trusted_header.enabled = true;
        config.client_cert.enabled = true;
        config
    }

    fn adapter() -> MemoryIdentityAdapter {
        let adapter = MemoryIdentityAdapter::new();
        adapter.add_user("alice", "hunter2", vec![Role::OwnerAdmin]);
        adapter.add_token("tok-alice", "alice");
        adapter
    }

    fn basic(username: &str, password: &str) -> HeaderValue {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
    }

    #[tokio::test]
    async fn test_no_credentials_resolves_nothing() {
        let result = authenticate(&HeaderMap::new(), &auth_config(), &adapter()).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_trusted_header_without_lookup_is_full_access() {
        let adapter = adapter();
        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("system"));

        let principal = authenticate(&headers, &auth_config(), &adapter).await.unwrap().unwrap();
        assert!(principal.has_full_access());
        assert_eq!(principal.username(), "system");
        // Trust is taken at face value, the identity store is never consulted.
        assert_eq!(adapter.find_by_login_calls(), 0);
        assert_eq!(adapter.validate_user_calls(), 0);
    }

    #[tokio::test]
    async fn test_trusted_header_with_lookup_loads_roles_once() {
        let adapter = adapter();
        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("alice"));
        headers.insert("cp-lookup-permissions", HeaderValue::from_static("true"));

        let principal = authenticate(&headers, &auth_config(), &adapter).await.unwrap().unwrap();
        assert!(!principal.has_full_access());
        assert!(principal.has_role(Role::OwnerAdmin));
        assert_eq!(adapter.find_by_login_calls(), 1);
        assert_eq!(adapter.validate_user_calls(), 0);
    }

    #[tokio::test]
    async fn test_trusted_header_lookup_unknown_user_fails() {
        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("ghost"));
        headers.insert("cp-lookup-permissions", HeaderValue::from_static("TRUE"));

        let err = authenticate(&headers, &auth_config(), &adapter()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_basic_auth_validates_then_loads() {
        let adapter = adapter();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, basic("alice", "hunter2"));

        let principal = authenticate(&headers, &auth_config(), &adapter).await.unwrap().unwrap();
        assert_eq!(principal.username(), "alice");
        assert_eq!(adapter.validate_user_calls(), 1);
        assert_eq!(adapter.find_by_login_calls(), 1);
    }

    #[tokio::test]
    async fn test_basic_auth_wrong_password_is_not_decisive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, basic("alice", "wrong"));

        let result = authenticate(&headers, &auth_config(), &adapter()).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_basic_auth_malformed_base64_aborts() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic not!base64!"));

        let err = authenticate(&headers, &auth_config(), &adapter()).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_basic_auth_missing_separator_aborts() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("no-colon-here");
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Basic {encoded}")).unwrap());

        let err = authenticate(&headers, &auth_config(), &adapter()).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_client_cert_resolves_known_cn() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ssl-client-cn", HeaderValue::from_static("alice"));

        let principal = authenticate(&headers, &auth_config(), &adapter()).await.unwrap().unwrap();
        assert_eq!(principal.username(), "alice");
    }

    #[tokio::test]
    async fn test_client_cert_unknown_cn_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ssl-client-cn", HeaderValue::from_static("nobody"));

        let result = authenticate(&headers, &auth_config(), &adapter()).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_bearer_token_resolves() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-alice"));

        let principal = authenticate(&headers, &auth_config(), &adapter()).await.unwrap().unwrap();
        assert_eq!(principal.username(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_bearer_token_aborts_chain() {
        // Bearer is ordered before basic, and a bad token is decisive, so a
        // request carrying a bad token never reaches another strategy.
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer bogus"));

        let err = authenticate(&headers, &auth_config(), &adapter()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_first_resolving_strategy_wins() {
        // Trusted header is ordered first; a request that also carries a
        // bearer token must resolve via the trusted header without touching
        // the token path.
        let adapter = adapter();
        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("system"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer bogus"));

        let principal = authenticate(&headers, &auth_config(), &adapter).await.unwrap().unwrap();
        assert!(principal.has_full_access());
        assert_eq!(adapter.find_by_token_calls(), 0);
    }

    #[tokio::test]
    async fn test_strategy_order_is_configurable() {
        // Reverse the order: bearer before trusted header. The bogus token
        // now aborts even though the trusted header would have resolved.
        let mut config = auth_config();
        config.strategy_order = vec![StrategyKind::BearerToken, StrategyKind::TrustedHeader];

        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("system"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer bogus"));

        let err = authenticate(&headers, &config, &adapter()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_disabled_strategy_is_skipped() {
        let mut config = auth_config();
        config.trusted_header.enabled = false;

        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("system"));

        let result = authenticate(&headers, &config, &adapter()).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_identity_failure_is_a_lookup_error() {
        let adapter = adapter();
        adapter.fail_lookups();

        let mut headers = HeaderMap::new();
        headers.insert("cp-user", HeaderValue::from_static("alice"));
        headers.insert("cp-lookup-permissions", HeaderValue::from_static("true"));

        let err = authenticate(&headers, &auth_config(), &adapter).await.unwrap_err();
        assert!(matches!(err, Error::IdentityLookup(_)));
    }
}
