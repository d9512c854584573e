//! The per-request pipeline: authenticate, authorize, parse paging, invoke.
//!
//! Runs as an axum middleware over every routed operation, in fixed order:
//!
//! 1. Authentication chain resolves `Option<Principal>`
//! 2. The operation's `RoleRequirement` is looked up in the registry
//! 3. The authorization gate allows or denies; a denial never reaches step 4
//! 4. The pagination contract is parsed into `Option<PageRequest>`
//! 5. Both values are attached to the request's extensions and the handler
//!    runs
//!
//! Extensions are request-scoped, so concurrent requests cannot observe each
//! other's principal or page context.

use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::trace;

use crate::AppState;
use crate::api::models::pagination::{PageRequest, parse_page_request};
use crate::auth::principal::Principal;
use crate::auth::{chain, gate};
use crate::errors::{Error, Result};

#[derive(Clone)]
struct PrincipalContext(Option<Principal>);

#[derive(Clone)]
struct PageContext(Option<PageRequest>);

/// Authenticate, authorize and parse the paging contract for one request.
///
/// Must be attached with `route_layer` so that `MatchedPath` carries the
/// route template the requirement registry is keyed by.
pub async fn pipeline_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let principal = chain::authenticate(request.headers(), &state.config.auth, state.identity.as_ref()).await?;

    // The registry is keyed by route template, not concrete URI, so
    // /owners/acme resolves the requirement registered for /owners/{key}.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let requirement = state.registry.requirement(request.method(), &route);
    gate::authorize(principal.as_ref(), requirement, &route)?;

    let page = parse_page_request(request.uri().query(), &state.config.paging)?;
    trace!("Pipeline admitted {route}: principal={principal:?} page={page:?}");

    request.extensions_mut().insert(PrincipalContext(principal));
    request.extensions_mut().insert(PageContext(page));
    Ok(next.run(request).await)
}

/// Extractor for the authenticated principal. Rejects with 401 when the
/// request is anonymous; use [`MaybePrincipal`] on operations that accept
/// anonymous callers.
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let context = parts.extensions.get::<PrincipalContext>().ok_or_else(|| Error::Internal {
            operation: "read principal context: handler is not behind the request pipeline".to_string(),
        })?;
        match &context.0 {
            Some(principal) => Ok(CurrentPrincipal(principal.clone())),
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}

/// Extractor for the principal on operations that accept anonymous callers.
pub struct MaybePrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let context = parts.extensions.get::<PrincipalContext>().ok_or_else(|| Error::Internal {
            operation: "read principal context: handler is not behind the request pipeline".to_string(),
        })?;
        Ok(MaybePrincipal(context.0.clone()))
    }
}

/// Extractor for the parsed paging contract. `None` means the request had no
/// paging or sorting parameters: return everything, unordered.
pub struct Page(pub Option<PageRequest>);

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let context = parts.extensions.get::<PageContext>().ok_or_else(|| Error::Internal {
            operation: "read page context: handler is not behind the request pipeline".to_string(),
        })?;
        Ok(Page(context.0.clone()))
    }
}
