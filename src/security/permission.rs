//! Authorization checks.
//!
//! Endpoints declare an ordered list of permissions; the first denial stops
//! the request with a 403.

use async_trait::async_trait;
use axum::http::Method;

use crate::http::RequestContext;

/// One authorization check against a request.
#[async_trait]
pub trait Permission: Send + Sync {
    async fn check(&self, ctx: &RequestContext) -> bool;
}

/// Allows only authenticated requests.
pub struct AuthenticatedOnly;

#[async_trait]
impl Permission for AuthenticatedOnly {
    async fn check(&self, ctx: &RequestContext) -> bool {
        ctx.user().is_some()
    }
}

/// Allows authenticated requests, and GETs from anyone.
pub struct AuthenticatedOrReadOnly;

#[async_trait]
impl Permission for AuthenticatedOrReadOnly {
    async fn check(&self, ctx: &RequestContext) -> bool {
        ctx.user().is_some() || ctx.method() == Method::GET
    }
}

/// Allows only identities flagged as admin.
pub struct AdminOnly;

#[async_trait]
impl Permission for AdminOnly {
    async fn check(&self, ctx: &RequestContext) -> bool {
        ctx.user().map(|user| user.is_admin).unwrap_or(false)
    }
}
