//! Authorization extractor.
//!
//! `Authorized<P>` resolves the bearer credential and runs the access gate
//! for policy `P`. Handlers take it before any path, query or body extractor,
//! so a denied request never parses input or touches the ledger.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use service_core::error::AppError;
use std::marker::PhantomData;

use crate::models::Principal;
use crate::services::access::{authorize, RoleSet, ADMIN_ONLY, TENANT_OR_ADMIN};
use crate::AppState;

/// A named role set usable as an extractor parameter.
pub trait Policy: Send + Sync + 'static {
    const ROLES: RoleSet;
}

#[derive(Debug)]
pub struct AdminOnly;

impl Policy for AdminOnly {
    const ROLES: RoleSet = ADMIN_ONLY;
}

#[derive(Debug)]
pub struct TenantOrAdmin;

impl Policy for TenantOrAdmin {
    const ROLES: RoleSet = TENANT_OR_ADMIN;
}

/// Principal that passed the role check for `P`.
#[derive(Debug)]
pub struct Authorized<P: Policy> {
    pub principal: Principal,
    _policy: PhantomData<P>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<P: Policy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = bearer_token(parts).and_then(|token| state.principals.resolve(token).ok());

        let principal = authorize(principal.as_ref(), P::ROLES)?.clone();

        tracing::Span::current().record("principal_id", principal.id.as_str());

        Ok(Self {
            principal,
            _policy: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/payments/pending");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn scheme_is_case_insensitive() {
        for header in ["Bearer abc", "bearer abc", "BEARER  abc "] {
            assert_eq!(bearer_token(&parts_with(Some(header))), Some("abc"), "{}", header);
        }
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_ignored() {
        assert_eq!(bearer_token(&parts_with(None)), None);
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearerabc"))), None);
    }
}
