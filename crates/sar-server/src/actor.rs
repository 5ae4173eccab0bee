use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sar_types::Actor;

/// Header carrying the opaque caller identity.
pub const ACTOR_HEADER: &str = "x-actor";

/// The actor issuing a request, read from `x-actor`. A missing or
/// non-UTF-8 header is the system actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Ok(Self(Actor::parse(raw)))
    }
}
