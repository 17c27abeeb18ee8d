//! Caller identity extractors.
//!
//! Every operation takes the caller's stable id explicitly; these extractors
//! read it from the `x-user-id` header and hand it to the route as a typed
//! parameter, so no handler reads ambient session state.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};

use crate::error::AppError;
use crate::models::UserId;

const USER_ID_HEADER: &str = "x-user-id";

fn header_user_id(req: &HttpRequest) -> Option<UserId> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(UserId::from)
}

/// A signed-in caller. Rejects the request with `Unauthorized` when the
/// identity header is missing.
#[derive(Debug, Clone)]
pub struct Caller(pub UserId);

impl FromRequest for Caller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            header_user_id(req)
                .map(Caller)
                .ok_or_else(|| AppError::Unauthorized.into()),
        )
    }
}

/// An optional caller. Anonymous requests resolve to `None`; the publication
/// layer turns that into an empty stream rather than an error.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<UserId>);

impl FromRequest for MaybeCaller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeCaller(header_user_id(req))))
    }
}
