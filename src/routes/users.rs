/// User endpoints
///
/// User records are managed by the identity store; the display-name lookup
/// is the only identity read the rendering surfaces need.
use actix_web::{get, post, put, web, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::Caller;
use crate::models::{User, UserId, ROLE_ADMIN};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameUserRequest {
    pub username: String,
}

/// Seed a user record. Open while the store is empty (bootstrap), admin-only
/// afterwards.
///
/// **Endpoint**: `POST /users`
#[post("/users")]
pub async fn create_user(
    state: web::Data<AppState>,
    caller: Caller,
    request: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AppError> {
    if !state.identity.is_empty() && !state.identity.is_admin(&caller.0) {
        return Err(AppError::Unauthorized);
    }

    let request = request.into_inner();
    let mut user = User::new(request.id, request.username);
    if request.admin {
        user = user.with_role(ROLE_ADMIN);
    }
    state.identity.create_user(user.clone())?;
    Ok(HttpResponse::Created().json(user))
}

/// **Endpoint**: `GET /users/:id/display-name`
#[get("/users/{user_id}/display-name")]
pub async fn display_name(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = UserId::from(user_id.into_inner());
    let display_name = state.identity.display_name_or_unknown(&id);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id,
        "display_name": display_name,
    })))
}

/// Change a username. Self or admin; membership data is untouched because it
/// references the stable id.
///
/// **Endpoint**: `PUT /users/:id/username`
#[put("/users/{user_id}/username")]
pub async fn rename_user(
    state: web::Data<AppState>,
    caller: Caller,
    user_id: web::Path<String>,
    request: web::Json<RenameUserRequest>,
) -> Result<HttpResponse, AppError> {
    let target = UserId::from(user_id.into_inner());
    if caller.0 != target && !state.identity.is_admin(&caller.0) {
        return Err(AppError::Unauthorized);
    }
    state
        .identity
        .rename_user(&target, request.into_inner().username)?;
    let user = state.identity.get(&target).ok_or(AppError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(user))
}
