/// Place endpoints
use actix_web::{get, post, web, HttpResponse};

use crate::error::AppError;
use crate::middleware::Caller;
use crate::services::place_service::{CreatePlaceRequest, PlaceService};
use crate::state::AppState;

/// **Endpoint**: `POST /places`
#[post("/places")]
pub async fn create_place(
    state: web::Data<AppState>,
    caller: Caller,
    request: web::Json<CreatePlaceRequest>,
) -> Result<HttpResponse, AppError> {
    let place =
        PlaceService::create_place(&state.store, &state.identity, caller.0, request.into_inner())?;
    Ok(HttpResponse::Created().json(place))
}

/// **Endpoint**: `GET /places/:id`
#[get("/places/{place_id}")]
pub async fn get_place(
    state: web::Data<AppState>,
    _caller: Caller,
    place_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let place = PlaceService::get_place(&state.store, &place_id)?;
    Ok(HttpResponse::Ok().json(place))
}
