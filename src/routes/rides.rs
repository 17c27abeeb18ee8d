/// Ride endpoints
///
/// Mutations delegate to `RideService`; reads render driver names through
/// the identity store rather than exposing raw identity fields as names.
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::identity::IdentityStore;
use crate::membership::is_ride_member;
use crate::middleware::Caller;
use crate::models::{Ride, UserId};
use crate::services::ride_service::{CreateRideRequest, RideService};
use crate::state::AppState;

/// A ride as rendered to clients: identity fields stay stable ids, the
/// driver's display name is resolved on the side.
#[derive(Debug, Serialize)]
pub struct RideView {
    pub id: String,
    pub driver: UserId,
    pub driver_name: String,
    pub riders: Vec<UserId>,
    pub origin: String,
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
    pub seats_available: u32,
    pub notes: String,
}

impl RideView {
    pub fn render(ride: Ride, identity: &IdentityStore) -> Self {
        let driver_name = identity.display_name_or_unknown(&ride.driver);
        Self {
            id: ride.id,
            driver: ride.driver,
            driver_name,
            riders: ride.riders,
            origin: ride.origin,
            destination: ride.destination,
            scheduled_at: ride.scheduled_at,
            seats_available: ride.seats_available,
            notes: ride.notes,
        }
    }
}

/// **Endpoint**: `POST /rides`
#[post("/rides")]
pub async fn create_ride(
    state: web::Data<AppState>,
    caller: Caller,
    request: web::Json<CreateRideRequest>,
) -> Result<HttpResponse, AppError> {
    let ride = RideService::create_ride(&state.store, &state.identity, caller.0, request.into_inner())?;
    Ok(HttpResponse::Created().json(RideView::render(ride, &state.identity)))
}

/// Rides the caller drives or rides (one-shot; `/ws?intent=rides` is the
/// live variant).
///
/// **Endpoint**: `GET /rides`
#[get("/rides")]
pub async fn my_rides(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    let rides: Vec<RideView> = RideService::my_rides(&state.store, &caller.0)
        .into_iter()
        .map(|ride| RideView::render(ride, &state.identity))
        .collect();
    Ok(HttpResponse::Ok().json(rides))
}

/// **Endpoint**: `GET /rides/:id`
#[get("/rides/{ride_id}")]
pub async fn get_ride(
    state: web::Data<AppState>,
    caller: Caller,
    ride_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ride = state
        .store
        .rides
        .get(&ride_id)
        .ok_or(AppError::NotFound("ride"))?;
    if !is_ride_member(&ride, &caller.0) && !state.identity.is_admin(&caller.0) {
        return Err(AppError::Unauthorized);
    }
    Ok(HttpResponse::Ok().json(RideView::render(ride, &state.identity)))
}

/// **Endpoint**: `POST /rides/:id/join`
#[post("/rides/{ride_id}/join")]
pub async fn join_ride(
    state: web::Data<AppState>,
    caller: Caller,
    ride_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ride = RideService::join_ride(&state.store, &state.identity, &ride_id, caller.0)?;
    Ok(HttpResponse::Ok().json(RideView::render(ride, &state.identity)))
}

/// **Endpoint**: `POST /rides/:id/leave`
#[post("/rides/{ride_id}/leave")]
pub async fn leave_ride(
    state: web::Data<AppState>,
    caller: Caller,
    ride_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ride = RideService::leave_ride(&state.store, &ride_id, caller.0)?;
    Ok(HttpResponse::Ok().json(RideView::render(ride, &state.identity)))
}

/// **Endpoint**: `DELETE /rides/:id`
#[delete("/rides/{ride_id}")]
pub async fn remove_ride(
    state: web::Data<AppState>,
    caller: Caller,
    ride_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    RideService::remove_ride(&state.store, &state.identity, &ride_id, &caller.0)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "removed" })))
}

/// **Endpoint**: `DELETE /rides/:id/riders/:user_id`
#[delete("/rides/{ride_id}/riders/{user_id}")]
pub async fn remove_rider(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (ride_id, target) = path.into_inner();
    let ride = RideService::remove_rider(
        &state.store,
        &state.identity,
        &ride_id,
        &UserId::from(target),
        &caller.0,
    )?;
    Ok(HttpResponse::Ok().json(RideView::render(ride, &state.identity)))
}
