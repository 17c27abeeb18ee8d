use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::identity::IdentityStore;
use crate::models::{Place, UserId};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaceRequest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub struct PlaceService;

impl PlaceService {
    pub fn create_place(
        store: &Store,
        identity: &IdentityStore,
        owner: UserId,
        req: CreatePlaceRequest,
    ) -> AppResult<Place> {
        if !identity.user_exists(&owner) {
            return Err(AppError::NotFound("user"));
        }
        if req.name.trim().is_empty() {
            return Err(AppError::BadRequest("place name is empty".to_string()));
        }
        if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
            return Err(AppError::BadRequest(
                "coordinates out of range".to_string(),
            ));
        }

        let place = Place::new(req.name.trim(), (req.latitude, req.longitude), Some(owner));
        store.places.insert(place.clone())?;
        Ok(place)
    }

    pub fn get_place(store: &Store, place_id: &str) -> AppResult<Place> {
        store.places.get(place_id).ok_or(AppError::NotFound("place"))
    }
}
