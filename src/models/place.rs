use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{UserId, SCHEMA_STABLE_IDS};
use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub schema_version: u32,
    pub name: String,
    /// (latitude, longitude)
    pub location: (f64, f64),
    pub owner: Option<UserId>,
}

impl Place {
    pub fn new(name: impl Into<String>, location: (f64, f64), owner: Option<UserId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SCHEMA_STABLE_IDS,
            name: name.into(),
            location,
            owner,
        }
    }
}

impl Document for Place {
    const COLLECTION: &'static str = "places";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
