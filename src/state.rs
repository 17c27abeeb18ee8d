use std::sync::Arc;

use crate::config::Config;
use crate::identity::IdentityStore;
use crate::store::Store;
use crate::sync::Publisher;

/// Shared application state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub identity: IdentityStore,
    pub publisher: Publisher,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let store = Store::new();
        Self {
            config,
            identity: IdentityStore::new(),
            publisher: Publisher::new(store.clone()),
            store,
        }
    }
}
