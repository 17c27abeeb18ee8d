pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod membership;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
