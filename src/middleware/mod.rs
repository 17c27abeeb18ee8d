pub mod auth;
pub mod request_id;

pub use auth::{Caller, MaybeCaller};
pub use request_id::RequestId;
