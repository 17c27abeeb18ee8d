pub mod chat_service;
pub mod place_service;
pub mod report_service;
pub mod ride_service;

pub use chat_service::ChatService;
pub use place_service::PlaceService;
pub use report_service::ReportService;
pub use ride_service::RideService;
