use actix_web::web;

pub mod chats;
pub mod places;
pub mod reports;
pub mod rides;
pub mod users;
pub mod wsroute;

/// Register every route; shared between the server and the route tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(rides::create_ride)
        .service(rides::my_rides)
        .service(rides::get_ride)
        .service(rides::join_ride)
        .service(rides::leave_ride)
        .service(rides::remove_ride)
        .service(rides::remove_rider)
        .service(chats::create_chat)
        .service(chats::my_chats)
        .service(chats::get_chat)
        .service(chats::send_message)
        .service(chats::delete_message)
        .service(places::create_place)
        .service(places::get_place)
        .service(reports::file_report)
        .service(reports::list_reports)
        .service(reports::resolve_report)
        .service(users::create_user)
        .service(users::display_name)
        .service(users::rename_user)
        .service(wsroute::ws_handler)
        .route("/health", web::get().to(|| async { "OK" }));
}
