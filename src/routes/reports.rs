/// Error report endpoints
///
/// Filing is open to any signed-in user; listing and resolving are admin
/// operations.
use actix_web::{get, post, web, HttpResponse};

use crate::error::AppError;
use crate::middleware::Caller;
use crate::services::report_service::{FileReportRequest, ReportService};
use crate::state::AppState;

/// **Endpoint**: `POST /reports`
#[post("/reports")]
pub async fn file_report(
    state: web::Data<AppState>,
    _caller: Caller,
    request: web::Json<FileReportRequest>,
) -> Result<HttpResponse, AppError> {
    let report = ReportService::file_report(&state.store, request.into_inner())?;
    Ok(HttpResponse::Created().json(report))
}

/// **Endpoint**: `GET /reports`
#[get("/reports")]
pub async fn list_reports(
    state: web::Data<AppState>,
    caller: Caller,
) -> Result<HttpResponse, AppError> {
    let reports = ReportService::list_reports(&state.store, &state.identity, &caller.0)?;
    Ok(HttpResponse::Ok().json(reports))
}

/// **Endpoint**: `POST /reports/:id/resolve`
#[post("/reports/{report_id}/resolve")]
pub async fn resolve_report(
    state: web::Data<AppState>,
    caller: Caller,
    report_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let report = ReportService::resolve_report(&state.store, &state.identity, &report_id, &caller.0)?;
    Ok(HttpResponse::Ok().json(report))
}
