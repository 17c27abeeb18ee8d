//! Error report surface. Anyone signed in can file a report; reviewing and
//! resolving them is an admin operation, and resolution stamps the admin's
//! stable id into `updated_by`.

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::identity::IdentityStore;
use crate::models::{ErrorReport, ReportCategory, ReportSeverity, UserId};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct FileReportRequest {
    pub message: String,
    pub severity: ReportSeverity,
    pub category: ReportCategory,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub platform: String,
}

pub struct ReportService;

impl ReportService {
    pub fn file_report(store: &Store, req: FileReportRequest) -> AppResult<ErrorReport> {
        if req.message.trim().is_empty() {
            return Err(AppError::BadRequest("report message is empty".to_string()));
        }

        let mut report = ErrorReport::new(req.message.trim(), req.severity, req.category);
        report.route = req.route;
        report.component = req.component;
        report.platform = req.platform;
        store.reports.insert(report.clone())?;
        tracing::info!(report_id = %report.id, severity = %report.severity, "error report filed");
        Ok(report)
    }

    pub fn resolve_report(
        store: &Store,
        identity: &IdentityStore,
        report_id: &str,
        caller: &UserId,
    ) -> AppResult<ErrorReport> {
        if !identity.is_admin(caller) {
            return Err(AppError::Unauthorized);
        }

        let admin = caller.clone();
        store.reports.update(report_id, move |report| {
            if report.resolved {
                return Err(AppError::InvalidState("report already resolved".to_string()));
            }
            report.resolved = true;
            report.updated_by = Some(admin);
            Ok(())
        })
    }

    /// Unresolved first, newest within each group; admin only.
    pub fn list_reports(
        store: &Store,
        identity: &IdentityStore,
        caller: &UserId,
    ) -> AppResult<Vec<ErrorReport>> {
        if !identity.is_admin(caller) {
            return Err(AppError::Unauthorized);
        }
        let mut reports = store.reports.snapshot_filtered(|_| true);
        reports.sort_by(|a, b| {
            a.resolved
                .cmp(&b.resolved)
                .then(b.timestamp.cmp(&a.timestamp))
        });
        Ok(reports)
    }
}
