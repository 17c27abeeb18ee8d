use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{UserId, SCHEMA_STABLE_IDS};
use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSeverity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Fatal = 3,
}

impl ReportSeverity {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ReportSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db())
    }
}

impl std::str::FromStr for ReportSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db(s).ok_or_else(|| format!("Invalid severity: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Crash,
    Network,
    Data,
    Ui,
    Other,
}

impl ReportCategory {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "crash" => Some(Self::Crash),
            "network" => Some(Self::Network),
            "data" => Some(Self::Data),
            "ui" => Some(Self::Ui),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Network => "network",
            Self::Data => "data",
            Self::Ui => "ui",
            Self::Other => "other",
        }
    }
}

/// Client error report reviewed by admins. `updated_by` is an identity field
/// holding the stable id of the admin who last resolved or edited it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: String,
    pub schema_version: u32,
    pub message: String,
    pub severity: ReportSeverity,
    pub category: ReportCategory,
    pub resolved: bool,
    pub updated_by: Option<UserId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub platform: String,
}

impl ErrorReport {
    pub fn new(
        message: impl Into<String>,
        severity: ReportSeverity,
        category: ReportCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SCHEMA_STABLE_IDS,
            message: message.into(),
            severity,
            category,
            resolved: false,
            updated_by: None,
            timestamp: Utc::now(),
            route: String::new(),
            component: String::new(),
            platform: String::new(),
        }
    }
}

impl Document for ErrorReport {
    const COLLECTION: &'static str = "error_reports";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
