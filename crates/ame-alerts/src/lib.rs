//! ---
//! ems_section: "02-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Alert records raised against configuration paths."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Alert records as exchanged over the alerting API.
//!
//! Field names on the wire are kebab-case (`alert-id`, `raised-at`, ...) in both
//! JSON and YAML. Nothing in the collectors produces or consumes these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("unknown alert severity '{0}'")]
    UnknownSeverity(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The severity of an alert.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl AlertSeverity {
    pub fn parse(value: &str) -> Result<Self, AlertError> {
        value
            .parse()
            .map_err(|_| AlertError::UnknownSeverity(value.to_owned()))
    }
}

/// A single alert raised against a configuration path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Alert {
    /// Auto-generated UUID identifying the alert.
    pub alert_id: String,
    pub configpath: String,
    /// Description of the error condition being represented.
    pub message: String,
    pub severity: AlertSeverity,
    pub raised_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

/// The alerts for one configuration path. Order carries no meaning.
pub type AetherAlerts = Vec<Alert>;

impl Alert {
    /// New active alert with a fresh v4 id, raised now.
    pub fn raise(
        configpath: impl Into<String>,
        message: impl Into<String>,
        severity: AlertSeverity,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            configpath: configpath.into(),
            message: message.into(),
            severity,
            raised_at: Utc::now(),
            cleared_at: None,
        }
    }

    /// Mark the alert cleared. An already cleared alert keeps its first clear time.
    pub fn clear(&mut self, at: DateTime<Utc>) {
        if self.cleared_at.is_none() {
            self.cleared_at = Some(at);
        }
    }

    pub fn is_active(&self) -> bool {
        self.cleared_at.is_none()
    }
}

pub fn alerts_from_json(raw: &str) -> Result<AetherAlerts, AlertError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn alerts_to_json(alerts: &[Alert]) -> Result<String, AlertError> {
    Ok(serde_json::to_string_pretty(alerts)?)
}

pub fn alerts_from_yaml(raw: &str) -> Result<AetherAlerts, AlertError> {
    Ok(serde_yaml::from_str(raw)?)
}

pub fn alerts_to_yaml(alerts: &[Alert]) -> Result<String, AlertError> {
    Ok(serde_yaml::to_string(alerts)?)
}
