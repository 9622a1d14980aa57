//! Domain types shared by every pipeline stage

use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

/// A roster member.
///
/// `email` is the natural key: every lookup and conditional write addresses a
/// member by exact match on it, and it never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub notified: bool,
}

impl Member {
    /// Create a freshly ingested member: no metrics yet, not notified.
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
            weight: None,
            height: None,
            notified: false,
        }
    }

    pub fn with_metrics(mut self, weight: Option<f64>, height: Option<f64>) -> Self {
        self.weight = weight;
        self.height = height;
        self
    }
}

/// Partial update pushed by an external client for one member's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub email: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl MetricUpdate {
    /// Check that the update addresses a member and carries something to write.
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(RosterError::InvalidUpdate(
                "email is required and cannot be empty".to_string(),
            ));
        }
        if self.weight.is_none() && self.height.is_none() {
            return Err(RosterError::InvalidUpdate(
                "at least one of weight or height must be provided".to_string(),
            ));
        }
        for (field, value) in [("weight", self.weight), ("height", self.height)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(RosterError::InvalidUpdate(format!("{} must be a finite number", field)));
            }
        }
        Ok(())
    }
}

/// Work item fanned out to the notifier, one per stored member.
///
/// On the wire the task is the bare member key so that any producer able to
/// publish a plain address can feed the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTask {
    pub email: String,
}

impl NotificationTask {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn to_body(&self) -> String {
        self.email.clone()
    }

    pub fn from_body(body: &str) -> Result<Self> {
        let email = body.trim();
        if email.is_empty() {
            return Err(RosterError::InvalidUpdate(
                "notification task carries an empty member key".to_string(),
            ));
        }
        Ok(Self::new(email))
    }
}
