use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use patient_cell::models::{Gender, Patient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    #[serde(rename = "WAITING")]
    Waiting,
    // Stored with a space, matching the dashboard's wire value
    #[serde(rename = "WITH DOCTOR")]
    WithDoctor,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Waiting => write!(f, "WAITING"),
            QueueStatus::WithDoctor => write!(f, "WITH DOCTOR"),
            QueueStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueuePriority {
    Normal,
    Urgent,
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePriority::Normal => write!(f, "NORMAL"),
            QueuePriority::Urgent => write!(f, "URGENT"),
        }
    }
}

/// A walk-in patient's position in the day's service line. Queue numbers
/// come from a database sequence and are never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub queue_number: i64,
    pub status: QueueStatus,
    pub priority: QueuePriority,
    pub arrived_at: DateTime<Utc>,
    pub patient: Patient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<Doctor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub patient_name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub mobile_number: String,
    pub priority: Option<QueuePriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQueueRequest {
    pub status: Option<QueueStatus>,
    pub priority: Option<QueuePriority>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueListQuery {
    pub status: Option<QueueStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum QueueError {
    #[error("Queue entry not found")]
    NotFound,

    #[error("Queue status cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Priority can only change while the patient is waiting")]
    PriorityLocked,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
