use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use patient_cell::models::Patient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "BOOKED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl AppointmentMetadata {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.reason.is_none() && self.cancellation_reason.is_none()
    }
}

/// A booking against a doctor/date/time. Soft-deleted: cancellation flips
/// the status, the row stays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub appointment_date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub metadata: Option<AppointmentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<Doctor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_name: String,
    pub appointment_date: NaiveDate,
    /// Accepts "11.30", "11:30" or "11:30:00"; normalised before storage.
    pub time: String,
    pub notes: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<NaiveDate>,
    pub time: Option<String>,
    pub notes: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentRequest {
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor already has a booking at {time} on {date}")]
    SlotTaken { date: NaiveDate, time: String },

    #[error("Slot {time} is blocked on the doctor's schedule")]
    SlotBlocked { time: String },

    #[error("A cancelled appointment cannot be rescheduled")]
    AlreadyCancelled,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Normalise the dashboard's time spellings ("11.30", "9:15") to the
/// zero-padded "HH:MM:SS" form the time column stores. Padding matters:
/// slot lookups are text matches and listings sort `time.asc` as text.
pub fn format_time_string(time: &str) -> String {
    let time = time.replace('.', ":");
    let mut parts = time.splitn(3, ':');
    let hour = parts.next().unwrap_or("0");
    let minute = parts.next().unwrap_or("00");
    let second = parts.next().unwrap_or("00");
    format!("{:0>2}:{:0>2}:{:0>2}", hour, minute, second)
}
