use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use doctor_cell::models::{DoctorError, SlotStatus};
use doctor_cell::services::{DoctorService, ScheduleService};
use patient_cell::services::PatientDirectoryService;

use crate::models::{
    format_time_string, Appointment, AppointmentError, AppointmentListQuery,
    AppointmentMetadata, AppointmentStatus, CreateAppointmentRequest,
    UpdateAppointmentRequest,
};

const APPOINTMENT_SELECT: &str = "select=*,doctor:doctors(*),patient:patients(*)";

/// Books, lists, reschedules and cancels appointments, keeping the doctor's
/// schedule slots in step with appointment status.
pub struct AppointmentAllocatorService {
    supabase: SupabaseClient,
    directory: PatientDirectoryService,
    doctors: DoctorService,
    schedule: ScheduleService,
}

impl AppointmentAllocatorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            directory: PatientDirectoryService::new(config),
            doctors: DoctorService::new(config),
            schedule: ScheduleService::new(config),
        }
    }

    pub async fn book(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.patient_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "patientName must not be empty".to_string(),
            ));
        }

        let time = format_time_string(&request.time);
        info!("Booking appointment with doctor {} on {} at {}",
              request.doctor_id, request.appointment_date, time);

        // Doctor must exist before anything is created
        self.doctors.get_doctor(request.doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        self.ensure_slot_free(request.doctor_id, request.appointment_date, &time, None, auth_token)
            .await?;

        let patient = self.directory
            .find_or_create_by_name(&request.patient_name, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let metadata = AppointmentMetadata {
            notes: request.notes,
            reason: request.reason,
            cancellation_reason: None,
        };
        let appointment_data = json!({
            "doctor_id": request.doctor_id,
            "patient_id": patient.id,
            "appointment_date": request.appointment_date,
            "time": time,
            "status": AppointmentStatus::Booked,
            "metadata": if metadata.is_empty() { Value::Null } else { json!(metadata) },
            "created_at": Utc::now().to_rfc3339()
        });

        let appointment = self.insert_appointment(appointment_data, auth_token).await?;

        match self.schedule
            .mark_slot_booked(request.doctor_id, &time, appointment.id, auth_token)
            .await
        {
            Ok(true) => debug!("Schedule slot marked booked for appointment {}", appointment.id),
            Ok(false) => debug!("No published slot at {}; booking stands without one", time),
            // The slot flip is a separate write; the appointment row already
            // exists, so surface the inconsistency loudly.
            Err(e) => error!("Failed to mark slot booked for appointment {}: {}", appointment.id, e),
        }

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Filtered listing, newest date first, mornings before afternoons
    /// within a date.
    pub async fn get_appointments(
        &self,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments with filters: {:?}", query);

        let mut path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.desc,time.asc",
            APPOINTMENT_SELECT
        );
        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    pub async fn get_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&{}", id, APPOINTMENT_SELECT);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Move a BOOKED appointment to a new date/time and/or amend its notes.
    /// The new slot goes through the same conflict checks as booking; the
    /// old slot is released.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", id);

        let current = self.get_appointment(id, auth_token).await?;
        if current.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let new_date = request.appointment_date.unwrap_or(current.appointment_date);
        let new_time = request.time.as_deref().map(format_time_string)
            .unwrap_or_else(|| current.time.clone());
        let moving = new_date != current.appointment_date || new_time != current.time;

        if moving {
            self.ensure_slot_free(current.doctor_id, new_date, &new_time, Some(id), auth_token)
                .await?;
        }

        let mut metadata = current.metadata.clone().unwrap_or_default();
        if let Some(notes) = request.notes {
            metadata.notes = Some(notes);
        }
        if let Some(reason) = request.reason {
            metadata.reason = Some(reason);
        }

        let update = json!({
            "appointment_date": new_date,
            "time": new_time,
            "metadata": if metadata.is_empty() { Value::Null } else { json!(metadata) },
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated = self.patch_appointment(id, update, auth_token).await?;

        if moving {
            if let Err(e) = self.schedule.release_slot(current.doctor_id, id, auth_token).await {
                error!("Failed to release old slot for appointment {}: {}", id, e);
            }
            match self.schedule
                .mark_slot_booked(current.doctor_id, &new_time, id, auth_token)
                .await
            {
                Ok(_) => {}
                Err(e) => error!("Failed to book new slot for appointment {}: {}", id, e),
            }
            info!("Appointment {} rescheduled to {} {}", id, new_date, new_time);
        }

        Ok(updated)
    }

    /// Cancel an appointment, releasing its schedule slot. Cancelling twice
    /// is a no-op that returns the already-cancelled appointment.
    pub async fn cancel(
        &self,
        id: Uuid,
        cancellation_reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", id);

        let current = self.get_appointment(id, auth_token).await?;
        if current.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} is already cancelled", id);
            return Ok(current);
        }

        let mut metadata = current.metadata.clone().unwrap_or_default();
        metadata.cancellation_reason = cancellation_reason;

        let update = json!({
            "status": AppointmentStatus::Cancelled,
            "metadata": if metadata.is_empty() { Value::Null } else { json!(metadata) },
            "updated_at": Utc::now().to_rfc3339()
        });

        let cancelled = self.patch_appointment(id, update, auth_token).await?;

        if let Err(e) = self.schedule.release_slot(current.doctor_id, id, auth_token).await {
            error!("Failed to release slot for cancelled appointment {}: {}", id, e);
        }

        info!("Appointment {} cancelled", id);
        Ok(cancelled)
    }

    pub async fn list_all(&self, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        self.get_appointments(AppointmentListQuery {
            doctor_id: None,
            patient_id: None,
            status: None,
        }, auth_token).await
    }

    pub async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.get_appointments(AppointmentListQuery {
            doctor_id: Some(doctor_id),
            patient_id: None,
            status: None,
        }, auth_token).await
    }

    pub async fn list_by_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.get_appointments(AppointmentListQuery {
            doctor_id: None,
            patient_id: Some(patient_id),
            status: None,
        }, auth_token).await
    }

    /// Reject the booking when the doctor already has a BOOKED appointment
    /// at that date/time, or when the published slot is booked or blocked.
    async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&time=eq.{}&status=eq.BOOKED",
            doctor_id, date, urlencoding::encode(time)
        );
        if let Some(exclude_id) = exclude {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(AppointmentError::SlotTaken { date, time: time.to_string() });
        }

        match self.schedule.slot_status(doctor_id, time, auth_token).await {
            Ok(Some(SlotStatus::Blocked)) => {
                Err(AppointmentError::SlotBlocked { time: time.to_string() })
            }
            Ok(Some(SlotStatus::Booked)) => {
                Err(AppointmentError::SlotTaken { date, time: time.to_string() })
            }
            Ok(_) => Ok(()),
            Err(e) => Err(AppointmentError::DatabaseError(e.to_string())),
        }
    }

    async fn insert_appointment(
        &self,
        appointment_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}", APPOINTMENT_SELECT);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(appointment_data),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let created = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn patch_appointment(
        &self,
        id: Uuid,
        update: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&{}", id, APPOINTMENT_SELECT);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let updated = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to update appointment".to_string()))?;

        serde_json::from_value(updated)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}
