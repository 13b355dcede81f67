use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CheckInRequest, QueueEntry, QueueError, QueuePriority, QueueStatus,
    UpdateQueueRequest,
};

const ENTRY_SELECT: &str = "select=*,patient:patients(*),doctor:doctors(*)";

pub struct QueueSequencerService {
    supabase: SupabaseClient,
}

impl QueueSequencerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Check a walk-in patient into the queue. The whole operation runs in
    /// the `check_in_patient` database function: patient lookup-or-create by
    /// phone number, queue number drawn from a sequence, WAITING entry
    /// inserted. One transaction, so concurrent check-ins cannot collide on
    /// a number.
    pub async fn check_in(
        &self,
        request: CheckInRequest,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        if request.patient_name.trim().is_empty() {
            return Err(QueueError::ValidationError("patientName must not be empty".to_string()));
        }
        if request.mobile_number.trim().is_empty() {
            return Err(QueueError::ValidationError("mobileNumber must not be empty".to_string()));
        }

        info!("Checking in patient: {}", request.patient_name);

        let priority = request.priority.unwrap_or(QueuePriority::Normal);
        let args = json!({
            "p_name": request.patient_name,
            "p_age": request.age,
            "p_gender": request.gender,
            "p_phone": request.mobile_number,
            "p_priority": priority
        });

        let entry: Value = self.supabase
            .rpc("check_in_patient", Some(auth_token), args)
            .await
            .map_err(|e| QueueError::DatabaseError(e.to_string()))?;

        let entry: QueueEntry = serde_json::from_value(entry)
            .map_err(|e| QueueError::DatabaseError(format!("Failed to parse queue entry: {}", e)))?;

        info!("Patient checked in with queue number {}", entry.queue_number);
        Ok(entry)
    }

    /// Queue in service order: URGENT before NORMAL, FIFO within a tier.
    pub async fn get_queue(
        &self,
        status: Option<QueueStatus>,
        auth_token: &str,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        debug!("Fetching queue with status filter: {:?}", status);

        let mut path = format!(
            "/rest/v1/queue_entries?{}&order=priority.desc,arrived_at.asc",
            ENTRY_SELECT
        );
        if let Some(status) = status {
            path.push_str(&format!(
                "&status=eq.{}",
                urlencoding::encode(&status.to_string())
            ));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| QueueError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<QueueEntry>, _>>()
            .map_err(|e| QueueError::DatabaseError(format!("Failed to parse queue: {}", e)))
    }

    pub async fn get_entry(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        let path = format!("/rest/v1/queue_entries?id=eq.{}&{}", id, ENTRY_SELECT);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| QueueError::DatabaseError(e.to_string()))?;

        let entry = result.into_iter().next().ok_or(QueueError::NotFound)?;
        serde_json::from_value(entry)
            .map_err(|e| QueueError::DatabaseError(format!("Failed to parse queue entry: {}", e)))
    }

    /// Apply a status and/or priority change. Transitions are checked
    /// explicitly; the free-form merge of the old system is gone.
    pub async fn update_entry(
        &self,
        id: Uuid,
        request: UpdateQueueRequest,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        debug!("Updating queue entry {}", id);

        let current = self.get_entry(id, auth_token).await?;
        validate_update(current.status, &request)?;

        let mut update = serde_json::Map::new();
        if let Some(status) = request.status {
            update.insert("status".to_string(), json!(status));
        }
        if let Some(priority) = request.priority {
            update.insert("priority".to_string(), json!(priority));
        }
        if update.is_empty() {
            return Ok(current);
        }

        let path = format!("/rest/v1/queue_entries?id=eq.{}&{}", id, ENTRY_SELECT);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
            Some(headers),
        ).await.map_err(|e| QueueError::DatabaseError(e.to_string()))?;

        let updated = result.into_iter().next()
            .ok_or_else(|| QueueError::DatabaseError("Failed to update queue entry".to_string()))?;

        serde_json::from_value(updated)
            .map_err(|e| QueueError::DatabaseError(format!("Failed to parse queue entry: {}", e)))
    }

    pub async fn remove(&self, id: Uuid, auth_token: &str) -> Result<(), QueueError> {
        info!("Removing queue entry {}", id);

        let path = format!("/rest/v1/queue_entries?id=eq.{}", id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(headers),
        ).await.map_err(|e| QueueError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(QueueError::NotFound);
        }

        Ok(())
    }
}

/// Status moves forward only (WAITING -> WITH DOCTOR -> COMPLETED, repeats
/// allowed as no-ops); priority is frozen once the patient leaves WAITING.
pub fn validate_update(
    current: QueueStatus,
    request: &UpdateQueueRequest,
) -> Result<(), QueueError> {
    if let Some(next) = request.status {
        let allowed = next == current
            || matches!(
                (current, next),
                (QueueStatus::Waiting, QueueStatus::WithDoctor)
                    | (QueueStatus::WithDoctor, QueueStatus::Completed)
            );
        if !allowed {
            return Err(QueueError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
    }

    if request.priority.is_some() && current != QueueStatus::Waiting {
        return Err(QueueError::PriorityLocked);
    }

    Ok(())
}
