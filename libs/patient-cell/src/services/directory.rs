use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{NewPatient, Patient, PatientError};

/// Lookup-or-create directory over the patients table. Matching is exact:
/// the queue matches on phone number, appointments match on name.
pub struct PatientDirectoryService {
    supabase: SupabaseClient,
}

impl PatientDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_by_phone(
        &self,
        phone_number: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>, PatientError> {
        debug!("Looking up patient by phone number");

        let path = format!(
            "/rest/v1/patients?phone_number=eq.{}&limit=1",
            urlencoding::encode(phone_number)
        );
        self.fetch_first(&path, auth_token).await
    }

    pub async fn find_by_name(
        &self,
        name: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>, PatientError> {
        debug!("Looking up patient by name: {}", name);

        let path = format!(
            "/rest/v1/patients?name=eq.{}&limit=1",
            urlencoding::encode(name)
        );
        self.fetch_first(&path, auth_token).await
    }

    pub async fn get_patient(
        &self,
        patient_id: &uuid::Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_first(&path, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn create(
        &self,
        new_patient: NewPatient,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        info!("Creating patient record for: {}", new_patient.name);

        let patient_data = json!({
            "name": new_patient.name,
            "age": new_patient.age,
            "gender": new_patient.gender,
            "phone_number": new_patient.phone_number,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(headers),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let created = result.into_iter().next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient".to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    /// Appointment booking matches patients by name and creates a bare
    /// record on miss, as the front desk often has nothing but a name.
    pub async fn find_or_create_by_name(
        &self,
        name: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        if let Some(patient) = self.find_by_name(name, auth_token).await? {
            return Ok(patient);
        }

        self.create(NewPatient::named(name), auth_token).await
    }

    async fn fetch_first(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>, PatientError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e))),
            None => Ok(None),
        }
    }
}
