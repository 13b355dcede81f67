use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorError, ScheduleBlock, SlotStatus, TimeSlot};

/// Keeps slot status in step with appointment status. Slot arrays live in a
/// jsonb column and are rewritten whole, so mutation happens here in Rust.
pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn blocks_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduleBlock>, DoctorError> {
        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ScheduleBlock>, _>>()
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }

    /// Status of the slot covering `time`, if any block publishes one.
    pub async fn slot_status(
        &self,
        doctor_id: Uuid,
        time: &str,
        auth_token: &str,
    ) -> Result<Option<SlotStatus>, DoctorError> {
        let blocks = self.blocks_for_doctor(doctor_id, auth_token).await?;
        Ok(blocks.iter()
            .flat_map(|block| block.slots.iter())
            .find(|slot| slot.time == time)
            .map(|slot| slot.status))
    }

    /// Flip the slot covering `time` to booked, back-referencing the
    /// appointment. Returns false when no block publishes that slot (the
    /// booking still stands; slot lists are advisory).
    pub async fn mark_slot_booked(
        &self,
        doctor_id: Uuid,
        time: &str,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, DoctorError> {
        debug!("Marking slot {} booked for doctor {}", time, doctor_id);

        let mut blocks = self.blocks_for_doctor(doctor_id, auth_token).await?;
        for block in &mut blocks {
            match book_slot(&mut block.slots, time, appointment_id) {
                SlotUpdate::NotPresent => continue,
                SlotUpdate::Unavailable => {
                    return Err(DoctorError::SlotUnavailable { time: time.to_string() });
                }
                SlotUpdate::Changed => {
                    self.write_slots(block, auth_token).await?;
                    info!("Slot {} booked on block {} (appointment {})",
                          time, block.id, appointment_id);
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Release whichever slot references the appointment. No-op when the
    /// booking was made outside published blocks.
    pub async fn release_slot(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, DoctorError> {
        debug!("Releasing slot for appointment {} (doctor {})", appointment_id, doctor_id);

        let mut blocks = self.blocks_for_doctor(doctor_id, auth_token).await?;
        for block in &mut blocks {
            if release_slot_in(&mut block.slots, appointment_id) {
                self.write_slots(block, auth_token).await?;
                info!("Slot released on block {} (appointment {})", block.id, appointment_id);
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn write_slots(
        &self,
        block: &ScheduleBlock,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", block.id);
        let update = json!({
            "slots": block.slots,
            "updated_at": Utc::now().to_rfc3339()
        });

        // PostgREST returns an empty body for a plain PATCH; ask for the
        // representation so the response parses.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update),
            Some(headers),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

pub enum SlotUpdate {
    /// No slot with that time in this list.
    NotPresent,
    /// Slot exists but is booked or blocked.
    Unavailable,
    /// Slot flipped to booked.
    Changed,
}

pub fn book_slot(slots: &mut [TimeSlot], time: &str, appointment_id: Uuid) -> SlotUpdate {
    match slots.iter_mut().find(|slot| slot.time == time) {
        None => SlotUpdate::NotPresent,
        Some(slot) if slot.status != SlotStatus::Available => SlotUpdate::Unavailable,
        Some(slot) => {
            slot.status = SlotStatus::Booked;
            slot.appointment_id = Some(appointment_id);
            SlotUpdate::Changed
        }
    }
}

pub fn release_slot_in(slots: &mut [TimeSlot], appointment_id: Uuid) -> bool {
    match slots.iter_mut().find(|slot| slot.appointment_id == Some(appointment_id)) {
        Some(slot) => {
            slot.status = SlotStatus::Available;
            slot.appointment_id = None;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> Vec<TimeSlot> {
        vec![
            TimeSlot { time: "09:00:00".into(), status: SlotStatus::Available, appointment_id: None },
            TimeSlot { time: "09:30:00".into(), status: SlotStatus::Blocked, appointment_id: None },
            TimeSlot { time: "10:00:00".into(), status: SlotStatus::Available, appointment_id: None },
        ]
    }

    #[test]
    fn booking_an_available_slot_sets_backreference() {
        let mut slots = slots();
        let appointment = Uuid::new_v4();

        assert!(matches!(book_slot(&mut slots, "09:00:00", appointment), SlotUpdate::Changed));
        assert_eq!(slots[0].status, SlotStatus::Booked);
        assert_eq!(slots[0].appointment_id, Some(appointment));
    }

    #[test]
    fn booking_a_blocked_slot_is_refused() {
        let mut slots = slots();
        assert!(matches!(
            book_slot(&mut slots, "09:30:00", Uuid::new_v4()),
            SlotUpdate::Unavailable
        ));
        assert_eq!(slots[1].status, SlotStatus::Blocked);
    }

    #[test]
    fn booking_twice_is_refused() {
        let mut slots = slots();
        let first = Uuid::new_v4();
        assert!(matches!(book_slot(&mut slots, "10:00:00", first), SlotUpdate::Changed));
        assert!(matches!(
            book_slot(&mut slots, "10:00:00", Uuid::new_v4()),
            SlotUpdate::Unavailable
        ));
        assert_eq!(slots[2].appointment_id, Some(first));
    }

    #[test]
    fn unknown_time_reports_not_present() {
        let mut slots = slots();
        assert!(matches!(
            book_slot(&mut slots, "23:00:00", Uuid::new_v4()),
            SlotUpdate::NotPresent
        ));
    }

    #[test]
    fn release_restores_availability() {
        let mut slots = slots();
        let appointment = Uuid::new_v4();
        book_slot(&mut slots, "09:00:00", appointment);

        assert!(release_slot_in(&mut slots, appointment));
        assert_eq!(slots[0].status, SlotStatus::Available);
        assert_eq!(slots[0].appointment_id, None);

        // Second release finds nothing to do
        assert!(!release_slot_in(&mut slots, appointment));
    }
}
