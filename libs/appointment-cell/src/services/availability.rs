// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    parse_date, Appointment, AppointmentError, AvailabilityQuery, AvailabilityResponse,
    ConflictReason, SlotCheck, TimeSlot,
};
use crate::services::clock::Clock;
use crate::services::repository::AppointmentRepository;

/// Read-only answers to "can this dentist / cabinet be booked at this slot".
pub struct AvailabilityService {
    repository: Arc<dyn AppointmentRepository>,
    clock: Arc<dyn Clock>,
    cabinets: Vec<String>,
}

impl AvailabilityService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        clock: Arc<dyn Clock>,
        cabinets: Vec<String>,
    ) -> Self {
        Self {
            repository,
            clock,
            cabinets,
        }
    }

    pub fn has_cabinet(&self, cabinet: &str) -> bool {
        self.cabinets.iter().any(|c| c == cabinet)
    }

    /// A slot starting at or before the current clinic time is past.
    pub fn is_past(&self, date: NaiveDate, time_slot: TimeSlot) -> bool {
        time_slot.on(date) <= self.clock.now()
    }

    pub async fn check_slot(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        time_slot: TimeSlot,
        cabinet: Option<&str>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<SlotCheck, AppointmentError> {
        debug!(
            "Checking slot {} {} for dentist {} (cabinet {:?}, excluding {:?})",
            date, time_slot, dentist_id, cabinet, exclude_appointment_id
        );

        if let Some(cabinet) = cabinet {
            if !self.has_cabinet(cabinet) {
                return Err(AppointmentError::NotFound(format!("Cabinet '{}'", cabinet)));
            }
        }

        if self.is_past(date, time_slot) {
            return Ok(SlotCheck::blocked(ConflictReason::Past));
        }

        let booked = self.booked_on(date, exclude_appointment_id).await?;
        let check = evaluate_slot(&booked, dentist_id, time_slot, cabinet);

        if let Some(reason) = check.reason {
            debug!("Slot {} {} unavailable: {}", date, time_slot, reason);
        }
        Ok(check)
    }

    /// Open slots for a dentist on `date`, in chronological order.
    pub async fn list_available_slots(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        let booked = self.booked_on(date, exclude_appointment_id).await?;

        Ok(TimeSlot::all()
            .filter(|slot| !self.is_past(date, *slot))
            .filter(|slot| evaluate_slot(&booked, dentist_id, *slot, None).available)
            .collect())
    }

    /// Configured cabinets free at `date` / `time_slot`, in configuration order.
    pub async fn list_available_cabinets(
        &self,
        date: NaiveDate,
        time_slot: TimeSlot,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<String>, AppointmentError> {
        if self.is_past(date, time_slot) {
            return Ok(Vec::new());
        }

        let booked = self.booked_on(date, exclude_appointment_id).await?;

        Ok(self
            .cabinets
            .iter()
            .filter(|cabinet| {
                !booked
                    .iter()
                    .any(|a| a.time_slot == time_slot && &a.cabinet == *cabinet)
            })
            .cloned()
            .collect())
    }

    /// Combined answer for the availability endpoint.
    pub async fn availability(&self, query: AvailabilityQuery) -> Result<AvailabilityResponse, AppointmentError> {
        let date = parse_date(&query.date)?;
        let time_slot = query.time_slot.as_deref().map(TimeSlot::parse).transpose()?;

        let available_slots = self
            .list_available_slots(query.dentist_id, date, query.exclude_appointment_id)
            .await?;

        let Some(time_slot) = time_slot else {
            return Ok(AvailabilityResponse {
                is_available: None,
                reason: None,
                available_slots,
                available_cabinets: None,
            });
        };

        let check = self
            .check_slot(
                query.dentist_id,
                date,
                time_slot,
                query.cabinet.as_deref(),
                query.exclude_appointment_id,
            )
            .await?;
        let available_cabinets = self
            .list_available_cabinets(date, time_slot, query.exclude_appointment_id)
            .await?;

        Ok(AvailabilityResponse {
            is_available: Some(check.available),
            reason: check.reason,
            available_slots,
            available_cabinets: Some(available_cabinets),
        })
    }

    async fn booked_on(
        &self,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut booked = self.repository.active_on(date).await.map_err(|e| {
            warn!("Availability lookup failed for {}: {}", date, e);
            AppointmentError::from(e)
        })?;

        booked.retain(|a| a.is_active() && Some(a.id) != exclude_appointment_id);
        Ok(booked)
    }
}

/// Decides a slot against the active appointments of one day. The dentist is checked before the cabinet.
pub fn evaluate_slot(
    booked: &[Appointment],
    dentist_id: Uuid,
    time_slot: TimeSlot,
    cabinet: Option<&str>,
) -> SlotCheck {
    let in_slot: Vec<&Appointment> = booked
        .iter()
        .filter(|a| a.is_active() && a.time_slot == time_slot)
        .collect();

    if in_slot.iter().any(|a| a.dentist_id == dentist_id) {
        return SlotCheck::blocked(ConflictReason::DentistBusy);
    }

    if let Some(cabinet) = cabinet {
        if in_slot.iter().any(|a| a.cabinet == cabinet) {
            return SlotCheck::blocked(ConflictReason::CabinetBusy);
        }
    }

    SlotCheck::available()
}
