// libs/appointment-cell/src/services/writer.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Permission, PermissionSet};

use crate::models::{
    parse_date, Appointment, AppointmentError, AppointmentFilter, AppointmentStatus,
    AppointmentType, CreateAppointmentRequest, TimeSlot, UpdateAppointmentRequest, SLOT_MINUTES,
};
use crate::services::availability::AvailabilityService;
use crate::services::clock::{Clock, SystemClock};
use crate::services::repository::{AppointmentRepository, SupabaseAppointmentRepository};

/// Validated create / update / delete of appointments.
///
/// Every write that moves an appointment runs a fresh availability check
/// first; the repository's uniqueness constraint backs that check up when two
/// requests race for the same slot.
pub struct AppointmentWriter {
    repository: Arc<dyn AppointmentRepository>,
    availability: AvailabilityService,
}

impl AppointmentWriter {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        clock: Arc<dyn Clock>,
        cabinets: Vec<String>,
    ) -> Self {
        let availability = AvailabilityService::new(Arc::clone(&repository), clock, cabinets);
        Self {
            repository,
            availability,
        }
    }

    /// Supabase-backed writer acting with the caller's token.
    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        Self::new(
            Arc::new(SupabaseAppointmentRepository::new(config, auth_token)),
            Arc::new(SystemClock::with_offset_minutes(config.clinic_utc_offset_minutes)),
            config.cabinets.clone(),
        )
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        permissions: &PermissionSet,
    ) -> Result<Appointment, AppointmentError> {
        require(permissions, Permission::BookAppointments)?;

        let missing: Vec<&str> = [
            ("patient_id", request.patient_id.is_none()),
            ("dentist_id", request.dentist_id.is_none()),
            ("date", is_blank(&request.date)),
            ("time_slot", is_blank(&request.time_slot)),
            ("cabinet", is_blank(&request.cabinet)),
            ("appointment_type", is_blank(&request.appointment_type)),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();
        let missing_fields = || {
            AppointmentError::Validation(format!("Missing required fields: {}", missing.join(", ")))
        };

        let (
            Some(patient_id),
            Some(dentist_id),
            Some(date),
            Some(time_slot),
            Some(cabinet),
            Some(appointment_type),
        ) = (
            request.patient_id,
            request.dentist_id,
            request.date.as_deref(),
            request.time_slot.as_deref(),
            request.cabinet.as_deref(),
            request.appointment_type.as_deref(),
        )
        else {
            return Err(missing_fields());
        };
        // Present but blank strings.
        if !missing.is_empty() {
            return Err(missing_fields());
        }

        let date = parse_date(date)?;
        let time_slot = TimeSlot::parse(time_slot)?;
        let appointment_type: AppointmentType = appointment_type.parse()?;
        let cabinet = self.known_cabinet(cabinet)?;

        info!(
            "Booking appointment for patient {} with dentist {} on {} at {} in {}",
            patient_id, dentist_id, date, time_slot, cabinet
        );

        self.ensure_dentist_exists(dentist_id).await?;
        self.ensure_slot_free(dentist_id, date, time_slot, &cabinet, None).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            dentist_id,
            date,
            time_slot,
            duration_minutes: SLOT_MINUTES,
            cabinet,
            appointment_type,
            status: AppointmentStatus::Scheduled,
            notes: clean_notes(request.notes),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.insert(appointment).await.map_err(|e| {
            warn!("Insert rejected for dentist {} on {} at {}: {}", dentist_id, date, time_slot, e);
            AppointmentError::from(e)
        })?;

        info!("Appointment {} booked", created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: UpdateAppointmentRequest,
        permissions: &PermissionSet,
    ) -> Result<Appointment, AppointmentError> {
        require(permissions, Permission::ViewAppointments)?;

        let current = self
            .repository
            .find(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", id)))?;

        let updated = self.apply_changes(&current, changes)?;

        let moves_slot = updated.dentist_id != current.dentist_id
            || updated.date != current.date
            || updated.time_slot != current.time_slot
            || updated.cabinet != current.cabinet;
        let edits_details = updated.patient_id != current.patient_id
            || updated.appointment_type != current.appointment_type
            || updated.notes != current.notes;

        if moves_slot || edits_details {
            require(permissions, Permission::RescheduleAppointments)?;
        }
        if updated.status != current.status {
            let allowed = permissions.contains(Permission::ChangeAppointmentStatus)
                || (updated.status == AppointmentStatus::Cancelled
                    && permissions.contains(Permission::CancelAppointments));
            if !allowed {
                return Err(AppointmentError::Forbidden(Permission::ChangeAppointmentStatus));
            }
        }

        if !moves_slot && !edits_details && updated.status == current.status {
            debug!("Update of appointment {} changes nothing", id);
            return Ok(current);
        }

        if moves_slot {
            if updated.dentist_id != current.dentist_id {
                self.ensure_dentist_exists(updated.dentist_id).await?;
            }
            if updated.is_active() {
                self.ensure_slot_free(
                    updated.dentist_id,
                    updated.date,
                    updated.time_slot,
                    &updated.cabinet,
                    Some(id),
                )
                .await?;
            }
        }

        if updated.status != current.status {
            info!("Appointment {} status {} -> {}", id, current.status, updated.status);
        }

        let saved = self
            .repository
            .update(updated)
            .await
            .map_err(|e| {
                warn!("Update of appointment {} rejected: {}", id, e);
                AppointmentError::from(e)
            })?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", id)))?;

        info!("Appointment {} updated", id);
        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid, permissions: &PermissionSet) -> Result<(), AppointmentError> {
        require(permissions, Permission::DeleteAppointments)?;

        if !self.repository.delete(id).await? {
            return Err(AppointmentError::NotFound(format!("Appointment {}", id)));
        }

        info!("Appointment {} deleted", id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid, permissions: &PermissionSet) -> Result<Appointment, AppointmentError> {
        require(permissions, Permission::ViewAppointments)?;

        self.repository
            .find(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", id)))
    }

    pub async fn list(
        &self,
        filter: &AppointmentFilter,
        permissions: &PermissionSet,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        require(permissions, Permission::ViewAppointments)?;
        Ok(self.repository.list(filter).await?)
    }

    fn apply_changes(
        &self,
        current: &Appointment,
        changes: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let mut updated = current.clone();

        if let Some(patient_id) = changes.patient_id {
            updated.patient_id = patient_id;
        }
        if let Some(dentist_id) = changes.dentist_id {
            updated.dentist_id = dentist_id;
        }
        if let Some(date) = changes.date.as_deref() {
            updated.date = parse_date(date)?;
        }
        if let Some(time_slot) = changes.time_slot.as_deref() {
            updated.time_slot = TimeSlot::parse(time_slot)?;
        }
        if let Some(cabinet) = changes.cabinet.as_deref() {
            updated.cabinet = self.known_cabinet(cabinet)?;
        }
        if let Some(appointment_type) = changes.appointment_type.as_deref() {
            updated.appointment_type = appointment_type.parse()?;
        }
        if let Some(status) = changes.status.as_deref() {
            // Any of the three statuses may follow any other.
            updated.status = status.parse()?;
        }
        if changes.notes.is_some() {
            updated.notes = clean_notes(changes.notes);
        }

        updated.updated_at = Utc::now();
        Ok(updated)
    }

    fn known_cabinet(&self, cabinet: &str) -> Result<String, AppointmentError> {
        let cabinet = cabinet.trim();
        if !self.availability.has_cabinet(cabinet) {
            return Err(AppointmentError::NotFound(format!("Cabinet '{}'", cabinet)));
        }
        Ok(cabinet.to_string())
    }

    async fn ensure_dentist_exists(&self, dentist_id: Uuid) -> Result<(), AppointmentError> {
        if !self.repository.dentist_exists(dentist_id).await? {
            return Err(AppointmentError::NotFound(format!("Dentist {}", dentist_id)));
        }
        Ok(())
    }

    async fn ensure_slot_free(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        time_slot: TimeSlot,
        cabinet: &str,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let check = self
            .availability
            .check_slot(dentist_id, date, time_slot, Some(cabinet), exclude_appointment_id)
            .await?;

        match check.reason {
            Some(reason) if !check.available => {
                warn!(
                    "Slot {} {} not bookable for dentist {} in {}: {}",
                    date, time_slot, dentist_id, cabinet, reason
                );
                Err(AppointmentError::Conflict { reason })
            }
            _ => Ok(()),
        }
    }
}

fn require(permissions: &PermissionSet, permission: Permission) -> Result<(), AppointmentError> {
    if permissions.contains(permission) {
        Ok(())
    } else {
        warn!("Permission {} denied", permission);
        Err(AppointmentError::Forbidden(permission))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
