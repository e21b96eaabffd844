use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentFilter, ConflictReason};

use super::{AppointmentRepository, RepositoryError};

/// Process-local store. The slot constraints are checked and the write applied
/// under one write guard, so concurrent bookings of a slot cannot both land.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    dentists: RwLock<HashSet<Uuid>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dentists(dentists: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            appointments: RwLock::new(HashMap::new()),
            dentists: RwLock::new(dentists.into_iter().collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

fn slot_conflict(
    stored: &HashMap<Uuid, Appointment>,
    candidate: &Appointment,
) -> Option<ConflictReason> {
    if !candidate.is_active() {
        return None;
    }

    let mut cabinet_taken = false;
    for other in stored.values() {
        if other.id == candidate.id || !other.occupies(candidate.date, candidate.time_slot) {
            continue;
        }
        if other.dentist_id == candidate.dentist_id {
            return Some(ConflictReason::DentistBusy);
        }
        if other.cabinet == candidate.cabinet {
            cabinet_taken = true;
        }
    }

    cabinet_taken.then_some(ConflictReason::CabinetBusy)
}

fn sort_chronologically(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        (a.date, a.time_slot, &a.cabinet).cmp(&(b.date, b.time_slot, &b.cabinet))
    });
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn dentist_exists(&self, dentist_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.dentists.read().await.contains(&dentist_id))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn active_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.date == date && a.is_active())
            .cloned()
            .collect();
        sort_chronologically(&mut found);
        Ok(found)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_chronologically(&mut found);
        Ok(found)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut stored = self.appointments.write().await;

        if stored.contains_key(&appointment.id) {
            return Err(RepositoryError::Unavailable(format!(
                "appointment id {} already exists",
                appointment.id
            )));
        }
        if let Some(reason) = slot_conflict(&stored, &appointment) {
            debug!("Rejecting insert of {}: {}", appointment.id, reason);
            return Err(RepositoryError::SlotTaken(reason));
        }

        stored.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Option<Appointment>, RepositoryError> {
        let mut stored = self.appointments.write().await;

        if !stored.contains_key(&appointment.id) {
            return Ok(None);
        }
        if let Some(reason) = slot_conflict(&stored, &appointment) {
            debug!("Rejecting update of {}: {}", appointment.id, reason);
            return Err(RepositoryError::SlotTaken(reason));
        }

        stored.insert(appointment.id, appointment.clone());
        Ok(Some(appointment))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }
}
