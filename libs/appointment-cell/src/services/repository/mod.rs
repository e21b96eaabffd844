use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, ConflictReason};

mod memory;
mod supabase;

pub use memory::InMemoryAppointmentRepository;
pub use supabase::{SupabaseAppointmentRepository, CABINET_SLOT_INDEX, DENTIST_SLOT_INDEX};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// A uniqueness constraint on (dentist|cabinet, date, slot) for active appointments was hit.
    #[error("slot already held ({0})")]
    SlotTaken(ConflictReason),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("malformed appointment record: {0}")]
    Decode(String),
}

impl From<RepositoryError> for AppointmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SlotTaken(reason) => AppointmentError::Conflict { reason },
            other => AppointmentError::Repository(other.to_string()),
        }
    }
}

/// Storage for appointments and the dentists they reference.
///
/// Implementations must reject an `insert` or `update` that would leave two
/// non-cancelled appointments sharing a dentist or a cabinet at the same
/// date and slot, reporting it as [`RepositoryError::SlotTaken`].
///
/// When both constraints are violated, which one a store reports is up to the
/// store: the in-memory store reports the dentist, the Supabase store reports
/// whichever unique index Postgres trips. Callers wanting a stable order run
/// the availability pre-check first, as `AppointmentWriter` does.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn dentist_exists(&self, dentist_id: Uuid) -> Result<bool, RepositoryError>;

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError>;

    /// Non-cancelled appointments on `date`, across all dentists and cabinets.
    async fn active_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError>;

    /// Appointments matching `filter`, ordered by date then slot.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    /// Replaces a stored appointment. `Ok(None)` when the id no longer exists.
    async fn update(&self, appointment: Appointment) -> Result<Option<Appointment>, RepositoryError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
