use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentFilter, ConflictReason};

use super::{AppointmentRepository, RepositoryError};

/// Partial unique index on (dentist_id, date, time_slot) where status <> 'cancelled'.
pub const DENTIST_SLOT_INDEX: &str = "appointments_dentist_slot_active_idx";
/// Partial unique index on (cabinet, date, time_slot) where status <> 'cancelled'.
pub const CABINET_SLOT_INDEX: &str = "appointments_cabinet_slot_active_idx";

/// PostgREST-backed store. Requests run with the caller's token so row-level security applies.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, RepositoryError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(&self.auth_token), None)
            .await
            .map_err(map_supabase_error)?;

        decode_rows(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Appointment>, RepositoryError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                method,
                path,
                Some(&self.auth_token),
                body,
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(map_supabase_error)?;

        decode_rows(rows)
    }
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, RepositoryError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn map_supabase_error(err: SupabaseError) -> RepositoryError {
    if err.is_unique_violation() {
        let reason = match err.constraint_name() {
            Some(name) if name == CABINET_SLOT_INDEX || name.contains("cabinet") => ConflictReason::CabinetBusy,
            _ => ConflictReason::DentistBusy,
        };
        warn!("Unique slot constraint violated: {}", err);
        return RepositoryError::SlotTaken(reason);
    }

    RepositoryError::Unavailable(err.to_string())
}

fn appointment_body(appointment: &Appointment) -> Value {
    json!({
        "id": appointment.id,
        "patient_id": appointment.patient_id,
        "dentist_id": appointment.dentist_id,
        "date": appointment.date.format("%Y-%m-%d").to_string(),
        "time_slot": appointment.time_slot.to_string(),
        "duration_minutes": appointment.duration_minutes,
        "cabinet": appointment.cabinet,
        "appointment_type": appointment.appointment_type,
        "status": appointment.status,
        "notes": appointment.notes,
        "created_at": appointment.created_at.to_rfc3339(),
        "updated_at": appointment.updated_at.to_rfc3339()
    })
}

fn filter_query(filter: &AppointmentFilter) -> String {
    let mut query_parts = Vec::new();

    if let Some(date) = filter.date {
        query_parts.push(format!("date=eq.{}", date.format("%Y-%m-%d")));
    }
    if let Some(dentist_id) = filter.dentist_id {
        query_parts.push(format!("dentist_id=eq.{}", dentist_id));
    }
    if let Some(patient_id) = filter.patient_id {
        query_parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(status) = filter.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    query_parts.push("order=date.asc,time_slot.asc".to_string());

    query_parts.join("&")
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn dentist_exists(&self, dentist_id: Uuid) -> Result<bool, RepositoryError> {
        let path = format!("/rest/v1/dentists?id=eq.{}&select=id", dentist_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(map_supabase_error)?;

        Ok(!rows.is_empty())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn active_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, RepositoryError> {
        debug!("Loading active appointments for {}", date);
        let path = format!(
            "/rest/v1/appointments?date=eq.{}&status=neq.cancelled&order=time_slot.asc",
            date.format("%Y-%m-%d")
        );
        self.fetch(&path).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError> {
        let path = format!("/rest/v1/appointments?{}", filter_query(filter));
        self.fetch(&path).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let rows = self
            .write(Method::POST, "/rest/v1/appointments", Some(appointment_body(&appointment)))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Unavailable("insert returned no rows".to_string()))
    }

    async fn update(&self, appointment: Appointment) -> Result<Option<Appointment>, RepositoryError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let mut body = appointment_body(&appointment);
        if let Some(fields) = body.as_object_mut() {
            fields.remove("id");
            fields.remove("created_at");
        }

        Ok(self.write(Method::PATCH, &path, Some(body)).await?.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(!self.write(Method::DELETE, &path, None).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;

    #[test]
    fn filter_query_includes_set_fields_only() {
        let dentist = Uuid::nil();
        let filter = AppointmentFilter {
            date: NaiveDate::from_ymd_opt(2025, 6, 10),
            dentist_id: Some(dentist),
            patient_id: None,
            status: Some(AppointmentStatus::Scheduled),
        };

        assert_eq!(
            filter_query(&filter),
            format!(
                "date=eq.2025-06-10&dentist_id=eq.{}&status=eq.scheduled&order=date.asc,time_slot.asc",
                dentist
            )
        );
    }

    #[test]
    fn empty_filter_only_orders() {
        assert_eq!(filter_query(&AppointmentFilter::default()), "order=date.asc,time_slot.asc");
    }
}
