// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, FromRequest, FromRequestParts, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Permission, Role, User};
use shared_models::error::AppError;

use crate::models::{
    parse_date, Appointment, AppointmentError, AppointmentFilter, AppointmentStatus,
    AvailabilityQuery, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::writer::AppointmentWriter;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict { reason } => AppError::Conflict {
                message: reason.message().to_string(),
                reason: Some(reason.to_string()),
            },
            e @ AppointmentError::NotFound(_) => AppError::NotFound(e.to_string()),
            AppointmentError::Forbidden(permission) => {
                AppError::Forbidden(format!("Missing permission: {}", permission))
            }
            AppointmentError::Repository(msg) => AppError::Database(msg),
        }
    }
}

/// `Json` whose rejections answer with the `{ "error": ... }` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub date: Option<String>,
    pub dentist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<String>,
}

impl AppointmentQueryParams {
    fn into_filter(self) -> Result<AppointmentFilter, AppointmentError> {
        Ok(AppointmentFilter {
            date: self.date.as_deref().map(parse_date).transpose()?,
            dentist_id: self.dentist_id,
            patient_id: self.patient_id,
            status: self
                .status
                .as_deref()
                .map(str::parse::<AppointmentStatus>)
                .transpose()?,
        })
    }
}

fn is_patient(user: &User) -> bool {
    user.role() == Role::Patient
}

fn owns(user: &User, appointment: &Appointment) -> bool {
    appointment.patient_id.to_string() == user.id
}

fn patient_scope_error() -> AppError {
    AppError::Forbidden("Patients can only access their own appointments".to_string())
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.permissions().contains(Permission::ViewAppointments) {
        return Err(AppointmentError::Forbidden(Permission::ViewAppointments).into());
    }

    debug!("Availability query from {}: {:?}", user.id, query);

    let writer = AppointmentWriter::from_config(&state, auth.token());
    let response = writer.availability().availability(query).await?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if is_patient(&user) {
        if let Some(patient_id) = request.patient_id {
            if patient_id.to_string() != user.id {
                warn!("Patient {} tried to book for {}", user.id, patient_id);
                return Err(patient_scope_error());
            }
        }
    }

    let writer = AppointmentWriter::from_config(&state, auth.token());
    let appointment = writer.create(request, &user.permissions()).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let mut filter = params.into_filter()?;

    if is_patient(&user) {
        let own_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;
        if filter.patient_id.is_some_and(|id| id != own_id) {
            return Err(patient_scope_error());
        }
        filter.patient_id = Some(own_id);
    }

    let writer = AppointmentWriter::from_config(&state, auth.token());
    let appointments = writer.list(&filter, &user.permissions()).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    AppPath(appointment_id): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let writer = AppointmentWriter::from_config(&state, auth.token());
    let appointment = writer.get(appointment_id, &user.permissions()).await?;

    if is_patient(&user) && !owns(&user, &appointment) {
        return Err(patient_scope_error());
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    AppPath(appointment_id): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let permissions = user.permissions();
    let writer = AppointmentWriter::from_config(&state, auth.token());

    if is_patient(&user) {
        let current = writer.get(appointment_id, &permissions).await?;
        let reassigns = request
            .patient_id
            .is_some_and(|id| id != current.patient_id);
        if !owns(&user, &current) || reassigns {
            warn!("Patient {} denied update of {}", user.id, appointment_id);
            return Err(patient_scope_error());
        }
    }

    let appointment = writer.update(appointment_id, request, &permissions).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    AppPath(appointment_id): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let writer = AppointmentWriter::from_config(&state, auth.token());
    writer.delete(appointment_id, &user.permissions()).await?;

    Ok(StatusCode::NO_CONTENT)
}
