// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Permission;

// ==============================================================================
// TIME SLOTS
// ==============================================================================

/// Every appointment occupies exactly one half-hour slot.
pub const SLOT_MINUTES: i32 = 30;
pub const OPENING_HOUR: u32 = 8;
pub const LAST_SLOT_HOUR: u32 = 21;

/// A half-hour mark within clinic hours, "08:00" through "21:00" inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    pub const COUNT: usize = 27;

    pub fn new(hour: u32, minute: u32) -> Result<Self, AppointmentError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            AppointmentError::Validation(format!("{:02}:{:02} is not a valid time", hour, minute))
        })?;
        Self::from_time(time)
    }

    pub fn from_time(time: NaiveTime) -> Result<Self, AppointmentError> {
        if time.second() != 0 || time.minute() % SLOT_MINUTES as u32 != 0 {
            return Err(AppointmentError::Validation(format!(
                "Time slot {} must fall on a {}-minute mark",
                time.format("%H:%M"),
                SLOT_MINUTES
            )));
        }

        let opening = NaiveTime::from_hms_opt(OPENING_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        let last = NaiveTime::from_hms_opt(LAST_SLOT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        if time < opening || time > last {
            return Err(AppointmentError::Validation(format!(
                "Time slot {} is outside clinic hours ({:02}:00-{:02}:00)",
                time.format("%H:%M"),
                OPENING_HOUR,
                LAST_SLOT_HOUR
            )));
        }

        Ok(Self(time))
    }

    /// Accepts "HH:MM" and the "HH:MM:SS" form Postgres returns for `time` columns.
    pub fn parse(raw: &str) -> Result<Self, AppointmentError> {
        let raw = raw.trim();
        let time = NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| AppointmentError::Validation(format!("'{}' is not a valid time slot (expected HH:MM)", raw)))?;
        Self::from_time(time)
    }

    /// All bookable slots in chronological order.
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (0..Self::COUNT as u32).filter_map(|i| {
            let minutes = OPENING_HOUR * 60 + i * SLOT_MINUTES as u32;
            NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).map(TimeSlot)
        })
    }

    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for TimeSlot {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = AppointmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.to_string()
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppointmentError::Validation(format!("'{}' is not a valid date (expected YYYY-MM-DD)", raw))
    })
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub duration_minutes: i32,
    pub cabinet: String,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether the appointment still holds its dentist and cabinet.
    pub fn is_active(&self) -> bool {
        self.status.blocks_slot()
    }

    pub fn occupies(&self, date: NaiveDate, time_slot: TimeSlot) -> bool {
        self.is_active() && self.date == date && self.time_slot == time_slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::Validation(format!(
                "Unknown status '{}' (expected scheduled, completed or cancelled)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    Checkup,
    Cleaning,
    Filling,
    Extraction,
    #[serde(alias = "root_canal")]
    RootCanal,
    Consultation,
    Other,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Checkup => write!(f, "checkup"),
            AppointmentType::Cleaning => write!(f, "cleaning"),
            AppointmentType::Filling => write!(f, "filling"),
            AppointmentType::Extraction => write!(f, "extraction"),
            AppointmentType::RootCanal => write!(f, "root-canal"),
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for AppointmentType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "checkup" => Ok(AppointmentType::Checkup),
            "cleaning" => Ok(AppointmentType::Cleaning),
            "filling" => Ok(AppointmentType::Filling),
            "extraction" => Ok(AppointmentType::Extraction),
            "root-canal" => Ok(AppointmentType::RootCanal),
            "consultation" => Ok(AppointmentType::Consultation),
            "other" => Ok(AppointmentType::Other),
            other => Err(AppointmentError::Validation(format!("Unknown appointment type '{}'", other))),
        }
    }
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    DentistBusy,
    CabinetBusy,
    Past,
}

impl ConflictReason {
    pub fn message(&self) -> &'static str {
        match self {
            ConflictReason::DentistBusy => "Dentist is already booked for this time slot",
            ConflictReason::CabinetBusy => "Cabinet is already in use for this time slot",
            ConflictReason::Past => "Cannot book a time slot in the past",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::DentistBusy => write!(f, "dentist-busy"),
            ConflictReason::CabinetBusy => write!(f, "cabinet-busy"),
            ConflictReason::Past => write!(f, "past"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCheck {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConflictReason>,
}

impl SlotCheck {
    pub fn available() -> Self {
        Self { available: true, reason: None }
    }

    pub fn blocked(reason: ConflictReason) -> Self {
        Self { available: false, reason: Some(reason) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub dentist_id: Uuid,
    pub date: String,
    pub time_slot: Option<String>,
    pub cabinet: Option<String>,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConflictReason>,
    pub available_slots: Vec<TimeSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_cabinets: Option<Vec<String>>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Raw booking input; every field is checked before anything is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub cabinet: Option<String>,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub cabinet: Option<String>,
    pub appointment_type: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub dentist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.date.map_or(true, |d| appointment.date == d)
            && self.dentist_id.map_or(true, |d| appointment.dentist_id == d)
            && self.patient_id.map_or(true, |p| appointment.patient_id == p)
            && self.status.map_or(true, |s| appointment.status == s)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{}", .reason.message())]
    Conflict { reason: ConflictReason },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Missing permission: {0}")]
    Forbidden(Permission),

    #[error("Appointment storage error: {0}")]
    Repository(String),
}
