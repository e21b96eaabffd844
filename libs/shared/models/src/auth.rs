use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Role {
        self.role.as_deref().map(Role::parse).unwrap_or(Role::Unknown)
    }

    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::for_role(self.role())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Receptionist,
    Dentist,
    Patient,
    Unknown,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "receptionist" | "front_desk" => Role::Receptionist,
            "dentist" | "doctor" => Role::Dentist,
            "patient" => Role::Patient,
            _ => Role::Unknown,
        }
    }
}

/// Capabilities checked by the appointment operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewAppointments,
    BookAppointments,
    RescheduleAppointments,
    ChangeAppointmentStatus,
    CancelAppointments,
    DeleteAppointments,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ViewAppointments,
        Permission::BookAppointments,
        Permission::RescheduleAppointments,
        Permission::ChangeAppointmentStatus,
        Permission::CancelAppointments,
        Permission::DeleteAppointments,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ViewAppointments => "view_appointments",
            Permission::BookAppointments => "book_appointments",
            Permission::RescheduleAppointments => "reschedule_appointments",
            Permission::ChangeAppointmentStatus => "change_appointment_status",
            Permission::CancelAppointments => "cancel_appointments",
            Permission::DeleteAppointments => "delete_appointments",
        };
        write!(f, "{}", name)
    }
}

/// An explicit set of permissions handed to each write operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    pub fn for_role(role: Role) -> Self {
        use Permission::*;

        let granted: &[Permission] = match role {
            Role::Admin => &Permission::ALL,
            Role::Receptionist => &[
                ViewAppointments,
                BookAppointments,
                RescheduleAppointments,
                ChangeAppointmentStatus,
                CancelAppointments,
                DeleteAppointments,
            ],
            Role::Dentist => &[
                ViewAppointments,
                BookAppointments,
                RescheduleAppointments,
                ChangeAppointmentStatus,
                CancelAppointments,
            ],
            Role::Patient => &[ViewAppointments, BookAppointments, CancelAppointments],
            Role::Unknown => &[],
        };

        Self(granted.iter().copied().collect())
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
