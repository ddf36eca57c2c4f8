use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ClassId);
id_newtype!(ProjectId);
id_newtype!(TeamId);
id_newtype!(FormId);
id_newtype!(EvaluationId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    LabInstructor,
    Teacher,
    Peer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::LabInstructor => "lab_instructor",
            Role::Teacher => "teacher",
            Role::Peer => "peer",
        }
    }

    /// Lab instructors and admins manage teacher accounts and class ownership.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::LabInstructor)
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "lab_instructor" => Ok(Role::LabInstructor),
            "teacher" => Ok(Role::Teacher),
            "peer" => Ok(Role::Peer),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(UnknownVariant {
                kind: "project status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Rating,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default = "field_required_default")]
    pub required: bool,
}

fn field_required_default() -> bool {
    true
}

/// University seat number: region digit, college code, admission year,
/// branch code, roll number (e.g. `1RV21CS001`).
pub fn is_valid_usn(usn: &str) -> bool {
    let bytes = usn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    matches!(bytes[0], b'1'..=b'9')
        && bytes[1..3].iter().all(u8::is_ascii_uppercase)
        && bytes[3..5].iter().all(u8::is_ascii_digit)
        && bytes[5..7].iter().all(u8::is_ascii_uppercase)
        && bytes[7..].iter().all(u8::is_ascii_digit)
}
