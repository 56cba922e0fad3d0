use serde::{Deserialize, Serialize};
use serde_json::json;

use ridelink_core::FailureCondition;

use super::errors::ApiError;

/// One invalid field, as reported in `details` of a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Collects field errors and turns them into a single validation failure.
#[derive(Debug, Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn required<'a>(&mut self, field: &'static str, value: &'a Option<String>) -> Option<&'a str> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.errors.push(FieldError::new(field, format!("{field} is required")));
                None
            }
        }
    }

    fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError(FailureCondition::validation(
                "Validation failed",
                json!(self.errors),
            )))
        }
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Normalized email on success.
    pub fn validate(&self) -> Result<String, ApiError> {
        let mut v = Validator::default();
        let email = v.required("email", &self.email).map(str::to_lowercase);
        v.required("password", &self.password);
        v.finish()?;
        Ok(email.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Driver,
    Passenger,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredAccount {
    pub status: &'static str,
    pub name: String,
    pub email: String,
    pub role: AccountRole,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<RegisteredAccount, ApiError> {
        let mut v = Validator::default();
        let name = v.required("name", &self.name).map(str::to_string);
        let email = v.required("email", &self.email).map(str::to_lowercase);
        if let Some(e) = &email {
            v.check(looks_like_email(e), "email", "email is not a valid address");
        }
        if let Some(p) = v.required("password", &self.password) {
            v.check(p.chars().count() >= 8, "password", "password must be at least 8 characters");
        }
        let role = match v.required("role", &self.role) {
            Some("driver") => Some(AccountRole::Driver),
            Some("passenger") => Some(AccountRole::Passenger),
            Some(_) => {
                v.check(false, "role", "role must be one of: driver, passenger");
                None
            }
            None => None,
        };
        v.finish()?;

        match (name, email, role) {
            (Some(name), Some(email), Some(role)) => Ok(RegisteredAccount {
                status: "registered",
                name,
                email,
                role,
            }),
            _ => Err(ApiError(FailureCondition::server_fault(
                "registration validation was inconsistent",
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rides
// ─────────────────────────────────────────────────────────────────────────────

pub const MAX_SEATS: u32 = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RideRequest {
    pub pickup: Option<String>,
    pub dropoff: Option<String>,
    pub seats: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRide {
    pub status: &'static str,
    pub pickup: String,
    pub dropoff: String,
    pub seats: u32,
}

impl RideRequest {
    pub fn validate(&self) -> Result<PendingRide, ApiError> {
        let mut v = Validator::default();
        let pickup = v.required("pickup", &self.pickup).map(str::to_string);
        let dropoff = v.required("dropoff", &self.dropoff).map(str::to_string);
        if let (Some(p), Some(d)) = (&pickup, &dropoff) {
            v.check(
                !p.eq_ignore_ascii_case(d),
                "dropoff",
                "dropoff must differ from pickup",
            );
        }
        let seats = self.seats.unwrap_or(1);
        v.check(
            (1..=MAX_SEATS).contains(&seats),
            "seats",
            format!("seats must be between 1 and {MAX_SEATS}"),
        );
        v.finish()?;

        Ok(PendingRide {
            status: "pending",
            pickup: pickup.unwrap_or_default(),
            dropoff: dropoff.unwrap_or_default(),
            seats,
        })
    }
}
