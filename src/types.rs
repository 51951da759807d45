// Core data types for an attendance capture

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern is a valid regex")
});

/// Check that an email has the basic `local@domain.tld` shape
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_PATTERN.is_match(email)
}

/// Generate an opaque, unique record id
pub fn generate_record_id() -> String {
    format!("att_{}", Uuid::new_v4().simple())
}

/// A device position in floating point degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A completed attendance capture, immutable once promoted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    id: String,
    email: String,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    address: String,
    photo_data_url: String,
}

impl AttendanceRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn photo_data_url(&self) -> &str {
        &self.photo_data_url
    }
}

/// Required record fields, in the order they are checked at promotion time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Id,
    Email,
    Timestamp,
    Latitude,
    Longitude,
    Address,
    PhotoDataUrl,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordField::Id => "id",
            RecordField::Email => "email",
            RecordField::Timestamp => "timestamp",
            RecordField::Latitude => "latitude",
            RecordField::Longitude => "longitude",
            RecordField::Address => "address",
            RecordField::PhotoDataUrl => "photoDataUrl",
        };
        f.write_str(name)
    }
}

/// Mutable accumulator for a record whose fields are still arriving
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    pub id: Option<String>,
    pub email: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub photo_data_url: Option<String>,
}

impl PartialRecord {
    /// Start a record for a new capture cycle with a freshly generated id
    pub fn located(
        email: &str,
        timestamp: DateTime<Utc>,
        coordinates: Coordinates,
        address: String,
    ) -> Self {
        Self {
            id: Some(generate_record_id()),
            email: Some(email.to_string()),
            timestamp: Some(timestamp),
            coordinates: Some(coordinates),
            address: Some(address),
            photo_data_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// First required field that is absent or empty
    pub fn first_missing(&self) -> Option<RecordField> {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        if blank(&self.id) {
            return Some(RecordField::Id);
        }
        if blank(&self.email) {
            return Some(RecordField::Email);
        }
        if self.timestamp.is_none() {
            return Some(RecordField::Timestamp);
        }
        match self.coordinates {
            None => return Some(RecordField::Latitude),
            Some(c) if !c.latitude.is_finite() => return Some(RecordField::Latitude),
            Some(c) if !c.longitude.is_finite() => return Some(RecordField::Longitude),
            Some(_) => {}
        }
        if blank(&self.address) {
            return Some(RecordField::Address);
        }
        if blank(&self.photo_data_url) {
            return Some(RecordField::PhotoDataUrl);
        }
        None
    }

    /// Promote to an immutable record if every required field is present
    pub fn promote(&self) -> Result<AttendanceRecord, RecordField> {
        if let Some(missing) = self.first_missing() {
            return Err(missing);
        }

        let (
            Some(id),
            Some(email),
            Some(timestamp),
            Some(coordinates),
            Some(address),
            Some(photo_data_url),
        ) = (
            &self.id,
            &self.email,
            self.timestamp,
            self.coordinates,
            &self.address,
            &self.photo_data_url,
        )
        else {
            return Err(RecordField::Id);
        };

        Ok(AttendanceRecord {
            id: id.clone(),
            email: email.clone(),
            timestamp,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            address: address.clone(),
            photo_data_url: photo_data_url.clone(),
        })
    }
}
