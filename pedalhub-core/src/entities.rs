//! Core entity structures.
//!
//! Wire shapes match the backend's JSON (camelCase field names).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A photo attached to an entity's photo collection.
///
/// Invariant: within one collection, at most one photo has `is_main == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub url: String,
    pub is_main: bool,
}

/// The authenticated user, as returned by `account/login` / `account/register`
/// or re-derived from an access token's claims.
///
/// `roles` is always derivable from `token`; the two must not disagree for
/// longer than one synchronous update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub known_as: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub token: String,
}

/// A member profile (the `user` resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i64,
    pub username: String,
    pub known_as: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    pub age: i32,
    pub gender: String,
    #[serde(default)]
    pub city: String,
    pub created: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub user_photos: Vec<Photo>,
}

/// A rentable bike from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bike {
    pub id: i64,
    pub brand: String,
    pub model: String,
    #[serde(rename = "type")]
    pub bike_type: String,
    pub year: i32,
    pub price: f64,
    pub is_available: bool,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub bike_photos: Vec<Photo>,
}

/// A single rental record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub id: i64,
    pub bike_id: i64,
    pub customer_username: String,
    pub rented_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// One row in a rental history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalEntry {
    pub bike_id: i64,
    pub customer_username: String,
    pub rented_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Rental history for one bike (`rental/bike/{bikeId}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeRentalHistory {
    pub bike_id: i64,
    #[serde(default)]
    pub rentals: Vec<RentalEntry>,
}

/// Rental history for one customer (`rental/customer/{username}/history`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRentalHistory {
    pub username: String,
    #[serde(default)]
    pub rentals: Vec<RentalEntry>,
}

/// Admin panel row: a username and the roles it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRoles {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Bike {
    /// Number of photos currently flagged main. Valid collections yield 0 or 1.
    pub fn main_photo_count(&self) -> usize {
        self.bike_photos.iter().filter(|p| p.is_main).count()
    }
}

impl Member {
    pub fn main_photo_count(&self) -> usize {
        self.user_photos.iter().filter(|p| p.is_main).count()
    }
}
