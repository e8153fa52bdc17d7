//! Contact entity model and DTOs.

use chrono::NaiveDate;
use contacts_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A contact row from the `contacts` table.
#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub id: DbId,
    pub owner_id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: NaiveDate,
    pub additional_data: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Contact as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: NaiveDate,
    pub additional_data: String,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone_number: c.phone_number,
            birthday: c.birthday,
            additional_data: c.additional_data,
        }
    }
}

/// `{ "contacts": [...] }` envelope used by every listing endpoint.
#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub contacts: Vec<ContactResponse>,
}

impl From<Vec<Contact>> for ContactListResponse {
    fn from(rows: Vec<Contact>) -> Self {
        Self {
            contacts: rows.into_iter().map(ContactResponse::from).collect(),
        }
    }
}

/// Body for creating a contact, and for replacing one on update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContact {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub last_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 32, message = "must be 1 to 32 characters"))]
    pub phone_number: String,
    pub birthday: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub additional_data: String,
}
