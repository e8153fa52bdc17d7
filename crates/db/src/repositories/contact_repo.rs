//! Repository for the `contacts` table.
//!
//! Every query is scoped by `owner_id`: a contact that belongs to another
//! user behaves exactly like a missing one.

use contacts_core::types::DbId;
use sqlx::PgPool;

use crate::models::contact::{Contact, CreateContact};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, first_name, last_name, email, phone_number, \
                       birthday, additional_data, created_at, updated_at";

/// Provides CRUD and search operations for contacts.
pub struct ContactRepo;

impl ContactRepo {
    /// Insert a new contact owned by `owner_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateContact,
    ) -> Result<Contact, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts
                (owner_id, first_name, last_name, email, phone_number, birthday, additional_data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(owner_id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone_number)
            .bind(input.birthday)
            .bind(&input.additional_data)
            .fetch_one(pool)
            .await
    }

    /// List a page of the owner's contacts ordered by id.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Contact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contacts
             WHERE owner_id = $1
             ORDER BY id
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Every contact the owner has, ordered by id.
    pub async fn list_all_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<Contact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contacts WHERE owner_id = $1 ORDER BY id");
        sqlx::query_as::<_, Contact>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Find one of the owner's contacts by id.
    pub async fn find_for_owner(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contacts WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Replace every editable field of a contact.
    ///
    /// Returns `None` if no such contact belongs to the owner.
    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &CreateContact,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!(
            "UPDATE contacts SET
                first_name = $3,
                last_name = $4,
                email = $5,
                phone_number = $6,
                birthday = $7,
                additional_data = $8
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone_number)
            .bind(input.birthday)
            .bind(&input.additional_data)
            .fetch_optional(pool)
            .await
    }

    /// Delete a contact, returning the removed row.
    pub async fn delete(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!(
            "DELETE FROM contacts WHERE id = $1 AND owner_id = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive substring search over first name, last name and email.
    ///
    /// `pattern` must already be an escaped `ILIKE` pattern
    /// (see `contacts_core::search::contains_pattern`).
    pub async fn search(
        pool: &PgPool,
        owner_id: DbId,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Contact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contacts
             WHERE owner_id = $1
               AND (first_name ILIKE $2 ESCAPE '\\'
                    OR last_name ILIKE $2 ESCAPE '\\'
                    OR email ILIKE $2 ESCAPE '\\')
             ORDER BY id
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(owner_id)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
