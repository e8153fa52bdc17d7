//! Handlers for the `/contacts` resource.
//!
//! Every operation is scoped to the authenticated caller; a contact owned by
//! someone else is indistinguishable from a missing one.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use contacts_core::birthday::{is_upcoming, UPCOMING_WINDOW_DAYS};
use contacts_core::error::CoreError;
use contacts_core::search::{clamp_limit, clamp_offset, contains_pattern, DEFAULT_LIMIT, MAX_LIMIT};
use contacts_core::types::DbId;
use contacts_core::validation::validate_input;
use contacts_db::models::contact::{ContactListResponse, ContactResponse, CreateContact};
use contacts_db::repositories::ContactRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientIp;
use crate::query::{PaginationParams, SearchParams};
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Contact",
        id,
    })
}

/// POST /contacts/
pub async fn create_contact(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    auth: AuthUser,
    Json(input): Json<CreateContact>,
) -> AppResult<Json<ContactResponse>> {
    state.contact_limiter.check(client)?;
    validate_input(&input)?;

    let contact = ContactRepo::create(&state.pool, auth.user_id, &input).await?;

    tracing::info!(contact_id = contact.id, user_id = auth.user_id, "Contact created");
    Ok(Json(contact.into()))
}

/// GET /contacts/?skip=&limit=
pub async fn list_contacts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ContactListResponse>> {
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = clamp_offset(params.skip);

    let contacts = ContactRepo::list_for_owner(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(contacts.into()))
}

/// GET /contacts/{id}
pub async fn get_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ContactResponse>> {
    let contact = ContactRepo::find_for_owner(&state.pool, auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(contact.into()))
}

/// PUT /contacts/{id}
pub async fn update_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<CreateContact>,
) -> AppResult<Json<ContactResponse>> {
    validate_input(&input)?;

    let contact = ContactRepo::update(&state.pool, auth.user_id, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(contact_id = id, user_id = auth.user_id, "Contact updated");
    Ok(Json(contact.into()))
}

/// DELETE /contacts/{id}
///
/// Responds with the contact as it was before deletion.
pub async fn delete_contact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ContactResponse>> {
    let contact = ContactRepo::delete(&state.pool, auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(contact_id = id, user_id = auth.user_id, "Contact deleted");
    Ok(Json(contact.into()))
}

/// GET /contacts/search/?query=&skip=&limit=
pub async fn search_contacts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<ContactListResponse>> {
    if params.query.trim().is_empty() {
        return Err(AppError::BadRequest("Search query must not be empty".into()));
    }
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = clamp_offset(params.skip);

    let contacts = ContactRepo::search(
        &state.pool,
        auth.user_id,
        &contains_pattern(&params.query),
        limit,
        offset,
    )
    .await?;
    Ok(Json(contacts.into()))
}

/// GET /contacts/upcoming_birthdays/
///
/// Contacts whose next birthday falls within the coming week, today included.
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ContactListResponse>> {
    let today = Utc::now().date_naive();

    let mut contacts = ContactRepo::list_all_for_owner(&state.pool, auth.user_id).await?;
    contacts.retain(|c| is_upcoming(c.birthday, today, UPCOMING_WINDOW_DAYS));

    Ok(Json(contacts.into()))
}
