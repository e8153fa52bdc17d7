//! Route definitions for the `/contacts` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::contacts;
use crate::state::AppState;

/// Contact routes. All require authentication.
///
/// ```text
/// GET    /contacts/                      -> list_contacts
/// POST   /contacts/                      -> create_contact (rate limited)
/// GET    /contacts/search/               -> search_contacts
/// GET    /contacts/upcoming_birthdays/   -> upcoming_birthdays
/// GET    /contacts/{id}                  -> get_contact
/// PUT    /contacts/{id}                  -> update_contact
/// DELETE /contacts/{id}                  -> delete_contact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/contacts/",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/contacts/search/", get(contacts::search_contacts))
        .route("/contacts/upcoming_birthdays/", get(contacts::upcoming_birthdays))
        .route(
            "/contacts/{id}",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
}
