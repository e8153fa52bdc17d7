//! Handlers for the `/users` resource.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use contacts_core::error::CoreError;
use contacts_core::types::DbId;
use contacts_db::models::user::UserResponse;
use contacts_db::repositories::UserRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Multipart field carrying the avatar image.
const AVATAR_FIELD: &str = "file";

/// Response body for `POST /users/{user_id}/avatar`.
#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub filename: String,
    pub url: String,
}

/// GET /users/me
pub async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&auth.user))
}

/// POST /users/{user_id}/avatar
///
/// Upload a new avatar for the caller and store its delivery URL.
pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<Json<AvatarResponse>> {
    if user_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Not enough permissions".into(),
        )));
    }

    let store = state.avatars.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::Unavailable(
            "Avatar storage is not configured".into(),
        ))
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("avatar").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;

    let url = store
        .upload(&format!("user_avatars/{user_id}"), &filename, data.to_vec())
        .await
        .map_err(|e| AppError::InternalError(format!("Avatar upload failed: {e}")))?;

    UserRepo::set_avatar_url(&state.pool, user_id, &url)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "User",
                id: user_id,
            })
        })?;

    tracing::info!(user_id, "Avatar updated");
    Ok(Json(AvatarResponse { filename, url }))
}
