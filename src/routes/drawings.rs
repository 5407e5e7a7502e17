//! Drawing routes — list, open, create, overwrite and delete.
//!
//! Every handler is scoped to the signed-in user; another user's drawing
//! answers 404 exactly like a missing one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::drawing::{self, Drawing, DrawingError, DrawingPatch, DrawingRef, DrawingSummary, NewDrawing};
use crate::state::AppState;

pub(crate) fn drawing_error_to_status(err: DrawingError) -> StatusCode {
    match err {
        DrawingError::NotFound(_) => StatusCode::NOT_FOUND,
        DrawingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Parse the `{id}` route segment.
fn parse_ref(raw: &str) -> Result<DrawingRef, StatusCode> {
    raw.parse::<DrawingRef>().map_err(|e| {
        tracing::debug!(error = %e, "rejecting drawing route");
        StatusCode::BAD_REQUEST
    })
}

/// Parse a segment that must name a saved drawing; `new` is not addressable here.
fn parse_saved_id(raw: &str) -> Result<Uuid, StatusCode> {
    match parse_ref(raw)? {
        DrawingRef::Saved(id) => Ok(id),
        DrawingRef::New => Err(StatusCode::BAD_REQUEST),
    }
}

/// Canvas payload: either a saved drawing or a blank template for `new`.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum OpenedDrawing {
    Unsaved { title: String },
    Saved { drawing: Drawing },
}

#[derive(Deserialize)]
pub struct CreateDrawingBody {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
pub struct UpdateDrawingBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// `GET /api/drawings` — the caller's drawings, most recently modified first.
pub async fn list_drawings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<DrawingSummary>>, StatusCode> {
    let drawings = drawing::list_for_owner(state.drawings.as_ref(), auth.user.id)
        .await
        .map_err(drawing_error_to_status)?;
    Ok(Json(drawings.iter().map(DrawingSummary::from).collect()))
}

/// `POST /api/drawings` — explicit save of a new drawing.
pub async fn create_drawing(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDrawingBody>,
) -> Result<(StatusCode, Json<Drawing>), StatusCode> {
    let new = NewDrawing {
        title: drawing::title_or_default(body.title.as_deref()),
        content: body.content,
        owner_id: auth.user.id,
    };
    let created = state
        .drawings
        .create(new)
        .await
        .map_err(drawing_error_to_status)?;
    tracing::info!(drawing_id = %created.id, owner_id = %auth.user.id, "drawing created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/drawings/:id` — open a drawing; `new` yields an unsaved template.
pub async fn get_drawing(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<OpenedDrawing>, StatusCode> {
    match parse_ref(&raw_id)? {
        DrawingRef::New => Ok(Json(OpenedDrawing::Unsaved { title: drawing::DEFAULT_TITLE.to_owned() })),
        DrawingRef::Saved(id) => {
            let drawing = drawing::load_owned(state.drawings.as_ref(), id, auth.user.id)
                .await
                .map_err(drawing_error_to_status)?;
            Ok(Json(OpenedDrawing::Saved { drawing }))
        }
    }
}

/// `PATCH /api/drawings/:id` — overwrite title and/or content. Last write wins.
/// A blank title resets to the default one.
pub async fn update_drawing(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
    Json(body): Json<UpdateDrawingBody>,
) -> Result<Json<Drawing>, StatusCode> {
    let id = parse_saved_id(&raw_id)?;
    let patch = DrawingPatch {
        title: body.title.as_deref().map(|t| drawing::title_or_default(Some(t))),
        content: body.content,
    };
    if patch.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = state
        .drawings
        .update(id, auth.user.id, patch)
        .await
        .map_err(drawing_error_to_status)?;
    Ok(Json(updated))
}

/// `DELETE /api/drawings/:id` — permanent delete.
pub async fn delete_drawing(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let id = parse_saved_id(&raw_id)?;
    state
        .drawings
        .delete(id, auth.user.id)
        .await
        .map_err(drawing_error_to_status)?;
    tracing::info!(drawing_id = %id, owner_id = %auth.user.id, "drawing deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "drawings_test.rs"]
mod tests;
