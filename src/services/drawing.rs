//! Drawing service — the data-access layer for saved drawings.
//!
//! DESIGN
//! ======
//! Each store operation is a single call against the backing store with no
//! retry, no transaction and no conflict detection: updates overwrite and the
//! last write wins. `content` is the editor's snapshot and is stored and
//! returned verbatim.
//!
//! Listing asks the store for no particular order; callers sort in memory
//! with [`sort_by_last_modified`].
//!
//! ERROR HANDLING
//! ==============
//! Store failures are logged at the call site and returned unchanged. A
//! drawing owned by someone else is reported as `NotFound`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Untitled Drawing";

/// Route segment that denotes a drawing that has not been saved yet.
pub const NEW_DRAWING_SEGMENT: &str = "new";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DrawingError {
    #[error("drawing not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for DrawingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DRAWING_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// A persisted drawing. Timestamps are milliseconds since Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub owner_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Everything the store needs to create a drawing; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDrawing {
    pub title: String,
    pub content: String,
    pub owner_id: Uuid,
}

/// Fields to overwrite. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawingPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl DrawingPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// List-view projection of a drawing (no snapshot payload).
#[derive(Debug, Clone, Serialize)]
pub struct DrawingSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Drawing> for DrawingSummary {
    fn from(d: &Drawing) -> Self {
        Self { id: d.id, title: d.title.clone(), created_at: d.created_at, updated_at: d.updated_at }
    }
}

/// Drawing identifier as it appears in the canvas route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingRef {
    /// The literal `new`: an unsaved drawing.
    New,
    Saved(Uuid),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid drawing id: {0:?}")]
pub struct InvalidDrawingRef(pub String);

impl FromStr for DrawingRef {
    type Err = InvalidDrawingRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NEW_DRAWING_SEGMENT {
            return Ok(Self::New);
        }
        Uuid::parse_str(s)
            .map(Self::Saved)
            .map_err(|_| InvalidDrawingRef(s.to_owned()))
    }
}

impl fmt::Display for DrawingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str(NEW_DRAWING_SEGMENT),
            Self::Saved(id) => write!(f, "{id}"),
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Remote document store holding the drawings collection.
#[async_trait::async_trait]
pub trait DrawingStore: Send + Sync {
    async fn create(&self, new: NewDrawing) -> Result<Drawing, DrawingError>;

    /// Overwrite fields of a drawing owned by `owner_id` and bump `updated_at`.
    async fn update(&self, id: Uuid, owner_id: Uuid, patch: DrawingPatch) -> Result<Drawing, DrawingError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Drawing>, DrawingError>;

    /// All drawings of one owner, in no particular order.
    async fn fetch_by_owner(&self, owner_id: Uuid) -> Result<Vec<Drawing>, DrawingError>;

    /// Hard delete. `NotFound` when nothing owned by `owner_id` matched.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), DrawingError>;
}

/// `PostgreSQL`-backed store over the `drawings` table.
pub struct PgDrawingStore {
    pool: PgPool,
}

impl PgDrawingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DRAWING_COLUMNS: &str = "id, title, content, owner_id, \
     (extract(epoch from created_at) * 1000)::bigint AS created_at, \
     (extract(epoch from updated_at) * 1000)::bigint AS updated_at";

type DrawingTuple = (Uuid, String, String, Uuid, i64, i64);

fn from_tuple((id, title, content, owner_id, created_at, updated_at): DrawingTuple) -> Drawing {
    Drawing { id, title, content, owner_id, created_at, updated_at }
}

#[async_trait::async_trait]
impl DrawingStore for PgDrawingStore {
    async fn create(&self, new: NewDrawing) -> Result<Drawing, DrawingError> {
        let row = sqlx::query_as::<_, DrawingTuple>(&format!(
            "INSERT INTO drawings (title, content, owner_id) VALUES ($1, $2, $3) RETURNING {DRAWING_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.owner_id)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| error!(error = %e, owner_id = %new.owner_id, "drawing create failed"))?;

        Ok(from_tuple(row))
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, patch: DrawingPatch) -> Result<Drawing, DrawingError> {
        let row = sqlx::query_as::<_, DrawingTuple>(&format!(
            "UPDATE drawings
             SET title = COALESCE($3, title), content = COALESCE($4, content), updated_at = now()
             WHERE id = $1 AND owner_id = $2
             RETURNING {DRAWING_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(patch.title.as_deref())
        .bind(patch.content.as_deref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(error = %e, drawing_id = %id, "drawing update failed"))?;

        row.map(from_tuple).ok_or(DrawingError::NotFound(id))
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Drawing>, DrawingError> {
        let row = sqlx::query_as::<_, DrawingTuple>(&format!("SELECT {DRAWING_COLUMNS} FROM drawings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| error!(error = %e, drawing_id = %id, "drawing fetch failed"))?;

        Ok(row.map(from_tuple))
    }

    async fn fetch_by_owner(&self, owner_id: Uuid) -> Result<Vec<Drawing>, DrawingError> {
        let rows =
            sqlx::query_as::<_, DrawingTuple>(&format!("SELECT {DRAWING_COLUMNS} FROM drawings WHERE owner_id = $1"))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await
                .inspect_err(|e| error!(error = %e, %owner_id, "drawing list failed"))?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), DrawingError> {
        let result = sqlx::query("DELETE FROM drawings WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| error!(error = %e, drawing_id = %id, "drawing delete failed"))?;

        if result.rows_affected() == 0 {
            return Err(DrawingError::NotFound(id));
        }
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Most recently modified first. Ties fall back to newest created, then id,
/// so repeated listings come back in the same order.
pub fn sort_by_last_modified(drawings: &mut [Drawing]) {
    drawings.sort_by(compare_last_modified);
}

fn compare_last_modified(a: &Drawing, b: &Drawing) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Fetch a drawing and hide it unless `owner_id` owns it.
///
/// # Errors
///
/// `NotFound` if the drawing is missing or owned by another user.
pub async fn load_owned(store: &dyn DrawingStore, id: Uuid, owner_id: Uuid) -> Result<Drawing, DrawingError> {
    match store.fetch(id).await? {
        Some(drawing) if drawing.owner_id == owner_id => Ok(drawing),
        _ => Err(DrawingError::NotFound(id)),
    }
}

/// The caller's drawings, most recently modified first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_for_owner(store: &dyn DrawingStore, owner_id: Uuid) -> Result<Vec<Drawing>, DrawingError> {
    let mut drawings = store.fetch_by_owner(owner_id).await?;
    sort_by_last_modified(&mut drawings);
    Ok(drawings)
}

/// Title to store for a user-supplied value; blank input falls back to the default.
#[must_use]
pub fn title_or_default(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => t.to_owned(),
        _ => DEFAULT_TITLE.to_owned(),
    }
}

#[cfg(test)]
#[path = "drawing_test.rs"]
mod tests;
