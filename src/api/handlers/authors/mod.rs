//! Author CRUD handlers.
//!
//! Validation and uniqueness checks run before any write so clients get a
//! precise status; the storage layer maps constraint races to the same errors.

pub(crate) mod storage;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    error::{ApiError, DataResponse, MessageResponse, json_body},
    validation::{is_blank, parse_id, too_long, valid_email},
};
use crate::api::notify::{AuthorEmailChanged, Notifier};
use storage::{
    author_id_taken, delete_author_record, email_taken, fetch_authors, find_active_author,
    insert_author_record, soft_delete_author_record, update_author_record,
};
use types::{AuthorResponse, CreateAuthorRequest, UpdateAuthorRequest};

pub(crate) const AUTHOR_NOT_FOUND: &str = "Author not found";
const ENTER_AUTHOR_ID: &str = "Enter Author ID";
const INVALID_AUTHOR_ID: &str = "Invalid Author ID";
const NAME_REQUIRED: &str = "Name is required";
const NAME_TOO_LONG: &str = "Name is too long";
const EMAIL_REQUIRED: &str = "Email is required";
const EMAIL_TOO_LONG: &str = "Email is too long";
const INVALID_EMAIL: &str = "Invalid email format";
const EMAIL_EXISTS: &str = "Email already exists";
const ID_EXISTS: &str = "ID already exists";

/// Trimmed, validated name and email from an author payload.
fn validated_fields(
    name: Option<&str>,
    email: Option<&str>,
) -> Result<(String, String), ApiError> {
    if is_blank(name) {
        return Err(ApiError::BadRequest(NAME_REQUIRED));
    }
    let name = name.unwrap_or_default().trim().to_string();
    if too_long(&name) {
        return Err(ApiError::BadRequest(NAME_TOO_LONG));
    }
    if is_blank(email) {
        return Err(ApiError::BadRequest(EMAIL_REQUIRED));
    }
    let email = email.unwrap_or_default().trim().to_string();
    if too_long(&email) {
        return Err(ApiError::BadRequest(EMAIL_TOO_LONG));
    }
    if !valid_email(&email) {
        return Err(ApiError::BadRequest(INVALID_EMAIL));
    }
    Ok((name, email))
}

#[utoipa::path(
    get,
    path = "/api/author",
    responses(
        (status = 200, description = "Active authors ordered by id.", body = DataResponse<Vec<AuthorResponse>>),
        (status = 500, description = "Storage failure.", body = MessageResponse),
    ),
    tag = "authors"
)]
#[instrument(skip(pool))]
pub async fn list_authors(pool: Extension<PgPool>) -> Result<Response, ApiError> {
    let authors = fetch_authors(&pool)
        .await
        .map_err(ApiError::database("Failed to fetch authors"))?;
    Ok(DataResponse::new(authors).with_status(StatusCode::OK))
}

#[utoipa::path(
    get,
    path = "/api/author/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author detail.", body = DataResponse<AuthorResponse>),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No active author with this id.", body = MessageResponse),
    ),
    tag = "authors"
)]
#[instrument(skip(pool))]
pub async fn get_author(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_AUTHOR_ID, INVALID_AUTHOR_ID)?;
    let author = find_active_author(&pool, id)
        .await
        .map_err(ApiError::database("Failed to get author"))?
        .ok_or(ApiError::NotFound(AUTHOR_NOT_FOUND))?;
    Ok(DataResponse::new(author).with_status(StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/author",
    request_body = CreateAuthorRequest,
    responses(
        (status = 201, description = "Author created.", body = DataResponse<AuthorResponse>),
        (status = 400, description = "Invalid input.", body = MessageResponse),
        (status = 409, description = "Email or id already in use.", body = MessageResponse),
    ),
    tag = "authors"
)]
/// Creates an author after checking name, email format, email uniqueness among
/// active authors and, when supplied, that the explicit id is unused.
#[instrument(skip(pool, payload))]
pub async fn create_author(
    pool: Extension<PgPool>,
    payload: Result<Json<CreateAuthorRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const FAILED: &str = "Failed to create author";

    let request = json_body(payload)?;
    let (name, email) = validated_fields(request.name.as_deref(), request.email.as_deref())?;

    if email_taken(&pool, &email, None)
        .await
        .map_err(ApiError::database(FAILED))?
    {
        return Err(ApiError::Conflict(EMAIL_EXISTS));
    }

    // Zero means "not supplied", like an omitted field.
    let explicit_id = match request.id {
        None | Some(0) => None,
        Some(id) if id < 0 => return Err(ApiError::BadRequest(INVALID_AUTHOR_ID)),
        Some(id) => Some(id),
    };
    if let Some(id) = explicit_id {
        if author_id_taken(&pool, id)
            .await
            .map_err(ApiError::database(FAILED))?
        {
            return Err(ApiError::Conflict(ID_EXISTS));
        }
    }

    let author = insert_author_record(&pool, explicit_id, &name, &email, FAILED).await?;
    info!(author_id = author.id, "author created");
    Ok(DataResponse::new(author).with_status(StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/api/author/{id}",
    params(("id" = i64, Path, description = "Author id")),
    request_body = UpdateAuthorRequest,
    responses(
        (status = 200, description = "Author updated.", body = DataResponse<AuthorResponse>),
        (status = 400, description = "Invalid input.", body = MessageResponse),
        (status = 404, description = "No active author with this id.", body = MessageResponse),
        (status = 409, description = "Email used by another author.", body = MessageResponse),
    ),
    tag = "authors"
)]
/// Replaces an author's name and email. When the email changes, a notification
/// is queued after the update is stored; queueing failures are only logged.
#[instrument(skip(pool, notifier, payload))]
pub async fn update_author(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
    notifier: Extension<Arc<Notifier>>,
    payload: Result<Json<UpdateAuthorRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const FAILED: &str = "Failed to update author";

    let id = parse_id(&id, ENTER_AUTHOR_ID, INVALID_AUTHOR_ID)?;

    let current = find_active_author(&pool, id)
        .await
        .map_err(ApiError::database("Failed to find author"))?
        .ok_or(ApiError::NotFound(AUTHOR_NOT_FOUND))?;

    let request = json_body(payload)?;
    let (name, email) = validated_fields(request.name.as_deref(), request.email.as_deref())?;

    if email_taken(&pool, &email, Some(id))
        .await
        .map_err(ApiError::database(FAILED))?
    {
        return Err(ApiError::Conflict(EMAIL_EXISTS));
    }

    let updated = update_author_record(&pool, id, &name, &email, FAILED)
        .await?
        .ok_or(ApiError::NotFound(AUTHOR_NOT_FOUND))?;

    if current.email != updated.email {
        notifier
            .author_email_changed(
                &pool,
                AuthorEmailChanged {
                    author_id: updated.id,
                    old_email: current.email,
                    new_email: updated.email.clone(),
                },
            )
            .await;
    }

    Ok(DataResponse::new(updated).with_status(StatusCode::OK))
}

#[utoipa::path(
    delete,
    path = "/api/author/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author and its books removed.", body = MessageResponse),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No author with this id.", body = MessageResponse),
    ),
    tag = "authors"
)]
/// Permanently removes an author, including a soft-deleted one. Its books are
/// removed by the foreign key cascade.
#[instrument(skip(pool))]
pub async fn delete_author(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_AUTHOR_ID, INVALID_AUTHOR_ID)?;
    let deleted = delete_author_record(&pool, id)
        .await
        .map_err(ApiError::database("Failed to delete author"))?;
    if !deleted {
        return Err(ApiError::NotFound(AUTHOR_NOT_FOUND));
    }
    info!(author_id = id, "author deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("Author deleted successfully")),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/author/softdelete/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "Author hidden from reads.", body = MessageResponse),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No active author with this id.", body = MessageResponse),
    ),
    tag = "authors"
)]
#[instrument(skip(pool))]
pub async fn soft_delete_author(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_AUTHOR_ID, INVALID_AUTHOR_ID)?;
    let deleted = soft_delete_author_record(&pool, id)
        .await
        .map_err(ApiError::database("Failed to soft delete author"))?;
    if !deleted {
        return Err(ApiError::NotFound(AUTHOR_NOT_FOUND));
    }
    info!(author_id = id, "author soft deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("Author soft deleted successfully")),
    )
        .into_response())
}
