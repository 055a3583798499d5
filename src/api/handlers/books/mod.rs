//! Book CRUD and title search handlers.
//!
//! A book must reference an active author on create and update. A missing
//! author is a client error (`400`), not a missing book.

pub(crate) mod storage;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{
    authors::{AUTHOR_NOT_FOUND, storage::find_active_author},
    error::{ApiError, DataResponse, MessageResponse, json_body},
    validation::{is_blank, is_zero_date, parse_id, too_long},
};
use storage::{
    BookFields, book_id_taken, delete_book_record, fetch_books, find_active_book,
    insert_book_record, isbn_taken, search_books_by_title, soft_delete_book_record,
    update_book_record,
};
use types::{BookRequest, BookResponse};

const BOOK_NOT_FOUND: &str = "Book not found";
const ENTER_BOOK_ID: &str = "Enter Book ID";
const INVALID_BOOK_ID: &str = "Invalid Book ID";
const TITLE_REQUIRED: &str = "Title is required";
const TITLE_TOO_LONG: &str = "Title is too long";
const ISBN_REQUIRED: &str = "ISBN is required";
const ISBN_TOO_LONG: &str = "ISBN is too long";
const PUBLISHED_DATE_REQUIRED: &str = "Published date is required";
const ISBN_EXISTS: &str = "ISBN already exists";
const ID_EXISTS: &str = "ID already exists";

/// Title, ISBN and published date checks, in that order. Title and ISBN are
/// trimmed and capped at the column width.
fn validated_fields(request: &BookRequest) -> Result<BookFields, ApiError> {
    if is_blank(request.title.as_deref()) {
        return Err(ApiError::BadRequest(TITLE_REQUIRED));
    }
    let title = request.title.as_deref().unwrap_or_default().trim().to_string();
    if too_long(&title) {
        return Err(ApiError::BadRequest(TITLE_TOO_LONG));
    }
    if is_blank(request.isbn.as_deref()) {
        return Err(ApiError::BadRequest(ISBN_REQUIRED));
    }
    let isbn = request.isbn.as_deref().unwrap_or_default().trim().to_string();
    if too_long(&isbn) {
        return Err(ApiError::BadRequest(ISBN_TOO_LONG));
    }
    let published_date = request
        .published_date
        .filter(|date| !is_zero_date(date))
        .ok_or(ApiError::BadRequest(PUBLISHED_DATE_REQUIRED))?;

    Ok(BookFields {
        title,
        isbn,
        published_date,
        author_id: request.author_id.unwrap_or_default(),
    })
}

/// The referenced author must exist and be active.
async fn ensure_author(pool: &PgPool, author_id: i64) -> Result<(), ApiError> {
    if author_id <= 0 {
        return Err(ApiError::BadRequest(AUTHOR_NOT_FOUND));
    }
    find_active_author(pool, author_id)
        .await
        .map_err(ApiError::database("Failed to find author"))?
        .map(|_| ())
        .ok_or(ApiError::BadRequest(AUTHOR_NOT_FOUND))
}

#[utoipa::path(
    get,
    path = "/api/book",
    responses(
        (status = 200, description = "Active books with their authors.", body = DataResponse<Vec<BookResponse>>),
        (status = 500, description = "Storage failure.", body = MessageResponse),
    ),
    tag = "books"
)]
#[instrument(skip(pool))]
pub async fn list_books(pool: Extension<PgPool>) -> Result<Response, ApiError> {
    let books = fetch_books(&pool)
        .await
        .map_err(ApiError::database("Failed to fetch books"))?;
    Ok(DataResponse::new(books).with_status(StatusCode::OK))
}

#[utoipa::path(
    get,
    path = "/api/book/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book detail with its author.", body = DataResponse<BookResponse>),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No active book with this id.", body = MessageResponse),
    ),
    tag = "books"
)]
#[instrument(skip(pool))]
pub async fn get_book(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_BOOK_ID, INVALID_BOOK_ID)?;
    let book = find_active_book(&pool, id)
        .await
        .map_err(ApiError::database("Failed to get Book"))?
        .ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;
    Ok(DataResponse::new(book).with_status(StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/book",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created.", body = DataResponse<BookResponse>),
        (status = 400, description = "Invalid input or unknown author.", body = MessageResponse),
        (status = 409, description = "ISBN or id already in use.", body = MessageResponse),
    ),
    tag = "books"
)]
/// Creates a book after validating its fields, ISBN uniqueness among active
/// books, the referenced author and, when supplied, the explicit id.
#[instrument(skip(pool, payload))]
pub async fn create_book(
    pool: Extension<PgPool>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const FAILED: &str = "Failed to create book";

    let request = json_body(payload)?;
    let fields = validated_fields(&request)?;

    if isbn_taken(&pool, &fields.isbn, None)
        .await
        .map_err(ApiError::database(FAILED))?
    {
        return Err(ApiError::Conflict(ISBN_EXISTS));
    }

    ensure_author(&pool, fields.author_id).await?;

    let explicit_id = match request.id {
        None | Some(0) => None,
        Some(id) if id < 0 => return Err(ApiError::BadRequest(INVALID_BOOK_ID)),
        Some(id) => Some(id),
    };
    if let Some(id) = explicit_id {
        if book_id_taken(&pool, id)
            .await
            .map_err(ApiError::database(FAILED))?
        {
            return Err(ApiError::Conflict(ID_EXISTS));
        }
    }

    let book = insert_book_record(&pool, explicit_id, &fields, FAILED).await?;
    info!(book_id = book.id, author_id = book.author_id, "book created");
    Ok(DataResponse::new(book).with_status(StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/api/book/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated.", body = DataResponse<BookResponse>),
        (status = 400, description = "Invalid input or unknown author.", body = MessageResponse),
        (status = 404, description = "No active book with this id.", body = MessageResponse),
        (status = 409, description = "ISBN used by another book.", body = MessageResponse),
    ),
    tag = "books"
)]
/// Replaces every field of a book. The ISBN check is skipped when the ISBN is
/// unchanged; the author is always re-checked.
#[instrument(skip(pool, payload))]
pub async fn update_book(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const FAILED: &str = "Failed to update book";

    let id = parse_id(&id, ENTER_BOOK_ID, INVALID_BOOK_ID)?;

    let current = find_active_book(&pool, id)
        .await
        .map_err(ApiError::database("Failed to find book"))?
        .ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;

    let request = json_body(payload)?;
    let fields = validated_fields(&request)?;

    if fields.isbn != current.isbn
        && isbn_taken(&pool, &fields.isbn, Some(id))
            .await
            .map_err(ApiError::database(FAILED))?
    {
        return Err(ApiError::Conflict(ISBN_EXISTS));
    }

    ensure_author(&pool, fields.author_id).await?;

    let book = update_book_record(&pool, id, &fields, FAILED)
        .await?
        .ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;
    Ok(DataResponse::new(book).with_status(StatusCode::OK))
}

#[utoipa::path(
    delete,
    path = "/api/book/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book removed.", body = MessageResponse),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No book with this id.", body = MessageResponse),
    ),
    tag = "books"
)]
/// Permanently removes a book, including a soft-deleted one.
#[instrument(skip(pool))]
pub async fn delete_book(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_BOOK_ID, INVALID_BOOK_ID)?;
    let deleted = delete_book_record(&pool, id)
        .await
        .map_err(ApiError::database("Failed to delete book"))?;
    if !deleted {
        return Err(ApiError::NotFound(BOOK_NOT_FOUND));
    }
    info!(book_id = id, "book deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("Book deleted successfully")),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/book/softdelete/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book hidden from reads.", body = MessageResponse),
        (status = 400, description = "Malformed id.", body = MessageResponse),
        (status = 404, description = "No active book with this id.", body = MessageResponse),
    ),
    tag = "books"
)]
#[instrument(skip(pool))]
pub async fn soft_delete_book(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, ENTER_BOOK_ID, INVALID_BOOK_ID)?;
    let deleted = soft_delete_book_record(&pool, id)
        .await
        .map_err(ApiError::database("Failed to soft delete book"))?;
    if !deleted {
        return Err(ApiError::NotFound(BOOK_NOT_FOUND));
    }
    info!(book_id = id, "book soft deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("Book soft deleted successfully")),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/book/search/{title}",
    params(("title" = String, Path, description = "Substring to look for in titles (case-sensitive)")),
    responses(
        (status = 200, description = "Matching active books; empty when nothing matches.", body = DataResponse<Vec<BookResponse>>),
        (status = 400, description = "Empty search term.", body = MessageResponse),
    ),
    tag = "books"
)]
#[instrument(skip(pool))]
pub async fn search_books(
    Path(title): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Response, ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest(TITLE_REQUIRED));
    }
    let books = search_books_by_title(&pool, &title)
        .await
        .map_err(ApiError::database("Failed to search books"))?;
    Ok(DataResponse::new(books).with_status(StatusCode::OK))
}
