//! SQL access for the `books` table.
//!
//! Every read joins the owning author so responses can embed it.

use sqlx::PgPool;
use tracing::{Instrument, info_span};

use super::{ID_EXISTS, ISBN_EXISTS, types::BookResponse};
use crate::api::handlers::{
    authors::AUTHOR_NOT_FOUND,
    error::{ApiError, is_constraint_violation, is_foreign_key_violation, is_unique_violation},
    validation::escape_like,
};

/// Validated values for an insert or update.
#[derive(Debug)]
pub(crate) struct BookFields {
    pub title: String,
    pub isbn: String,
    pub published_date: chrono::DateTime<chrono::Utc>,
    pub author_id: i64,
}

pub(super) async fn fetch_books(pool: &PgPool) -> Result<Vec<BookResponse>, sqlx::Error> {
    let query = r"
        SELECT b.id, b.title, b.isbn, b.published_date, b.author_id,
               a.name AS author_name, a.email AS author_email
        FROM books b
        JOIN authors a ON a.id = b.author_id
        WHERE b.deleted_at IS NULL
        ORDER BY b.id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(BookResponse::from_row).collect())
}

pub(super) async fn find_active_book(
    pool: &PgPool,
    id: i64,
) -> Result<Option<BookResponse>, sqlx::Error> {
    let query = r"
        SELECT b.id, b.title, b.isbn, b.published_date, b.author_id,
               a.name AS author_name, a.email AS author_email
        FROM books b
        JOIN authors a ON a.id = b.author_id
        WHERE b.id = $1 AND b.deleted_at IS NULL
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(BookResponse::from_row))
}

/// Active books whose title contains `title`, case-sensitively.
pub(super) async fn search_books_by_title(
    pool: &PgPool,
    title: &str,
) -> Result<Vec<BookResponse>, sqlx::Error> {
    let query = r"
        SELECT b.id, b.title, b.isbn, b.published_date, b.author_id,
               a.name AS author_name, a.email AS author_email
        FROM books b
        JOIN authors a ON a.id = b.author_id
        WHERE b.deleted_at IS NULL
          AND b.title LIKE $1 ESCAPE '\'
        ORDER BY b.id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(format!("%{}%", escape_like(title)))
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(BookResponse::from_row).collect())
}

/// Whether any row, active or soft-deleted, already uses `id`.
pub(super) async fn book_id_taken(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    sqlx::query_scalar(query)
        .bind(id)
        .fetch_one(pool)
        .instrument(span)
        .await
}

/// Whether an active book other than `exclude_id` uses `isbn`.
pub(super) async fn isbn_taken(
    pool: &PgPool,
    isbn: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let query = r"
        SELECT EXISTS (
            SELECT 1 FROM books
            WHERE isbn = $1
              AND deleted_at IS NULL
              AND ($2::BIGINT IS NULL OR id <> $2)
        )
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    sqlx::query_scalar(query)
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(pool)
        .instrument(span)
        .await
}

/// Inserts a book and returns it with its author. An explicit id advances the
/// id sequence in the same transaction.
pub(crate) async fn insert_book_record(
    pool: &PgPool,
    id: Option<i64>,
    fields: &BookFields,
    failure: &'static str,
) -> Result<BookResponse, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database(failure))?;

    let query = r"
        WITH inserted AS (
            INSERT INTO books (id, title, isbn, published_date, author_id)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('books', 'id'))), $2, $3, $4, $5)
            RETURNING id, title, isbn, published_date, author_id
        )
        SELECT i.id, i.title, i.isbn, i.published_date, i.author_id,
               a.name AS author_name, a.email AS author_email
        FROM inserted i
        JOIN authors a ON a.id = i.author_id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.isbn)
        .bind(fields.published_date)
        .bind(fields.author_id)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .map_err(|err| write_error(err, failure))?;

    if id.is_some() {
        let query = r"
            SELECT setval(
                pg_get_serial_sequence('books', 'id'),
                GREATEST((SELECT MAX(id) FROM books), 1)
            )
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(ApiError::database(failure))?;
    }

    tx.commit().await.map_err(ApiError::database(failure))?;

    Ok(BookResponse::from_row(&row))
}

/// Replaces every field of an active book. `None` when the row is gone.
pub(crate) async fn update_book_record(
    pool: &PgPool,
    id: i64,
    fields: &BookFields,
    failure: &'static str,
) -> Result<Option<BookResponse>, ApiError> {
    let query = r"
        WITH updated AS (
            UPDATE books
            SET title = $2, isbn = $3, published_date = $4, author_id = $5
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, title, isbn, published_date, author_id
        )
        SELECT u.id, u.title, u.isbn, u.published_date, u.author_id,
               a.name AS author_name, a.email AS author_email
        FROM updated u
        JOIN authors a ON a.id = u.author_id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.isbn)
        .bind(fields.published_date)
        .bind(fields.author_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| write_error(err, failure))?;

    Ok(row.as_ref().map(BookResponse::from_row))
}

/// Removes the row whether or not it was soft-deleted.
pub(super) async fn delete_book_record(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM books WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn soft_delete_book_record(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE books
        SET deleted_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn write_error(err: sqlx::Error, failure: &'static str) -> ApiError {
    if is_constraint_violation(&err, "books_pkey") {
        ApiError::Conflict(ID_EXISTS)
    } else if is_unique_violation(&err) {
        ApiError::Conflict(ISBN_EXISTS)
    } else if is_foreign_key_violation(&err) {
        ApiError::BadRequest(AUTHOR_NOT_FOUND)
    } else {
        ApiError::database(failure)(err)
    }
}
