//! SQL access for the `authors` table.
//!
//! Reads only see active rows (`deleted_at IS NULL`) except where noted. Writes
//! map constraint violations to the same conflicts the handlers pre-check.

use sqlx::PgPool;
use tracing::{Instrument, info_span};

use super::{EMAIL_EXISTS, ID_EXISTS, types::AuthorResponse};
use crate::api::handlers::error::{ApiError, is_constraint_violation, is_unique_violation};

pub(super) async fn fetch_authors(pool: &PgPool) -> Result<Vec<AuthorResponse>, sqlx::Error> {
    let query = r"
        SELECT id, name, email
        FROM authors
        WHERE deleted_at IS NULL
        ORDER BY id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(AuthorResponse::from_row).collect())
}

/// Active author by id. Also used by the book handlers to resolve references.
pub(crate) async fn find_active_author(
    pool: &PgPool,
    id: i64,
) -> Result<Option<AuthorResponse>, sqlx::Error> {
    let query = r"
        SELECT id, name, email
        FROM authors
        WHERE id = $1 AND deleted_at IS NULL
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
    Ok(row.as_ref().map(AuthorResponse::from_row))
}

/// Whether any row, active or soft-deleted, already uses `id`.
pub(super) async fn author_id_taken(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS (SELECT 1 FROM authors WHERE id = $1)";
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

/// Whether an active author other than `exclude_id` uses `email`.
pub(super) async fn email_taken(
    pool: &PgPool,
    email: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let query = r"
        SELECT EXISTS (
            SELECT 1 FROM authors
            WHERE email = $1
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
        .bind(email)
        .bind(exclude_id)
        .fetch_one(pool)
        .instrument(span)
        .await
}

/// Inserts an author. An explicit id advances the id sequence in the same
/// transaction so later generated ids skip past it.
pub(crate) async fn insert_author_record(
    pool: &PgPool,
    id: Option<i64>,
    name: &str,
    email: &str,
    failure: &'static str,
) -> Result<AuthorResponse, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::database(failure))?;

    let row = match id {
        Some(id) => {
            let query = r"
                INSERT INTO authors (id, name, email)
                VALUES ($1, $2, $3)
                RETURNING id, name, email
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(name)
                .bind(email)
                .fetch_one(&mut *tx)
                .instrument(span)
                .await
        }
        None => {
            let query = r"
                INSERT INTO authors (name, email)
                VALUES ($1, $2)
                RETURNING id, name, email
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(name)
                .bind(email)
                .fetch_one(&mut *tx)
                .instrument(span)
                .await
        }
    }
    .map_err(|err| write_error(err, failure))?;

    if id.is_some() {
        let query = r"
            SELECT setval(
                pg_get_serial_sequence('authors', 'id'),
                GREATEST((SELECT MAX(id) FROM authors), 1)
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

    Ok(AuthorResponse::from_row(&row))
}

/// Replaces name and email of an active author. `None` when the row is gone.
pub(crate) async fn update_author_record(
    pool: &PgPool,
    id: i64,
    name: &str,
    email: &str,
    failure: &'static str,
) -> Result<Option<AuthorResponse>, ApiError> {
    let query = r"
        UPDATE authors
        SET name = $2, email = $3
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING id, name, email
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| write_error(err, failure))?;

    Ok(row.as_ref().map(AuthorResponse::from_row))
}

/// Removes the row whether or not it was soft-deleted. Books follow via cascade.
pub(super) async fn delete_author_record(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM authors WHERE id = $1";
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

pub(super) async fn soft_delete_author_record(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE authors
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
    if is_constraint_violation(&err, "authors_pkey") {
        ApiError::Conflict(ID_EXISTS)
    } else if is_unique_violation(&err) {
        ApiError::Conflict(EMAIL_EXISTS)
    } else {
        ApiError::database(failure)(err)
    }
}
