//! Request/response types for the book API.
//!
//! Field names follow the public wire format (`publishedDate`, `authorID`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use utoipa::ToSchema;

use crate::api::handlers::authors::types::AuthorResponse;

/// Flat body shared by `POST /api/book` and `PUT /api/book/{id}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct BookRequest {
    /// Optional explicit id on create; ignored on update.
    pub id: Option<i64>,
    pub title: Option<String>,
    pub isbn: Option<String>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(rename = "authorID")]
    pub author_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub isbn: String,
    #[serde(rename = "publishedDate")]
    pub published_date: DateTime<Utc>,
    #[serde(rename = "authorID")]
    pub author_id: i64,
    pub author: AuthorResponse,
}

impl BookResponse {
    /// Expects the book columns plus `author_name` and `author_email`.
    pub(super) fn from_row(row: &PgRow) -> Self {
        let author_id: i64 = row.get("author_id");
        Self {
            id: row.get("id"),
            title: row.get("title"),
            isbn: row.get("isbn"),
            published_date: row.get("published_date"),
            author_id,
            author: AuthorResponse {
                id: author_id,
                name: row.get("author_name"),
                email: row.get("author_email"),
            },
        }
    }
}
