//! Request/response types for the author API.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.

use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use utoipa::ToSchema;

/// Body for `POST /api/author`. Missing fields are reported as validation errors.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateAuthorRequest {
    /// Optional explicit id; assigned by the database when omitted.
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Body for `PUT /api/author/{id}`. The id comes from the path.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateAuthorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl AuthorResponse {
    pub(crate) fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
        }
    }
}
