//! # Libris (Library Management API)
//!
//! `libris` is a small CRUD service for a library's authors and books, backed by
//! PostgreSQL.
//!
//! ## Resources
//!
//! - **Authors** have a name and an email. Emails are unique among active authors.
//! - **Books** have a title, an ISBN, a published date and exactly one author.
//!   ISBNs are unique among active books, and every book response embeds its author.
//!
//! ## Deletes
//!
//! Both resources support two kinds of delete:
//!
//! - **Soft delete** sets `deleted_at`. The row stays for history but disappears
//!   from every list, get and search. Soft-deleted rows do not reserve their
//!   email/ISBN, so new records can reuse them.
//! - **Hard delete** removes the row even if it was already soft-deleted.
//!   Hard-deleting an author cascades to its books.
//!
//! ## Integrity
//!
//! Handlers validate input and check uniqueness and author existence before writing,
//! so callers get precise `400`/`404`/`409` messages. The database constraints stay
//! authoritative: a unique violation raced past the pre-check still maps to `409`.
//!
//! ## Notifications
//!
//! Changing an author's email enqueues a notification in the `email_outbox` table
//! after the update is stored. A background worker delivers it; delivery problems
//! never affect the API response.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
