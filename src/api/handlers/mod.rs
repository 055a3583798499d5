//! HTTP handlers for the library API.
//!
//! `authors` and `books` own their SQL in a `storage` submodule and their wire
//! types in `types`. `error` holds the shared JSON envelope and `validation`
//! the input checks both resources use.

pub mod authors;
pub mod books;
pub mod error;
pub mod health;
pub mod root;
pub mod validation;
