//! # todo_core
//!
//! Core domain logic for the Todo API: credential hashing, token issuance,
//! session persistence and todo storage.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod todos;
