//! HTTP handlers for generic entity CRUD.

pub mod crud;
pub use crud::*;
