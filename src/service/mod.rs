//! CrudService: what the generic handlers call, and its repository-backed implementation.

mod crud;
pub use crud::{CrudService, RepositoryService};
