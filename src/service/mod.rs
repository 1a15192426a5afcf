//! CrudService: generic CRUD and listings over a record store.

mod crud;
mod validation;
pub use crud::CrudService;
pub use validation::RequestValidator;
