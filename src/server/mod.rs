//! HTTP server for the docroute document service.

pub mod operations;
pub mod routes;
pub mod secret;
pub mod status;

pub use routes::serve;
