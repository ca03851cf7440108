//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, CORS, trace, request id)
//!     → request.rs (correlation context, request logging)
//!     → handlers/ (validate, call services or the bus)
//!     → response.rs (JSON error document, correlation headers)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use response::X_CORRELATION_ID;
pub use server::{AppState, HttpServer};
