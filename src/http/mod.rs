//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID and trace layers)
//!     → request.rs (host extraction, buffer into OutboundRequest)
//!     → [proxy dispatcher resolves service, authorizes, forwards]
//!     → response.rs (strip hop-by-hop headers, stream body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{OutboundRequest, ACCESS_TOKEN, X_REQUEST_ID};
pub use server::{invalid_state_router, serve_invalid_state, HttpServer, ServerError};
