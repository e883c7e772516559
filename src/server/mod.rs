//! HTTP surface of the token service
//!
//! Routes, origin admission, error responses, and the listen/shutdown
//! lifecycle.

mod error;
mod lifecycle;
mod origin;
mod routes;

pub use error::{ApiError, ErrorBody};
pub use lifecycle::{
    LifecycleError, LifecycleState, ShutdownHandle, TokenService, SHUTDOWN_GRACE,
};
pub use origin::OriginPolicy;
pub use routes::{build_router, AppState};
