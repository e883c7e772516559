//! Token service - issues short-lived signed access credentials over HTTP
//!
//! Clients ask for an RTC, RTM, combined RTC+RTM, or chat credential by path
//! parameters or a JSON body. Requests are resolved into a validated
//! [`request::RequestRecord`], dispatched to a [`builder::TokenBuilder`], and
//! answered as JSON. Origin admission and bounded graceful shutdown live in
//! [`server`].

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod server;

pub use builder::{AccessToken, AccessTokenBuilder, BuildError, Role, TokenBuilder};
pub use config::{ConfigError, ServiceConfig};
pub use dispatch::{Credential, Dispatcher, Issued};
pub use error::TokenError;
pub use server::{LifecycleState, OriginPolicy, TokenService};
