//! Request relay for the remote API.
//!
//! Every `sign` or `proxy` call walks the same steps and stops at the first
//! failure:
//! - the integration must be enabled for the course's account
//! - the caller must hold a role in the course
//! - `http_method`, `http_path` and `http_parameters` must be valid
//! - the request is signed, and for `proxy` sent once to the remote API

mod client;
mod config;
mod policy;
mod types;

pub use client::Relay;
pub use config::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, RawRelayConfig, RelayConfig};
pub use policy::{MANAGER_RIGHTS, STUDENT_RIGHTS, resolve_role};
pub use types::{EnabledResponse, ProxyContent, ProxyResponse, SignParams, SignResponse};
