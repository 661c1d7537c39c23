//! Network gateway: one owner of the rig, served over HTTP.

pub mod routes;
pub mod state;

pub use routes::{router, ApiError};
pub use state::{Gateway, GatewayState, StatusReport};
