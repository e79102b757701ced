//! Line-delimited JSON protocol between the host and the daemon. Each method
//! family lives in its own handler module; the router tries them in turn.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Request};
