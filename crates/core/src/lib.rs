#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models and pure logic for the draw keeper daemon.

pub mod api;
pub mod error;
pub mod model;
pub mod projection;

mod util;

pub use error::RemoteError;
pub use projection::project;
pub use util::{new_ulid, now_secs};
