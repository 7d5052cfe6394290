//! Remote device server seam
//!
//! The connection manager talks to the device server only through the
//! [`RemoteClient`] and [`ClientFactory`] traits. A simulated server is
//! provided for tests and offline runs.

mod mock;
mod traits;

pub use mock::{MockClient, MockConfig, MockServer, RemoteCall};
pub use traits::*;
