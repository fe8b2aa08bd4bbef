//! Remote gateway: the typed boundary to the REST service.
//!
//! [`Transport`] moves bytes and classifies statuses; [`RemoteGateway`] adds
//! endpoint paths and JSON (de)serialization on top of it.

mod error;
mod gateway;
mod http;
mod transport;
pub mod wire;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{classify, RemoteError};
pub use gateway::RemoteGateway;
pub use http::{HttpTransport, API_PREFIX};
pub use transport::Transport;
pub use wire::{FamilyMemberDto, ImageRef, MealDto, RecordEatenRequest};
