//! # irlbot-obs
//!
//! Remote control of OBS Studio through obs-websocket v5.
//!
//! - [`ObsClient`]: WebSocket connection with the identification handshake
//!   and request/response correlation
//! - [`ObsRpc`]: the request seam the controller depends on
//! - [`StreamController`]: idempotent start/stop, scene switching, status
//! - [`testing::FakeObs`]: in-memory double used by tests

#![deny(unsafe_code)]

pub mod client;
pub mod controller;
pub mod errors;
pub mod protocol;
pub mod rpc;
pub mod testing;

pub use client::ObsClient;
pub use controller::{RemoteStreamStatus, StreamController};
pub use errors::ObsError;
pub use rpc::ObsRpc;
