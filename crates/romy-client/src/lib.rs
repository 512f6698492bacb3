//! ROMY device client seams
//!
//! The actual HTTP handshake with a robot's local interface is owned by an
//! external client library. This crate defines what the integration needs
//! from it:
//!
//! - [`DeviceClient`] - connects to a robot given a host and password
//! - [`Robot`] - a connected robot: identity, live status, commands
//! - [`DiscoverySource`] - local network announcements of robots
//!
//! With the `test-util` feature, [`mock`] provides a scripted in-memory
//! implementation used by the tests of the other crates.

mod command;
mod discovery;
mod error;
mod robot;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use async_trait::async_trait;
use std::sync::Arc;

pub use command::RobotCommand;
pub use discovery::{DiscoverySource, ZeroconfServiceInfo, ATTR_PROPERTIES_ID};
pub use error::{ClientError, ClientResult};
pub use robot::{RobotConnection, RobotStatus, StatusMap};

/// Connects to robots on the local network
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Attempt a connection to the robot at `host`
    ///
    /// An empty `password` probes the robot without unlocking it. Connecting
    /// never fails with an error: an unreachable robot is reported through
    /// [`RobotConnection::initialized`] being `false`.
    async fn connect(&self, host: &str, password: &str) -> Arc<dyn Robot>;
}

/// A robot handle returned by [`DeviceClient::connect`]
#[async_trait]
pub trait Robot: Send + Sync {
    /// Identity and lock state observed when the handle was created
    fn connection(&self) -> RobotConnection;

    /// Fetch the robot's current status
    async fn update(&self) -> ClientResult<RobotStatus>;

    /// Send a command to the robot
    async fn send_command(&self, command: RobotCommand) -> ClientResult<()>;
}
