//! Scripted in-memory device client
//!
//! Robots are registered per host. A host without a robot behaves like an
//! unreachable address; a robot with a password reports itself locked until
//! it is connected with that exact password.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::{
    ClientError, ClientResult, DeviceClient, Robot, RobotCommand, RobotConnection, RobotStatus,
};

/// A simulated robot
#[derive(Debug)]
pub struct MockRobot {
    pub unique_id: String,
    pub user_name: String,
    pub model: String,
    pub firmware: String,
    pub port: u16,
    password: Option<String>,
    status: Mutex<RobotStatus>,
    fail_updates: AtomicBool,
    commands: Mutex<Vec<RobotCommand>>,
}

impl MockRobot {
    pub fn new(unique_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            user_name: user_name.into(),
            model: "ROMY C5".to_string(),
            firmware: "1.0.7".to_string(),
            port: 8080,
            password: None,
            status: Mutex::new(RobotStatus::default()),
            fail_updates: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Lock the local interface behind a password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_status(self, status: RobotStatus) -> Self {
        *self.status.lock().unwrap() = status;
        self
    }

    /// Replace the status returned by subsequent updates
    pub fn set_status(&self, status: RobotStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Make subsequent updates fail as if the robot dropped off the network
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<RobotCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn accepts(&self, password: &str) -> bool {
        self.password.as_deref().map_or(true, |p| p == password)
    }
}

/// Device client backed by [`MockRobot`]s
#[derive(Debug, Default)]
pub struct MockDeviceClient {
    robots: Mutex<HashMap<String, Arc<MockRobot>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockDeviceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a robot at `host`, returning a handle to inspect it later
    pub fn add_robot(&self, host: impl Into<String>, robot: MockRobot) -> Arc<MockRobot> {
        let robot = Arc::new(robot);
        self.robots
            .lock()
            .unwrap()
            .insert(host.into(), robot.clone());
        robot
    }

    /// Take the robot at `host` off the network
    pub fn remove_robot(&self, host: &str) -> Option<Arc<MockRobot>> {
        self.robots.lock().unwrap().remove(host)
    }

    /// All `(host, password)` pairs `connect` was called with
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    async fn connect(&self, host: &str, password: &str) -> Arc<dyn Robot> {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), password.to_string()));

        let robot = self.robots.lock().unwrap().get(host).cloned();
        let connection = match &robot {
            Some(robot) => RobotConnection {
                host: host.to_string(),
                initialized: true,
                unlocked: robot.accepts(password),
                unique_id: robot.unique_id.clone(),
                user_name: robot.user_name.clone(),
                port: robot.port,
                model: robot.model.clone(),
                firmware: robot.firmware.clone(),
            },
            None => RobotConnection::unreachable(host),
        };
        debug!(
            "Connected to {}: initialized={} unlocked={}",
            host, connection.initialized, connection.unlocked
        );

        Arc::new(MockRobotHandle { connection, robot })
    }
}

struct MockRobotHandle {
    connection: RobotConnection,
    robot: Option<Arc<MockRobot>>,
}

impl MockRobotHandle {
    fn usable_robot(&self) -> ClientResult<&MockRobot> {
        let robot = self.robot.as_deref().ok_or_else(|| ClientError::Unreachable {
            host: self.connection.host.clone(),
        })?;
        if robot.fail_updates.load(Ordering::SeqCst) {
            return Err(ClientError::Unreachable {
                host: self.connection.host.clone(),
            });
        }
        if !self.connection.unlocked {
            return Err(ClientError::Locked {
                host: self.connection.host.clone(),
            });
        }
        Ok(robot)
    }
}

#[async_trait]
impl Robot for MockRobotHandle {
    fn connection(&self) -> RobotConnection {
        self.connection.clone()
    }

    async fn update(&self) -> ClientResult<RobotStatus> {
        let robot = self.usable_robot()?;
        let status = robot.status.lock().unwrap().clone();
        Ok(status)
    }

    async fn send_command(&self, command: RobotCommand) -> ClientResult<()> {
        let robot = self.usable_robot()?;
        trace!("Robot at {} received {:?}", self.connection.host, command);
        robot.commands.lock().unwrap().push(command);
        Ok(())
    }
}
