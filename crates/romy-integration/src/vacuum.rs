//! Vacuum platform
//!
//! The robot itself: cleaning status, battery, fan speed and the commands
//! that drive it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use romy_client::{ClientError, Robot, RobotCommand, StatusMap};
use romy_core::states::STATE_UNKNOWN;
use romy_core::{Context, EntityIdError, Platform, State, ICON};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::entity::RomyEntity;

/// Errors from vacuum commands
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VacuumError {
    #[error("unknown fan speed: {0}")]
    UnknownFanSpeed(String),

    #[error(transparent)]
    Robot(#[from] ClientError),
}

/// Fan speeds, in the order of the robot's cleaning parameter sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSpeed {
    Default,
    Normal,
    Silent,
    Intensive,
    SuperSilent,
    High,
    Auto,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 7] = [
        FanSpeed::Default,
        FanSpeed::Normal,
        FanSpeed::Silent,
        FanSpeed::Intensive,
        FanSpeed::SuperSilent,
        FanSpeed::High,
        FanSpeed::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Default => "Default",
            FanSpeed::Normal => "Normal",
            FanSpeed::Silent => "Silent",
            FanSpeed::Intensive => "Intensive",
            FanSpeed::SuperSilent => "Super_Silent",
            FanSpeed::High => "High",
            FanSpeed::Auto => "Auto",
        }
    }

    /// Cleaning parameter set index
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanSpeed {
    type Err = VacuumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|speed| speed.as_str() == s)
            .copied()
            .ok_or_else(|| VacuumError::UnknownFanSpeed(s.to_string()))
    }
}

/// Supported vacuum feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VacuumFeatures(u32);

impl VacuumFeatures {
    pub const TURN_ON: Self = Self(1);
    pub const TURN_OFF: Self = Self(2);
    pub const PAUSE: Self = Self(4);
    pub const STOP: Self = Self(8);
    pub const RETURN_HOME: Self = Self(16);
    pub const FAN_SPEED: Self = Self(32);
    pub const BATTERY: Self = Self(64);
    pub const STATUS: Self = Self(128);
    pub const SEND_COMMAND: Self = Self(256);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Features of every ROMY robot
pub const SUPPORTED_FEATURES: VacuumFeatures = VacuumFeatures::BATTERY
    .union(VacuumFeatures::PAUSE)
    .union(VacuumFeatures::RETURN_HOME)
    .union(VacuumFeatures::SEND_COMMAND)
    .union(VacuumFeatures::STATUS)
    .union(VacuumFeatures::STOP)
    .union(VacuumFeatures::TURN_OFF)
    .union(VacuumFeatures::TURN_ON)
    .union(VacuumFeatures::FAN_SPEED);

/// The robot as a vacuum entity
pub struct RomyVacuum {
    entity: RomyEntity,
    robot: Arc<dyn Robot>,
    /// Fan speed used when a cleaning run starts
    fan_speed: AtomicU8,
    is_on: AtomicBool,
}

impl RomyVacuum {
    /// Create the vacuum, taking the initial fan speed from `status`
    pub fn new(robot: Arc<dyn Robot>, status: &dyn StatusMap) -> Result<Self, EntityIdError> {
        let entity = RomyEntity::for_robot(Platform::Vacuum, &robot.connection())?;
        let fan_speed = status
            .cleaning_parameter_set()
            .and_then(FanSpeed::from_index)
            .unwrap_or(FanSpeed::Default);

        Ok(Self {
            entity,
            robot,
            fan_speed: AtomicU8::new(fan_speed.index()),
            is_on: AtomicBool::new(false),
        })
    }

    pub fn base(&self) -> &RomyEntity {
        &self.entity
    }

    pub fn supported_features(&self) -> VacuumFeatures {
        SUPPORTED_FEATURES
    }

    pub fn fan_speed_list(&self) -> Vec<&'static str> {
        FanSpeed::ALL.iter().map(FanSpeed::as_str).collect()
    }

    /// Fan speed the next cleaning run starts with
    pub fn fan_speed(&self) -> FanSpeed {
        FanSpeed::from_index(self.fan_speed.load(Ordering::SeqCst)).unwrap_or(FanSpeed::Default)
    }

    /// Whether a cleaning run was started from here and not stopped since
    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::SeqCst)
    }

    async fn send(&self, command: RobotCommand) -> Result<(), VacuumError> {
        debug!("Sending {} to {}", command, self.entity.name());
        self.robot.send_command(command).await?;
        Ok(())
    }

    /// Start cleaning, or continue a paused run, with the current fan speed
    pub async fn turn_on(&self) -> Result<(), VacuumError> {
        self.send(RobotCommand::CleanStartOrContinue {
            cleaning_parameter_set: self.fan_speed().index(),
        })
        .await?;
        self.is_on.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop cleaning and go back to the dock
    pub async fn turn_off(&self) -> Result<(), VacuumError> {
        self.return_to_base().await
    }

    pub async fn stop(&self) -> Result<(), VacuumError> {
        self.send(RobotCommand::Stop).await?;
        self.is_on.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), VacuumError> {
        self.stop().await
    }

    /// Pause a running clean, start one otherwise
    pub async fn start_pause(&self) -> Result<(), VacuumError> {
        if self.is_on() {
            self.pause().await
        } else {
            self.turn_on().await
        }
    }

    pub async fn return_to_base(&self) -> Result<(), VacuumError> {
        self.send(RobotCommand::GoHome).await?;
        self.is_on.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Switch the fan speed; unknown names are rejected before anything is sent
    pub async fn set_fan_speed(&self, fan_speed: &str) -> Result<(), VacuumError> {
        let speed: FanSpeed = fan_speed.parse()?;
        self.send(RobotCommand::SwitchCleaningParameterSet {
            cleaning_parameter_set: speed.index(),
        })
        .await?;
        self.fan_speed.store(speed.index(), Ordering::SeqCst);
        Ok(())
    }

    /// Pass a command through to the robot verbatim
    pub async fn send_command(
        &self,
        command: &str,
        params: Vec<(String, String)>,
    ) -> Result<(), VacuumError> {
        self.send(RobotCommand::Raw {
            name: command.to_string(),
            params,
        })
        .await
    }

    pub fn project(
        &self,
        status: Option<&dyn StatusMap>,
        available: bool,
        context: &Context,
    ) -> State {
        let mut attributes: HashMap<String, Value> = HashMap::new();
        attributes.insert("icon".to_string(), json!(ICON));
        attributes.insert(
            "supported_features".to_string(),
            json!(self.supported_features().bits()),
        );
        attributes.insert("fan_speed_list".to_string(), json!(self.fan_speed_list()));

        if !available {
            return self.entity.unavailable(attributes, context);
        }

        let fan_speed = status
            .and_then(|s| s.cleaning_parameter_set())
            .and_then(FanSpeed::from_index)
            .unwrap_or_else(|| self.fan_speed());
        attributes.insert("fan_speed".to_string(), json!(fan_speed.as_str()));

        if let Some(battery) = status.and_then(|s| s.sensor("battery_level")) {
            attributes.insert("battery_level".to_string(), json!(battery));
        }

        let state = status.and_then(|s| s.mode()).unwrap_or(STATE_UNKNOWN);
        self.entity.state(state, attributes, context)
    }
}
