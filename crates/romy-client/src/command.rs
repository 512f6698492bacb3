//! Commands understood by a robot's local interface

use serde::{Deserialize, Serialize};
use std::fmt;

/// A command sent to a robot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RobotCommand {
    /// Start a cleaning run, or continue a paused one
    CleanStartOrContinue { cleaning_parameter_set: u8 },
    /// Stop the current run
    Stop,
    /// Drive back to the docking station
    GoHome,
    /// Change the cleaning parameter set (fan speed) of the current run
    SwitchCleaningParameterSet { cleaning_parameter_set: u8 },
    /// Any other command, passed through verbatim
    Raw {
        name: String,
        #[serde(default)]
        params: Vec<(String, String)>,
    },
}

impl RobotCommand {
    /// Name of the command on the robot's interface
    pub fn name(&self) -> &str {
        match self {
            RobotCommand::CleanStartOrContinue { .. } => "clean_start_or_continue",
            RobotCommand::Stop => "stop",
            RobotCommand::GoHome => "go_home",
            RobotCommand::SwitchCleaningParameterSet { .. } => "switch_cleaning_parameter_set",
            RobotCommand::Raw { name, .. } => name,
        }
    }

    /// Query parameters of the command
    pub fn params(&self) -> Vec<(String, String)> {
        match self {
            RobotCommand::CleanStartOrContinue {
                cleaning_parameter_set,
            }
            | RobotCommand::SwitchCleaningParameterSet {
                cleaning_parameter_set,
            } => vec![(
                "cleaning_parameter_set".to_string(),
                cleaning_parameter_set.to_string(),
            )],
            RobotCommand::Stop | RobotCommand::GoHome => Vec::new(),
            RobotCommand::Raw { params, .. } => params.clone(),
        }
    }
}

impl fmt::Display for RobotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set/{}", self.name())?;
        for (i, (key, value)) in self.params().iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RobotCommand::GoHome.to_string(), "set/go_home");
        assert_eq!(
            RobotCommand::CleanStartOrContinue {
                cleaning_parameter_set: 3
            }
            .to_string(),
            "set/clean_start_or_continue?cleaning_parameter_set=3"
        );
        assert_eq!(
            RobotCommand::Raw {
                name: "set_volume".to_string(),
                params: vec![
                    ("volume".to_string(), "4".to_string()),
                    ("mute".to_string(), "0".to_string())
                ],
            }
            .to_string(),
            "set/set_volume?volume=4&mute=0"
        );
    }
}
