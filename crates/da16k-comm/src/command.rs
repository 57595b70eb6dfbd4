//! Cloud-to-device commands.

use std::fmt;

/// A command received from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    /// Command name.
    pub command: String,
    /// Everything after the first space, if there was one.
    pub parameters: Option<String>,
}

impl DeviceCommand {
    /// Split a `+NWICGETCMD` payload on its first space.
    pub fn parse(payload: &str) -> Self {
        match payload.split_once(' ') {
            Some((command, parameters)) => DeviceCommand {
                command: command.to_string(),
                parameters: Some(parameters.to_string()),
            },
            None => DeviceCommand {
                command: payload.to_string(),
                parameters: None,
            },
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameters {
            Some(parameters) => write!(f, "{} {}", self.command, parameters),
            None => write!(f, "{}", self.command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_with_parameters() {
        let cmd = DeviceCommand::parse("set-led red blink");
        assert_eq!(cmd.command, "set-led");
        assert_eq!(cmd.parameters.as_deref(), Some("red blink"));
        assert_eq!(cmd.to_string(), "set-led red blink");
    }

    #[test]
    fn test_command_without_parameters() {
        let cmd = DeviceCommand::parse("reboot");
        assert_eq!(cmd.command, "reboot");
        assert_eq!(cmd.parameters, None);
    }

    #[test]
    fn test_trailing_space_gives_empty_parameters() {
        let cmd = DeviceCommand::parse("reboot ");
        assert_eq!(cmd.command, "reboot");
        assert_eq!(cmd.parameters.as_deref(), Some(""));
    }
}
