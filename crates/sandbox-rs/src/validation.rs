//! Validation of C configuration records

use sandbox_core::{Result, SandboxError};

use crate::abi::{MAX_ENVIRONMENT_VARIABLES, MAX_POLICY, SandboxConfiguration};

/// Check a configuration record before anything is copied out of it.
///
/// Only pointer presence is checked; string contents are read later by
/// [`TaskConfig::from_raw`](crate::config::TaskConfig::from_raw).
pub fn validate_configuration(config: Option<&SandboxConfiguration>) -> Result<()> {
    let Some(config) = config else {
        return Err(invalid("configuration cannot be null"));
    };

    if config.TaskName.is_null() || config.UserCommand.is_null() {
        return Err(invalid("TaskName and UserCommand must be set"));
    }

    if config.Policy < 0 || config.Policy >= MAX_POLICY {
        return Err(invalid("Policy value is out of range"));
    }

    if config.EnvironmentVariablesCount > MAX_ENVIRONMENT_VARIABLES {
        return Err(SandboxError::InvalidConfig(format!(
            "EnvironmentVariablesCount exceeds {}",
            MAX_ENVIRONMENT_VARIABLES
        )));
    }

    if config.EnvironmentVariablesCount > 0 && config.EnvironmentVariables.is_null() {
        return Err(invalid(
            "EnvironmentVariables cannot be null when EnvironmentVariablesCount is not zero",
        ));
    }

    config.limits().validate()
}

fn invalid(message: &str) -> SandboxError {
    SandboxError::InvalidConfig(message.to_string())
}
