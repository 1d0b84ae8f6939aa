//! State and control of the DHCP and DNS services.
//!
//! State checks run unprivileged. Control actions go through the privileged
//! runner, see `ApplyEngine::control_service`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::Serialize;
use tokio::process::Command;
use crate::config::ServicesConfig;
use crate::error::ValidationError;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Reload => "reload",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            "reload" => Ok(ServiceAction::Reload),
            _ => Err(ValidationError::InvalidAction(s.trim().to_string())),
        }
    }
}

/// Only the configured DHCP and DNS services may be named
pub fn resolve<'a>(config: &'a ServicesConfig, service: &str) -> Result<&'a str, ValidationError> {
    config
        .managed()
        .into_iter()
        .find(|name| *name == service.trim())
        .ok_or_else(|| ValidationError::UnknownService(service.trim().to_string()))
}

/// Anything but `active` on stdout reads as stopped. A check that cannot run
/// is unknown.
pub async fn query(config: &ServicesConfig, service: &str) -> ServiceState {
    let Some((program, args)) = config.status_command.split_first() else {
        return ServiceState::Unknown;
    };

    let output = Command::new(program)
        .args(args)
        .arg(service)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(STATUS_TIMEOUT, output).await {
        Ok(Ok(output)) if String::from_utf8_lossy(&output.stdout).trim() == "active" => {
            ServiceState::Running
        }
        Ok(Ok(_)) => ServiceState::Stopped,
        Ok(Err(e)) => {
            tracing::warn!("Failed to query {}: {}", service, e);
            ServiceState::Unknown
        }
        Err(_) => {
            tracing::warn!("State check for {} timed out", service);
            ServiceState::Unknown
        }
    }
}

pub async fn statuses(config: &ServicesConfig) -> Vec<ServiceStatus> {
    let mut statuses = Vec::new();
    for name in config.managed() {
        statuses.push(ServiceStatus {
            name: name.to_string(),
            state: query(config, name).await,
        });
    }
    statuses
}
