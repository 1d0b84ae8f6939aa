use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub privilege: PrivilegeConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_dhcp_conf")]
    pub dhcp_conf: PathBuf,
    #[serde(default = "default_bind_dir")]
    pub bind_dir: PathBuf,
    #[serde(default = "default_leases_file")]
    pub leases_file: PathBuf,
    /// Where staged text is written before the privileged copy
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_dhcp_service")]
    pub dhcp_service: String,
    #[serde(default = "default_dns_service")]
    pub dns_service: String,
    /// Owner passed to `chown` after every zone write
    #[serde(default = "default_zone_owner")]
    pub zone_owner: String,
    /// Command prefix; the service name is appended
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
    /// Unprivileged state check; prints `active` for a running service
    #[serde(default = "default_status_command")]
    pub status_command: Vec<String>,
    /// Privileged control prefix; the action and service name are appended
    #[serde(default = "default_control_command")]
    pub control_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrivilegeConfig {
    /// Escalation program, reads the credential on stdin
    #[serde(default = "default_privilege_program")]
    pub program: String,
    #[serde(default = "default_privilege_args")]
    pub args: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_dhcp_conf() -> PathBuf {
    PathBuf::from("/etc/dhcp/dhcpd.conf")
}

fn default_bind_dir() -> PathBuf {
    PathBuf::from("/etc/bind")
}

fn default_leases_file() -> PathBuf {
    PathBuf::from("/var/lib/dhcp/dhcpd.leases")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_dhcp_service() -> String {
    "isc-dhcp-server".to_string()
}

fn default_dns_service() -> String {
    "bind9".to_string()
}

fn default_zone_owner() -> String {
    "bind:bind".to_string()
}

fn default_reload_command() -> Vec<String> {
    vec!["systemctl".to_string(), "reload".to_string()]
}

fn default_status_command() -> Vec<String> {
    vec!["systemctl".to_string(), "is-active".to_string()]
}

fn default_control_command() -> Vec<String> {
    vec!["systemctl".to_string()]
}

fn default_privilege_program() -> String {
    "sudo".to_string()
}

fn default_privilege_args() -> Vec<String> {
    // -S: password on stdin, -p "": no prompt text on stderr
    vec!["-S".to_string(), "-p".to_string(), String::new()]
}

fn default_timeout() -> u64 {
    30
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dhcp_conf: default_dhcp_conf(),
            bind_dir: default_bind_dir(),
            leases_file: default_leases_file(),
            temp_dir: default_temp_dir(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            dhcp_service: default_dhcp_service(),
            dns_service: default_dns_service(),
            zone_owner: default_zone_owner(),
            reload_command: default_reload_command(),
            status_command: default_status_command(),
            control_command: default_control_command(),
        }
    }
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            program: default_privilege_program(),
            args: default_privilege_args(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl PrivilegeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PathsConfig {
    /// Path of the zone file backing `zone`
    pub fn zone_file(&self, zone: &str) -> PathBuf {
        self.bind_dir
            .join(format!("{}{}", shared::protocol::ZONE_FILE_PREFIX, zone))
    }
}

impl ServicesConfig {
    /// Full argv reloading `service`
    pub fn reload_argv(&self, service: &str) -> Vec<String> {
        let mut argv = self.reload_command.clone();
        argv.push(service.to_string());
        argv
    }

    /// Full argv running `action` on `service`
    pub fn control_argv(&self, action: &str, service: &str) -> Vec<String> {
        let mut argv = self.control_command.clone();
        argv.push(action.to_string());
        argv.push(service.to_string());
        argv
    }

    /// The services this daemon reports on and may control
    pub fn managed(&self) -> [&str; 2] {
        [self.dhcp_service.as_str(), self.dns_service.as_str()]
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
