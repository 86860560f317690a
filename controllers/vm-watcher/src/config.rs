//! Command-line and environment configuration.
//!
//! Every setting can be given as a flag or through its environment variable;
//! the flag wins when both are present.

use crate::error::ControllerError;
use crate::reconciler::ReconcileSettings;
use clap::Parser;
use guacamole_client::Credentials;
use std::fmt;
use std::time::Duration;

/// Raw configuration as parsed from flags and environment
#[derive(Parser, Clone)]
#[command(
    name = "vm-watcher-controller",
    version,
    about = "Keeps Apache Guacamole connections in sync with KubeVirt VirtualMachines"
)]
pub struct Config {
    /// Base URL of Apache Guacamole (e.g., https://guacamole.example.com/guacamole)
    #[arg(long, env = "GUACAMOLE_BASE_URL")]
    pub guacamole_url: Option<String>,

    /// Guacamole admin username
    #[arg(long, env = "GUACAMOLE_USERNAME")]
    pub guacamole_username: Option<String>,

    /// Guacamole admin password
    #[arg(long, env = "GUACAMOLE_PASSWORD", hide_env_values = true)]
    pub guacamole_password: Option<String>,

    /// Timeout for each Guacamole API request, in seconds
    #[arg(long, env = "GUACAMOLE_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Only watch VirtualMachines in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Maximum number of VirtualMachines reconciled at the same time
    #[arg(long, env = "RECONCILE_CONCURRENCY", default_value_t = 2)]
    pub concurrency: u16,

    /// Deadline for a single reconciliation, in seconds
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = 60)]
    pub reconcile_timeout_secs: u64,

    /// Wait before re-checking a VirtualMachine that is not running yet, in seconds
    #[arg(long, default_value_t = 30)]
    pub not_running_requeue_secs: u64,

    /// Delay before retrying a failed reconciliation, in seconds
    #[arg(long, default_value_t = 120)]
    pub retry_delay_secs: u64,

    /// Cluster DNS domain used for Service hostnames
    #[arg(long, env = "CLUSTER_DOMAIN", default_value = "cluster.local")]
    pub cluster_domain: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("guacamole_url", &self.guacamole_url)
            .field("guacamole_username", &self.guacamole_username)
            .field("guacamole_password", &self.guacamole_password.as_ref().map(|_| "<redacted>"))
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("watch_namespace", &self.watch_namespace)
            .field("concurrency", &self.concurrency)
            .field("reconcile_timeout_secs", &self.reconcile_timeout_secs)
            .field("not_running_requeue_secs", &self.not_running_requeue_secs)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("cluster_domain", &self.cluster_domain)
            .finish()
    }
}

/// Guacamole connection settings
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
}

/// Validated controller settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub watch_namespace: Option<String>,
    pub concurrency: u16,
    pub reconcile_timeout: Duration,
    pub reconcile: ReconcileSettings,
    pub cluster_domain: String,
}

fn required(value: Option<String>, what: &str, flag: &str, env: &str) -> Result<String, ControllerError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ControllerError::InvalidConfig(format!(
                "{} is required. Set via --{} flag or {} environment variable",
                what, flag, env
            ))
        })
}

fn positive_secs(value: u64, flag: &str) -> Result<Duration, ControllerError> {
    if value == 0 {
        return Err(ControllerError::InvalidConfig(format!("--{} must be greater than zero", flag)));
    }
    Ok(Duration::from_secs(value))
}

impl Config {
    /// Check required values and convert to typed settings
    pub fn validate(self) -> Result<Settings, ControllerError> {
        let base_url = required(self.guacamole_url, "Guacamole base URL", "guacamole-url", "GUACAMOLE_BASE_URL")?;
        let username = required(
            self.guacamole_username,
            "Guacamole username",
            "guacamole-username",
            "GUACAMOLE_USERNAME",
        )?;
        // Passwords are taken verbatim
        let password = self
            .guacamole_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ControllerError::InvalidConfig(
                    "Guacamole password is required. Set via --guacamole-password flag or GUACAMOLE_PASSWORD environment variable"
                        .to_string(),
                )
            })?;

        Ok(Settings {
            gateway: GatewaySettings {
                base_url,
                credentials: Credentials::new(username, password),
                timeout: positive_secs(self.http_timeout_secs, "http-timeout-secs")?,
            },
            watch_namespace: self
                .watch_namespace
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            concurrency: self.concurrency,
            reconcile_timeout: positive_secs(self.reconcile_timeout_secs, "reconcile-timeout-secs")?,
            reconcile: ReconcileSettings {
                not_running_requeue: positive_secs(self.not_running_requeue_secs, "not-running-requeue-secs")?,
                retry_delay: positive_secs(self.retry_delay_secs, "retry-delay-secs")?,
            },
            cluster_domain: self.cluster_domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["vm-watcher-controller"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    const COMPLETE: &[&str] = &[
        "--guacamole-url",
        "https://guac.example.com/guacamole",
        "--guacamole-username",
        "guacadmin",
        "--guacamole-password",
        "hunter2",
    ];

    #[test]
    fn test_flags_produce_settings() {
        let mut args = COMPLETE.to_vec();
        args.extend_from_slice(&["--watch-namespace", "lab", "--concurrency", "4", "--http-timeout-secs", "10"]);

        let settings = parse(&args).validate().unwrap();
        assert_eq!(settings.gateway.base_url, "https://guac.example.com/guacamole");
        assert_eq!(settings.gateway.credentials.username, "guacadmin");
        assert_eq!(settings.gateway.timeout, Duration::from_secs(10));
        assert_eq!(settings.watch_namespace.as_deref(), Some("lab"));
        assert_eq!(settings.concurrency, 4);
    }

    #[test]
    fn test_defaults() {
        let settings = parse(COMPLETE).validate().unwrap();
        assert_eq!(settings.reconcile.not_running_requeue, Duration::from_secs(30));
        assert_eq!(settings.reconcile.retry_delay, Duration::from_secs(120));
        assert_eq!(settings.reconcile_timeout, Duration::from_secs(60));
        assert_eq!(settings.cluster_domain, "cluster.local");
    }

    #[test]
    fn test_empty_password_is_rejected_with_hint() {
        let config = parse(&[
            "--guacamole-url",
            "https://guac.example.com",
            "--guacamole-username",
            "guacadmin",
            "--guacamole-password",
            "",
        ]);

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
        assert!(message.contains("--guacamole-password"));
        assert!(message.contains("GUACAMOLE_PASSWORD"));
    }

    #[test]
    fn test_blank_url_is_rejected() {
        let config = parse(&[
            "--guacamole-url",
            "  ",
            "--guacamole-username",
            "guacadmin",
            "--guacamole-password",
            "hunter2",
        ]);
        assert!(matches!(config.validate(), Err(ControllerError::InvalidConfig(m)) if m.contains("GUACAMOLE_BASE_URL")));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut args = COMPLETE.to_vec();
        args.extend_from_slice(&["--reconcile-timeout-secs", "0"]);
        assert!(matches!(parse(&args).validate(), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_not_running_requeue_is_rejected() {
        let mut args = COMPLETE.to_vec();
        args.extend_from_slice(&["--not-running-requeue-secs", "0"]);
        let err = parse(&args).validate().unwrap_err();
        assert!(
            matches!(&err, ControllerError::InvalidConfig(m) if m.contains("--not-running-requeue-secs")),
            "got {err:?}"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", parse(COMPLETE)).contains("hunter2"));
    }
}
