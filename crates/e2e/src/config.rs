//! Run configuration
//!
//! Everything the console tests read from their environment is collected
//! into a [`RunConfig`] once per run and handed to every helper.

use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Name of the pre-provisioned cluster every suite expects to find
pub const TEST_INFRA_CLUSTER_NAME: &str = "test-infra-cluster";

/// Default console URL when `BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Configuration for a single test run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Console UI base URL
    pub base_url: String,

    /// Assisted installer API base URL
    pub api_base_url: String,

    pub pull_secret: String,
    pub ssh_pub_key: String,
    pub cluster_name: String,
    pub dns_domain_name: String,
    pub api_vip: String,
    pub ingress_vip: String,
    pub num_masters: usize,
    pub num_workers: usize,

    /// The cluster provisioned by the test infrastructure
    pub test_infra_cluster: TestInfraCluster,

    /// Deadlines for each class of wait
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone)]
pub struct TestInfraCluster {
    pub name: String,
    pub hostnames: Vec<String>,
    pub base_domain: String,
    pub openshift_version: String,
}

impl Default for TestInfraCluster {
    fn default() -> Self {
        Self {
            name: TEST_INFRA_CLUSTER_NAME.to_string(),
            hostnames: (0..3)
                .map(|i| format!("{}-master-{}", TEST_INFRA_CLUSTER_NAME, i))
                .collect(),
            base_domain: "redhat.com".to_string(),
            openshift_version: "4.5".to_string(),
        }
    }
}

impl RunConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> E2eResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| E2eError::Config(format!("{} is not set", key)))
        };
        let count = |key: &str| -> E2eResult<usize> {
            let raw = required(key)?;
            raw.trim().parse().map_err(|_| {
                E2eError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))
            })
        };

        Ok(Self {
            base_url: lookup("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_base_url: required("API_BASE_URL")?,
            pull_secret: required("PULL_SECRET")?,
            ssh_pub_key: required("SSH_PUB_KEY")?,
            cluster_name: required("CLUSTER_NAME")?,
            dns_domain_name: required("DNS_DOMAIN_NAME")?,
            api_vip: required("API_VIP")?,
            ingress_vip: required("INGRESS_VIP")?,
            num_masters: count("NUM_MASTERS")?,
            num_workers: count("NUM_WORKERS")?,
            test_infra_cluster: TestInfraCluster::default(),
            timeouts: Timeouts::from_lookup(&lookup)?,
        })
    }

    /// Total number of hosts the discovery flows wait for
    pub fn num_hosts(&self) -> usize {
        self.num_masters + self.num_workers
    }
}

/// Classes of waits, each with its own deadline magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineClass {
    #[default]
    Command,
    ValidateChanges,
    ApiRequest,
    InstallPreparation,
    HostRegistration,
    HostDiscovery,
    IsoGeneration,
    ClusterCreation,
}

/// Deadlines per [`DeadlineClass`]
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub command: Duration,
    pub validate_changes: Duration,
    pub api_request: Duration,
    pub install_preparation: Duration,
    pub host_registration: Duration,
    pub host_discovery: Duration,
    pub iso_generation: Duration,
    pub cluster_creation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(10),
            validate_changes: Duration::from_secs(10),
            api_request: Duration::from_secs(30),
            install_preparation: Duration::from_secs(5 * 60),
            host_registration: Duration::from_secs(10 * 60),
            host_discovery: Duration::from_secs(10 * 60),
            iso_generation: Duration::from_secs(5 * 60),
            cluster_creation: Duration::from_secs(60 * 60),
        }
    }
}

impl Timeouts {
    /// Start from the defaults and apply `E2E_*_TIMEOUT` overrides (seconds)
    pub fn from_lookup<F>(lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut timeouts = Self::default();
        let slots: [(&str, &mut Duration); 8] = [
            ("E2E_COMMAND_TIMEOUT", &mut timeouts.command),
            ("E2E_VALIDATE_CHANGES_TIMEOUT", &mut timeouts.validate_changes),
            ("E2E_API_REQUEST_TIMEOUT", &mut timeouts.api_request),
            ("E2E_INSTALL_PREPARATION_TIMEOUT", &mut timeouts.install_preparation),
            ("E2E_HOST_REGISTRATION_TIMEOUT", &mut timeouts.host_registration),
            ("E2E_HOST_DISCOVERY_TIMEOUT", &mut timeouts.host_discovery),
            ("E2E_ISO_GENERATION_TIMEOUT", &mut timeouts.iso_generation),
            ("E2E_CLUSTER_CREATION_TIMEOUT", &mut timeouts.cluster_creation),
        ];

        for (key, slot) in slots {
            if let Some(raw) = lookup(key) {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    E2eError::Config(format!("{} must be a number of seconds, got '{}'", key, raw))
                })?;
                *slot = Duration::from_secs(secs);
            }
        }

        Ok(timeouts)
    }

    /// Deadline for a class of wait
    pub fn get(&self, class: DeadlineClass) -> Duration {
        match class {
            DeadlineClass::Command => self.command,
            DeadlineClass::ValidateChanges => self.validate_changes,
            DeadlineClass::ApiRequest => self.api_request,
            DeadlineClass::InstallPreparation => self.install_preparation,
            DeadlineClass::HostRegistration => self.host_registration,
            DeadlineClass::HostDiscovery => self.host_discovery,
            DeadlineClass::IsoGeneration => self.iso_generation,
            DeadlineClass::ClusterCreation => self.cluster_creation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn complete_env() -> HashMap<String, String> {
        env(&[
            ("API_BASE_URL", "http://api.local"),
            ("PULL_SECRET", "{\"auths\":{}}"),
            ("SSH_PUB_KEY", "ssh-rsa AAAA"),
            ("CLUSTER_NAME", "test-infra-cluster"),
            ("DNS_DOMAIN_NAME", "redhat.com"),
            ("API_VIP", "192.168.126.100"),
            ("INGRESS_VIP", "192.168.126.101"),
            ("NUM_MASTERS", "3"),
            ("NUM_WORKERS", "2"),
        ])
    }

    #[test]
    fn test_from_lookup_complete() {
        let vars = complete_env();
        let config = RunConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.num_hosts(), 5);
        assert_eq!(config.test_infra_cluster.hostnames[2], "test-infra-cluster-master-2");
        assert_eq!(config.timeouts.cluster_creation, Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_variable_is_config_error() {
        let mut vars = complete_env();
        vars.remove("PULL_SECRET");
        let err = RunConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, E2eError::Config(msg) if msg.contains("PULL_SECRET")));
    }

    #[test]
    fn test_non_numeric_host_count_rejected() {
        let mut vars = complete_env();
        vars.insert("NUM_WORKERS".into(), "two".into());
        assert!(RunConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_timeout_override() {
        let mut vars = complete_env();
        vars.insert("E2E_HOST_DISCOVERY_TIMEOUT".into(), "42".into());
        let config = RunConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.timeouts.get(DeadlineClass::HostDiscovery), Duration::from_secs(42));
        assert_eq!(config.timeouts.get(DeadlineClass::Command), Duration::from_secs(10));
    }
}
