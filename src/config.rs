/*!
 * Configuration types for dsx
 *
 * Defaults match a local minimum-viable-dataspace deployment; every value can
 * be overridden from a TOML file and then from the environment variables the
 * deployment tooling already exports.
 */

use crate::error::{DsxError, Result};
use dsx_core_poll::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mask used when printing secrets
const MASK: &str = "**********";

/// Top-level configuration passed explicitly into every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DsxConfig {
    /// Provider connector (control plane, data plane, identity hub)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Identity API of the provider's identity hub
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Credential issuer
    #[serde(default)]
    pub issuer: IssuerConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Polling budgets per call site
    #[serde(default)]
    pub polling: PollingConfig,

    /// Credentials requested from the issuer
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// End-to-end transaction settings
    #[serde(default)]
    pub transaction: TransactionConfig,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Public hostname used for URLs and DID generation
    #[serde(default = "default_public_host")]
    pub public_host: String,

    #[serde(default = "default_participant_name")]
    pub participant_name: String,

    /// Explicit provider DID; derived from host and DID port when absent
    #[serde(default)]
    pub did: Option<String>,

    #[serde(default = "default_cp_web_port")]
    pub cp_web_port: u16,

    #[serde(default = "default_management_port")]
    pub management_port: u16,

    #[serde(default = "default_protocol_port")]
    pub protocol_port: u16,

    #[serde(default = "default_dp_web_port")]
    pub dp_web_port: u16,

    #[serde(default = "default_dp_public_port")]
    pub dp_public_port: u16,

    #[serde(default = "default_ih_web_port")]
    pub ih_web_port: u16,

    #[serde(default = "default_ih_did_port")]
    pub ih_did_port: u16,

    /// Sent as `X-Api-Key` on management API calls
    #[serde(default = "default_api_key")]
    pub management_api_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            public_host: default_public_host(),
            participant_name: default_participant_name(),
            did: None,
            cp_web_port: default_cp_web_port(),
            management_port: default_management_port(),
            protocol_port: default_protocol_port(),
            dp_web_port: default_dp_web_port(),
            dp_public_port: default_dp_public_port(),
            ih_web_port: default_ih_web_port(),
            ih_did_port: default_ih_did_port(),
            management_api_key: default_api_key(),
        }
    }
}

impl ProviderConfig {
    /// Provider DID (explicit, or `did:web` derived from host and DID port)
    pub fn did(&self) -> String {
        if let Some(ref did) = self.did {
            return did.clone();
        }
        if matches!(self.ih_did_port, 80 | 443) {
            format!("did:web:{}:{}", self.public_host, self.participant_name)
        } else {
            format!(
                "did:web:{}:{}",
                url_encode(&format!("{}:{}", self.public_host, self.ih_did_port)),
                self.participant_name
            )
        }
    }

    /// Management API base URL
    pub fn management_url(&self) -> String {
        format!(
            "{}/api/management",
            build_url(&self.public_host, self.management_port)
        )
    }

    /// DSP endpoint used as the counter-party address
    pub fn protocol_url(&self) -> String {
        format!("{}/api/dsp", build_url(&self.public_host, self.protocol_port))
    }

    /// Data plane public API base URL
    pub fn public_data_url(&self) -> String {
        format!("{}/api/public", build_url(&self.public_host, self.dp_public_port))
    }

    /// Health endpoints of the provider components, in check order
    pub fn health_endpoints(&self) -> Vec<(String, String)> {
        [
            ("Control Plane", self.cp_web_port),
            ("Data Plane", self.dp_web_port),
            ("Identity Hub", self.ih_web_port),
        ]
        .iter()
        .map(|(name, port)| {
            (
                name.to_string(),
                format!("{}/api/check/health", build_url(&self.public_host, *port)),
            )
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity API port on the provider host
    #[serde(default = "default_identity_port")]
    pub port: u16,

    /// Context path the identity hub mounts its identity API under
    #[serde(default = "default_identity_context_path")]
    pub context_path: String,

    /// Sent as `X-Api-Key` on identity API calls
    #[serde(default = "default_superuser_key")]
    pub superuser_key: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            port: default_identity_port(),
            context_path: default_identity_context_path(),
            superuser_key: default_superuser_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerConfig {
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// Port serving the issuer's DID document
    #[serde(default = "default_issuer_did_port")]
    pub did_api_port: u16,

    /// Explicit issuer DID; derived from host and DID port when absent
    #[serde(default)]
    pub did: Option<String>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            public_host: default_public_host(),
            did_api_port: default_issuer_did_port(),
            did: None,
        }
    }
}

impl IssuerConfig {
    pub fn did(&self) -> String {
        match self.did {
            Some(ref did) => did.clone(),
            None => format!(
                "did:web:{}",
                url_encode(&format!("{}:{}", self.public_host, self.did_api_port))
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for one-shot calls; polled fetches clamp it to the poll interval
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Attempt budget for one polling call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl PollSettings {
    pub const fn new(max_attempts: u32, interval_secs: u64) -> Self {
        Self {
            max_attempts,
            interval_secs,
        }
    }

    /// Convert into the poller's validated configuration
    pub fn to_poll_config(&self) -> Result<PollConfig> {
        Ok(PollConfig::new(
            self.max_attempts,
            Duration::from_secs(self.interval_secs),
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_negotiation_poll")]
    pub negotiation: PollSettings,

    #[serde(default = "default_transfer_poll")]
    pub transfer: PollSettings,

    #[serde(default = "default_credential_poll")]
    pub credential: PollSettings,

    #[serde(default = "default_health_poll")]
    pub health: PollSettings,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            negotiation: default_negotiation_poll(),
            transfer: default_transfer_poll(),
            credential: default_credential_poll(),
            health: default_health_poll(),
        }
    }
}

/// One credential to request from the issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// Credential type, e.g. `MembershipCredential`
    #[serde(rename = "type")]
    pub credential_type: String,

    /// Credential definition id registered at the issuer
    pub definition_id: String,

    #[serde(default = "default_credential_format")]
    pub format: String,
}

impl CredentialSpec {
    pub fn new(credential_type: &str, definition_id: &str) -> Self {
        Self {
            credential_type: credential_type.to_string(),
            definition_id: definition_id.to_string(),
            format: default_credential_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_holder_pid")]
    pub holder_pid: String,

    #[serde(default = "default_credential_specs")]
    pub requested: Vec<CredentialSpec>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            holder_pid: default_holder_pid(),
            requested: default_credential_specs(),
        }
    }
}

impl CredentialsConfig {
    /// Look up configured specs by credential type
    pub fn select(&self, types: &[String]) -> Result<Vec<CredentialSpec>> {
        types
            .iter()
            .map(|t| {
                self.requested
                    .iter()
                    .find(|spec| &spec.credential_type == t)
                    .cloned()
                    .ok_or_else(|| {
                        DsxError::Config(format!(
                            "no credential definition configured for type '{}'",
                            t
                        ))
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "default_target_asset")]
    pub target_asset_id: String,

    /// Skip prerequisite verification (not recommended)
    #[serde(default)]
    pub skip_prerequisites: bool,

    /// Wait for component health with the health poll budget instead of a single check
    #[serde(default)]
    pub wait_for_health: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            target_asset_id: default_target_asset(),
            skip_prerequisites: false,
            wait_for_health: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_public_host() -> String {
    "host.docker.internal".to_string()
}

fn default_participant_name() -> String {
    "provider".to_string()
}

fn default_cp_web_port() -> u16 {
    8080
}

fn default_management_port() -> u16 {
    8081
}

fn default_protocol_port() -> u16 {
    8082
}

fn default_dp_web_port() -> u16 {
    8090
}

fn default_dp_public_port() -> u16 {
    11002
}

fn default_ih_web_port() -> u16 {
    7000
}

fn default_ih_did_port() -> u16 {
    7003
}

fn default_identity_port() -> u16 {
    7005
}

fn default_identity_context_path() -> String {
    "/api/identity".to_string()
}

fn default_issuer_did_port() -> u16 {
    10016
}

fn default_api_key() -> String {
    "password".to_string()
}

fn default_superuser_key() -> String {
    "c3VwZXItdXNlcg==.c3VwZXItc2VjcmV0LWtleQo=".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_negotiation_poll() -> PollSettings {
    PollSettings::new(60, 2)
}

fn default_transfer_poll() -> PollSettings {
    PollSettings::new(60, 2)
}

fn default_credential_poll() -> PollSettings {
    PollSettings::new(30, 2)
}

fn default_health_poll() -> PollSettings {
    PollSettings::new(30, 10)
}

fn default_credential_format() -> String {
    "VC1_0_JWT".to_string()
}

fn default_holder_pid() -> String {
    "credential-request-1".to_string()
}

fn default_credential_specs() -> Vec<CredentialSpec> {
    vec![
        CredentialSpec::new("MembershipCredential", "membership-credential-def"),
        CredentialSpec::new("DataProcessorCredential", "data-processor-credential-def"),
    ]
}

fn default_target_asset() -> String {
    "asset-1".to_string()
}

impl DsxConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| DsxError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| DsxError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Overlay values from an environment lookup.
    ///
    /// Variable names follow the deployment's `.env` file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let p = &mut self.provider;
        if let Some(v) = lookup("PROVIDER_PUBLIC_HOST") {
            p.public_host = v;
        }
        if let Some(v) = lookup("PROVIDER_PARTICIPANT_NAME") {
            p.participant_name = v;
        }
        for (name, slot) in [
            ("PROVIDER_CP_WEB_PORT", &mut p.cp_web_port),
            ("PROVIDER_CP_MANAGEMENT_PORT", &mut p.management_port),
            ("PROVIDER_CP_PROTOCOL_PORT", &mut p.protocol_port),
            ("PROVIDER_DP_WEB_PORT", &mut p.dp_web_port),
            ("PROVIDER_DP_PUBLIC_PORT", &mut p.dp_public_port),
            ("PROVIDER_IH_WEB_PORT", &mut p.ih_web_port),
            ("PROVIDER_IH_DID_PORT", &mut p.ih_did_port),
            ("PROVIDER_IH_IDENTITY_PORT", &mut self.identity.port),
            ("ISSUER_DID_API_PORT", &mut self.issuer.did_api_port),
        ] {
            if let Some(v) = lookup(name) {
                *slot = parse_port(name, &v)?;
            }
        }
        if let Some(v) = lookup("PROVIDER_MANAGEMENT_API_KEY") {
            p.management_api_key = v;
        }
        if let Some(v) = lookup("PROVIDER_IDENTITY_SUPERUSER_KEY") {
            self.identity.superuser_key = v;
        }
        if let Some(v) = lookup("ISSUER_PUBLIC_HOST") {
            self.issuer.public_host = v;
        }
        Ok(())
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<()> {
        for (name, port) in [
            ("provider.cp_web_port", self.provider.cp_web_port),
            ("provider.management_port", self.provider.management_port),
            ("provider.protocol_port", self.provider.protocol_port),
            ("provider.dp_web_port", self.provider.dp_web_port),
            ("provider.dp_public_port", self.provider.dp_public_port),
            ("provider.ih_web_port", self.provider.ih_web_port),
            ("provider.ih_did_port", self.provider.ih_did_port),
            ("identity.port", self.identity.port),
            ("issuer.did_api_port", self.issuer.did_api_port),
        ] {
            if port == 0 {
                return Err(DsxError::Config(format!("{} must be between 1-65535", name)));
            }
        }

        for (name, settings) in [
            ("polling.negotiation", self.polling.negotiation),
            ("polling.transfer", self.polling.transfer),
            ("polling.credential", self.polling.credential),
            ("polling.health", self.polling.health),
        ] {
            settings
                .to_poll_config()
                .map_err(|e| DsxError::Config(format!("{}: {}", name, e)))?;
            if settings.interval_secs == 0 {
                return Err(DsxError::Config(format!(
                    "{}: interval_secs must be at least 1",
                    name
                )));
            }
        }

        if self.http.request_timeout_secs == 0 {
            return Err(DsxError::Config(
                "http.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        validate_did("provider DID", &self.provider.did())?;
        validate_did("issuer DID", &self.issuer.did())?;

        if self.credentials.requested.is_empty() {
            return Err(DsxError::Config(
                "credentials.requested must name at least one credential".to_string(),
            ));
        }

        Ok(())
    }

    /// Identity API base URL (host shared with the provider)
    pub fn identity_url(&self) -> String {
        format!(
            "{}{}",
            build_url(&self.provider.public_host, self.identity.port),
            self.identity.context_path
        )
    }

    /// Copy of this configuration with secrets masked, for display
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.provider.management_api_key = mask_secret(&self.provider.management_api_key);
        copy.identity.superuser_key = mask_secret(&self.identity.superuser_key);
        copy
    }
}

fn build_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(DsxError::Config(format!(
            "{} must be a port between 1-65535, got '{}'",
            name, value
        ))),
        Ok(port) => Ok(port),
    }
}

/// Accepts `did:web:<host>[:<path>...]`
pub fn validate_did(label: &str, did: &str) -> Result<()> {
    let parts: Vec<&str> = did.split(':').collect();
    if !did.starts_with("did:web:") || parts.len() < 3 || parts[2].is_empty() {
        return Err(DsxError::Config(format!(
            "{} '{}' is not a did:web identifier",
            label, did
        )));
    }
    Ok(())
}

/// Mask a secret for logging, keeping the last four characters
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return MASK.to_string();
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{}", MASK, tail)
}
