use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level probe configuration.
///
/// Every field defaults to the value the probe ships with, so an empty file
/// (or no file at all) is a complete, valid config describing the standard
/// local setup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProbeConfig {
    /// Target application.
    #[serde(default)]
    pub target: TargetConfig,

    /// Browser launch configuration.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Fixed waits and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Network capture filters.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Console capture behavior.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Mock identity for the signed-in send test.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Chat UI contract the target app must expose.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Report output.
    #[serde(default)]
    pub output: OutputConfig,
}

impl ProbeConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string. An empty string yields the defaults.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config = if yaml.trim().is_empty() {
            ProbeConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the config.
    fn validate(&self) -> Result<()> {
        if self.target.url.is_empty() {
            return Err(Error::Config("target.url is required".into()));
        }
        if self.timing.navigation_timeout_ms == 0 {
            return Err(Error::Config(
                "timing.navigation_timeout_ms must be at least 1".into(),
            ));
        }
        if self.timing.network_idle_ms == 0 {
            return Err(Error::Config(
                "timing.network_idle_ms must be at least 1".into(),
            ));
        }
        if self.timing.input_timeout_ms == 0 {
            return Err(Error::Config(
                "timing.input_timeout_ms must be at least 1".into(),
            ));
        }
        if self.network.url_markers.is_empty() {
            return Err(Error::Config("network.url_markers must not be empty".into()));
        }
        if self.network.response_markers.is_empty() {
            return Err(Error::Config(
                "network.response_markers must not be empty".into(),
            ));
        }
        if self.identity.storage_key.is_empty() {
            return Err(Error::Config("identity.storage_key is required".into()));
        }
        if self.chat.window_id.is_empty() {
            return Err(Error::Config("chat.window_id is required".into()));
        }
        if self.chat.input_selector.is_empty() {
            return Err(Error::Config("chat.input_selector is required".into()));
        }
        if self.chat.send_selector.is_empty() {
            return Err(Error::Config("chat.send_selector is required".into()));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(Error::Config("output.path is required".into()));
        }
        Ok(())
    }
}

/// Target application.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// URL the probe navigates to.
    #[serde(default = "default_target_url")]
    pub url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_target_url(),
        }
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    pub chrome_executable: Option<PathBuf>,

    /// Window size.
    #[serde(default)]
    pub viewport: Viewport,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
            viewport: Viewport::default(),
        }
    }
}

/// Viewport dimensions.
#[derive(Debug, Clone, Deserialize)]
pub struct Viewport {
    #[serde(default = "default_viewport_width")]
    pub width: u32,
    #[serde(default = "default_viewport_height")]
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: default_viewport_width(),
            height: default_viewport_height(),
        }
    }
}

/// Fixed waits and timeouts, all in milliseconds.
///
/// The settle delays are plain sleeps: the probe intentionally waits a fixed
/// time rather than polling for a condition, because what the app does in
/// those windows (listener attach, snapshot fan-in) has no observable
/// completion signal. They may be zero. The timeouts bound actual waits and
/// must be non-zero.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Upper bound for page load plus the post-load network-idle wait.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// How long the network must stay quiet to count as idle.
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,

    /// Settle after reload, for backend listeners to attach and fire.
    #[serde(default = "default_listener_settle_ms")]
    pub listener_settle_ms: u64,

    /// Settle before the first chat sample, for the chat listener to populate.
    #[serde(default = "default_chat_settle_ms")]
    pub chat_settle_ms: u64,

    /// Settle after the test send, for the message to propagate.
    #[serde(default = "default_send_settle_ms")]
    pub send_settle_ms: u64,

    /// Upper bound for the message input to appear after sign-in.
    #[serde(default = "default_input_timeout_ms")]
    pub input_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            network_idle_ms: default_network_idle_ms(),
            listener_settle_ms: default_listener_settle_ms(),
            chat_settle_ms: default_chat_settle_ms(),
            send_settle_ms: default_send_settle_ms(),
            input_timeout_ms: default_input_timeout_ms(),
        }
    }
}

/// Network capture filters. Both filters are plain substring matches.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// A failed request is recorded when its URL contains any of these.
    #[serde(default = "default_url_markers")]
    pub url_markers: Vec<String>,

    /// A non-200 response is recorded when its URL contains any of these.
    #[serde(default = "default_response_markers")]
    pub response_markers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url_markers: default_url_markers(),
            response_markers: default_response_markers(),
        }
    }
}

/// Console capture behavior.
///
/// Every console message is recorded; the markers only decide which ones are
/// additionally echoed to the operator's terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Echo a message when its text contains any of these (case-sensitive).
    #[serde(default = "default_echo_markers")]
    pub echo_markers: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            echo_markers: default_echo_markers(),
        }
    }
}

/// Mock identity written into the page's session storage so the app treats
/// the probe as a signed-in user.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_email")]
    pub email: String,

    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_identity_uid")]
    pub uid: String,

    /// Session-storage key the app reads the identity from.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Global function the app may expose to refresh auth-gated UI. Called
    /// if present; absence or failure is ignored.
    #[serde(default = "default_refresh_hook")]
    pub refresh_hook: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            email: default_identity_email(),
            name: default_identity_name(),
            uid: default_identity_uid(),
            storage_key: default_storage_key(),
            refresh_hook: default_refresh_hook(),
        }
    }
}

/// Chat UI contract: the element ids/selectors the target app must expose.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Id of the element hosting rendered chat content (no leading `#`).
    #[serde(default = "default_window_id")]
    pub window_id: String,

    /// CSS selector of the message input.
    #[serde(default = "default_input_selector")]
    pub input_selector: String,

    /// CSS selector of the send control.
    #[serde(default = "default_send_selector")]
    pub send_selector: String,

    /// Text typed into the input for the send test.
    #[serde(default = "default_test_message")]
    pub test_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            window_id: default_window_id(),
            input_selector: default_input_selector(),
            send_selector: default_send_selector(),
            test_message: default_test_message(),
        }
    }
}

/// Report output.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Where the JSON report is written. Parent directories are created.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Screenshot path used when the run fails (supports `{timestamp}`).
    /// Unset by default: no screenshot is taken.
    pub failure_screenshot: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            failure_screenshot: None,
        }
    }
}

fn default_target_url() -> String {
    "http://localhost:3000".into()
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_network_idle_ms() -> u64 {
    500
}

fn default_listener_settle_ms() -> u64 {
    10_000
}

fn default_chat_settle_ms() -> u64 {
    3_000
}

fn default_send_settle_ms() -> u64 {
    3_000
}

fn default_input_timeout_ms() -> u64 {
    10_000
}

fn default_url_markers() -> Vec<String> {
    vec!["firebase".into(), "firestore".into()]
}

fn default_response_markers() -> Vec<String> {
    vec!["firebase".into(), "/api/firebase-config".into()]
}

fn default_echo_markers() -> Vec<String> {
    vec!["[DEBUG]".into(), "Firestore".into(), "chat".into()]
}

fn default_identity_email() -> String {
    "test@example.com".into()
}

fn default_identity_name() -> String {
    "Test User".into()
}

fn default_identity_uid() -> String {
    "test_uid_123".into()
}

fn default_storage_key() -> String {
    "mh_current".into()
}

fn default_refresh_hook() -> String {
    "updateAuthGates".into()
}

fn default_window_id() -> String {
    "chatWindow".into()
}

fn default_input_selector() -> String {
    "#messageInput".into()
}

fn default_send_selector() -> String {
    "#sendBtn".into()
}

fn default_test_message() -> String {
    "Firebase diagnostic test message".into()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("tests/firebase_diagnostics.json")
}
