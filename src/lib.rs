//! # fireprobe
//!
//! Browser-driven diagnostics for a Firebase-backed chat app. One scripted
//! pass captures console output, page errors, suspicious network traffic, and
//! chat state around a simulated signed-in send, then always leaves a JSON
//! record behind.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fireprobe::{Probe, ProbeConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> fireprobe::Result<()> {
//! let config = ProbeConfig::load("configs/default.yaml")?;
//! let mut probe = Probe::launch(&config).await?;
//! let summary = probe.run(&config).await?;
//! probe.close().await?;
//! println!("Success: {}", summary.success);
//! # Ok(())
//! # }
//! ```

mod config;
mod probe;
mod report;

pub use config::{
    BrowserConfig, ChatConfig, ConsoleConfig, IdentityConfig, NetworkConfig, OutputConfig,
    ProbeConfig, TargetConfig, TimingConfig, Viewport,
};
pub use probe::{Probe, RunSummary};
pub use report::{AfterSend, ChatSnapshot, FirebaseInit, InitSnapshot, NetworkEntry, Report};

/// Result type for fireprobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or a probe run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_yaml() {
        let config = ProbeConfig::parse("").unwrap();
        assert_eq!(config.target.url, "http://localhost:3000");
        assert!(config.browser.headless);
        assert_eq!(config.timing.navigation_timeout_ms, 60_000);
        assert_eq!(config.output.path.to_str(), Some("tests/firebase_diagnostics.json"));
    }

    #[test]
    fn test_parse_target_override() {
        let yaml = r#"
target:
  url: "http://localhost:8080"
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.target.url, "http://localhost:8080");
        // Everything else keeps its default.
        assert_eq!(config.identity.storage_key, "mh_current");
        assert_eq!(config.chat.input_selector, "#messageInput");
    }

    #[test]
    fn test_parse_browser_config() {
        let yaml = r#"
browser:
  headless: false
  chrome_executable: "/usr/bin/chromium"
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.chrome_executable.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_parse_viewport_config() {
        let yaml = r#"
browser:
  viewport:
    width: 1920
    height: 1080
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.browser.viewport.width, 1920);
        assert_eq!(config.browser.viewport.height, 1080);
    }

    #[test]
    fn test_parse_partial_timing() {
        let yaml = r#"
timing:
  listener_settle_ms: 500
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.timing.listener_settle_ms, 500);
        // Unset siblings keep their defaults.
        assert_eq!(config.timing.navigation_timeout_ms, 60_000);
        assert_eq!(config.timing.network_idle_ms, 500);
        assert_eq!(config.timing.chat_settle_ms, 3_000);
        assert_eq!(config.timing.send_settle_ms, 3_000);
        assert_eq!(config.timing.input_timeout_ms, 10_000);
    }

    #[test]
    fn test_parse_zero_settles_allowed() {
        let yaml = r#"
timing:
  listener_settle_ms: 0
  chat_settle_ms: 0
  send_settle_ms: 0
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.timing.listener_settle_ms, 0);
        assert_eq!(config.timing.chat_settle_ms, 0);
        assert_eq!(config.timing.send_settle_ms, 0);
    }

    #[test]
    fn test_parse_identity() {
        let yaml = r#"
identity:
  email: "probe@internal.test"
  name: "Probe"
  uid: "probe_1"
  storage_key: "app_user"
  refresh_hook: "refreshAuthUi"
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.identity.email, "probe@internal.test");
        assert_eq!(config.identity.name, "Probe");
        assert_eq!(config.identity.uid, "probe_1");
        assert_eq!(config.identity.storage_key, "app_user");
        assert_eq!(config.identity.refresh_hook, "refreshAuthUi");
    }

    #[test]
    fn test_parse_network_markers() {
        let yaml = r#"
network:
  url_markers: ["firestore"]
  response_markers: ["/api/config"]
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.network.url_markers, vec!["firestore"]);
        assert_eq!(config.network.response_markers, vec!["/api/config"]);
    }

    #[test]
    fn test_parse_console_markers() {
        let yaml = r#"
console:
  echo_markers: ["[TRACE]"]
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.console.echo_markers, vec!["[TRACE]"]);
    }

    #[test]
    fn test_parse_output_config() {
        let yaml = r#"
output:
  path: "out/diag.json"
  failure_screenshot: "out/failure-{timestamp}.png"
"#;
        let config = ProbeConfig::parse(yaml).unwrap();
        assert_eq!(config.output.path.to_str(), Some("out/diag.json"));
        assert_eq!(
            config.output.failure_screenshot.as_deref(),
            Some("out/failure-{timestamp}.png")
        );
    }

    #[test]
    fn test_default_values() {
        let config = ProbeConfig::default();
        assert_eq!(config.browser.viewport.width, 1280);
        assert_eq!(config.browser.viewport.height, 720);
        assert_eq!(
            config.network.url_markers,
            vec!["firebase".to_string(), "firestore".to_string()]
        );
        assert_eq!(
            config.network.response_markers,
            vec!["firebase".to_string(), "/api/firebase-config".to_string()]
        );
        assert_eq!(
            config.console.echo_markers,
            vec!["[DEBUG]".to_string(), "Firestore".to_string(), "chat".to_string()]
        );
        assert_eq!(config.chat.window_id, "chatWindow");
        assert_eq!(config.chat.send_selector, "#sendBtn");
        assert_eq!(config.chat.test_message, "Firebase diagnostic test message");
        assert_eq!(config.identity.email, "test@example.com");
        assert!(config.output.failure_screenshot.is_none());
    }

    #[test]
    fn test_validation_empty_url() {
        let yaml = r#"
target:
  url: ""
"#;
        let result = ProbeConfig::parse(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("target.url"));
    }

    #[test]
    fn test_validation_zero_navigation_timeout() {
        let yaml = r#"
timing:
  navigation_timeout_ms: 0
"#;
        let result = ProbeConfig::parse(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least 1"));
    }

    #[test]
    fn test_validation_zero_network_idle() {
        let yaml = r#"
timing:
  network_idle_ms: 0
"#;
        assert!(ProbeConfig::parse(yaml).is_err());
    }

    #[test]
    fn test_validation_empty_url_markers() {
        let yaml = r#"
network:
  url_markers: []
"#;
        let result = ProbeConfig::parse(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("url_markers"));
    }

    #[test]
    fn test_validation_empty_input_selector() {
        let yaml = r#"
chat:
  input_selector: ""
"#;
        let result = ProbeConfig::parse(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("input_selector"));
    }

    #[test]
    fn test_validation_empty_output_path() {
        let yaml = r#"
output:
  path: ""
"#;
        let result = ProbeConfig::parse(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("output.path"));
    }

    #[test]
    fn test_load_default_config() {
        // The shipped config file must describe exactly the built-in defaults.
        let config = ProbeConfig::load("configs/default.yaml").unwrap();
        let defaults = ProbeConfig::default();
        assert_eq!(config.target.url, defaults.target.url);
        assert_eq!(config.browser.headless, defaults.browser.headless);
        assert_eq!(config.timing.navigation_timeout_ms, defaults.timing.navigation_timeout_ms);
        assert_eq!(config.timing.listener_settle_ms, defaults.timing.listener_settle_ms);
        assert_eq!(config.network.url_markers, defaults.network.url_markers);
        assert_eq!(config.console.echo_markers, defaults.console.echo_markers);
        assert_eq!(config.identity.storage_key, defaults.identity.storage_key);
        assert_eq!(config.chat.test_message, defaults.chat.test_message);
        assert_eq!(config.output.path, defaults.output.path);
    }
}
