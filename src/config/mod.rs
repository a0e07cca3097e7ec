pub mod schema;

pub use schema::{
    BrowserConfig, ChatConfig, ConsoleConfig, IdentityConfig, NetworkConfig, OutputConfig,
    ProbeConfig, TargetConfig, TimingConfig, Viewport,
};
