//! Tracing for the `chainweb3` binary. Logs go to stderr so command output
//! on stdout stays machine-readable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter for the CLI and the libraries it drives. `level` comes from
/// `--log-level`; `components` raises or lowers one library, e.g.
/// `chainweb3-abi` for ABI loading or `chainweb3-rpc` for request traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Workspace crate name (dashes allowed) to level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// `--log-json`: one JSON object per event
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives, e.g. `warn,chainweb3_abi=debug`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `config` when set.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr = fmt::layer().with_writer(std::io::stderr);
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
    }
}
