use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_JSP_SERVLET_CLASS: &str = "org.apache.jasper.servlet.JspServlet";

/// Knobs consumed by the bootstrap coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootstrapConfig {
    /// When false, no scan happens: only the explicit, container and
    /// default descriptors are merged.
    pub tomcat_scanning: bool,
    /// Debounce window of the reload watcher; 0 disables watching.
    pub watcher_bounce_millis: u64,
    /// Locations under these roots are never scanned for fragments or
    /// annotations.
    pub shared_libraries: BTreeSet<PathBuf>,
    pub log_effective_descriptor: bool,
    /// Replaces the built-in default descriptor.
    pub default_descriptor: Option<PathBuf>,
    pub jsp_servlet_class: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            tomcat_scanning: true,
            watcher_bounce_millis: 0,
            shared_libraries: BTreeSet::new(),
            log_effective_descriptor: false,
            default_descriptor: None,
            jsp_servlet_class: DEFAULT_JSP_SERVLET_CLASS.to_string(),
        }
    }
}

impl BootstrapConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn watcher_bounce(&self) -> Duration {
        Duration::from_millis(self.watcher_bounce_millis)
    }

    pub fn watching_enabled(&self) -> bool {
        self.watcher_bounce_millis > 0
    }
}
