use crate::models::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Static inputs of one deployment: where its classes live and where its
/// descriptors are read from on every assembly pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub name: String,
    pub classpath: Vec<SourceLocation>,
    /// The application's own descriptor (`WEB-INF/web.xml`); may be absent.
    pub explicit_descriptor: Option<PathBuf>,
    /// Container-specific overrides (`WEB-INF/tomcat-web.xml`).
    pub container_descriptor: Option<PathBuf>,
}

impl DeploymentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classpath: Vec::new(),
            explicit_descriptor: None,
            container_descriptor: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.classpath.push(location);
        self
    }

    pub fn with_explicit_descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_descriptor = Some(path.into());
        self
    }

    pub fn with_container_descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.container_descriptor = Some(path.into());
        self
    }
}
