use crate::error::DiscoveryError;
use crate::models::TypeRef;
use crate::scan::ScanArchive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a container initializer; the container resolves it back
/// to the instance it loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InitializerHandle {
    pub class_name: String,
}

impl InitializerHandle {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

impl fmt::Display for InitializerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name)
    }
}

/// One declared interest type. A type whose class could not be loaded is
/// kept as `Unresolved` so the dispatcher can skip just that entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestType {
    Resolved(TypeRef),
    /// Declared by name only, typically a container or shared-library type
    /// outside the scan. The dispatcher picks the tag from whichever finder
    /// index knows the name.
    Named(String),
    Unresolved { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerRegistration {
    pub handle: InitializerHandle,
    pub interest: Vec<InterestType>,
}

impl InitializerRegistration {
    pub fn new(handle: InitializerHandle) -> Self {
        Self {
            handle,
            interest: Vec::new(),
        }
    }

    pub fn with_interest(mut self, interest: InterestType) -> Self {
        self.interest.push(interest);
        self
    }
}

/// Service-loading collaborator enumerating the initializers of a deployment.
pub trait InitializerLoader: Send + Sync {
    fn load(&self, archive: &ScanArchive) -> Result<Vec<InitializerRegistration>, DiscoveryError>;
}
