//! Data model and collaborator contracts for assembling an effective web
//! descriptor.
//!
//! The assembly engine in `webscope-core` only talks to the outside world
//! through the traits defined here, so scanners, class readers, descriptor
//! parsers and container sinks can be swapped per environment (and faked in
//! tests).

pub mod container;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod initializer;
pub mod lifecycle;
pub mod models;
pub mod reader;
pub mod scan;

// Re-export commonly used types
pub use container::ContainerSink;
pub use context::{ClassPath, ClassPathScope};
pub use descriptor::{DescriptorParser, DescriptorSource};
pub use error::{DeclarationConflict, DescriptorError, DiscoveryError, ReadError, ScanError};
pub use initializer::{InitializerHandle, InitializerLoader, InitializerRegistration, InterestType};
pub use lifecycle::{LifecycleEvent, LifecycleKind, LifecycleListener};
pub use models::*;
pub use reader::ClassAttributeReader;
pub use scan::{ClassFinder, ClasspathScanner, LocationManifest, ScanArchive};
