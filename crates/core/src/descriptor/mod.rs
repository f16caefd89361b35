//! Deployment descriptor parsing.

mod builtin;
mod xml;

pub use builtin::{DEFAULT_DESCRIPTOR, builtin_default_source};
pub use xml::XmlDescriptorParser;
pub(crate) use xml::apply_mapping;
