use crate::initializer::InitializerHandle;
use crate::models::{ClassRef, ComponentDeclaration, SourceLocation};
use std::collections::BTreeSet;

/// Registration sink of the live container.
pub trait ContainerSink: Send {
    /// Drop everything registered by a previous pass.
    fn reset(&mut self) {}

    fn register_component(&mut self, declaration: &ComponentDeclaration);

    fn set_context_param(&mut self, name: &str, value: &str);

    fn add_welcome_file(&mut self, file: &str);

    fn add_resource_location(&mut self, _location: &SourceLocation) {}

    fn register_initializer(&mut self, initializer: &InitializerHandle, classes: &BTreeSet<ClassRef>);
}
