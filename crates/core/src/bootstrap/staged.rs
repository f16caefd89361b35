use std::collections::BTreeSet;
use webscope_api::{ClassRef, ComponentDeclaration, ContainerSink, InitializerHandle, SourceLocation};

/// One recorded container call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOp {
    Component(ComponentDeclaration),
    ContextParam { name: String, value: String },
    WelcomeFile(String),
    ResourceLocation(SourceLocation),
    Initializer {
        handle: InitializerHandle,
        classes: BTreeSet<ClassRef>,
    },
}

/// A [`ContainerSink`] that records instead of applying, so that a pass can
/// be installed all at once or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedContainer {
    ops: Vec<ContainerOp>,
}

impl StagedContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[ContainerOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn initializers(&self) -> impl Iterator<Item = (&InitializerHandle, &BTreeSet<ClassRef>)> {
        self.ops.iter().filter_map(|op| match op {
            ContainerOp::Initializer { handle, classes } => Some((handle, classes)),
            _ => None,
        })
    }

    /// Reset `sink` and apply every recorded call in order.
    pub fn replay(&self, sink: &mut dyn ContainerSink) {
        sink.reset();
        for op in &self.ops {
            match op {
                ContainerOp::Component(declaration) => sink.register_component(declaration),
                ContainerOp::ContextParam { name, value } => sink.set_context_param(name, value),
                ContainerOp::WelcomeFile(file) => sink.add_welcome_file(file),
                ContainerOp::ResourceLocation(location) => sink.add_resource_location(location),
                ContainerOp::Initializer { handle, classes } => {
                    sink.register_initializer(handle, classes)
                }
            }
        }
    }
}

impl ContainerSink for StagedContainer {
    fn reset(&mut self) {
        self.ops.clear();
    }

    fn register_component(&mut self, declaration: &ComponentDeclaration) {
        self.ops.push(ContainerOp::Component(declaration.clone()));
    }

    fn set_context_param(&mut self, name: &str, value: &str) {
        self.ops.push(ContainerOp::ContextParam {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn add_welcome_file(&mut self, file: &str) {
        self.ops.push(ContainerOp::WelcomeFile(file.to_string()));
    }

    fn add_resource_location(&mut self, location: &SourceLocation) {
        self.ops.push(ContainerOp::ResourceLocation(location.clone()));
    }

    fn register_initializer(&mut self, initializer: &InitializerHandle, classes: &BTreeSet<ClassRef>) {
        self.ops.push(ContainerOp::Initializer {
            handle: initializer.clone(),
            classes: classes.clone(),
        });
    }
}
