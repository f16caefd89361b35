use std::collections::BTreeSet;
use tracing::info;
use webscope_api::{ClassRef, ComponentDeclaration, ContainerSink, InitializerHandle, SourceLocation};

/// Stands in for a servlet container: every call is logged.
#[derive(Debug, Default)]
pub struct LogSink {
    calls: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerSink for LogSink {
    fn reset(&mut self) {
        if self.calls > 0 {
            info!("container reset after {} call(s)", self.calls);
        }
        self.calls = 0;
    }

    fn register_component(&mut self, declaration: &ComponentDeclaration) {
        self.calls += 1;
        info!(
            "register {} {}",
            declaration.kind,
            declaration
                .name()
                .or(declaration.class_name.as_deref())
                .unwrap_or("-")
        );
    }

    fn set_context_param(&mut self, name: &str, value: &str) {
        self.calls += 1;
        info!("context-param {}={}", name, value);
    }

    fn add_welcome_file(&mut self, file: &str) {
        self.calls += 1;
        info!("welcome-file {}", file);
    }

    fn add_resource_location(&mut self, location: &SourceLocation) {
        self.calls += 1;
        info!("static resources from {}", location);
    }

    fn register_initializer(&mut self, initializer: &InitializerHandle, classes: &BTreeSet<ClassRef>) {
        self.calls += 1;
        info!("initializer {} with {} class(es)", initializer, classes.len());
    }
}
