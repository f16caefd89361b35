use std::path::Path;
use std::sync::Arc;
use webscope_api::ContainerSink;
use webscope_core::descriptor::XmlDescriptorParser;
use webscope_core::{AssemblyServices, BootstrapConfig, Deployment};
use webscope_java::{JavaWebPlugin, WebappLayout};

/// Bootstraps the collaborators for Java web applications read from disk.
///
/// This is the central factory of the runtime: the Java scanner, class file
/// reader and service loader, plus the XML descriptor parser.
pub fn build_default_services() -> AssemblyServices {
    let java = JavaWebPlugin::new();
    AssemblyServices {
        scanner: java.scanner(),
        reader: java.reader(),
        parser: Arc::new(XmlDescriptorParser),
        initializers: java.initializers(),
    }
}

/// A deployment of the exploded web application at `webapp`.
pub fn build_deployment(
    webapp: &Path,
    config: BootstrapConfig,
    sink: Box<dyn ContainerSink>,
) -> std::io::Result<Deployment> {
    let spec = WebappLayout::new(webapp).deployment_spec()?;
    tracing::info!(
        "Deployment {} with {} class path location(s)",
        spec.name,
        spec.classpath.len()
    );
    Ok(Deployment::new(spec, config, build_default_services(), sink))
}

/// Initializes the logging system for a specific component.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<impl Drop> {
    Some(webscope_core::logging::init_logging(component, to_stderr))
}
