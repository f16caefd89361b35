use std::sync::Arc;
use webscope_api::{
    AnnotationRecord, AttributeValue, ClassAttributeReader, ComponentDeclaration, ComponentKind,
    DeclarationSource, ElementValue, ReadError, SourceLocation, attr,
};

const NAMESPACES: [&str; 2] = ["javax.servlet.annotation.", "jakarta.servlet.annotation."];

/// Turns the class-level annotations of one class into component
/// declarations.
pub struct AnnotationExtractor {
    reader: Arc<dyn ClassAttributeReader>,
}

impl AnnotationExtractor {
    pub fn new(reader: Arc<dyn ClassAttributeReader>) -> Self {
        Self { reader }
    }

    /// Read `class_name` from `location` and convert its markers.
    pub fn extract(
        &self,
        location: &SourceLocation,
        class_name: &str,
    ) -> Result<Vec<ComponentDeclaration>, ReadError> {
        let records = self.reader.class_attributes(location, class_name)?;
        Ok(Self::declarations(class_name, &records))
    }

    /// One declaration per recognized marker; anything else is ignored.
    pub fn declarations(class_name: &str, records: &[AnnotationRecord]) -> Vec<ComponentDeclaration> {
        records
            .iter()
            .filter_map(|record| {
                let simple = NAMESPACES
                    .iter()
                    .find_map(|ns| record.type_name.strip_prefix(ns))?;
                match simple {
                    "WebServlet" => Some(servlet(class_name, record)),
                    "WebFilter" => Some(filter(class_name, record)),
                    "WebListener" => Some(listener(class_name, record)),
                    _ => None,
                }
            })
            .collect()
    }
}

fn servlet(class_name: &str, record: &AnnotationRecord) -> ComponentDeclaration {
    let mut decl = component(ComponentKind::Servlet, class_name, record, "name");
    if let Some(load) = record.get("loadOnStartup").and_then(ElementValue::as_int) {
        decl.attributes
            .insert(attr::LOAD_ON_STARTUP, AttributeValue::Integer(load));
    }
    decl
}

fn filter(class_name: &str, record: &AnnotationRecord) -> ComponentDeclaration {
    let mut decl = component(ComponentKind::Filter, class_name, record, "filterName");
    let servlet_names = record.strings("servletNames");
    if !servlet_names.is_empty() {
        decl.attributes
            .insert(attr::SERVLET_NAMES, AttributeValue::List(servlet_names));
    }
    if let Some(value) = record.get("dispatcherTypes") {
        let dispatchers: Vec<String> = value
            .items()
            .iter()
            .filter_map(|item| match item {
                ElementValue::Enum { constant, .. } => Some(constant.clone()),
                _ => None,
            })
            .collect();
        if !dispatchers.is_empty() {
            decl.attributes
                .insert(attr::DISPATCHER_TYPES, AttributeValue::List(dispatchers));
        }
    }
    decl
}

fn listener(class_name: &str, record: &AnnotationRecord) -> ComponentDeclaration {
    let mut decl = ComponentDeclaration::new(ComponentKind::Listener, class_name)
        .with_source(DeclarationSource::Annotation);
    if let Some(description) = record.string("value") {
        decl.attributes
            .insert(attr::DESCRIPTION, AttributeValue::Text(description.to_string()));
    }
    decl
}

/// Attributes servlets and filters share.
fn component(
    kind: ComponentKind,
    class_name: &str,
    record: &AnnotationRecord,
    name_element: &str,
) -> ComponentDeclaration {
    let mut decl =
        ComponentDeclaration::new(kind, class_name).with_source(DeclarationSource::Annotation);
    let name = record.string(name_element).unwrap_or(class_name);
    decl.attributes
        .insert(attr::NAME, AttributeValue::Text(name.to_string()));

    let mut patterns = record.strings("value");
    for pattern in record.strings("urlPatterns") {
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }
    if !patterns.is_empty() {
        decl.attributes
            .insert(attr::URL_PATTERNS, AttributeValue::List(patterns));
    }

    if let Some(params) = record.get("initParams") {
        for param in params.items() {
            if let ElementValue::Annotation(param) = param {
                if let Some(name) = param.string("name") {
                    let value = param
                        .get("value")
                        .and_then(ElementValue::as_str)
                        .unwrap_or_default();
                    decl.attributes.put_param(attr::INIT_PARAMS, name, value);
                }
            }
        }
    }
    if let Some(flag) = record.get("asyncSupported").and_then(ElementValue::as_bool) {
        decl.attributes
            .insert(attr::ASYNC_SUPPORTED, AttributeValue::Flag(flag));
    }
    if let Some(description) = record.string("description") {
        decl.attributes
            .insert(attr::DESCRIPTION, AttributeValue::Text(description.to_string()));
    }
    if let Some(display_name) = record.string("displayName") {
        decl.attributes
            .insert(attr::DISPLAY_NAME, AttributeValue::Text(display_name.to_string()));
    }
    decl
}
