use roxmltree::{Document, Node};
use webscope_api::models::attr;
use webscope_api::{
    AttributeValue, ComponentDeclaration, ComponentKind, DescriptorError, DescriptorParser,
    DescriptorSource, Fragment, FragmentKind, OrderingEntry, PendingMapping,
};

/// Namespace-agnostic reader for `web.xml` and `web-fragment.xml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlDescriptorParser;

impl XmlDescriptorParser {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorParser for XmlDescriptorParser {
    fn parse(
        &self,
        source: &DescriptorSource,
        kind: FragmentKind,
    ) -> Result<Fragment, DescriptorError> {
        let doc = Document::parse(&source.content).map_err(|e| DescriptorError::Syntax {
            origin: source.origin.clone(),
            message: e.to_string(),
        })?;
        DocumentReader {
            origin: &source.origin,
            kind,
        }
        .read(doc.root_element())
    }
}

struct DocumentReader<'s> {
    origin: &'s str,
    kind: FragmentKind,
}

impl DocumentReader<'_> {
    fn invalid(&self, message: impl Into<String>) -> DescriptorError {
        DescriptorError::Invalid {
            origin: self.origin.to_string(),
            message: message.into(),
        }
    }

    fn read(&self, root: Node<'_, '_>) -> Result<Fragment, DescriptorError> {
        let expected_root = match self.kind {
            FragmentKind::PerLocation => "web-fragment",
            _ => "web-app",
        };
        let found = root.tag_name().name();
        if found != expected_root {
            return Err(DescriptorError::UnexpectedRoot {
                origin: self.origin.to_string(),
                found: found.to_string(),
            });
        }

        let mut fragment = Fragment::new(self.kind);
        fragment.version = root.attribute("version").map(str::to_string);
        fragment.metadata_complete = root
            .attribute("metadata-complete")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        // Mappings may precede the components they name.
        let mut mappings = Vec::new();

        for child in elements(root) {
            match child.tag_name().name() {
                "name" => fragment.name = text(child),
                "display-name" => fragment.display_name = text(child),
                "context-param" => self.read_context_param(child, &mut fragment)?,
                "servlet" => {
                    let decl = self.read_servlet(child)?;
                    self.add(&mut fragment, decl)?;
                }
                "filter" => {
                    let decl = self.read_filter(child)?;
                    self.add(&mut fragment, decl)?;
                }
                "listener" => {
                    let decl = self.read_listener(child)?;
                    self.add(&mut fragment, decl)?;
                }
                "servlet-mapping" => mappings.push(self.read_mapping(ComponentKind::Servlet, child)?),
                "filter-mapping" => mappings.push(self.read_mapping(ComponentKind::Filter, child)?),
                "welcome-file-list" => {
                    for file in named_elements(child, "welcome-file").filter_map(text) {
                        if !fragment.welcome_files.contains(&file) {
                            fragment.welcome_files.push(file);
                        }
                    }
                }
                "absolute-ordering" if self.kind == FragmentKind::Explicit => {
                    fragment.absolute_ordering = Some(ordering_list(child));
                }
                "ordering" if self.kind == FragmentKind::PerLocation => {
                    for side in elements(child) {
                        match side.tag_name().name() {
                            "before" => fragment.ordering.before.extend(ordering_list(side)),
                            "after" => fragment.ordering.after.extend(ordering_list(side)),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        for mapping in mappings {
            bind_mapping(&mut fragment, mapping);
        }

        Ok(fragment)
    }

    fn add(&self, fragment: &mut Fragment, decl: ComponentDeclaration) -> Result<(), DescriptorError> {
        fragment
            .add_declaration(decl)
            .map_err(|conflict| DescriptorError::Conflict {
                origin: self.origin.to_string(),
                conflict,
            })
    }

    fn read_context_param(&self, node: Node<'_, '_>, fragment: &mut Fragment) -> Result<(), DescriptorError> {
        let name = child_text(node, "param-name")
            .ok_or_else(|| self.invalid("context-param without param-name"))?;
        let value = child_text(node, "param-value").unwrap_or_default();
        match fragment.context_params.get(&name) {
            Some(existing) if *existing != value => Err(self.invalid(format!(
                "context-param '{name}' declared twice with different values"
            ))),
            _ => {
                fragment.context_params.insert(name, value);
                Ok(())
            }
        }
    }

    fn read_servlet(&self, node: Node<'_, '_>) -> Result<ComponentDeclaration, DescriptorError> {
        let name = child_text(node, "servlet-name")
            .ok_or_else(|| self.invalid("servlet without servlet-name"))?;
        let mut decl = match child_text(node, "servlet-class") {
            Some(class_name) => ComponentDeclaration::new(ComponentKind::Servlet, class_name),
            None => ComponentDeclaration::named(ComponentKind::Servlet, name.clone()),
        };
        decl.attributes.insert(attr::NAME, AttributeValue::Text(name.clone()));
        read_common(node, &mut decl);

        if let Some(jsp_file) = child_text(node, "jsp-file") {
            decl.attributes.insert(attr::JSP_FILE, AttributeValue::Text(jsp_file));
        }
        if let Some(load) = named_elements(node, "load-on-startup").next() {
            let raw = text(load).unwrap_or_default();
            // An empty element means "load at startup, order unspecified".
            let value = if raw.is_empty() {
                0
            } else {
                raw.parse::<i64>().map_err(|_| {
                    self.invalid(format!("servlet '{name}': invalid load-on-startup '{raw}'"))
                })?
            };
            decl.attributes
                .insert(attr::LOAD_ON_STARTUP, AttributeValue::Integer(value));
        }
        Ok(decl)
    }

    fn read_filter(&self, node: Node<'_, '_>) -> Result<ComponentDeclaration, DescriptorError> {
        let name = child_text(node, "filter-name")
            .ok_or_else(|| self.invalid("filter without filter-name"))?;
        let mut decl = match child_text(node, "filter-class") {
            Some(class_name) => ComponentDeclaration::new(ComponentKind::Filter, class_name),
            None => ComponentDeclaration::named(ComponentKind::Filter, name.clone()),
        };
        decl.attributes.insert(attr::NAME, AttributeValue::Text(name));
        read_common(node, &mut decl);
        Ok(decl)
    }

    fn read_listener(&self, node: Node<'_, '_>) -> Result<ComponentDeclaration, DescriptorError> {
        let class_name = child_text(node, "listener-class")
            .ok_or_else(|| self.invalid("listener without listener-class"))?;
        let mut decl = ComponentDeclaration::new(ComponentKind::Listener, class_name);
        if let Some(description) = child_text(node, "description") {
            decl.attributes
                .insert(attr::DESCRIPTION, AttributeValue::Text(description));
        }
        Ok(decl)
    }

    fn read_mapping(&self, kind: ComponentKind, node: Node<'_, '_>) -> Result<PendingMapping, DescriptorError> {
        let name_element = match kind {
            ComponentKind::Filter => "filter-name",
            _ => "servlet-name",
        };
        let name = child_text(node, name_element)
            .ok_or_else(|| self.invalid(format!("{kind}-mapping without {name_element}")))?;
        let mut mapping = PendingMapping {
            kind,
            name,
            url_patterns: named_elements(node, "url-pattern").filter_map(text).collect(),
            servlet_names: Vec::new(),
            dispatchers: Vec::new(),
        };
        if kind == ComponentKind::Filter {
            mapping.servlet_names = named_elements(node, "servlet-name").filter_map(text).collect();
            mapping.dispatchers = named_elements(node, "dispatcher")
                .filter_map(text)
                .map(|d| d.to_ascii_uppercase())
                .collect();
        }
        Ok(mapping)
    }
}

/// Attach a mapping to the component it names when this descriptor declares
/// it; otherwise keep it pending for the merger.
fn bind_mapping(fragment: &mut Fragment, mapping: PendingMapping) {
    let Some(decl) = fragment.find_named_mut(mapping.kind, &mapping.name) else {
        fragment.pending_mappings.push(mapping);
        return;
    };
    apply_mapping(&mut decl.attributes, &mapping);
}

pub(crate) fn apply_mapping(attributes: &mut webscope_api::Attributes, mapping: &PendingMapping) {
    if !mapping.url_patterns.is_empty() {
        attributes.extend_list(attr::URL_PATTERNS, mapping.url_patterns.iter().cloned());
    }
    if !mapping.servlet_names.is_empty() {
        attributes.extend_list(attr::SERVLET_NAMES, mapping.servlet_names.iter().cloned());
    }
    if !mapping.dispatchers.is_empty() {
        attributes.extend_list(attr::DISPATCHER_TYPES, mapping.dispatchers.iter().cloned());
    }
}

fn read_common(node: Node<'_, '_>, decl: &mut ComponentDeclaration) {
    for param in named_elements(node, "init-param") {
        if let Some(name) = child_text(param, "param-name") {
            let value = child_text(param, "param-value").unwrap_or_default();
            decl.attributes.put_param(attr::INIT_PARAMS, name, value);
        }
    }
    if let Some(flag) = child_text(node, "async-supported") {
        decl.attributes.insert(
            attr::ASYNC_SUPPORTED,
            AttributeValue::Flag(flag.eq_ignore_ascii_case("true")),
        );
    }
    if let Some(description) = child_text(node, "description") {
        decl.attributes
            .insert(attr::DESCRIPTION, AttributeValue::Text(description));
    }
    if let Some(display_name) = child_text(node, "display-name") {
        decl.attributes
            .insert(attr::DISPLAY_NAME, AttributeValue::Text(display_name));
    }
}

fn ordering_list(node: Node<'_, '_>) -> Vec<OrderingEntry> {
    elements(node)
        .filter_map(|entry| match entry.tag_name().name() {
            "others" => Some(OrderingEntry::Others),
            "name" => text(entry).map(OrderingEntry::Named),
            _ => None,
        })
        .collect()
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn named_elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(move |n| n.tag_name().name() == name)
}

/// Trimmed text content (CDATA included); `None` when blank.
fn text(node: Node<'_, '_>) -> Option<String> {
    let content: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn child_text(node: Node<'_, '_>, name: &'static str) -> Option<String> {
    named_elements(node, name).next().and_then(text)
}
