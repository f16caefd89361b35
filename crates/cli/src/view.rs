use tabled::Tabled;
use webscope_api::attr;
use webscope_core::merge::{EffectiveEntry, Origin};

/// One row of the component table.
#[derive(Tabled)]
pub struct ComponentView {
    pub kind: String,
    pub name: String,
    pub class: String,
    pub mappings: String,
    pub origin: String,
}

impl ComponentView {
    pub fn from_entry(entry: &EffectiveEntry) -> Self {
        let declaration = &entry.declaration;
        let mut mappings = declaration.url_patterns().to_vec();
        mappings.extend(
            declaration
                .attributes
                .list(attr::SERVLET_NAMES)
                .iter()
                .map(|name| format!("<{name}>")),
        );

        Self {
            kind: declaration.kind.to_string(),
            name: declaration.name().unwrap_or("-").to_string(),
            class: declaration
                .class_name
                .as_deref()
                .map(shorten_class)
                .unwrap_or_else(|| "-".to_string()),
            mappings: if mappings.is_empty() {
                "-".to_string()
            } else {
                mappings.join(" ")
            },
            origin: origin_label(&entry.origin),
        }
    }
}

fn origin_label(origin: &Origin) -> String {
    match origin {
        Origin::Fragment {
            name: Some(name), ..
        } => format!("fragment {name}"),
        Origin::Fragment {
            location: Some(location),
            ..
        } => match location.path().file_name() {
            Some(file) => format!("fragment {}", file.to_string_lossy()),
            None => format!("fragment {location}"),
        },
        other => other.to_string(),
    }
}

/// `org.apache.catalina.servlets.DefaultServlet` -> `o.a.c.s.DefaultServlet`.
pub fn shorten_class(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    let Some((simple, packages)) = parts.split_last().filter(|_| parts.len() > 2) else {
        return name.to_string();
    };
    let mut short: Vec<String> = packages
        .iter()
        .map(|p| p.chars().next().map(String::from).unwrap_or_default())
        .collect();
    short.push(simple.to_string());
    short.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use webscope_api::{AttributeValue, ComponentDeclaration, ComponentKind, SourceLocation};

    #[test]
    fn test_shorten_class() {
        assert_eq!(
            shorten_class("org.apache.catalina.servlets.DefaultServlet"),
            "o.a.c.s.DefaultServlet"
        );
        assert_eq!(shorten_class("com.Foo"), "com.Foo");
        assert_eq!(shorten_class("Foo"), "Foo");
    }

    #[test]
    fn test_view_of_fragment_entry() {
        let declaration = ComponentDeclaration::new(ComponentKind::Filter, "com.example.web.Timing")
            .with_attribute(attr::NAME, AttributeValue::Text("timing".to_string()))
            .with_attribute(attr::URL_PATTERNS, AttributeValue::List(vec!["/*".to_string()]))
            .with_attribute(attr::SERVLET_NAMES, AttributeValue::List(vec!["api".to_string()]));
        let entry = EffectiveEntry {
            declaration,
            origin: Origin::Fragment {
                location: Some(SourceLocation::archive("/app/WEB-INF/lib/metrics.jar")),
                name: None,
            },
        };

        let view = ComponentView::from_entry(&entry);
        assert_eq!(view.kind, "filter");
        assert_eq!(view.name, "timing");
        assert_eq!(view.class, "c.e.w.Timing");
        assert_eq!(view.mappings, "/* <api>");
        assert_eq!(view.origin, "fragment metrics.jar");
    }
}
