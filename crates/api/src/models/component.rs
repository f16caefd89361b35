use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known attribute names shared by the descriptor parser, the
/// annotation extractor and the merger.
pub mod attr {
    pub const NAME: &str = "name";
    pub const URL_PATTERNS: &str = "urlPatterns";
    pub const SERVLET_NAMES: &str = "servletNames";
    pub const DISPATCHER_TYPES: &str = "dispatcherTypes";
    pub const INIT_PARAMS: &str = "initParams";
    pub const LOAD_ON_STARTUP: &str = "loadOnStartup";
    pub const ASYNC_SUPPORTED: &str = "asyncSupported";
    pub const DESCRIPTION: &str = "description";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const JSP_FILE: &str = "jspFile";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Servlet,
    Filter,
    Listener,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Servlet => "servlet",
            ComponentKind::Filter => "filter",
            ComponentKind::Listener => "listener",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
    Params(BTreeMap<String, String>),
}

/// A named attribute that two sources disagree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeClash {
    pub attribute: String,
    pub existing: AttributeValue,
    pub incoming: AttributeValue,
}

/// Attribute table of a component declaration, ordered by name so that
/// serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(AttributeValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> &[String] {
        match self.0.get(name) {
            Some(AttributeValue::List(values)) => values.as_slice(),
            _ => &[],
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(AttributeValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(AttributeValue::Flag(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn params(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        match self.0.get(name) {
            Some(AttributeValue::Params(p)) => Some(p),
            _ => None,
        }
    }

    /// Append values to a list attribute, skipping ones already present.
    pub fn extend_list(&mut self, name: &str, values: impl IntoIterator<Item = String>) {
        let entry = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| AttributeValue::List(Vec::new()));
        if let AttributeValue::List(existing) = entry {
            for value in values {
                if !existing.contains(&value) {
                    existing.push(value);
                }
            }
        }
    }

    /// Set a single parameter inside a params attribute.
    pub fn put_param(&mut self, name: &str, key: impl Into<String>, value: impl Into<String>) {
        let entry = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| AttributeValue::Params(BTreeMap::new()));
        if let AttributeValue::Params(params) = entry {
            params.insert(key.into(), value.into());
        }
    }

    /// Fill in whatever `other` sets that `self` does not. Params are filled
    /// per entry; every other value is taken whole or not at all. `self`
    /// always wins.
    pub fn fill_from(&mut self, other: &Attributes) {
        for (name, value) in &other.0 {
            match (self.0.get_mut(name), value) {
                (None, _) => {
                    self.0.insert(name.clone(), value.clone());
                }
                (Some(AttributeValue::Params(mine)), AttributeValue::Params(theirs)) => {
                    for (k, v) in theirs {
                        mine.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
                (Some(_), _) => {}
            }
        }
    }

    /// Combine two peers of the same precedence tier. Lists union, params
    /// merge per entry, scalars must agree. Attributes for which `locked`
    /// returns true are owned by a higher tier and are neither compared nor
    /// copied.
    pub fn combine_peer(
        &mut self,
        other: &Attributes,
        locked: impl Fn(&str, Option<&str>) -> bool,
    ) -> Result<(), AttributeClash> {
        for (name, value) in &other.0 {
            if locked(name, None) {
                continue;
            }
            match (self.0.get_mut(name), value) {
                (None, _) => {
                    let mut value = value.clone();
                    if let AttributeValue::Params(params) = &mut value {
                        params.retain(|k, _| !locked(name, Some(k)));
                    }
                    self.0.insert(name.clone(), value);
                }
                (Some(AttributeValue::List(mine)), AttributeValue::List(theirs)) => {
                    for v in theirs {
                        if !mine.contains(v) {
                            mine.push(v.clone());
                        }
                    }
                }
                (Some(AttributeValue::Params(mine)), AttributeValue::Params(theirs)) => {
                    for (k, v) in theirs {
                        if locked(name, Some(k)) {
                            continue;
                        }
                        match mine.get(k) {
                            None => {
                                mine.insert(k.clone(), v.clone());
                            }
                            Some(existing) if existing == v => {}
                            Some(existing) => {
                                return Err(AttributeClash {
                                    attribute: format!("{name}.{k}"),
                                    existing: AttributeValue::Text(existing.clone()),
                                    incoming: AttributeValue::Text(v.clone()),
                                });
                            }
                        }
                    }
                }
                (Some(existing), incoming) => {
                    if existing != incoming {
                        return Err(AttributeClash {
                            attribute: name.clone(),
                            existing: existing.clone(),
                            incoming: incoming.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Identity of a declaration inside a descriptor.
///
/// Components are identified by kind and class; class-less servlets and
/// filters (JSP servlets, name-only overrides) fall back to their name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclarationKey {
    Class { kind: ComponentKind, class_name: String },
    Named { kind: ComponentKind, name: String },
}

impl DeclarationKey {
    pub fn kind(&self) -> ComponentKind {
        match self {
            DeclarationKey::Class { kind, .. } | DeclarationKey::Named { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for DeclarationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKey::Class { kind, class_name } => write!(f, "{kind} {class_name}"),
            DeclarationKey::Named { kind, name } => write!(f, "{kind} named '{name}'"),
        }
    }
}

/// Whether a declaration was read from XML or extracted from bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationSource {
    Descriptor,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDeclaration {
    pub kind: ComponentKind,
    pub class_name: Option<String>,
    pub attributes: Attributes,
    pub source: DeclarationSource,
}

impl ComponentDeclaration {
    pub fn new(kind: ComponentKind, class_name: impl Into<String>) -> Self {
        Self {
            kind,
            class_name: Some(class_name.into()),
            attributes: Attributes::new(),
            source: DeclarationSource::Descriptor,
        }
    }

    /// A servlet or filter known only by name.
    pub fn named(kind: ComponentKind, name: impl Into<String>) -> Self {
        let mut decl = Self {
            kind,
            class_name: None,
            attributes: Attributes::new(),
            source: DeclarationSource::Descriptor,
        };
        decl.attributes
            .insert(attr::NAME, AttributeValue::Text(name.into()));
        decl
    }

    pub fn with_source(mut self, source: DeclarationSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name, value);
        self
    }

    pub fn key(&self) -> DeclarationKey {
        match &self.class_name {
            Some(class_name) => DeclarationKey::Class {
                kind: self.kind,
                class_name: class_name.clone(),
            },
            None => DeclarationKey::Named {
                kind: self.kind,
                name: self.name().unwrap_or_default().to_string(),
            },
        }
    }

    /// Declared component name; defaults to the class name.
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .text(attr::NAME)
            .or(self.class_name.as_deref())
    }

    pub fn url_patterns(&self) -> &[String] {
        self.attributes.list(attr::URL_PATTERNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> AttributeValue {
        AttributeValue::Params(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_key_falls_back_to_name() {
        let decl = ComponentDeclaration::named(ComponentKind::Servlet, "hello.jsp");
        assert_eq!(
            decl.key(),
            DeclarationKey::Named {
                kind: ComponentKind::Servlet,
                name: "hello.jsp".to_string()
            }
        );
        let decl = ComponentDeclaration::new(ComponentKind::Listener, "com.example.Boot");
        assert_eq!(decl.name(), Some("com.example.Boot"));
    }

    #[test]
    fn test_fill_from_keeps_own_values() {
        let mut mine = Attributes::new();
        mine.insert(attr::URL_PATTERNS, AttributeValue::List(vec!["/a".into()]));
        mine.insert(attr::INIT_PARAMS, params(&[("mode", "strict")]));

        let mut theirs = Attributes::new();
        theirs.insert(attr::URL_PATTERNS, AttributeValue::List(vec!["/b".into()]));
        theirs.insert(attr::INIT_PARAMS, params(&[("mode", "lax"), ("depth", "2")]));
        theirs.insert(attr::LOAD_ON_STARTUP, AttributeValue::Integer(1));

        mine.fill_from(&theirs);

        assert_eq!(mine.list(attr::URL_PATTERNS), &["/a".to_string()]);
        let p = mine.params(attr::INIT_PARAMS).unwrap();
        assert_eq!(p.get("mode").map(String::as_str), Some("strict"));
        assert_eq!(p.get("depth").map(String::as_str), Some("2"));
        assert_eq!(mine.integer(attr::LOAD_ON_STARTUP), Some(1));
    }

    #[test]
    fn test_combine_peer_unions_lists_and_rejects_scalar_clash() {
        let mut a = Attributes::new();
        a.insert(attr::URL_PATTERNS, AttributeValue::List(vec!["/a".into()]));
        a.insert(attr::LOAD_ON_STARTUP, AttributeValue::Integer(1));

        let mut b = Attributes::new();
        b.insert(attr::URL_PATTERNS, AttributeValue::List(vec!["/b".into(), "/a".into()]));
        a.combine_peer(&b, |_, _| false).unwrap();
        assert_eq!(a.list(attr::URL_PATTERNS), &["/a".to_string(), "/b".to_string()]);

        let mut c = Attributes::new();
        c.insert(attr::LOAD_ON_STARTUP, AttributeValue::Integer(5));
        let clash = a.combine_peer(&c, |_, _| false).unwrap_err();
        assert_eq!(clash.attribute, attr::LOAD_ON_STARTUP);

        // A locked attribute is owned by a higher tier and never compared.
        a.combine_peer(&c, |name, _| name == attr::LOAD_ON_STARTUP)
            .unwrap();
        assert_eq!(a.integer(attr::LOAD_ON_STARTUP), Some(1));
    }

    #[test]
    fn test_combine_peer_params_per_entry() {
        let mut a = Attributes::new();
        a.insert(attr::INIT_PARAMS, params(&[("x", "1")]));
        let mut b = Attributes::new();
        b.insert(attr::INIT_PARAMS, params(&[("x", "2"), ("y", "3")]));

        let clash = a.combine_peer(&b, |_, _| false).unwrap_err();
        assert_eq!(clash.attribute, "initParams.x");

        a.combine_peer(&b, |name, key| name == attr::INIT_PARAMS && key == Some("x"))
            .unwrap();
        let p = a.params(attr::INIT_PARAMS).unwrap();
        assert_eq!(p.get("x").map(String::as_str), Some("1"));
        assert_eq!(p.get("y").map(String::as_str), Some("3"));
    }
}
