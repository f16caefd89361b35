use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use webscope_api::{
    ComponentDeclaration, ComponentKind, DeclarationKey, DeclarationSource, Fragment,
    PendingMapping, SourceLocation,
};

/// Which tier an effective entry was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "camelCase")]
pub enum Origin {
    Explicit,
    Fragment {
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<SourceLocation>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Container,
    Default,
}

impl Origin {
    pub fn of(fragment: &Fragment) -> Self {
        Origin::Fragment {
            location: fragment.source_location.clone(),
            name: fragment.name.clone(),
        }
    }

    /// Precedence tier; lower wins.
    pub fn tier(&self) -> u8 {
        match self {
            Origin::Explicit => 0,
            Origin::Fragment { .. } => 1,
            Origin::Container => 2,
            Origin::Default => 3,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Explicit => f.write_str("explicit descriptor"),
            Origin::Fragment {
                name: Some(name), ..
            } => write!(f, "fragment '{name}'"),
            Origin::Fragment {
                location: Some(location),
                ..
            } => write!(f, "fragment of {location}"),
            Origin::Fragment { .. } => f.write_str("unnamed fragment"),
            Origin::Container => f.write_str("container descriptor"),
            Origin::Default => f.write_str("default descriptor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveEntry {
    #[serde(flatten)]
    pub declaration: ComponentDeclaration,
    pub origin: Origin,
}

/// The merged descriptor of one deployment.
///
/// Entries stay keyed by the identity they were declared under, even after
/// JSP conversion rewrites their class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveDescriptor {
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub metadata_complete: bool,
    pub(super) entries: IndexMap<DeclarationKey, EffectiveEntry>,
    pub(super) context_params: IndexMap<String, String>,
    pub(super) welcome_files: Vec<String>,
    pub(super) pending_mappings: Vec<(PendingMapping, Origin)>,
    pub(super) fragment_order: Vec<String>,
}

impl EffectiveDescriptor {
    pub fn entries(&self) -> impl Iterator<Item = &EffectiveEntry> {
        self.entries.values()
    }

    pub fn entry(&self, key: &DeclarationKey) -> Option<&EffectiveEntry> {
        self.entries.get(key)
    }

    pub fn components(&self, kind: ComponentKind) -> impl Iterator<Item = &EffectiveEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.declaration.kind == kind)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &EffectiveEntry> {
        self.components(ComponentKind::Listener)
    }

    pub fn servlets(&self) -> impl Iterator<Item = &EffectiveEntry> {
        self.components(ComponentKind::Servlet)
    }

    pub fn filters(&self) -> impl Iterator<Item = &EffectiveEntry> {
        self.components(ComponentKind::Filter)
    }

    /// Servlet or filter by declared name.
    pub fn named(&self, kind: ComponentKind, name: &str) -> Option<&EffectiveEntry> {
        self.components(kind)
            .find(|entry| entry.declaration.name() == Some(name))
    }

    pub fn context_params(&self) -> &IndexMap<String, String> {
        &self.context_params
    }

    pub fn welcome_files(&self) -> &[String] {
        &self.welcome_files
    }

    /// Names (or locations) of the merged fragments, in merge order.
    pub fn fragment_order(&self) -> &[String] {
        &self.fragment_order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn annotation_derived(&self) -> impl Iterator<Item = &EffectiveEntry> {
        self.entries
            .values()
            .filter(|entry| entry.declaration.source == DeclarationSource::Annotation)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&DescriptorDump {
            display_name: self.display_name.as_deref(),
            version: self.version.as_deref(),
            metadata_complete: self.metadata_complete,
            fragment_order: &self.fragment_order,
            context_params: &self.context_params,
            welcome_files: &self.welcome_files,
            components: self.entries.values().collect(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorDump<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    metadata_complete: bool,
    fragment_order: &'a [String],
    context_params: &'a IndexMap<String, String>,
    welcome_files: &'a [String],
    components: Vec<&'a EffectiveEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use webscope_api::{AttributeValue, attr};

    #[test]
    fn test_origin_tiers() {
        let fragment = Origin::Fragment {
            location: Some(SourceLocation::archive("/lib/a.jar")),
            name: None,
        };
        assert!(Origin::Explicit.tier() < fragment.tier());
        assert!(fragment.tier() < Origin::Container.tier());
        assert!(Origin::Container.tier() < Origin::Default.tier());
        assert_eq!(fragment.to_string(), "fragment of /lib/a.jar");
    }

    #[test]
    fn test_json_dump_is_stable() {
        let mut descriptor = EffectiveDescriptor::default();
        let decl = ComponentDeclaration::new(ComponentKind::Servlet, "com.example.S")
            .with_attribute(attr::URL_PATTERNS, AttributeValue::List(vec!["/a".into()]));
        descriptor.entries.insert(
            decl.key(),
            EffectiveEntry {
                declaration: decl,
                origin: Origin::Explicit,
            },
        );
        descriptor.context_params.insert("mode".into(), "prod".into());

        let json = descriptor.to_json_pretty().unwrap();
        assert_eq!(json, descriptor.clone().to_json_pretty().unwrap());

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["components"][0]["className"], "com.example.S");
        assert_eq!(value["components"][0]["origin"]["tier"], "explicit");
        assert_eq!(value["components"][0]["attributes"]["urlPatterns"][0], "/a");
        assert_eq!(value["contextParams"]["mode"], "prod");
    }
}
