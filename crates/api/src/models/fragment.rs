use crate::error::DeclarationConflict;
use crate::models::component::{ComponentDeclaration, ComponentKind, DeclarationKey};
use crate::models::location::SourceLocation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The four places a fragment can come from, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentKind {
    Explicit,
    PerLocation,
    Container,
    Default,
}

/// One entry of an ordering list: a fragment name or the `others` marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderingEntry {
    Named(String),
    Others,
}

/// Relative ordering of a per-location fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeOrdering {
    pub before: Vec<OrderingEntry>,
    pub after: Vec<OrderingEntry>,
}

impl RelativeOrdering {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn before_others(&self) -> bool {
        self.before.contains(&OrderingEntry::Others)
    }

    pub fn after_others(&self) -> bool {
        self.after.contains(&OrderingEntry::Others)
    }
}

/// A servlet/filter mapping naming a component that the same descriptor
/// does not declare; bound when the effective descriptor is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMapping {
    pub kind: ComponentKind,
    pub name: String,
    pub url_patterns: Vec<String>,
    pub servlet_names: Vec<String>,
    pub dispatchers: Vec<String>,
}

/// A partial deployment descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub source_location: Option<SourceLocation>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub display_name: Option<String>,
    pub metadata_complete: bool,
    pub ordering: RelativeOrdering,
    pub absolute_ordering: Option<Vec<OrderingEntry>>,
    declarations: IndexMap<DeclarationKey, ComponentDeclaration>,
    pub context_params: IndexMap<String, String>,
    pub welcome_files: Vec<String>,
    pub pending_mappings: Vec<PendingMapping>,
}

impl Fragment {
    pub fn new(kind: FragmentKind) -> Self {
        Self {
            kind,
            source_location: None,
            name: None,
            version: None,
            display_name: None,
            metadata_complete: false,
            ordering: RelativeOrdering::default(),
            absolute_ordering: None,
            declarations: IndexMap::new(),
            context_params: IndexMap::new(),
            welcome_files: Vec::new(),
            pending_mappings: Vec::new(),
        }
    }

    pub fn explicit() -> Self {
        Self::new(FragmentKind::Explicit)
    }

    pub fn for_location(location: SourceLocation) -> Self {
        let mut fragment = Self::new(FragmentKind::PerLocation);
        fragment.source_location = Some(location);
        fragment
    }

    pub fn declarations(&self) -> impl Iterator<Item = &ComponentDeclaration> {
        self.declarations.values()
    }

    pub fn declaration(&self, key: &DeclarationKey) -> Option<&ComponentDeclaration> {
        self.declarations.get(key)
    }

    pub fn declaration_mut(&mut self, key: &DeclarationKey) -> Option<&mut ComponentDeclaration> {
        self.declarations.get_mut(key)
    }

    /// Find a servlet or filter by its declared name.
    pub fn find_named_mut(
        &mut self,
        kind: ComponentKind,
        name: &str,
    ) -> Option<&mut ComponentDeclaration> {
        self.declarations
            .values_mut()
            .find(|d| d.kind == kind && d.name() == Some(name))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Add a declaration read from this fragment's own source. An identical
    /// duplicate is absorbed; a differing one is a conflict.
    pub fn add_declaration(
        &mut self,
        declaration: ComponentDeclaration,
    ) -> Result<(), DeclarationConflict> {
        let key = declaration.key();
        match self.declarations.get(&key) {
            None => {
                self.declarations.insert(key, declaration);
                Ok(())
            }
            Some(existing) if existing.attributes == declaration.attributes => Ok(()),
            Some(_) => Err(DeclarationConflict { key }),
        }
    }

    /// Add an annotation-derived declaration. Whatever the fragment's XML
    /// already says about the same component wins; the annotation only
    /// fills gaps.
    pub fn add_annotated(&mut self, declaration: ComponentDeclaration) {
        let key = declaration.key();
        match self.declarations.get_mut(&key) {
            Some(existing) => existing.attributes.fill_from(&declaration.attributes),
            None => {
                self.declarations.insert(key, declaration);
            }
        }
    }
}
