use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
    Enum,
}

/// A reference to a scanned class. Ordered by name first so sets of class
/// refs iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub name: String,
    pub kind: ClassKind,
    pub public: bool,
    pub is_abstract: bool,
}

impl ClassRef {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            public: true,
            is_abstract: matches!(kind, ClassKind::Interface | ClassKind::Annotation),
        }
    }

    pub fn with_access(mut self, public: bool, is_abstract: bool) -> Self {
        self.public = public;
        self.is_abstract = is_abstract;
        self
    }

    /// Concrete, publicly visible classes are the only ones a container can
    /// instantiate as web components.
    pub fn is_instantiable(&self) -> bool {
        self.public && !self.is_abstract && self.kind == ClassKind::Class
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Structural facts about one class, as recorded by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub class: ClassRef,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    /// Fully qualified names of the class-level annotations.
    pub annotations: Vec<String>,
}

impl ClassInfo {
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            super_class: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }
}

/// Tag deciding which finder index resolves an interest type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Annotation,
    Interface,
    Superclass,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub tag: TypeTag,
}

impl TypeRef {
    pub fn annotation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::Annotation,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::Interface,
        }
    }

    pub fn superclass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::Superclass,
        }
    }

    /// Derive the tag from the kind of the referenced class.
    pub fn for_class(class: &ClassRef) -> Self {
        let tag = match class.kind {
            ClassKind::Annotation => TypeTag::Annotation,
            ClassKind::Interface => TypeTag::Interface,
            ClassKind::Class | ClassKind::Enum => TypeTag::Superclass,
        };
        Self {
            name: class.name.clone(),
            tag,
        }
    }
}
