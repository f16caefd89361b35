//! Classpath discovery contracts.

use crate::descriptor::DescriptorSource;
use crate::error::ScanError;
use crate::models::{ClassInfo, ClassRef, SourceLocation};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// What one source location contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationManifest {
    pub class_names: BTreeSet<String>,
    /// `META-INF/web-fragment.xml`, if the location ships one.
    pub web_fragment: Option<DescriptorSource>,
    /// Why the location's `web-fragment.xml` could not be decoded.
    pub fragment_error: Option<String>,
    /// Whether the location ships static resources under `META-INF/resources`.
    pub has_resources: bool,
}

impl LocationManifest {
    pub fn claims(&self, class_name: &str) -> bool {
        self.class_names.contains(class_name)
    }
}

/// Result of one classpath scan. Locations keep scan order.
#[derive(Debug, Clone, Default)]
pub struct ScanArchive {
    locations: IndexMap<SourceLocation, LocationManifest>,
    classes: BTreeMap<String, ClassInfo>,
}

impl ScanArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&mut self, location: SourceLocation, manifest: LocationManifest) {
        self.locations.insert(location, manifest);
    }

    /// Record a class. The first location to define a name shadows later
    /// ones, as a class loader would.
    pub fn add_class(&mut self, info: ClassInfo) {
        self.classes.entry(info.name().to_string()).or_insert(info);
    }

    pub fn locations(&self) -> impl Iterator<Item = (&SourceLocation, &LocationManifest)> {
        self.locations.iter()
    }

    pub fn manifest(&self, location: &SourceLocation) -> Option<&LocationManifest> {
        self.locations.get(location)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    pub fn class_info(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// The first location (in scan order) whose manifest claims the class.
    pub fn owning_location(&self, class_name: &str) -> Option<&SourceLocation> {
        self.locations
            .iter()
            .find(|(_, manifest)| manifest.claims(class_name))
            .map(|(location, _)| location)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

/// Enumerates the classpath in scope (see [`crate::context::ClassPathScope`]).
pub trait ClasspathScanner: Send + Sync {
    /// Scan every location of the current class path. `visitor` is called
    /// once for each file visited so callers can watch them.
    fn scan(&self, visitor: &mut dyn FnMut(&Path)) -> Result<ScanArchive, ScanError>;
}

/// Indexed queries over a scan.
pub trait ClassFinder: Send + Sync {
    fn find_annotated_classes(&self, annotation: &str) -> Vec<ClassRef>;

    /// Every class implementing the interface, directly or through
    /// sub-interfaces and superclasses.
    fn find_implementations(&self, interface: &str) -> Vec<ClassRef>;

    /// Every transitive subclass of the class.
    fn find_subclasses(&self, class: &str) -> Vec<ClassRef>;
}
