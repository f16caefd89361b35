use crate::error::ClassificationError;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;
use webscope_api::{ClassFinder, ClassRef, ScanArchive, SourceLocation};

/// Class-level annotations that declare a web component.
pub const COMPONENT_ANNOTATIONS: [&str; 6] = [
    "javax.servlet.annotation.WebServlet",
    "javax.servlet.annotation.WebFilter",
    "javax.servlet.annotation.WebListener",
    "jakarta.servlet.annotation.WebServlet",
    "jakarta.servlet.annotation.WebFilter",
    "jakarta.servlet.annotation.WebListener",
];

/// Annotated candidates grouped by the location that declares them, in
/// scan order.
pub type ClassifiedComponents = IndexMap<SourceLocation, BTreeSet<ClassRef>>;

pub struct ComponentClassifier<'a> {
    finder: &'a dyn ClassFinder,
    archive: &'a ScanArchive,
}

impl<'a> ComponentClassifier<'a> {
    pub fn new(finder: &'a dyn ClassFinder, archive: &'a ScanArchive) -> Self {
        Self { finder, archive }
    }

    /// Group every instantiable component candidate under its owning
    /// location. A candidate no location claims fails the whole step.
    pub fn classify(&self) -> Result<ClassifiedComponents, ClassificationError> {
        let mut grouped: IndexMap<SourceLocation, BTreeSet<ClassRef>> = IndexMap::new();

        for annotation in COMPONENT_ANNOTATIONS {
            for candidate in self.finder.find_annotated_classes(annotation) {
                if !candidate.is_instantiable() {
                    debug!("Skipping non-instantiable component candidate {}", candidate);
                    continue;
                }
                let location = self.archive.owning_location(&candidate.name).ok_or_else(|| {
                    ClassificationError {
                        class_name: candidate.name.clone(),
                    }
                })?;
                grouped.entry(location.clone()).or_default().insert(candidate);
            }
        }

        let mut ordered = ClassifiedComponents::new();
        for (location, _) in self.archive.locations() {
            if let Some(classes) = grouped.swap_remove(location) {
                ordered.insert(location.clone(), classes);
            }
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::AnnotationFinder;
    use webscope_api::{ClassInfo, ClassKind, LocationManifest};

    fn annotated(name: &str, annotation: &str) -> ClassInfo {
        let mut info = ClassInfo::new(ClassRef::new(name, ClassKind::Class));
        info.annotations.push(annotation.to_string());
        info
    }

    fn manifest(classes: &[&str]) -> LocationManifest {
        LocationManifest {
            class_names: classes.iter().map(|s| s.to_string()).collect(),
            ..LocationManifest::default()
        }
    }

    #[test]
    fn test_groups_by_owning_location() {
        let l1 = SourceLocation::archive("/lib/one.jar");
        let l2 = SourceLocation::directory("/classes");
        let mut archive = ScanArchive::new();
        archive.add_location(l2.clone(), manifest(&["app.Boot"]));
        archive.add_location(l1.clone(), manifest(&["lib.Servlet", "lib.Abstract"]));
        archive.add_class(annotated("app.Boot", "jakarta.servlet.annotation.WebListener"));
        archive.add_class(annotated("lib.Servlet", "javax.servlet.annotation.WebServlet"));
        let mut abstract_class = annotated("lib.Abstract", "javax.servlet.annotation.WebFilter");
        abstract_class.class.is_abstract = true;
        archive.add_class(abstract_class);

        let finder = AnnotationFinder::link(&archive);
        let grouped = ComponentClassifier::new(&finder, &archive).classify().unwrap();

        let locations: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(locations, vec![l2.clone(), l1.clone()]);
        let in_l1: Vec<_> = grouped[&l1].iter().map(|c| c.name.as_str()).collect();
        assert_eq!(in_l1, vec!["lib.Servlet"]);
    }

    #[test]
    fn test_orphan_is_an_error() {
        let mut archive = ScanArchive::new();
        archive.add_location(SourceLocation::archive("/lib/one.jar"), manifest(&[]));
        archive.add_class(annotated("lost.Listener", "javax.servlet.annotation.WebListener"));

        let finder = AnnotationFinder::link(&archive);
        let err = ComponentClassifier::new(&finder, &archive)
            .classify()
            .unwrap_err();
        assert_eq!(err.class_name, "lost.Listener");
    }
}
