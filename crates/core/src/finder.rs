use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;
use webscope_api::{ClassFinder, ClassInfo, ClassRef, ScanArchive};

/// In-memory [`ClassFinder`] over one scan.
///
/// Every index is built up front by [`AnnotationFinder::link`], so lookups
/// are plain map reads. Supertypes that were not scanned (e.g. container
/// API classes) still take part in the hierarchy by name.
#[derive(Debug, Default)]
pub struct AnnotationFinder {
    annotated: HashMap<String, BTreeSet<ClassRef>>,
    implementations: HashMap<String, BTreeSet<ClassRef>>,
    subclasses: HashMap<String, BTreeSet<ClassRef>>,
}

impl AnnotationFinder {
    pub fn link(archive: &ScanArchive) -> Self {
        let mut finder = Self::default();

        for info in archive.classes() {
            for annotation in &info.annotations {
                finder
                    .annotated
                    .entry(annotation.clone())
                    .or_default()
                    .insert(info.class.clone());
            }

            let (superclasses, interfaces) = supertypes(archive, info);
            for name in superclasses {
                finder
                    .subclasses
                    .entry(name)
                    .or_default()
                    .insert(info.class.clone());
            }
            for name in interfaces {
                finder
                    .implementations
                    .entry(name)
                    .or_default()
                    .insert(info.class.clone());
            }
        }

        debug!(
            "Linked {} classes: {} annotation types, {} interfaces, {} superclasses",
            archive.class_count(),
            finder.annotated.len(),
            finder.implementations.len(),
            finder.subclasses.len()
        );
        finder
    }
}

/// Transitive superclasses and interfaces of `info`.
fn supertypes(archive: &ScanArchive, info: &ClassInfo) -> (Vec<String>, HashSet<String>) {
    let mut superclasses = Vec::new();
    let mut interfaces = HashSet::new();
    let mut pending: Vec<&str> = info.interfaces.iter().map(String::as_str).collect();

    let mut current = info.super_class.as_deref();
    while let Some(name) = current {
        if superclasses.iter().any(|s: &String| s == name) || name == info.name() {
            break;
        }
        superclasses.push(name.to_string());
        match archive.class_info(name) {
            Some(parent) => {
                pending.extend(parent.interfaces.iter().map(String::as_str));
                current = parent.super_class.as_deref();
            }
            None => current = None,
        }
    }

    while let Some(name) = pending.pop() {
        if !interfaces.insert(name.to_string()) {
            continue;
        }
        if let Some(parent) = archive.class_info(name) {
            pending.extend(parent.interfaces.iter().map(String::as_str));
        }
    }
    interfaces.remove(info.name());

    (superclasses, interfaces)
}

fn collect(index: &HashMap<String, BTreeSet<ClassRef>>, key: &str) -> Vec<ClassRef> {
    index
        .get(key)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}

impl ClassFinder for AnnotationFinder {
    fn find_annotated_classes(&self, annotation: &str) -> Vec<ClassRef> {
        collect(&self.annotated, annotation)
    }

    fn find_implementations(&self, interface: &str) -> Vec<ClassRef> {
        collect(&self.implementations, interface)
    }

    fn find_subclasses(&self, class: &str) -> Vec<ClassRef> {
        collect(&self.subclasses, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webscope_api::ClassKind;

    fn class(name: &str, super_class: Option<&str>, interfaces: &[&str]) -> ClassInfo {
        let mut info = ClassInfo::new(ClassRef::new(name, ClassKind::Class));
        info.super_class = super_class.map(str::to_string);
        info.interfaces = interfaces.iter().map(|s| s.to_string()).collect();
        info
    }

    fn interface(name: &str, extends: &[&str]) -> ClassInfo {
        let mut info = ClassInfo::new(ClassRef::new(name, ClassKind::Interface));
        info.interfaces = extends.iter().map(|s| s.to_string()).collect();
        info
    }

    fn names(refs: Vec<ClassRef>) -> Vec<String> {
        refs.into_iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_transitive_hierarchy() {
        let mut archive = ScanArchive::new();
        archive.add_class(interface("a.Handler", &[]));
        archive.add_class(interface("a.SpecialHandler", &["a.Handler"]));
        archive.add_class(class("a.Base", Some("javax.servlet.http.HttpServlet"), &["a.SpecialHandler"]));
        archive.add_class(class("a.Leaf", Some("a.Base"), &[]));
        let mut annotated = class("a.Marked", None, &[]);
        annotated.annotations.push("a.Marker".to_string());
        archive.add_class(annotated);

        let finder = AnnotationFinder::link(&archive);

        assert_eq!(names(finder.find_implementations("a.Handler")), vec!["a.Base", "a.Leaf", "a.SpecialHandler"]);
        assert_eq!(names(finder.find_subclasses("a.Base")), vec!["a.Leaf"]);
        assert_eq!(
            names(finder.find_subclasses("javax.servlet.http.HttpServlet")),
            vec!["a.Base", "a.Leaf"]
        );
        assert_eq!(names(finder.find_annotated_classes("a.Marker")), vec!["a.Marked"]);
        assert!(finder.find_annotated_classes("a.Unknown").is_empty());
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let mut archive = ScanArchive::new();
        archive.add_class(class("a.A", Some("a.B"), &[]));
        archive.add_class(class("a.B", Some("a.A"), &[]));
        let finder = AnnotationFinder::link(&archive);
        assert_eq!(names(finder.find_subclasses("a.A")), vec!["a.B"]);
    }
}
