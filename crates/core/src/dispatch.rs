use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use webscope_api::{
    ClassFinder, ClassRef, ContainerSink, DiscoveryError, InitializerHandle, InitializerLoader,
    InitializerRegistration, InterestType, ScanArchive, TypeRef, TypeTag,
};

/// An initializer together with everything its interest types matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializerBinding {
    pub initializer: InitializerHandle,
    pub interest_types: BTreeSet<TypeRef>,
    pub matched_classes: BTreeSet<ClassRef>,
}

impl InitializerBinding {
    /// A binding that matched nothing, still to be invoked.
    pub fn empty(initializer: InitializerHandle) -> Self {
        Self {
            initializer,
            interest_types: BTreeSet::new(),
            matched_classes: BTreeSet::new(),
        }
    }

    /// Resolve every interest type of `registration` against `finder`.
    /// Unresolved types are skipped on their own.
    pub fn resolve(registration: &InitializerRegistration, finder: &dyn ClassFinder) -> Self {
        let mut binding = Self::empty(registration.handle.clone());
        for interest in &registration.interest {
            let (type_ref, matches) = match interest {
                InterestType::Resolved(type_ref) => {
                    let matches = match type_ref.tag {
                        TypeTag::Annotation => finder.find_annotated_classes(&type_ref.name),
                        TypeTag::Interface => finder.find_implementations(&type_ref.name),
                        TypeTag::Superclass => finder.find_subclasses(&type_ref.name),
                    };
                    (type_ref.clone(), matches)
                }
                InterestType::Named(name) => match resolve_named(name, finder) {
                    Some(found) => found,
                    None => {
                        debug!(
                            "Skipping interest type {} of {}: unknown to the scan",
                            name, registration.handle
                        );
                        continue;
                    }
                },
                InterestType::Unresolved { name, reason } => {
                    debug!(
                        "Skipping interest type {} of {}: {}",
                        name, registration.handle, reason
                    );
                    continue;
                }
            };
            binding.interest_types.insert(type_ref);
            binding.matched_classes.extend(matches);
        }
        binding
    }
}

/// Tag an unscanned type by the first index that knows its name. A name is
/// only ever an annotation, an interface or a class, so at most one index
/// holds it.
fn resolve_named(name: &str, finder: &dyn ClassFinder) -> Option<(TypeRef, Vec<ClassRef>)> {
    let annotated = finder.find_annotated_classes(name);
    if !annotated.is_empty() {
        return Some((TypeRef::annotation(name), annotated));
    }
    let implementations = finder.find_implementations(name);
    if !implementations.is_empty() {
        return Some((TypeRef::interface(name), implementations));
    }
    let subclasses = finder.find_subclasses(name);
    if !subclasses.is_empty() {
        return Some((TypeRef::superclass(name), subclasses));
    }
    None
}

pub struct InitializerDispatcher {
    loader: Arc<dyn InitializerLoader>,
}

impl InitializerDispatcher {
    pub fn new(loader: Arc<dyn InitializerLoader>) -> Self {
        Self { loader }
    }

    /// Discover the initializers of the scanned deployment and resolve their
    /// interest sets. Only a failure to enumerate them at all is an error.
    pub fn resolve(
        &self,
        archive: &ScanArchive,
        finder: &dyn ClassFinder,
    ) -> Result<Vec<InitializerBinding>, DiscoveryError> {
        let registrations = self.loader.load(archive).inspect_err(|e| {
            warn!("Initializer discovery failed: {}", e);
        })?;
        let bindings: Vec<InitializerBinding> = registrations
            .iter()
            .map(|registration| InitializerBinding::resolve(registration, finder))
            .collect();
        debug!("Resolved {} initializer(s)", bindings.len());
        Ok(bindings)
    }

    /// Invoke each binding exactly once, empty match sets included.
    pub fn dispatch(bindings: &[InitializerBinding], sink: &mut dyn ContainerSink) {
        for binding in bindings {
            debug!(
                "Invoking initializer {} with {} class(es)",
                binding.initializer,
                binding.matched_classes.len()
            );
            sink.register_initializer(&binding.initializer, &binding.matched_classes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::AnnotationFinder;
    use webscope_api::{ClassInfo, ClassKind, ComponentDeclaration};

    struct StaticLoader(Vec<InitializerRegistration>);

    impl InitializerLoader for StaticLoader {
        fn load(&self, _: &ScanArchive) -> Result<Vec<InitializerRegistration>, DiscoveryError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLoader;

    impl InitializerLoader for FailingLoader {
        fn load(&self, _: &ScanArchive) -> Result<Vec<InitializerRegistration>, DiscoveryError> {
            Err(DiscoveryError::Io {
                path: "/lib/broken.jar".into(),
                source: std::io::Error::other("boom"),
            })
        }
    }

    #[derive(Default)]
    struct InvocationSink(Vec<(InitializerHandle, BTreeSet<ClassRef>)>);

    impl ContainerSink for InvocationSink {
        fn register_component(&mut self, _: &ComponentDeclaration) {}
        fn set_context_param(&mut self, _: &str, _: &str) {}
        fn add_welcome_file(&mut self, _: &str) {}
        fn register_initializer(&mut self, initializer: &InitializerHandle, classes: &BTreeSet<ClassRef>) {
            self.0.push((initializer.clone(), classes.clone()));
        }
    }

    fn archive() -> ScanArchive {
        let mut archive = ScanArchive::new();
        let mut handler = ClassInfo::new(ClassRef::new("app.Handler", ClassKind::Class));
        handler.interfaces.push("spi.Plugin".into());
        handler.annotations.push("spi.Marker".into());
        archive.add_class(handler);
        let mut sub = ClassInfo::new(ClassRef::new("app.Sub", ClassKind::Class));
        sub.super_class = Some("app.Handler".into());
        archive.add_class(sub);
        archive
    }

    #[test]
    fn test_union_of_interest_types() {
        let archive = archive();
        let finder = AnnotationFinder::link(&archive);
        let registration = InitializerRegistration::new(InitializerHandle::new("spi.Init"))
            .with_interest(InterestType::Resolved(TypeRef::annotation("spi.Marker")))
            .with_interest(InterestType::Resolved(TypeRef::interface("spi.Plugin")))
            .with_interest(InterestType::Unresolved {
                name: "spi.Gone".into(),
                reason: "class not found".into(),
            });

        let binding = InitializerBinding::resolve(&registration, &finder);
        let matched: Vec<_> = binding.matched_classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(matched, vec!["app.Handler", "app.Sub"]);
        assert_eq!(binding.interest_types.len(), 2);
    }

    #[test]
    fn test_unscanned_container_types_resolve_through_the_finder() {
        let mut archive = ScanArchive::new();
        let mut servlet = ClassInfo::new(ClassRef::new("app.MyServlet", ClassKind::Class));
        servlet.super_class = Some("javax.servlet.http.HttpServlet".into());
        servlet.interfaces.push("javax.servlet.Servlet".into());
        archive.add_class(servlet);
        let mut resource = ClassInfo::new(ClassRef::new("app.Orders", ClassKind::Class));
        resource.annotations.push("javax.ws.rs.Path".into());
        archive.add_class(resource);
        let finder = AnnotationFinder::link(&archive);

        let registration = InitializerRegistration::new(InitializerHandle::new("spi.Init"))
            .with_interest(InterestType::Named("javax.servlet.http.HttpServlet".into()))
            .with_interest(InterestType::Named("javax.servlet.Servlet".into()))
            .with_interest(InterestType::Named("javax.ws.rs.Path".into()))
            .with_interest(InterestType::Named("javax.servlet.Filter".into()));

        let binding = InitializerBinding::resolve(&registration, &finder);
        let matched: Vec<_> = binding.matched_classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(matched, vec!["app.MyServlet", "app.Orders"]);
        assert_eq!(
            binding.interest_types,
            BTreeSet::from([
                TypeRef::superclass("javax.servlet.http.HttpServlet"),
                TypeRef::interface("javax.servlet.Servlet"),
                TypeRef::annotation("javax.ws.rs.Path"),
            ])
        );
    }

    #[test]
    fn test_empty_match_is_still_invoked_once() {
        let archive = archive();
        let finder = AnnotationFinder::link(&archive);
        let dispatcher = InitializerDispatcher::new(Arc::new(StaticLoader(vec![
            InitializerRegistration::new(InitializerHandle::new("spi.Lonely"))
                .with_interest(InterestType::Resolved(TypeRef::annotation("spi.Nothing"))),
        ])));

        let bindings = dispatcher.resolve(&archive, &finder).unwrap();
        let mut sink = InvocationSink::default();
        InitializerDispatcher::dispatch(&bindings, &mut sink);

        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].0, InitializerHandle::new("spi.Lonely"));
        assert!(sink.0[0].1.is_empty());
    }

    #[test]
    fn test_discovery_failure_propagates() {
        let archive = archive();
        let finder = AnnotationFinder::link(&archive);
        let dispatcher = InitializerDispatcher::new(Arc::new(FailingLoader));
        assert!(dispatcher.resolve(&archive, &finder).is_err());
    }
}
