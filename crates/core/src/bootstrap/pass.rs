use super::AssemblyServices;
use super::staged::StagedContainer;
use crate::classify::{ClassifiedComponents, ComponentClassifier};
use crate::config::BootstrapConfig;
use crate::dispatch::{InitializerBinding, InitializerDispatcher};
use crate::error::{AssemblyError, AssemblyFailure};
use crate::extract::AnnotationExtractor;
use crate::finder::AnnotationFinder;
use crate::merge::{EffectiveDescriptor, FragmentMerger};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use webscope_api::{
    ClassPath, ClassPathScope, ContainerSink, DeploymentSpec, DescriptorSource, Fragment,
    FragmentKind, InitializerHandle, ScanArchive, SourceLocation,
};

/// Outcome of one assembly pass.
///
/// `ok` is false as soon as any failure was recorded; the staged operations
/// are then not meant to be installed, but stay available for inspection.
#[derive(Debug)]
pub struct AssemblyReport {
    pub ok: bool,
    pub failures: Vec<AssemblyFailure>,
    pub descriptor: EffectiveDescriptor,
    pub bindings: Vec<InitializerBinding>,
    pub staged: StagedContainer,
    pub scanned_locations: usize,
    /// Classes whose annotations could not be read; logged, never fatal.
    pub unreadable_classes: Vec<String>,
}

/// Scan-derived state. Lives for one pass only.
struct ScanContext {
    archive: ScanArchive,
    finder: AnnotationFinder,
    classified: ClassifiedComponents,
}

pub struct AssemblyPass<'a> {
    spec: &'a DeploymentSpec,
    config: &'a BootstrapConfig,
    services: &'a AssemblyServices,
    primary_initializer: Option<&'a InitializerHandle>,
}

impl<'a> AssemblyPass<'a> {
    pub fn new(
        spec: &'a DeploymentSpec,
        config: &'a BootstrapConfig,
        services: &'a AssemblyServices,
    ) -> Self {
        Self {
            spec,
            config,
            services,
            primary_initializer: None,
        }
    }

    pub fn with_primary_initializer(mut self, handle: Option<&'a InitializerHandle>) -> Self {
        self.primary_initializer = handle;
        self
    }

    /// Run the pass. Only a scan or classification failure is an `Err`;
    /// everything else is recorded in the report.
    pub fn run(&self, visitor: &mut dyn FnMut(&Path)) -> Result<AssemblyReport, AssemblyError> {
        let span = info_span!("assembly", deployment = %self.spec.name);
        let _enter = span.enter();

        let mut failures: Vec<AssemblyFailure> = Vec::new();
        let mut unreadable_classes = Vec::new();

        let scan = if self.config.tomcat_scanning {
            Some(self.scan_and_classify(visitor)?)
        } else {
            debug!("Scanning disabled; merging descriptors only");
            None
        };

        let merger = FragmentMerger::new(Arc::clone(&self.services.parser))
            .with_jsp_servlet_class(self.config.jsp_servlet_class.clone());

        for path in [&self.spec.explicit_descriptor, &self.spec.container_descriptor]
            .into_iter()
            .flatten()
        {
            visitor(path.as_path());
        }

        let default = self.default_fragment(&merger).unwrap_or_else(|error| {
            failures.push(AssemblyFailure::BuiltinDescriptor {
                which: "default",
                error,
            });
            Fragment::new(FragmentKind::Default)
        });
        let container = self.container_fragment(&merger).unwrap_or_else(|error| {
            failures.push(AssemblyFailure::BuiltinDescriptor {
                which: "container",
                error,
            });
            Fragment::new(FragmentKind::Container)
        });

        let mut explicit = Fragment::explicit();
        if let Some(path) = &self.spec.explicit_descriptor {
            let parsed = DescriptorSource::read_optional(path).and_then(|source| match source {
                Some(source) => merger.parser().parse_into(&source, &mut explicit),
                None => {
                    debug!("No explicit descriptor at {}", path.display());
                    Ok(())
                }
            });
            if let Err(error) = parsed {
                failures.push(AssemblyFailure::ExplicitDescriptor(error));
            }
        }

        let mut fragments = match &scan {
            Some(scan) => self.location_fragments(&merger, &scan.archive, &mut failures),
            None => Vec::new(),
        };

        let order = merger
            .order_fragments(&explicit, &fragments)
            .unwrap_or_else(|error| {
                failures.push(AssemblyFailure::Ordering(error));
                Vec::new()
            });

        let mut bindings = Vec::new();
        if let Some(scan) = &scan {
            if failures.is_empty() {
                let dispatcher = InitializerDispatcher::new(Arc::clone(&self.services.initializers));
                match dispatcher.resolve(&scan.archive, &scan.finder) {
                    Ok(resolved) => bindings = resolved,
                    Err(error) => failures.push(AssemblyFailure::Discovery(error)),
                }
            }

            if !explicit.metadata_complete {
                unreadable_classes = self.extract_annotations(&scan.classified, &mut fragments);
            }
        }

        let mut effective = merger.begin(&explicit);
        let mut staged = StagedContainer::new();

        if !explicit.metadata_complete && failures.is_empty() {
            let ordered: Vec<&Fragment> = order.iter().map(|&idx| &fragments[idx]).collect();
            if let Err(conflict) = merger.merge_fragments(&mut effective, &ordered) {
                failures.push(AssemblyFailure::Conflict(conflict));
            }
        }
        merger.merge_builtin(&mut effective, &container);
        merger.merge_builtin(&mut effective, &default);

        if explicit.metadata_complete || failures.is_empty() {
            merger.convert_jsp_declarations(&mut effective);
            if let Err(conflict) = merger.apply_to_container(&mut effective, &mut staged) {
                failures.push(AssemblyFailure::Conflict(conflict));
            }
        }

        if self.config.log_effective_descriptor {
            match effective.to_json_pretty() {
                Ok(json) => info!("Effective descriptor of {}:\n{}", self.spec.name, json),
                Err(e) => warn!("Could not render effective descriptor: {}", e),
            }
        }

        let ok = failures.is_empty();
        if ok {
            if let Some(scan) = &scan {
                for location in resource_locations(&scan.archive, &fragments, &order) {
                    staged.add_resource_location(location);
                }
            }
            if let Some(primary) = self.primary_initializer {
                staged.register_initializer(primary, &BTreeSet::new());
            }
            InitializerDispatcher::dispatch(&bindings, &mut staged);
            info!(
                "Assembled {} component(s) for {}",
                effective.len(),
                self.spec.name
            );
        } else {
            for failure in &failures {
                warn!("Assembly of {} failed: {}", self.spec.name, failure);
            }
        }

        Ok(AssemblyReport {
            ok,
            failures,
            descriptor: effective,
            bindings,
            staged,
            scanned_locations: fragments.len(),
            unreadable_classes,
        })
    }

    /// Scan and classify with the deployment's class path installed on this
    /// thread; the previous one is back in place when this returns.
    fn scan_and_classify(&self, visitor: &mut dyn FnMut(&Path)) -> Result<ScanContext, AssemblyError> {
        let class_path = ClassPath::new(self.spec.name.clone(), self.spec.classpath.clone())
            .with_shared(self.config.shared_libraries.clone());
        let _scope = ClassPathScope::enter(Arc::new(class_path));

        let archive = self.services.scanner.scan(visitor)?;
        let finder = AnnotationFinder::link(&archive);
        let classified = ComponentClassifier::new(&finder, &archive).classify()?;
        debug!(
            "Scanned {} classes in {} location(s); {} location(s) declare components",
            archive.class_count(),
            archive.locations().count(),
            classified.len()
        );
        Ok(ScanContext {
            archive,
            finder,
            classified,
        })
    }

    fn default_fragment(&self, merger: &FragmentMerger) -> Result<Fragment, webscope_api::DescriptorError> {
        match &self.config.default_descriptor {
            Some(path) => {
                let source = DescriptorSource::read(path)?;
                merger.parse_default_fragment(Some(&source))
            }
            None => merger.parse_default_fragment(None),
        }
    }

    fn container_fragment(&self, merger: &FragmentMerger) -> Result<Fragment, webscope_api::DescriptorError> {
        let source = match &self.spec.container_descriptor {
            Some(path) => DescriptorSource::read_optional(path)?,
            None => None,
        };
        merger.parse_container_fragment(source.as_ref())
    }

    /// One fragment per scanned location, in scan order.
    fn location_fragments(
        &self,
        merger: &FragmentMerger,
        archive: &ScanArchive,
        failures: &mut Vec<AssemblyFailure>,
    ) -> Vec<Fragment> {
        archive
            .locations()
            .map(|(location, manifest)| {
                if let Some(message) = &manifest.fragment_error {
                    failures.push(AssemblyFailure::UndecodableFragment {
                        location: location.clone(),
                        message: message.clone(),
                    });
                    return Fragment::for_location(location.clone());
                }
                let Some(source) = &manifest.web_fragment else {
                    return Fragment::for_location(location.clone());
                };
                match merger.parser().parse(source, FragmentKind::PerLocation) {
                    Ok(mut fragment) => {
                        fragment.source_location = Some(location.clone());
                        fragment
                    }
                    Err(error) => {
                        failures.push(AssemblyFailure::Fragment {
                            location: location.clone(),
                            error,
                        });
                        Fragment::for_location(location.clone())
                    }
                }
            })
            .collect()
    }

    /// Add annotation-derived declarations to the fragment of each location.
    /// Returns the classes that could not be read.
    fn extract_annotations(
        &self,
        classified: &ClassifiedComponents,
        fragments: &mut [Fragment],
    ) -> Vec<String> {
        let extractor = AnnotationExtractor::new(Arc::clone(&self.services.reader));
        let positions: HashMap<SourceLocation, usize> = fragments
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| f.source_location.clone().map(|l| (l, idx)))
            .collect();

        let mut unreadable = Vec::new();
        for (location, classes) in classified {
            let Some(&idx) = positions.get(location) else {
                continue;
            };
            let fragment = &mut fragments[idx];
            if fragment.metadata_complete {
                debug!("Fragment of {} is metadata-complete; skipping annotations", location);
                continue;
            }
            for class in classes {
                match extractor.extract(location, &class.name) {
                    Ok(declarations) => {
                        for declaration in declarations {
                            fragment.add_annotated(declaration);
                        }
                    }
                    Err(e) => {
                        warn!("Skipping annotations of {}: {}", class.name, e);
                        unreadable.push(class.name.clone());
                    }
                }
            }
        }
        unreadable
    }
}

/// Locations shipping static resources: merged fragments first, in merge
/// order, then the rest in scan order.
fn resource_locations<'f>(
    archive: &ScanArchive,
    fragments: &'f [Fragment],
    order: &[usize],
) -> Vec<&'f SourceLocation> {
    let rest = (0..fragments.len()).filter(|idx| !order.contains(idx));
    order
        .iter()
        .copied()
        .chain(rest)
        .filter_map(|idx| fragments[idx].source_location.as_ref())
        .filter(|location| {
            archive
                .manifest(location)
                .is_some_and(|manifest| manifest.has_resources)
        })
        .collect()
}
