use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use webscope_api::{
    AnnotationRecord, ClassAttributeReader, ClassInfo, ClassKind, ClassPath, ClassRef,
    ClasspathScanner, ComponentDeclaration, ContainerSink, DescriptorSource, DiscoveryError,
    ElementValue, InitializerHandle, InitializerLoader, InitializerRegistration, LocationManifest,
    ReadError, ScanArchive, ScanError, SourceLocation,
};
use webscope_core::AssemblyServices;
use webscope_core::bootstrap::StagedContainer;
use webscope_core::descriptor::XmlDescriptorParser;

pub const WEB_SERVLET: &str = "jakarta.servlet.annotation.WebServlet";
pub const WEB_LISTENER: &str = "jakarta.servlet.annotation.WebListener";

/// A classpath assembled in memory, plus the annotation tables the reader
/// hands out for it.
#[derive(Clone, Default)]
pub struct Classpath {
    pub archive: ScanArchive,
    pub records: HashMap<String, Vec<AnnotationRecord>>,
    pub visited: Vec<PathBuf>,
}

#[allow(dead_code)]
impl Classpath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(mut self, location: &SourceLocation, web_fragment: Option<&str>) -> Self {
        let manifest = LocationManifest {
            web_fragment: web_fragment
                .map(|xml| DescriptorSource::new(format!("{location}!web-fragment.xml"), xml)),
            ..LocationManifest::default()
        };
        self.archive.add_location(location.clone(), manifest);
        self.visited.push(location.path().to_path_buf());
        self
    }

    /// A location whose `web-fragment.xml` could not be decoded.
    pub fn undecodable_fragment(mut self, location: &SourceLocation, reason: &str) -> Self {
        let manifest = LocationManifest {
            fragment_error: Some(reason.to_string()),
            ..LocationManifest::default()
        };
        self.archive.add_location(location.clone(), manifest);
        self
    }

    pub fn with_resources(mut self, location: &SourceLocation) -> Self {
        let mut manifest = self.archive.manifest(location).cloned().unwrap_or_default();
        manifest.has_resources = true;
        self.archive.add_location(location.clone(), manifest);
        self
    }

    /// Add an annotated class to `location` (or to no location at all).
    pub fn annotated(
        mut self,
        location: Option<&SourceLocation>,
        class_name: &str,
        record: AnnotationRecord,
    ) -> Self {
        if let Some(location) = location {
            let mut manifest = self.archive.manifest(location).cloned().unwrap_or_default();
            manifest.class_names.insert(class_name.to_string());
            self.archive.add_location(location.clone(), manifest);
        }
        let mut info = ClassInfo::new(ClassRef::new(class_name, ClassKind::Class));
        info.annotations.push(record.type_name.clone());
        self.archive.add_class(info);
        self.records
            .entry(class_name.to_string())
            .or_default()
            .push(record);
        self
    }

    pub fn listener(self, location: &SourceLocation, class_name: &str) -> Self {
        self.annotated(Some(location), class_name, AnnotationRecord::new(WEB_LISTENER))
    }

    pub fn servlet(self, location: &SourceLocation, class_name: &str, patterns: &[&str]) -> Self {
        let record = AnnotationRecord::new(WEB_SERVLET).with(
            "urlPatterns",
            ElementValue::Array(
                patterns
                    .iter()
                    .map(|p| ElementValue::Str(p.to_string()))
                    .collect(),
            ),
        );
        self.annotated(Some(location), class_name, record)
    }
}

/// Serves the prepared classpath, restricted to what the class path in
/// scope allows, and remembers which deployment asked.
pub struct FakeScanner {
    classpath: Classpath,
    fail: bool,
    pub scanned_for: Mutex<Vec<String>>,
}

impl FakeScanner {
    pub fn new(classpath: Classpath) -> Self {
        Self {
            classpath,
            fail: false,
            scanned_for: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            classpath: Classpath::new(),
            fail: true,
            scanned_for: Mutex::new(Vec::new()),
        }
    }
}

impl ClasspathScanner for FakeScanner {
    fn scan(&self, visitor: &mut dyn FnMut(&Path)) -> Result<ScanArchive, ScanError> {
        let class_path = ClassPath::current().ok_or(ScanError::NoClassPath)?;
        self.scanned_for
            .lock()
            .unwrap()
            .push(class_path.deployment.clone());
        if self.fail {
            return Err(ScanError::Io {
                path: PathBuf::from("/broken"),
                source: std::io::Error::other("disk on fire"),
            });
        }

        let allowed: BTreeSet<&SourceLocation> = class_path.scannable().collect();
        let source = &self.classpath.archive;
        let mut archive = ScanArchive::new();
        for (location, manifest) in source.locations() {
            if allowed.contains(location) {
                archive.add_location(location.clone(), manifest.clone());
            }
        }
        for info in source.classes() {
            let excluded = source
                .owning_location(info.name())
                .is_some_and(|location| !allowed.contains(location));
            if !excluded {
                archive.add_class(info.clone());
            }
        }
        for path in &self.classpath.visited {
            visitor(path);
        }
        Ok(archive)
    }
}

pub struct MapReader(pub HashMap<String, Vec<AnnotationRecord>>);

impl ClassAttributeReader for MapReader {
    fn class_attributes(
        &self,
        _location: &SourceLocation,
        class_name: &str,
    ) -> Result<Vec<AnnotationRecord>, ReadError> {
        self.0
            .get(class_name)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(class_name.to_string()))
    }
}

pub struct StaticLoader(pub Result<Vec<InitializerRegistration>, ()>);

impl InitializerLoader for StaticLoader {
    fn load(&self, _: &ScanArchive) -> Result<Vec<InitializerRegistration>, DiscoveryError> {
        self.0.clone().map_err(|_| DiscoveryError::Io {
            path: PathBuf::from("META-INF/services"),
            source: std::io::Error::other("unreadable"),
        })
    }
}

/// Live container double; clones share the recorded state.
#[derive(Clone, Default)]
pub struct SharedSink(pub Arc<Mutex<StagedContainer>>);

#[allow(dead_code)]
impl SharedSink {
    pub fn snapshot(&self) -> StagedContainer {
        self.0.lock().unwrap().clone()
    }
}

impl ContainerSink for SharedSink {
    fn reset(&mut self) {
        self.0.lock().unwrap().reset();
    }
    fn register_component(&mut self, declaration: &ComponentDeclaration) {
        self.0.lock().unwrap().register_component(declaration);
    }
    fn set_context_param(&mut self, name: &str, value: &str) {
        self.0.lock().unwrap().set_context_param(name, value);
    }
    fn add_welcome_file(&mut self, file: &str) {
        self.0.lock().unwrap().add_welcome_file(file);
    }
    fn add_resource_location(&mut self, location: &SourceLocation) {
        self.0.lock().unwrap().add_resource_location(location);
    }
    fn register_initializer(&mut self, initializer: &InitializerHandle, classes: &BTreeSet<ClassRef>) {
        self.0.lock().unwrap().register_initializer(initializer, classes);
    }
}

#[allow(dead_code)]
pub fn services_with(
    scanner: Arc<FakeScanner>,
    records: HashMap<String, Vec<AnnotationRecord>>,
    initializers: Vec<InitializerRegistration>,
) -> AssemblyServices {
    AssemblyServices {
        scanner,
        reader: Arc::new(MapReader(records)),
        parser: Arc::new(XmlDescriptorParser),
        initializers: Arc::new(StaticLoader(Ok(initializers))),
    }
}

#[allow(dead_code)]
pub fn services(classpath: Classpath) -> AssemblyServices {
    let records = classpath.records.clone();
    services_with(Arc::new(FakeScanner::new(classpath)), records, Vec::new())
}

#[allow(dead_code)]
pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
