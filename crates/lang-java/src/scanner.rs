use crate::archive::{self, EntryError, RESOURCES_PREFIX, WEB_FRAGMENT_ENTRY};
use crate::classfile::{self, DecodedClass};
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use webscope_api::{
    ClassPath, ClasspathScanner, DescriptorSource, LocationManifest, ScanArchive, ScanError,
    SourceLocation,
};

/// Scans jars and class directories of the class path in scope.
///
/// Locations are decoded in parallel and merged back in class path order,
/// so the first location defining a class keeps shadowing later ones.
#[derive(Debug, Default)]
pub struct JarScanner;

/// Everything one location contributed to a scan.
struct LocationScan {
    location: SourceLocation,
    manifest: LocationManifest,
    classes: Vec<DecodedClass>,
    visited: Vec<PathBuf>,
}

impl JarScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_location(location: &SourceLocation) -> Result<Option<LocationScan>, ScanError> {
        if !location.path().exists() {
            debug!("Skipping missing class path entry {}", location);
            return Ok(None);
        }
        let scan = if location.is_archive() {
            scan_archive(location)
        } else {
            scan_directory(location)
        }?;
        debug!(
            "{}: {} class(es), web-fragment: {}",
            location,
            scan.classes.len(),
            scan.manifest.web_fragment.is_some()
        );
        Ok(Some(scan))
    }
}

impl ClasspathScanner for JarScanner {
    fn scan(&self, visitor: &mut dyn FnMut(&Path)) -> Result<ScanArchive, ScanError> {
        let class_path = ClassPath::current().ok_or(ScanError::NoClassPath)?;
        let locations: Vec<&SourceLocation> = class_path.scannable().collect();
        // Visited before they are read.
        for location in locations.iter().filter(|l| l.path().exists()) {
            visitor(location.path());
        }

        let scans = locations
            .par_iter()
            .map(|location| Self::scan_location(location))
            .collect::<Result<Vec<_>, _>>()?;

        let mut archive = ScanArchive::new();
        for scan in scans.into_iter().flatten() {
            for path in &scan.visited {
                visitor(path);
            }
            archive.add_location(scan.location, scan.manifest);
            for class in scan.classes {
                archive.add_class(class.info);
            }
        }
        info!(
            "Scanned {} location(s) of {}: {} class(es)",
            archive.locations().count(),
            class_path.deployment,
            archive.class_count()
        );
        Ok(archive)
    }
}

fn scan_error(path: &Path, error: EntryError) -> ScanError {
    match error {
        EntryError::Io(source) => ScanError::Io {
            path: path.to_path_buf(),
            source,
        },
        EntryError::Archive(message) => ScanError::Archive {
            path: path.to_path_buf(),
            message,
        },
    }
}

fn decode_or_skip(origin: &str, bytes: Vec<u8>) -> Option<DecodedClass> {
    match classfile::decode(bytes) {
        Ok(class) => Some(class),
        Err(e) => {
            warn!("Skipping unreadable class {}: {}", origin, e);
            None
        }
    }
}

fn record_fragment(manifest: &mut LocationManifest, origin: String, bytes: Vec<u8>) {
    match DescriptorSource::from_bytes(origin, bytes) {
        Ok(source) => manifest.web_fragment = Some(source),
        Err(e) => {
            warn!("Cannot decode web fragment {}", e);
            manifest.fragment_error = Some(e.to_string());
        }
    }
}

fn scan_archive(location: &SourceLocation) -> Result<LocationScan, ScanError> {
    let path = location.path();
    let mut zip = archive::open_zip(path).map_err(|e| scan_error(path, e))?;
    let mut manifest = LocationManifest::default();
    let mut classes = Vec::new();

    for idx in 0..zip.len() {
        let mut entry = zip
            .by_index(idx)
            .map_err(|e| scan_error(path, EntryError::from(e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        if name.starts_with(RESOURCES_PREFIX) {
            manifest.has_resources = true;
            continue;
        }
        let wanted_class = archive::class_name_of(&name);
        if wanted_class.is_none() && name != WEB_FRAGMENT_ENTRY {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = format!("{}!/{}", path.display(), name);
        match wanted_class {
            Some(class_name) => {
                if let Some(class) = decode_or_skip(&origin, bytes) {
                    manifest.class_names.insert(class_name);
                    classes.push(class);
                }
            }
            None => record_fragment(&mut manifest, origin, bytes),
        }
    }

    Ok(LocationScan {
        location: location.clone(),
        manifest,
        classes,
        visited: Vec::new(),
    })
}

fn scan_directory(location: &SourceLocation) -> Result<LocationScan, ScanError> {
    let root = location.path();
    let mut manifest = LocationManifest::default();
    let mut classes = Vec::new();
    let mut visited = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ScanError::Io {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if name.starts_with(RESOURCES_PREFIX) {
            manifest.has_resources = true;
            continue;
        }
        let wanted_class = archive::class_name_of(&name);
        if wanted_class.is_none() && name != WEB_FRAGMENT_ENTRY {
            continue;
        }

        let bytes = std::fs::read(entry.path()).map_err(|source| ScanError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        visited.push(entry.path().to_path_buf());
        let origin = entry.path().display().to_string();
        match wanted_class {
            Some(class_name) => {
                if let Some(class) = decode_or_skip(&origin, bytes) {
                    manifest.class_names.insert(class_name);
                    classes.push(class);
                }
            }
            None => record_fragment(&mut manifest, origin, bytes),
        }
    }

    Ok(LocationScan {
        location: location.clone(),
        manifest,
        classes,
        visited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use webscope_api::ClassPathScope;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn scan_with(locations: Vec<SourceLocation>) -> (Result<ScanArchive, ScanError>, Vec<PathBuf>) {
        let _scope = ClassPathScope::enter(Arc::new(ClassPath::new("shop", locations)));
        let mut visited = Vec::new();
        let result = JarScanner::new().scan(&mut |p: &Path| visited.push(p.to_path_buf()));
        (result, visited)
    }

    #[test]
    fn test_scan_without_class_path_fails() {
        let result = JarScanner::new().scan(&mut |_: &Path| {});
        assert!(matches!(result, Err(ScanError::NoClassPath)));
    }

    #[test]
    fn test_jar_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/web-fragment.xml", b"<web-fragment><name>lib</name></web-fragment>"),
                ("META-INF/resources/index.html", b"<html/>"),
                ("com/example/Broken.class", &[0xCA, 0xFE, 0xBA, 0xBE]),
                ("README.txt", b"hello"),
            ],
        );

        let location = SourceLocation::archive(&jar);
        let (result, visited) = scan_with(vec![location.clone()]);
        let archive = result.unwrap();

        let manifest = archive.manifest(&location).unwrap();
        assert!(manifest.has_resources);
        assert!(
            manifest
                .web_fragment
                .as_ref()
                .is_some_and(|s| s.content.contains("<name>lib</name>"))
        );
        // Undecodable classes are skipped, not fatal.
        assert!(manifest.class_names.is_empty());
        assert_eq!(archive.class_count(), 0);
        assert_eq!(visited, vec![jar]);
    }

    #[test]
    fn test_directory_and_missing_locations() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(classes.join("META-INF")).unwrap();
        std::fs::write(classes.join("META-INF/web-fragment.xml"), "<web-fragment/>").unwrap();
        std::fs::write(classes.join("app.properties"), "a=b").unwrap();

        let present = SourceLocation::directory(&classes);
        let missing = SourceLocation::archive(dir.path().join("gone.jar"));
        let (result, visited) = scan_with(vec![present.clone(), missing.clone()]);
        let archive = result.unwrap();

        assert!(archive.manifest(&present).unwrap().web_fragment.is_some());
        assert!(archive.manifest(&missing).is_none());
        assert_eq!(
            visited,
            vec![classes.clone(), classes.join("META-INF/web-fragment.xml")]
        );
    }

    #[test]
    fn test_undecodable_fragment_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("latin1.jar");
        write_jar(
            &jar,
            &[("META-INF/web-fragment.xml", b"<web-fragment><name>caf\xE9</name></web-fragment>")],
        );
        let bom = dir.path().join("bom.jar");
        write_jar(
            &bom,
            &[("META-INF/web-fragment.xml", b"\xEF\xBB\xBF<web-fragment/>")],
        );

        let latin1 = SourceLocation::archive(&jar);
        let with_bom = SourceLocation::archive(&bom);
        let (result, _) = scan_with(vec![latin1.clone(), with_bom.clone()]);
        let archive = result.unwrap();

        let manifest = archive.manifest(&latin1).unwrap();
        assert!(manifest.web_fragment.is_none());
        assert!(
            manifest
                .fragment_error
                .as_deref()
                .is_some_and(|e| e.contains("not valid UTF-8"))
        );

        let manifest = archive.manifest(&with_bom).unwrap();
        assert!(manifest.fragment_error.is_none());
        assert!(
            manifest
                .web_fragment
                .as_ref()
                .is_some_and(|s| s.content.starts_with("<web-fragment"))
        );
    }

    #[test]
    fn test_corrupt_jar_fails_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("bad.jar");
        std::fs::write(&jar, b"definitely not a zip").unwrap();

        let (result, _) = scan_with(vec![SourceLocation::archive(&jar)]);
        assert!(matches!(result, Err(ScanError::Archive { .. })));
    }

    #[test]
    fn test_shared_locations_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let shared_root = dir.path().join("shared");
        std::fs::create_dir_all(&shared_root).unwrap();
        let jar = shared_root.join("common.jar");
        write_jar(&jar, &[("META-INF/web-fragment.xml", b"<web-fragment/>")]);

        let class_path = ClassPath::new("shop", vec![SourceLocation::archive(&jar)])
            .with_shared([shared_root].into_iter().collect());
        let _scope = ClassPathScope::enter(Arc::new(class_path));
        let archive = JarScanner::new().scan(&mut |_: &Path| {}).unwrap();
        assert_eq!(archive.locations().count(), 0);
    }
}
