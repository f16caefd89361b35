//! Uniform access to the entries of a classpath location, whether it is a
//! jar or an exploded directory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use webscope_api::SourceLocation;
use zip::ZipArchive;
use zip::result::ZipError;

pub const WEB_FRAGMENT_ENTRY: &str = "META-INF/web-fragment.xml";
pub const RESOURCES_PREFIX: &str = "META-INF/resources/";

/// Entry path of a class inside a location, e.g. `com/example/App.class`.
pub fn class_entry(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// Binary class name of a `.class` entry, or `None` for entries that do not
/// describe a loadable class (`module-info`, `package-info`, anything under
/// `META-INF`).
pub fn class_name_of(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(".class")?;
    if stem.starts_with("META-INF/") {
        return None;
    }
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(stem.replace('/', "."))
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Archive(String),
}

impl From<ZipError> for EntryError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(e) => EntryError::Io(e),
            other => EntryError::Archive(other.to_string()),
        }
    }
}

pub fn open_zip(path: &Path) -> Result<ZipArchive<File>, EntryError> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(file)?)
}

/// Read one entry of `location`; `Ok(None)` when it does not exist.
pub fn read_entry(location: &SourceLocation, entry: &str) -> Result<Option<Vec<u8>>, EntryError> {
    if location.is_archive() {
        let mut archive = open_zip(location.path())?;
        let mut file = match archive.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    } else {
        match std::fs::read(location.path().join(entry)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
