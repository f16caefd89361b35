//! Initializer discovery through `META-INF/services`.

use crate::archive::{self, EntryError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use webscope_api::{
    ClassAttributeReader, DiscoveryError, ElementValue, InitializerHandle, InitializerLoader,
    InitializerRegistration, InterestType, ScanArchive, SourceLocation, TypeRef,
};

pub const SERVICE_FILES: [&str; 2] = [
    "META-INF/services/jakarta.servlet.ServletContainerInitializer",
    "META-INF/services/javax.servlet.ServletContainerInitializer",
];

pub const HANDLES_TYPES: [&str; 2] = [
    "jakarta.servlet.annotation.HandlesTypes",
    "javax.servlet.annotation.HandlesTypes",
];

/// Loads the initializers named by service files, in class path order, and
/// resolves their declared interest types against the scan.
pub struct ServiceFileLoader {
    reader: Arc<dyn ClassAttributeReader>,
}

impl ServiceFileLoader {
    pub fn new(reader: Arc<dyn ClassAttributeReader>) -> Self {
        Self { reader }
    }

    fn interest(&self, archive: &ScanArchive, handle: &InitializerHandle) -> Vec<InterestType> {
        let Some(location) = archive.owning_location(&handle.class_name) else {
            debug!("Initializer {} is not part of the scan; no interest types", handle);
            return Vec::new();
        };
        let records = match self.reader.class_attributes(location, &handle.class_name) {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not read interest types of {}: {}", handle, e);
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        for record in records
            .iter()
            .filter(|r| HANDLES_TYPES.contains(&r.type_name.as_str()))
        {
            if let Some(value) = record.get("value") {
                names.extend(value.items().iter().filter_map(|item| match item {
                    ElementValue::Class(name) => Some(name.clone()),
                    _ => None,
                }));
            }
        }

        names
            .into_iter()
            .map(|name| match archive.class_info(&name) {
                Some(info) => InterestType::Resolved(TypeRef::for_class(&info.class)),
                None => InterestType::Named(name),
            })
            .collect()
    }
}

impl InitializerLoader for ServiceFileLoader {
    fn load(&self, archive: &ScanArchive) -> Result<Vec<InitializerRegistration>, DiscoveryError> {
        let mut seen = BTreeSet::new();
        let mut registrations = Vec::new();
        for (location, _) in archive.locations() {
            for service_file in SERVICE_FILES {
                let Some(bytes) = read_service_file(location, service_file)? else {
                    continue;
                };
                let content = String::from_utf8(bytes).map_err(|e| DiscoveryError::Encoding {
                    path: location.path().join(service_file),
                    message: e.utf8_error().to_string(),
                })?;
                for class_name in parse_service_file(&content) {
                    if !seen.insert(class_name.clone()) {
                        continue;
                    }
                    let handle = InitializerHandle::new(class_name);
                    let interest = self.interest(archive, &handle);
                    debug!(
                        "Initializer {} from {} declares {} interest type(s)",
                        handle,
                        location,
                        interest.len()
                    );
                    registrations.push(InitializerRegistration { handle, interest });
                }
            }
        }
        Ok(registrations)
    }
}

fn read_service_file(location: &SourceLocation, entry: &str) -> Result<Option<Vec<u8>>, DiscoveryError> {
    archive::read_entry(location, entry).map_err(|e| match e {
        EntryError::Io(source) => DiscoveryError::Io {
            path: location.path().join(entry),
            source,
        },
        EntryError::Archive(message) => DiscoveryError::Archive {
            path: location.path().to_path_buf(),
            message,
        },
    })
}

/// Provider class names, one per line; `#` starts a comment.
pub fn parse_service_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
