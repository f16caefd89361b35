use crate::archive::{self, EntryError};
use crate::classfile;
use webscope_api::{AnnotationRecord, ClassAttributeReader, ReadError, SourceLocation};

/// Reads annotation tables straight from the class files of a location.
#[derive(Debug, Default)]
pub struct ClassfileAttributeReader;

impl ClassfileAttributeReader {
    pub fn new() -> Self {
        Self
    }
}

impl ClassAttributeReader for ClassfileAttributeReader {
    fn class_attributes(
        &self,
        location: &SourceLocation,
        class_name: &str,
    ) -> Result<Vec<AnnotationRecord>, ReadError> {
        let entry = archive::class_entry(class_name);
        let bytes = archive::read_entry(location, &entry)
            .map_err(|e| match e {
                EntryError::Io(source) => ReadError::Io {
                    class: class_name.to_string(),
                    source,
                },
                EntryError::Archive(message) => ReadError::Malformed {
                    class: class_name.to_string(),
                    message,
                },
            })?
            .ok_or_else(|| ReadError::NotFound(class_name.to_string()))?;

        let decoded = classfile::decode(bytes).map_err(|message| ReadError::Malformed {
            class: class_name.to_string(),
            message,
        })?;
        Ok(decoded.annotations)
    }
}
