use crate::error::DescriptorError;
use crate::models::{Fragment, FragmentKind};
use std::path::Path;

/// Raw descriptor text plus a human readable origin for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSource {
    pub origin: String,
    pub content: String,
}

impl DescriptorSource {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), content))
    }

    /// Decode descriptor bytes taken from an archive entry. A leading byte
    /// order mark is dropped; anything but UTF-8 is rejected.
    pub fn from_bytes(origin: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DescriptorError> {
        let origin = origin.into();
        match String::from_utf8(bytes) {
            Ok(mut content) => {
                if content.starts_with('\u{feff}') {
                    content.drain(..'\u{feff}'.len_utf8());
                }
                Ok(Self { origin, content })
            }
            Err(e) => Err(DescriptorError::Encoding {
                origin,
                message: e.utf8_error().to_string(),
            }),
        }
    }

    /// Like [`DescriptorSource::read`], but a missing file is `Ok(None)`.
    pub fn read_optional(path: &Path) -> Result<Option<Self>, DescriptorError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(Self::new(path.display().to_string(), content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DescriptorError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Parses deployment descriptors into fragments.
pub trait DescriptorParser: Send + Sync {
    fn parse(&self, source: &DescriptorSource, kind: FragmentKind)
    -> Result<Fragment, DescriptorError>;

    /// Parse into an existing fragment. On error `target` is left untouched.
    fn parse_into(&self, source: &DescriptorSource, target: &mut Fragment)
    -> Result<(), DescriptorError> {
        let mut parsed = self.parse(source, target.kind)?;
        parsed.source_location = target.source_location.take();
        *target = parsed;
        Ok(())
    }
}
