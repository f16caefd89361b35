use crate::error::ReadError;
use crate::models::{AnnotationRecord, SourceLocation};

/// Reads the class-level annotation table of one class.
pub trait ClassAttributeReader: Send + Sync {
    fn class_attributes(
        &self,
        location: &SourceLocation,
        class_name: &str,
    ) -> Result<Vec<AnnotationRecord>, ReadError>;
}
