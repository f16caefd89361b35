pub mod archive;
pub mod classfile;
pub mod layout;
pub mod reader;
pub mod scanner;
pub mod services;

pub use layout::WebappLayout;
pub use reader::ClassfileAttributeReader;
pub use scanner::JarScanner;
pub use services::ServiceFileLoader;

use std::sync::Arc;
use webscope_api::{ClassAttributeReader, ClasspathScanner, InitializerLoader};

/// The collaborators needed to assemble a Java web application from disk.
pub struct JavaWebPlugin {
    scanner: Arc<JarScanner>,
    reader: Arc<ClassfileAttributeReader>,
    initializers: Arc<ServiceFileLoader>,
}

impl JavaWebPlugin {
    pub fn new() -> Self {
        let reader = Arc::new(ClassfileAttributeReader::new());
        let initializers = Arc::new(ServiceFileLoader::new(reader.clone()));
        Self {
            scanner: Arc::new(JarScanner::new()),
            reader,
            initializers,
        }
    }

    pub fn scanner(&self) -> Arc<dyn ClasspathScanner> {
        self.scanner.clone()
    }

    pub fn reader(&self) -> Arc<dyn ClassAttributeReader> {
        self.reader.clone()
    }

    pub fn initializers(&self) -> Arc<dyn InitializerLoader> {
        self.initializers.clone()
    }
}

impl Default for JavaWebPlugin {
    fn default() -> Self {
        Self::new()
    }
}
