use std::io;
use std::path::{Path, PathBuf};
use webscope_api::{DeploymentSpec, SourceLocation};

/// An exploded web application directory.
#[derive(Debug, Clone)]
pub struct WebappLayout {
    root: PathBuf,
}

impl WebappLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deployment name: the directory name, `ROOT` for an unnamed root.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ROOT".to_string())
    }

    pub fn web_xml(&self) -> PathBuf {
        self.root.join("WEB-INF").join("web.xml")
    }

    pub fn tomcat_web_xml(&self) -> PathBuf {
        self.root.join("WEB-INF").join("tomcat-web.xml")
    }

    /// `WEB-INF/classes` first, then the jars of `WEB-INF/lib` by file name.
    pub fn class_path(&self) -> io::Result<Vec<SourceLocation>> {
        let mut locations = Vec::new();
        let classes = self.root.join("WEB-INF").join("classes");
        if classes.is_dir() {
            locations.push(SourceLocation::directory(classes));
        }

        let lib = self.root.join("WEB-INF").join("lib");
        if lib.is_dir() {
            let mut jars = Vec::new();
            for entry in std::fs::read_dir(&lib)? {
                let path = entry?.path();
                let is_jar = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("jar"));
                if is_jar && path.is_file() {
                    jars.push(path);
                }
            }
            jars.sort();
            locations.extend(jars.into_iter().map(SourceLocation::archive));
        }
        Ok(locations)
    }

    /// Everything one deployment of this directory reads. Descriptors are
    /// referenced even when absent so that creating them later is noticed.
    pub fn deployment_spec(&self) -> io::Result<DeploymentSpec> {
        let spec = self
            .class_path()?
            .into_iter()
            .fold(DeploymentSpec::new(self.name()), |spec, location| {
                spec.with_location(location)
            });
        Ok(spec
            .with_explicit_descriptor(self.web_xml())
            .with_container_descriptor(self.tomcat_web_xml()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_spec() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shop");
        std::fs::create_dir_all(root.join("WEB-INF/classes")).unwrap();
        std::fs::create_dir_all(root.join("WEB-INF/lib")).unwrap();
        std::fs::write(root.join("WEB-INF/lib/b.jar"), b"").unwrap();
        std::fs::write(root.join("WEB-INF/lib/a.JAR"), b"").unwrap();
        std::fs::write(root.join("WEB-INF/lib/notes.txt"), b"").unwrap();

        let spec = WebappLayout::new(&root).deployment_spec().unwrap();
        assert_eq!(spec.name, "shop");
        let paths: Vec<_> = spec.classpath.iter().map(|l| l.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                root.join("WEB-INF/classes"),
                root.join("WEB-INF/lib/a.JAR"),
                root.join("WEB-INF/lib/b.jar"),
            ]
        );
        assert!(!spec.classpath[0].is_archive());
        assert_eq!(spec.explicit_descriptor, Some(root.join("WEB-INF/web.xml")));
        assert_eq!(spec.container_descriptor, Some(root.join("WEB-INF/tomcat-web.xml")));
    }

    #[test]
    fn test_empty_webapp() {
        let dir = tempfile::tempdir().unwrap();
        let spec = WebappLayout::new(dir.path()).deployment_spec().unwrap();
        assert!(spec.classpath.is_empty());
    }
}
