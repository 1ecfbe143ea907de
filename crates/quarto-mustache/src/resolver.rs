/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template sources.
//!
//! A [`TemplateResolver`] maps template names to stable identifiers, and
//! identifiers to template strings. Partial names are resolved relative to
//! the identifier of the including template.

use crate::error::{MustacheError, MustacheResult};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub trait TemplateResolver: Send + Sync {
    /// The identifier of the template named `name`, included from the
    /// template identified by `relative_to`. `None` if there is no such
    /// template.
    fn template_id_for_name(&self, name: &str, relative_to: Option<&str>) -> Option<String>;

    fn template_string_for_id(&self, template_id: &str) -> MustacheResult<String>;
}

/// Templates stored in memory, identified by their names.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates<N, S>(templates: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(name, template)| (name.into(), template.into()))
                .collect(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }
}

impl TemplateResolver for MemoryResolver {
    fn template_id_for_name(&self, name: &str, _relative_to: Option<&str>) -> Option<String> {
        Some(name.to_string())
    }

    fn template_string_for_id(&self, template_id: &str) -> MustacheResult<String> {
        self.templates.get(template_id).cloned().ok_or_else(|| {
            MustacheError::not_found(format!("Template not found: \"{}\"", template_id))
                .with_template_id(Some(template_id))
                .into()
        })
    }
}

/// Templates stored as files below a root directory.
///
/// Identifiers are normalized file paths. Names resolve relative to the
/// directory of the including template, or to the root directory when they
/// start with `/`. Paths that escape the root directory do not resolve.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    root: PathBuf,
    extension: Option<String>,
}

impl FileSystemResolver {
    /// Resolve `name` to `<root>/name.mustache`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
            extension: Some("mustache".to_string()),
        }
    }

    /// Change the file extension appended to template names. `None` or an
    /// empty extension uses names as file names.
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.filter(|e| !e.is_empty()).map(str::to_string);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateResolver for FileSystemResolver {
    fn template_id_for_name(&self, name: &str, relative_to: Option<&str>) -> Option<String> {
        let (name, base) = match name.strip_prefix('/') {
            Some(absolute) => (absolute, None),
            None => (name, relative_to),
        };
        if name.is_empty() {
            return base.map(str::to_string);
        }

        let file_name = match &self.extension {
            Some(extension) => format!("{}.{}", name, extension),
            None => name.to_string(),
        };
        let directory = base
            .and_then(|id| Path::new(id).parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let path = normalize(&directory.join(file_name));

        if !path.starts_with(&self.root) {
            tracing::debug!("Template {:?} resolves outside of {:?}", name, self.root);
            return None;
        }
        if !path.is_file() {
            return None;
        }
        Some(path.to_string_lossy().into_owned())
    }

    fn template_string_for_id(&self, template_id: &str) -> MustacheResult<String> {
        Ok(std::fs::read_to_string(template_id)?)
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("page.mustache"), "page").unwrap();
        fs::write(dir.path().join("header.mustache"), "header").unwrap();
        fs::write(dir.path().join("partials/item.mustache"), "item").unwrap();
        fs::write(dir.path().join("partials/header.mustache"), "nested header").unwrap();
        fs::write(dir.path().join("plain.txt"), "plain").unwrap();
        dir
    }

    #[test]
    fn test_memory_resolver() {
        let resolver = MemoryResolver::with_templates([("a", "A")]);
        assert_eq!(resolver.template_id_for_name("a", Some("b")).as_deref(), Some("a"));
        assert_eq!(resolver.template_string_for_id("a").unwrap(), "A");
        let error = resolver.template_string_for_id("zz").unwrap_err();
        assert_eq!(error.kind(), Some(crate::ErrorKind::TemplateNotFound));
        assert_eq!(error.to_string(), "Template not found: \"zz\"");
    }

    #[test]
    fn test_file_system_resolves_from_root() {
        let dir = fixture();
        let resolver = FileSystemResolver::new(dir.path());
        let id = resolver.template_id_for_name("page", None).unwrap();
        assert_eq!(resolver.template_string_for_id(&id).unwrap(), "page");
        assert!(resolver.template_id_for_name("missing", None).is_none());
    }

    #[test]
    fn test_file_system_resolves_relative_to_base() {
        let dir = fixture();
        let resolver = FileSystemResolver::new(dir.path());
        let item = resolver.template_id_for_name("partials/item", None).unwrap();

        let header = resolver.template_id_for_name("header", Some(&item)).unwrap();
        assert_eq!(resolver.template_string_for_id(&header).unwrap(), "nested header");

        let root_header = resolver.template_id_for_name("/header", Some(&item)).unwrap();
        assert_eq!(resolver.template_string_for_id(&root_header).unwrap(), "header");

        let parent_header = resolver.template_id_for_name("../header", Some(&item)).unwrap();
        assert_eq!(parent_header, root_header);
    }

    #[test]
    fn test_file_system_rejects_paths_outside_root() {
        let dir = fixture();
        let resolver = FileSystemResolver::new(dir.path().join("partials"));
        assert!(resolver.template_id_for_name("../page", None).is_none());
    }

    #[test]
    fn test_file_system_empty_name_is_base() {
        let dir = fixture();
        let resolver = FileSystemResolver::new(dir.path());
        assert_eq!(resolver.template_id_for_name("", Some("base")).as_deref(), Some("base"));
        assert_eq!(resolver.template_id_for_name("/", Some("base")), None);
    }

    #[test]
    fn test_file_system_extension() {
        let dir = fixture();
        let resolver = FileSystemResolver::new(dir.path()).with_extension(Some(""));
        let id = resolver.template_id_for_name("plain.txt", None).unwrap();
        assert_eq!(resolver.template_string_for_id(&id).unwrap(), "plain");

        let resolver = FileSystemResolver::new(dir.path()).with_extension(Some("txt"));
        assert!(resolver.template_id_for_name("plain", None).is_some());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
