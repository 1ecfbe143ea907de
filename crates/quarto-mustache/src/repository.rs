/*
 * repository.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template repositories.
//!
//! A [`TemplateRepository`] compiles templates, loads partials through its
//! [`TemplateResolver`], and caches the compiled ASTs by template id. All
//! templates of a repository share its configuration.
//!
//! Partials that include themselves are compiled in two phases: an
//! undefined AST is cached before the partial source is compiled, so that
//! recursive lookups find it, and is defined once compilation succeeds.

use crate::ast::{TemplateAst, TemplateAstNode};
use crate::compiler::TemplateCompiler;
use crate::configuration::Configuration;
use crate::error::{MustacheError, MustacheResult};
use crate::parser::TemplateParser;
use crate::rendering::ContentType;
use crate::resolver::{FileSystemResolver, MemoryResolver, TemplateResolver};
use crate::template::Template;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

struct RepositoryInner {
    configuration: RwLock<Configuration>,
    locked_configuration: OnceLock<Configuration>,
    resolver: Option<Arc<dyn TemplateResolver>>,
    cache: Mutex<HashMap<String, TemplateAst>>,
    /// Serializes top-level compilations, so that two threads never compile
    /// the same partial concurrently.
    compilation: Mutex<()>,
}

/// A source of compiled templates. Cloning is cheap and clones share the
/// same cache.
#[derive(Clone)]
pub struct TemplateRepository {
    inner: Arc<RepositoryInner>,
}

impl Default for TemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRepository {
    /// A repository without data source. It compiles template strings, but
    /// can not load partials.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_resolver(resolver: impl TemplateResolver + 'static) -> Self {
        Self::build(Some(Arc::new(resolver)))
    }

    /// A repository of in-memory templates, keyed by name.
    pub fn from_templates<N, S>(templates: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self::with_resolver(MemoryResolver::with_templates(templates))
    }

    /// A repository of `.mustache` files stored below `directory`.
    pub fn from_directory(directory: impl Into<PathBuf>) -> Self {
        Self::with_resolver(FileSystemResolver::new(directory))
    }

    fn build(resolver: Option<Arc<dyn TemplateResolver>>) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                configuration: RwLock::new(Configuration::default()),
                locked_configuration: OnceLock::new(),
                resolver,
                cache: Mutex::new(HashMap::new()),
                compilation: Mutex::new(()),
            }),
        }
    }

    /// A copy of the current configuration.
    pub fn configuration(&self) -> Configuration {
        self.inner
            .configuration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration. It only has an effect before the first
    /// template is compiled.
    pub fn set_configuration(&self, configuration: Configuration) {
        if self.inner.locked_configuration.get().is_some() {
            tracing::warn!("Configuration changed after the repository compiled its first template");
        }
        *self
            .inner
            .configuration
            .write()
            .unwrap_or_else(PoisonError::into_inner) = configuration;
    }

    pub(crate) fn locked_configuration(&self) -> &Configuration {
        self.inner
            .locked_configuration
            .get_or_init(|| self.configuration())
    }

    /// Compile a template string. Its partials are loaded from the
    /// repository's data source.
    pub fn template_from_string(&self, template_string: &str) -> MustacheResult<Template> {
        let ast = {
            let _compilation = self.lock_compilation();
            self.compile_string(template_string, None)?
        };
        Ok(self.template(ast))
    }

    /// Load and compile the template named `name`.
    pub fn template_named(&self, name: &str) -> MustacheResult<Template> {
        let ast = {
            let _compilation = self.lock_compilation();
            self.template_ast_named(name, None)?
        };
        Ok(self.template(ast))
    }

    /// Forget all compiled templates. Templates loaded afterwards are read
    /// again from the data source; existing templates are unaffected.
    pub fn reload_templates(&self) {
        tracing::debug!("Clearing template cache");
        self.lock_cache().clear();
    }

    fn template(&self, ast: TemplateAst) -> Template {
        let configuration = self.locked_configuration();
        let base_context = configuration
            .base_context
            .with_throw_when_missing(configuration.throw_when_missing);
        Template::new(self.clone(), ast, base_context)
    }

    fn lock_compilation(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner
            .compilation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, TemplateAst>> {
        self.inner.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The AST of the template named `name`, included from the template
    /// identified by `relative_to`.
    pub(crate) fn template_ast_named(&self, name: &str, relative_to: Option<&str>) -> MustacheResult<TemplateAst> {
        let Some(resolver) = &self.inner.resolver else {
            return Err(MustacheError::not_found("Missing data source")
                .with_template_id(relative_to)
                .into());
        };

        let Some(template_id) = resolver.template_id_for_name(name, relative_to) else {
            let error = match relative_to {
                Some(base) => MustacheError::not_found(format!("Template not found: \"{}\" from {}", name, base))
                    .with_template_id(Some(base)),
                None => MustacheError::not_found(format!("Template not found: \"{}\"", name)),
            };
            return Err(error.into());
        };

        if let Some(ast) = self.lock_cache().get(&template_id) {
            return Ok(ast.clone());
        }

        let template_string = resolver.template_string_for_id(&template_id)?;
        tracing::debug!("Compiling template {}", template_id);

        // Cached before compiling, so that recursive partials find it.
        let ast = TemplateAst::undefined();
        self.lock_cache().insert(template_id.clone(), ast.clone());

        match self.compile_nodes(&template_string, Some(&template_id)) {
            Ok((nodes, content_type)) => {
                ast.define(nodes, content_type);
                Ok(ast)
            }
            Err(error) => {
                self.lock_cache().remove(&template_id);
                Err(error)
            }
        }
    }

    pub(crate) fn compile_string(&self, template_string: &str, template_id: Option<&str>) -> MustacheResult<TemplateAst> {
        let (nodes, content_type) = self.compile_nodes(template_string, template_id)?;
        Ok(TemplateAst::new(nodes, content_type))
    }

    fn compile_nodes(
        &self,
        template_string: &str,
        template_id: Option<&str>,
    ) -> MustacheResult<(Vec<TemplateAstNode>, ContentType)> {
        let configuration = self.locked_configuration();
        let mut compiler = TemplateCompiler::new(configuration.content_type, self.clone(), template_id);
        TemplateParser::new(configuration.tag_delimiter_pair.clone()).parse(template_string, template_id, &mut compiler);
        compiler.finish()
    }
}

impl std::fmt::Debug for TemplateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.lock_cache().len();
        f.debug_struct("TemplateRepository")
            .field("has_resolver", &self.inner.resolver.is_some())
            .field("cached_templates", &cached)
            .finish()
    }
}
