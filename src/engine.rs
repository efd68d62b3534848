use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{LexerConfig, RenderConfig};
use crate::StencilResult;
use crate::error::{RenderErrorKind, StencilError};
use crate::function::FunctionRegistry;
use crate::interface::{IncludeResolver, TemplateLoader};
use crate::template::Template;

/// `Engine` ties together the syntax configuration, the function registry and
/// a store of named templates that other templates can include.
///
/// Configure the engine first, then parse and render. Templates keep the
/// syntax they were parsed with, so changing a delimiter afterwards only
/// affects templates parsed later. Rendering takes `&self`, so a configured
/// engine can be shared between threads.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stencil::Engine;
///
/// let mut engine = Engine::new();
/// engine.add_template("header", "Hello {{ name }}").unwrap();
/// engine
///     .add_callback("double", 1, |args| {
///         let n = args[0].as_i64().ok_or("expected an integer")?;
///         Ok((n * 2).into())
///     })
///     .unwrap();
///
/// let output = engine
///     .render("{% include \"header\" %}, you are {{ double(age) }}", &json!({"name": "Ann", "age": 21}))
///     .unwrap();
/// assert_eq!(output, "Hello Ann, you are 42");
/// ```
pub struct Engine {
    config: LexerConfig,
    render_config: RenderConfig,
    registry: FunctionRegistry,
    templates: HashMap<String, Arc<Template>>,
    loader: Option<Box<dyn TemplateLoader + Send + Sync>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("render_config", &self.render_config)
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("loader", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with the default syntax, the builtin functions and
    /// no templates.
    pub fn new() -> Self {
        Self {
            config: LexerConfig::default(),
            render_config: RenderConfig::default(),
            registry: FunctionRegistry::new(),
            templates: HashMap::new(),
            loader: None,
        }
    }

    /// Creates an engine with a custom syntax.
    pub fn with_config(config: LexerConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub const fn lexer_config(&self) -> &LexerConfig {
        &self.config
    }

    pub const fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    pub const fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Sets the statement delimiters, e.g. `("<%", "%>")`.
    pub fn set_statement<O: Into<String>, C: Into<String>>(
        &mut self,
        open: O,
        close: C,
    ) -> &mut Self {
        self.config = std::mem::take(&mut self.config).with_statement(open, close);
        self
    }

    pub fn set_expression<O: Into<String>, C: Into<String>>(
        &mut self,
        open: O,
        close: C,
    ) -> &mut Self {
        self.config = std::mem::take(&mut self.config).with_expression(open, close);
        self
    }

    pub fn set_comment<O: Into<String>, C: Into<String>>(
        &mut self,
        open: O,
        close: C,
    ) -> &mut Self {
        self.config = std::mem::take(&mut self.config).with_comment(open, close);
        self
    }

    /// Sets the prefix that turns the rest of a line into a statement.
    pub fn set_line_statement<P: Into<String>>(&mut self, prefix: P) -> &mut Self {
        self.config = std::mem::take(&mut self.config).with_line_statement(prefix);
        self
    }

    /// Remove the first newline after a statement or comment block.
    pub const fn set_trim_blocks(&mut self, trim_blocks: bool) -> &mut Self {
        self.config.trim_blocks = trim_blocks;
        self
    }

    /// Strip indentation before a statement or comment block.
    pub const fn set_lstrip_blocks(&mut self, lstrip_blocks: bool) -> &mut Self {
        self.config.lstrip_blocks = lstrip_blocks;
        self
    }

    pub const fn set_max_include_depth(&mut self, max_include_depth: usize) -> &mut Self {
        self.render_config.max_include_depth = max_include_depth;
        self
    }

    /// Sets the loader asked for templates an `include` names that were not
    /// added up front. Loaded templates are parsed each time they are
    /// included.
    pub fn set_loader<L>(&mut self, loader: L) -> &mut Self
    where
        L: TemplateLoader + Send + Sync + 'static,
    {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Registers a callback callable from templates as `name(...)` with
    /// exactly `arity` arguments.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::FunctionExists` if a builtin or an earlier
    /// callback already uses that name and arity.
    pub fn add_callback<N, F>(&mut self, name: N, arity: usize, callback: F) -> StencilResult<()>
    where
        N: AsRef<str>,
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.registry.add_callback(name, arity, callback)
    }

    /// Parses `content` with this engine's syntax and functions.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::Parse` if the template is malformed or calls an
    /// unknown function.
    #[tracing::instrument(level = "debug", skip_all, fields(len = content.as_ref().len()))]
    pub fn parse<C: AsRef<str>>(&self, content: C) -> StencilResult<Template> {
        let template = Template::parse_with(content.as_ref(), &self.config, &self.registry)?;
        tracing::debug!(nodes = template.root().nodes.len(), "parsed template");
        Ok(template)
    }

    /// Parses `content` and stores it under `name` for later includes and
    /// [`Engine::render_named`].
    ///
    /// # Errors
    ///
    /// - `StencilError::TemplateExists` if the name is taken.
    /// - `StencilError::Parse` if the template is malformed.
    pub fn add_template<N: AsRef<str>, C: AsRef<str>>(
        &mut self,
        name: N,
        content: C,
    ) -> StencilResult<()> {
        let name = name.as_ref();
        if self.templates.contains_key(name) {
            return Err(StencilError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        let template = self.parse(content)?;
        self.include_template(name, template);
        Ok(())
    }

    /// Stores an already parsed template under `name`, replacing any
    /// template stored under that name before.
    pub fn include_template<N: Into<String>>(&mut self, name: N, mut template: Template) {
        let name = name.into();
        tracing::debug!(name = name.as_str(), "stored template");
        template.name = Some(name.clone());
        self.templates.insert(name, Arc::new(template));
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name).map(|template| &**template)
    }

    /// Parses and renders `source` in one go.
    ///
    /// # Errors
    ///
    /// Any parse error, then any render error.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn render<C: AsRef<str>>(&self, source: C, data: &Value) -> StencilResult<String> {
        let template = self.parse(source)?;
        self.render_template(&template, data)
    }

    /// Renders a parsed template. Includes resolve against the templates
    /// stored in this engine, then against the loader.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::Render` if a variable is missing, a value has
    /// the wrong type for an operation or an include cannot be resolved.
    pub fn render_template(&self, template: &Template, data: &Value) -> StencilResult<String> {
        let mut output = String::with_capacity(template.content().len());
        self.render_to(&mut output, template, data)?;
        Ok(output)
    }

    /// Renders the template stored (or loadable) under `name`.
    ///
    /// # Errors
    ///
    /// - `StencilError::MissingTemplate` if no such template exists.
    /// - `StencilError::Parse` if the loaded source is malformed.
    /// - `StencilError::Render` as for [`Engine::render_template`].
    pub fn render_named(&self, name: &str, data: &Value) -> StencilResult<String> {
        let template = self.load(name)?;
        self.render_template(&template, data)
    }

    /// Appends the rendering of `template` to `output`. If rendering fails,
    /// `output` holds whatever was written before the error.
    ///
    /// # Errors
    ///
    /// As for [`Engine::render_template`].
    #[tracing::instrument(level = "debug", skip_all, fields(template = template.name()))]
    pub fn render_to(
        &self,
        output: &mut String,
        template: &Template,
        data: &Value,
    ) -> StencilResult<()> {
        tracing::debug!("render started");
        template.render_into(output, data, &self.registry, self, &self.render_config)?;
        Ok(())
    }

    fn load(&self, name: &str) -> StencilResult<Arc<Template>> {
        if let Some(template) = self.templates.get(name) {
            tracing::trace!(name, "template found in store");
            return Ok(Arc::clone(template));
        }

        let source = self
            .loader
            .as_ref()
            .and_then(|loader| loader.load(name))
            .ok_or_else(|| StencilError::MissingTemplate {
                template_name: name.to_string(),
            })?;
        tracing::trace!(name, "template source loaded");

        let mut template = Template::from_source(source, &self.config, &self.registry)?;
        template.name = Some(name.to_string());
        Ok(Arc::new(template))
    }
}

impl IncludeResolver for Engine {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, RenderErrorKind> {
        self.load(name).map_err(|error| match error {
            StencilError::Parse(error) => RenderErrorKind::InvalidInclude {
                template_name: name.to_string(),
                error: Box::new(error),
            },
            StencilError::MissingTemplate { .. }
            | StencilError::TemplateExists { .. }
            | StencilError::FunctionExists { .. }
            | StencilError::Render(_) => RenderErrorKind::MissingInclude {
                template_name: name.to_string(),
            },
        })
    }
}
