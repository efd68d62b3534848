use std::collections::BTreeSet;

use serde_json::Value;

use crate::{
    ast::{
        BlockNode, ForArrayStatementNode, ForObjectStatementNode, IncludeStatementNode, JsonNode,
        Visitor,
    },
    config::{LexerConfig, RenderConfig},
    error::{ParseError, RenderError, StencilResult},
    function::{FunctionRegistry, builtin_registry},
    interface::{IncludeResolver, NoIncludes},
    parser::parse,
    renderer::Renderer,
};

/// A Template is a parsed template that can be rendered any number of times.
///
/// The template owns its source; text in the tree refers back into it by byte
/// span. Parsing happens once, in [`Template::new`] or
/// [`Template::parse_with`], and the result is immutable, so a template can be
/// shared between threads and rendered concurrently.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use stencil::Template;
///
/// let template = Template::new("Hello, {{ name }}!").unwrap();
/// let result = template.render(&json!({ "name": "World" })).unwrap();
/// assert_eq!(result, "Hello, World!");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    content: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    root: BlockNode,
    pub(crate) name: Option<String>,
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct TemplateHelper {
            content: String,
            #[serde(default)]
            name: Option<String>,
        }

        let helper = TemplateHelper::deserialize(deserializer)?;

        // The tree is not serialized; rebuild it with the default syntax.
        let mut template = Self::new(helper.content)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse template: {}", e)))?;
        template.name = helper.name;
        Ok(template)
    }
}

impl Template {
    /// Parses `content` with the default delimiters and the builtin functions.
    ///
    /// # Errors
    ///
    /// Returns a `StencilError::Parse` error if the template syntax is invalid
    /// or it calls a function that is not a builtin.
    pub fn new<C: Into<String>>(content: C) -> StencilResult<Self> {
        Self::parse_with(content, &LexerConfig::default(), builtin_registry())
    }

    /// Parses `content` with custom delimiters and functions. Callbacks are
    /// only checked for existence here; the registry used to render must
    /// provide them again.
    ///
    /// # Errors
    ///
    /// Returns a `StencilError::Parse` error if the template syntax is invalid
    /// or it calls a function `registry` does not know.
    pub fn parse_with<C: Into<String>>(
        content: C,
        config: &LexerConfig,
        registry: &FunctionRegistry,
    ) -> StencilResult<Self> {
        Ok(Self::from_source(content.into(), config, registry)?)
    }

    pub(crate) fn from_source(
        content: String,
        config: &LexerConfig,
        registry: &FunctionRegistry,
    ) -> Result<Self, ParseError> {
        let root = parse(&content, config, registry)?;
        Ok(Self {
            content,
            root,
            name: None,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn root(&self) -> &BlockNode {
        &self.root
    }

    /// The name the template was registered under, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renders the template on its own, with the builtin functions only.
    /// Every `include` fails since there is nothing to resolve it against;
    /// use [`crate::Engine`] for templates that include others.
    ///
    /// # Errors
    ///
    /// Returns a `StencilError::Render` error if a variable is missing, a
    /// value has the wrong type for an operation or an include is reached.
    pub fn render(&self, data: &Value) -> StencilResult<String> {
        let mut output = String::with_capacity(self.content.len());
        self.render_into(
            &mut output,
            data,
            builtin_registry(),
            &NoIncludes,
            &RenderConfig::default(),
        )?;
        Ok(output)
    }

    pub(crate) fn render_into(
        &self,
        output: &mut String,
        data: &Value,
        registry: &FunctionRegistry,
        resolver: &dyn IncludeResolver,
        config: &RenderConfig,
    ) -> Result<(), RenderError> {
        Renderer::new(output, self, data, registry, resolver, config).visit_block(&self.root)
    }

    /// Names of the variables this template reads from the data, sorted and
    /// without duplicates. Loop variables and `loop` are not included.
    ///
    /// # Example
    ///
    /// ```
    /// use stencil::Template;
    ///
    /// let template = Template::new(
    ///     "{{ user.name }}{% for item in items %}{{ item.id }}{{ loop.index }}{% endfor %}",
    /// )
    /// .unwrap();
    /// assert_eq!(template.variables(), ["items", "user.name"]);
    /// ```
    pub fn variables(&self) -> Vec<String> {
        let mut collector = VariableCollector::default();
        let Ok(()) = collector.visit_block(&self.root);
        collector.variables.into_iter().collect()
    }

    /// Names of the templates this template includes, in source order.
    pub fn includes(&self) -> Vec<String> {
        let mut collector = IncludeCollector::default();
        let Ok(()) = collector.visit_block(&self.root);
        collector.includes
    }
}

#[derive(Default)]
struct VariableCollector {
    /// Names bound by the enclosing loops.
    bound: Vec<String>,
    variables: BTreeSet<String>,
}

impl VariableCollector {
    fn visit_loop_body(&mut self, names: &[&str], body: &BlockNode) {
        for name in names {
            self.bound.push((*name).to_string());
        }
        let Ok(()) = self.visit_block(body);
        self.bound
            .truncate(self.bound.len().saturating_sub(names.len()));
    }
}

impl Visitor for VariableCollector {
    type Error = std::convert::Infallible;

    fn visit_json(&mut self, node: &JsonNode) -> Result<(), Self::Error> {
        let first = node
            .name
            .split_once('.')
            .map_or(node.name.as_str(), |(first, _)| first);
        if !self.bound.iter().any(|bound| bound == first) {
            self.variables.insert(node.name.clone());
        }
        Ok(())
    }

    fn visit_for_array(&mut self, node: &ForArrayStatementNode) -> Result<(), Self::Error> {
        self.visit_expression_list(&node.condition)?;
        self.visit_loop_body(&[node.value.as_str(), "loop"], &node.body);
        Ok(())
    }

    fn visit_for_object(&mut self, node: &ForObjectStatementNode) -> Result<(), Self::Error> {
        self.visit_expression_list(&node.condition)?;
        self.visit_loop_body(
            &[node.key.as_str(), node.value.as_str(), "loop"],
            &node.body,
        );
        Ok(())
    }
}

#[derive(Default)]
struct IncludeCollector {
    includes: Vec<String>,
}

impl Visitor for IncludeCollector {
    type Error = std::convert::Infallible;

    fn visit_include(&mut self, node: &IncludeStatementNode) -> Result<(), Self::Error> {
        self.includes.push(node.file.clone());
        Ok(())
    }
}
