use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{error::RenderErrorKind, template::Template};

/// `TemplateLoader` supplies the source of templates that were not added to
/// the engine up front. It is consulted when an `include` names a template
/// the engine does not know yet.
///
/// Maps of names to sources and closures implement it out of the box:
///
/// ```
/// use std::collections::HashMap;
/// use stencil::TemplateLoader;
///
/// let mut sources = HashMap::new();
/// sources.insert("header".to_string(), "Welcome".to_string());
/// assert_eq!(sources.load("header").as_deref(), Some("Welcome"));
///
/// let loader = |name: &str| (name == "footer").then(|| "Bye".to_string());
/// assert_eq!(loader.load("footer").as_deref(), Some("Bye"));
/// assert_eq!(loader.load("header"), None);
/// ```
pub trait TemplateLoader {
    /// Returns the source of the template called `name`, if there is one.
    fn load(&self, name: &str) -> Option<String>;
}

impl TemplateLoader for HashMap<String, String> {
    fn load(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl TemplateLoader for BTreeMap<String, String> {
    fn load(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<F> TemplateLoader for F
where
    F: Fn(&str) -> Option<String>,
{
    fn load(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Looks up the templates named by `include` statements while rendering.
pub(crate) trait IncludeResolver {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, RenderErrorKind>;
}

/// Resolver for templates rendered on their own: every include is missing.
pub(crate) struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, RenderErrorKind> {
        Err(RenderErrorKind::MissingInclude {
            template_name: name.to_string(),
        })
    }
}
