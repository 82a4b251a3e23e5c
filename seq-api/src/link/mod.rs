//! Hypermedia links: templates advertised by the server, the table of links a
//! resource carries, and the resolver turning a link plus parameters into a URI.

mod params;
mod table;
mod template;

pub use params::{LinkParams, ParamValue};
pub use table::{LinkTable, Resource};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{NavigationError, Result};
use template::UriTemplate;

/// A named affordance advertised by the server: a URI template.
///
/// A template with no substitution fields is a literal (relative) URI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link {
    template: String,
}

impl Link {
    /// Wrap a template string.
    pub fn new<S: Into<String>>(template: S) -> Self {
        Link {
            template: template.into(),
        }
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variable names the template declares, in order of appearance.
    pub fn parameter_names(&self) -> Result<Vec<String>> {
        let parsed = UriTemplate::parse(&self.template)?;
        Ok(parsed
            .parameter_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Expand this link; see [`resolve`].
    pub fn resolve(&self, params: Option<&LinkParams>) -> Result<String> {
        resolve(&self.template, params)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl From<&str> for Link {
    fn from(template: &str) -> Self {
        Link::new(template)
    }
}

impl From<String> for Link {
    fn from(template: String) -> Self {
        Link::new(template)
    }
}

/// Expand a URI `template` against `params`.
///
/// - Every supplied name must be declared by the template, otherwise
///   [`NavigationError::UndeclaredParameters`] names the unknown keys.
/// - Timestamps are rendered in round-trippable ISO-8601 form.
/// - Without parameters, a template that has no fields comes back unchanged.
/// - Required fields (`{x}`, `{+x}`) left unbound stay in the output.
///
/// ```
/// # use seq_api::{resolve, LinkParams};
/// let uri = resolve("api/events/{id}{?render}", Some(&LinkParams::new().with("id", "event-1")))?;
/// assert_eq!(uri, "api/events/event-1");
/// # Ok::<(), seq_api::Error>(())
/// ```
pub fn resolve(template: &str, params: Option<&LinkParams>) -> Result<String> {
    let parsed = UriTemplate::parse(template)?;

    let params = match params {
        Some(p) if !p.is_empty() => p,
        _ if !parsed.has_expressions() => return Ok(template.to_string()),
        _ => return Ok(parsed.expand(&LinkParams::new())),
    };

    let declared = parsed.parameter_names();
    let undeclared: Vec<String> = params
        .names()
        .filter(|name| !declared.contains(name))
        .map(str::to_string)
        .collect();
    if !undeclared.is_empty() {
        return Err(NavigationError::UndeclaredParameters {
            template: template.to_string(),
            names: undeclared,
        }
        .into());
    }

    Ok(parsed.expand(params))
}

/// True when `uri` still contains a `{...}` expression.
pub(crate) fn has_unresolved_fields(uri: &str) -> bool {
    uri.find('{')
        .is_some_and(|open| uri[open..].contains('}'))
}
