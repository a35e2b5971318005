//! Attribute value filters for tagweave.
//!
//! A grammar names filters declaratively ([`FilterSpec`]); compiling a spec
//! against the grammar's [`FilterConfig`] and a [`FilterRegistry`] of custom
//! callbacks yields a [`Filter`] that can be applied to untrusted values.
//!
//! Built-in filters: `url`, `int`, `uint`, `float`, `number`, `range`,
//! `identifier`, `regexp`, `color`, `email`, `simpletext`, `text`, `alnum` and
//! `hashmap`. Any other name refers to a custom filter registered by the host
//! application.

mod builtin;
mod url_policy;

pub use crate::url_policy::UrlPolicy;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Custom attribute filter: returns the accepted value, or `None` to reject.
pub type AttributeFilterFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Tag-level filter over a tag's whole attribute map. Returning `false`
/// abandons the tag.
pub type TagFilterFn = Arc<dyn Fn(&mut BTreeMap<String, String>) -> bool + Send + Sync>;

/// Why a filter rejected a value. The `Display` text is used as the reason
/// in invalid-attribute log entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The value does not have the shape the filter expects.
    #[error("not a valid {filter}")]
    Invalid {
        /// Name of the rejecting filter.
        filter: &'static str,
    },
    /// URL scheme outside the policy's allow list.
    #[error("scheme '{0}' is not allowed")]
    DisallowedScheme(String),
    /// URL host denied by the policy.
    #[error("host '{0}' is not allowed")]
    DisallowedHost(String),
    /// A custom filter returned `None`.
    #[error("rejected by filter '{0}'")]
    Custom(String),
}

/// Errors raised while compiling filter specs. These are configuration
/// mistakes, reported when the grammar is built.
#[derive(Debug, Error)]
pub enum FilterConfigError {
    /// A filter name is neither built-in nor registered.
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    /// A tag filter name is not registered.
    #[error("unknown tag filter '{0}'")]
    UnknownTagFilter(String),
    /// The `regexp` filter pattern does not compile.
    #[error("invalid regexp filter pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },
    /// A `range` filter with `min > max`.
    #[error("invalid range filter: min ({min}) exceeds max ({max})")]
    InvalidRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// The URL policy has no scheme to allow.
    #[error("url policy must allow at least one scheme")]
    NoSchemes,
}

/// Grammar-wide filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Policy applied by every `url` filter.
    #[serde(default)]
    pub url: UrlPolicy,
}

/// Declarative filter reference as written in a grammar file.
///
/// Deserializes from a bare name (`"url"`, `"myCustomFilter"`) or from an
/// object carrying parameters (`{"name": "range", "min": 1, "max": 7}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FilterSpecRepr", into = "FilterSpecRepr")]
pub enum FilterSpec {
    /// URL validated against the grammar's [`UrlPolicy`].
    Url,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Decimal number with optional exponent.
    Float,
    /// Digits only, returned unchanged.
    Number,
    /// Integer clamped into `[min, max]`.
    Range {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },
    /// `[-0-9A-Za-z_]+`.
    Identifier,
    /// Value must match the pattern (unanchored unless the pattern anchors).
    Regexp {
        /// Regular expression source.
        pattern: String,
    },
    /// Hex color or color name.
    Color,
    /// E-mail address.
    Email,
    /// Letters, digits, spaces and `-+,._`.
    SimpleText,
    /// Any text, unchanged.
    Text,
    /// ASCII letters and digits.
    Alnum,
    /// Value replaced by its mapping; unmapped values pass through unless
    /// `strict`.
    Hashmap {
        /// Value mapping.
        map: BTreeMap<String, String>,
        /// Reject unmapped values.
        strict: bool,
    },
    /// Host-registered attribute filter.
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FilterSpecRepr {
    Name(String),
    Object(FilterSpecObject),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterSpecObject {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    map: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    strict: bool,
}

impl TryFrom<FilterSpecRepr> for FilterSpec {
    type Error = String;

    fn try_from(repr: FilterSpecRepr) -> Result<Self, Self::Error> {
        let obj = match repr {
            FilterSpecRepr::Name(name) => FilterSpecObject {
                name,
                ..FilterSpecObject::default()
            },
            FilterSpecRepr::Object(obj) => obj,
        };
        let missing = |param: &str| format!("filter '{}' requires '{param}'", obj.name);
        Ok(match obj.name.as_str() {
            "url" => FilterSpec::Url,
            "int" => FilterSpec::Int,
            "uint" => FilterSpec::Uint,
            "float" => FilterSpec::Float,
            "number" => FilterSpec::Number,
            "range" => FilterSpec::Range {
                min: obj.min.ok_or_else(|| missing("min"))?,
                max: obj.max.ok_or_else(|| missing("max"))?,
            },
            "identifier" => FilterSpec::Identifier,
            "regexp" => FilterSpec::Regexp {
                pattern: obj.pattern.clone().ok_or_else(|| missing("pattern"))?,
            },
            "color" => FilterSpec::Color,
            "email" => FilterSpec::Email,
            "simpletext" => FilterSpec::SimpleText,
            "text" => FilterSpec::Text,
            "alnum" => FilterSpec::Alnum,
            "hashmap" => FilterSpec::Hashmap {
                map: obj.map.clone().ok_or_else(|| missing("map"))?,
                strict: obj.strict,
            },
            "" => return Err("filter name must not be empty".into()),
            _ => FilterSpec::Custom(obj.name.clone()),
        })
    }
}

impl From<FilterSpec> for FilterSpecRepr {
    fn from(spec: FilterSpec) -> Self {
        let named = |name: &str| FilterSpecRepr::Name(name.to_string());
        match spec {
            FilterSpec::Range { min, max } => FilterSpecRepr::Object(FilterSpecObject {
                name: "range".into(),
                min: Some(min),
                max: Some(max),
                ..FilterSpecObject::default()
            }),
            FilterSpec::Regexp { pattern } => FilterSpecRepr::Object(FilterSpecObject {
                name: "regexp".into(),
                pattern: Some(pattern),
                ..FilterSpecObject::default()
            }),
            FilterSpec::Hashmap { map, strict } => FilterSpecRepr::Object(FilterSpecObject {
                name: "hashmap".into(),
                map: Some(map),
                strict,
                ..FilterSpecObject::default()
            }),
            FilterSpec::Custom(name) => FilterSpecRepr::Name(name),
            simple => named(simple.name()),
        }
    }
}

impl FilterSpec {
    /// Filter name as written in grammar files.
    pub fn name(&self) -> &str {
        match self {
            FilterSpec::Url => "url",
            FilterSpec::Int => "int",
            FilterSpec::Uint => "uint",
            FilterSpec::Float => "float",
            FilterSpec::Number => "number",
            FilterSpec::Range { .. } => "range",
            FilterSpec::Identifier => "identifier",
            FilterSpec::Regexp { .. } => "regexp",
            FilterSpec::Color => "color",
            FilterSpec::Email => "email",
            FilterSpec::SimpleText => "simpletext",
            FilterSpec::Text => "text",
            FilterSpec::Alnum => "alnum",
            FilterSpec::Hashmap { .. } => "hashmap",
            FilterSpec::Custom(name) => name,
        }
    }
}

/// Custom attribute and tag filters supplied by the host application.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    attribute: HashMap<String, AttributeFilterFn>,
    tag: HashMap<String, TagFilterFn>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut attribute: Vec<&String> = self.attribute.keys().collect();
        let mut tag: Vec<&String> = self.tag.keys().collect();
        attribute.sort();
        tag.sort();
        f.debug_struct("FilterRegistry")
            .field("attribute", &attribute)
            .field("tag", &tag)
            .finish()
    }
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom attribute filter. Re-registering a name replaces it.
    pub fn register_attribute_filter<F>(&mut self, name: impl Into<String>, filter: F) -> &mut Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.attribute.insert(name.into(), Arc::new(filter));
        self
    }

    /// Register a tag-level filter. Re-registering a name replaces it.
    pub fn register_tag_filter<F>(&mut self, name: impl Into<String>, filter: F) -> &mut Self
    where
        F: Fn(&mut BTreeMap<String, String>) -> bool + Send + Sync + 'static,
    {
        self.tag.insert(name.into(), Arc::new(filter));
        self
    }

    /// Look up a custom attribute filter.
    pub fn attribute_filter(&self, name: &str) -> Option<&AttributeFilterFn> {
        self.attribute.get(name)
    }

    /// Look up a tag filter, failing loudly when it is not registered.
    pub fn tag_filter(&self, name: &str) -> Result<TagFilter, FilterConfigError> {
        self.tag
            .get(name)
            .map(|func| TagFilter {
                name: name.to_string(),
                func: Arc::clone(func),
            })
            .ok_or_else(|| FilterConfigError::UnknownTagFilter(name.to_string()))
    }
}

/// A named tag-level filter bound to its callback.
#[derive(Clone)]
pub struct TagFilter {
    name: String,
    func: TagFilterFn,
}

impl TagFilter {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the filter; `false` means the tag is rejected.
    pub fn apply(&self, attributes: &mut BTreeMap<String, String>) -> bool {
        (self.func)(attributes)
    }
}

impl fmt::Debug for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TagFilter").field(&self.name).finish()
    }
}

/// Result of a successful filter application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// Accepted value.
    pub value: String,
    /// The filter changed the value's meaning (e.g. range clamping), as
    /// opposed to merely canonicalizing its spelling.
    pub adjusted: bool,
}

impl Filtered {
    fn kept(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            adjusted: false,
        }
    }
}

/// A compiled, immutable filter.
#[derive(Clone)]
pub enum Filter {
    /// See [`FilterSpec::Url`].
    Url(Arc<UrlPolicy>),
    /// See [`FilterSpec::Int`].
    Int,
    /// See [`FilterSpec::Uint`].
    Uint,
    /// See [`FilterSpec::Float`].
    Float,
    /// See [`FilterSpec::Number`].
    Number,
    /// See [`FilterSpec::Range`].
    Range {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },
    /// See [`FilterSpec::Identifier`].
    Identifier,
    /// See [`FilterSpec::Regexp`].
    Regexp(Regex),
    /// See [`FilterSpec::Color`].
    Color,
    /// See [`FilterSpec::Email`].
    Email,
    /// See [`FilterSpec::SimpleText`].
    SimpleText,
    /// See [`FilterSpec::Text`].
    Text,
    /// See [`FilterSpec::Alnum`].
    Alnum,
    /// See [`FilterSpec::Hashmap`].
    Hashmap {
        /// Value mapping.
        map: Arc<BTreeMap<String, String>>,
        /// Reject unmapped values.
        strict: bool,
    },
    /// A registered custom filter.
    Custom {
        /// Registered name.
        name: String,
        /// Callback.
        func: AttributeFilterFn,
    },
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Range { min, max } => write!(f, "Filter::Range({min}..={max})"),
            Filter::Regexp(re) => write!(f, "Filter::Regexp({})", re.as_str()),
            other => write!(f, "Filter::{}", other.name()),
        }
    }
}

impl Filter {
    /// Compile a declarative filter.
    pub fn compile(
        spec: &FilterSpec,
        url_policy: &Arc<UrlPolicy>,
        registry: &FilterRegistry,
    ) -> Result<Self, FilterConfigError> {
        Ok(match spec {
            FilterSpec::Url => {
                if url_policy.allowed_schemes.is_empty() {
                    return Err(FilterConfigError::NoSchemes);
                }
                Filter::Url(Arc::clone(url_policy))
            }
            FilterSpec::Int => Filter::Int,
            FilterSpec::Uint => Filter::Uint,
            FilterSpec::Float => Filter::Float,
            FilterSpec::Number => Filter::Number,
            &FilterSpec::Range { min, max } => {
                if min > max {
                    return Err(FilterConfigError::InvalidRange { min, max });
                }
                Filter::Range { min, max }
            }
            FilterSpec::Identifier => Filter::Identifier,
            FilterSpec::Regexp { pattern } => {
                let re = Regex::new(pattern).map_err(|source| FilterConfigError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
                Filter::Regexp(re)
            }
            FilterSpec::Color => Filter::Color,
            FilterSpec::Email => Filter::Email,
            FilterSpec::SimpleText => Filter::SimpleText,
            FilterSpec::Text => Filter::Text,
            FilterSpec::Alnum => Filter::Alnum,
            FilterSpec::Hashmap { map, strict } => Filter::Hashmap {
                map: Arc::new(map.clone()),
                strict: *strict,
            },
            FilterSpec::Custom(name) => {
                let func = registry
                    .attribute_filter(name)
                    .ok_or_else(|| FilterConfigError::UnknownFilter(name.clone()))?;
                Filter::Custom {
                    name: name.clone(),
                    func: Arc::clone(func),
                }
            }
        })
    }

    /// Filter name, as used in grammar files and log entries.
    pub fn name(&self) -> &str {
        match self {
            Filter::Url(_) => "url",
            Filter::Int => "int",
            Filter::Uint => "uint",
            Filter::Float => "float",
            Filter::Number => "number",
            Filter::Range { .. } => "range",
            Filter::Identifier => "identifier",
            Filter::Regexp(_) => "regexp",
            Filter::Color => "color",
            Filter::Email => "email",
            Filter::SimpleText => "simpletext",
            Filter::Text => "text",
            Filter::Alnum => "alnum",
            Filter::Hashmap { .. } => "hashmap",
            Filter::Custom { name, .. } => name,
        }
    }

    /// Apply the filter to an untrusted value.
    pub fn apply(&self, value: &str) -> Result<Filtered, FilterError> {
        let check = |ok: bool, filter: &'static str| {
            if ok {
                Ok(Filtered::kept(value))
            } else {
                Err(FilterError::Invalid { filter })
            }
        };
        match self {
            Filter::Url(policy) => policy.filter(value).map(Filtered::kept),
            Filter::Int => builtin::int(value)
                .map(|n| Filtered::kept(n.to_string()))
                .ok_or(FilterError::Invalid { filter: "int" }),
            Filter::Uint => builtin::uint(value)
                .map(|n| Filtered::kept(n.to_string()))
                .ok_or(FilterError::Invalid { filter: "uint" }),
            Filter::Float => builtin::float(value)
                .map(|n| Filtered::kept(n.to_string()))
                .ok_or(FilterError::Invalid { filter: "float" }),
            Filter::Number => check(builtin::number(value), "number"),
            Filter::Range { min, max } => {
                let n = builtin::int(value).ok_or(FilterError::Invalid { filter: "range" })?;
                let clamped = n.clamp(*min, *max);
                Ok(Filtered {
                    value: clamped.to_string(),
                    adjusted: clamped != n,
                })
            }
            Filter::Identifier => check(builtin::identifier(value), "identifier"),
            Filter::Regexp(re) => check(re.is_match(value), "regexp"),
            Filter::Color => check(builtin::color(value), "color"),
            Filter::Email => check(builtin::email(value), "email"),
            Filter::SimpleText => check(builtin::simple_text(value), "simpletext"),
            Filter::Text => Ok(Filtered::kept(value)),
            Filter::Alnum => check(builtin::alnum(value), "alnum"),
            Filter::Hashmap { map, strict } => match map.get(value) {
                Some(mapped) => Ok(Filtered::kept(mapped.as_str())),
                None if *strict => Err(FilterError::Invalid { filter: "hashmap" }),
                None => Ok(Filtered::kept(value)),
            },
            Filter::Custom { name, func } => func(value)
                .map(Filtered::kept)
                .ok_or_else(|| FilterError::Custom(name.clone())),
        }
    }
}

/// Apply a chain of filters in order, feeding each output into the next.
pub fn apply_chain(chain: &[Filter], value: &str) -> Result<Filtered, FilterError> {
    let mut current = Filtered::kept(value);
    for filter in chain {
        let next = filter.apply(&current.value)?;
        current = Filtered {
            value: next.value,
            adjusted: current.adjusted || next.adjusted,
        };
    }
    Ok(current)
}
