//! Serde data model of a grammar file.
//!
//! These types mirror the JSON(C) layout one to one (camelCase keys). They
//! are plain data; [`crate::Grammar::compile`] validates them and builds the
//! runtime tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tagweave_filters::{FilterConfig, FilterSpec};

/// Current grammar file format version.
pub const GRAMMAR_FORMAT_VERSION: &str = "1.0.0";

/// Default per-tag nesting limit.
pub const DEFAULT_NESTING_LIMIT: u32 = 10;

/// Default per-tag occurrence limit.
pub const DEFAULT_TAG_LIMIT: u32 = 5000;

/// Default per-pass candidate limit.
pub const DEFAULT_PASS_LIMIT: usize = 10_000;

fn default_version() -> String {
    GRAMMAR_FORMAT_VERSION.to_string()
}

fn default_nesting_limit() -> u32 {
    DEFAULT_NESTING_LIMIT
}

fn default_tag_limit() -> u32 {
    DEFAULT_TAG_LIMIT
}

fn default_pass_limit() -> usize {
    DEFAULT_PASS_LIMIT
}

fn default_true() -> bool {
    true
}

/// A whole grammar file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GrammarSpec {
    /// File format version; the major component must match
    /// [`GRAMMAR_FORMAT_VERSION`].
    #[serde(default = "default_version")]
    pub schema_version: String,
    /// Grammar-wide filter settings (URL policy).
    #[serde(default)]
    pub filters: FilterConfig,
    /// Rules in effect when no tag is open.
    #[serde(default)]
    pub root: RootSpec,
    /// Extra names (case-insensitive) that resolve to a tag.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Tag definitions keyed by canonical name.
    pub tags: BTreeMap<String, TagSpec>,
    /// Tokenizer passes, in rank order.
    #[serde(default)]
    pub passes: Vec<PassSpec>,
}

/// Whether tags not named by an `allow`/`deny` list are allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultRule {
    /// Everything not denied is allowed.
    #[default]
    Allow,
    /// Only explicitly allowed tags are allowed.
    Deny,
}

/// Allowed set at the root of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RootSpec {
    /// Fallback for unlisted tags.
    #[serde(default)]
    pub default_rule: DefaultRule,
    /// Tags allowed at the root.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tags denied at the root. Deny wins over allow.
    #[serde(default)]
    pub deny: Vec<String>,
}

/// One tag definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TagSpec {
    /// Maximum number of simultaneously open instances.
    #[serde(default = "default_nesting_limit")]
    pub nesting_limit: u32,
    /// Maximum number of accepted instances per parse.
    #[serde(default = "default_tag_limit")]
    pub tag_limit: u32,
    /// Fallback for descendants not named by `rules.allow` / `rules.deny`.
    #[serde(default)]
    pub default_rule: DefaultRule,
    /// Declared attributes keyed by lowercase name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
    /// Structural rules.
    #[serde(default)]
    pub rules: RuleSpec,
    /// Tag-level filters, by registered name.
    #[serde(default)]
    pub filters: TagFiltersSpec,
    /// A start tag not immediately followed by its own end marker is treated
    /// as self-closing.
    #[serde(default)]
    pub auto_close: bool,
    /// Reserved for tags produced by non-bracket passes; writing it as a
    /// bracket tag is refused.
    #[serde(default)]
    pub internal: bool,
}

impl Default for TagSpec {
    fn default() -> Self {
        Self {
            nesting_limit: DEFAULT_NESTING_LIMIT,
            tag_limit: DEFAULT_TAG_LIMIT,
            default_rule: DefaultRule::Allow,
            attributes: BTreeMap::new(),
            rules: RuleSpec::default(),
            filters: TagFiltersSpec::default(),
            auto_close: false,
            internal: false,
        }
    }
}

/// One declared attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttributeSpec {
    /// A tag missing this attribute after filtering is abandoned.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Used when the attribute is absent or its value is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Filters applied before the type filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_filters: Vec<FilterSpec>,
    /// The type filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
    /// Filters applied after the type filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_filters: Vec<FilterSpec>,
}

impl Default for AttributeSpec {
    fn default() -> Self {
        Self {
            required: true,
            default_value: None,
            pre_filters: Vec::new(),
            filter: None,
            post_filters: Vec::new(),
        }
    }
}

/// Tag-level filters run over the whole attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TagFiltersSpec {
    /// Run before attribute filtering.
    #[serde(default)]
    pub pre: Vec<String>,
    /// Run after attribute filtering.
    #[serde(default)]
    pub post: Vec<String>,
}

/// Structural rules of a tag. Every list names tags (or aliases).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSpec {
    /// Descendants allowed when `defaultRule` is `deny`.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Descendants denied. Deny wins over allow.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Direct children denied; deeper descendants are unaffected.
    #[serde(default)]
    pub deny_child: Vec<String>,
    /// Opening this tag closes the innermost open tag if it is one of these.
    #[serde(default)]
    pub close_parent: Vec<String>,
    /// Opening this tag closes the nearest open ancestor among these, along
    /// with everything opened inside it.
    #[serde(default)]
    pub close_ancestor: Vec<String>,
    /// The innermost open tag must be this one. At most one entry.
    #[serde(default)]
    pub require_parent: Vec<String>,
    /// Each of these must be open somewhere above the tag.
    #[serde(default)]
    pub require_ascendant: Vec<String>,
    /// Everything up to this tag's own end tag is left as text.
    #[serde(default)]
    pub ignore_tags: bool,
    /// Absorb whitespace before the start tag.
    #[serde(default)]
    pub trim_before: bool,
    /// Absorb whitespace after the end tag.
    #[serde(default)]
    pub trim_after: bool,
    /// Absorb whitespace right after the start tag.
    #[serde(default)]
    pub ltrim_content: bool,
    /// Absorb whitespace right before the end tag.
    #[serde(default)]
    pub rtrim_content: bool,
}

/// What a pass does once it has produced `limit` candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitAction {
    /// Stop scanning silently.
    Ignore,
    /// Stop scanning and log a warning.
    #[default]
    Warn,
    /// Discard everything the pass produced and log an error.
    Abort,
}

impl std::fmt::Display for LimitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitAction::Ignore => write!(f, "ignore"),
            LimitAction::Warn => write!(f, "warn"),
            LimitAction::Abort => write!(f, "abort"),
        }
    }
}

/// One tokenizer pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSpec {
    /// Unique pass name, used in log entries and to bind plugins.
    pub name: String,
    /// Maximum number of candidates the pass may produce.
    #[serde(default = "default_pass_limit")]
    pub limit: usize,
    /// Policy when `limit` is exceeded.
    #[serde(default)]
    pub limit_action: LimitAction,
    /// Pass kind and its settings.
    #[serde(flatten)]
    pub kind: PassKindSpec,
}

/// Kind-specific pass settings, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PassKindSpec {
    /// `[name attr=value]...[/name]` markup.
    Bracket(BracketPassSpec),
    /// Every regexp match becomes a self-closing tag.
    Regexp(RegexpPassSpec),
    /// Implemented by a `TagPass` registered under the pass name.
    Plugin,
}

/// Settings of a bracket pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketPassSpec {
    /// Recognized BBCode names (case-insensitive).
    #[serde(default)]
    pub bbcodes: BTreeMap<String, BbcodeSpec>,
}

/// One BBCode recognized by a bracket pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BbcodeSpec {
    /// Tag produced; defaults to the uppercased BBCode name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Attribute set by `[name=value]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_attribute: Option<String>,
    /// Attributes filled from the tag's content when absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_attributes: Vec<String>,
    /// Attribute values applied when the source text does not set them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub predefined_attributes: BTreeMap<String, String>,
}

/// Settings of a regexp pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexpPassSpec {
    /// Pattern, in `regex` crate syntax.
    pub regexp: String,
    /// Name of the tag produced for each match.
    pub tag_name: String,
    /// Named capture group → attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}
