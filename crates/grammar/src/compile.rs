//! Validation and compilation of a [`GrammarSpec`] into runtime tables.

use crate::decl::{
    BracketPassSpec, DefaultRule, GRAMMAR_FORMAT_VERSION, GrammarSpec, LimitAction, PassKindSpec,
    RegexpPassSpec, RuleSpec, TagSpec,
};
use crate::tagset::{TagId, TagSet};
use crate::GrammarError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tagweave_filters::{Filter, FilterRegistry, FilterSpec, TagFilter, UrlPolicy};

/// Element names used by the output format itself.
const RESERVED_NAMES: [&str; 5] = ["rt", "pt", "st", "et", "i"];

/// Compiled, immutable grammar. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Grammar {
    tags: Vec<TagDef>,
    lookup: HashMap<String, TagId>,
    root_allowed: TagSet,
    passes: Vec<PassDef>,
}

/// Compiled tag definition.
#[derive(Debug)]
pub struct TagDef {
    /// Identifier of this tag.
    pub id: TagId,
    /// Canonical name, used as the output element name.
    pub name: String,
    /// Maximum simultaneously open instances.
    pub nesting_limit: u32,
    /// Maximum accepted instances per parse.
    pub tag_limit: u32,
    /// Declared attributes, sorted by name.
    pub attributes: Vec<AttributeDef>,
    /// Tag filters run before attribute filtering.
    pub pre_filters: Vec<TagFilter>,
    /// Tag filters run after attribute filtering.
    pub post_filters: Vec<TagFilter>,
    /// Tags allowed anywhere below this one.
    pub permitted_descendants: TagSet,
    /// `false` when `permitted_descendants` is the full set, so opening the
    /// tag never narrows the allowed set.
    pub restricts_descendants: bool,
    /// Tags refused as direct children.
    pub denied_children: TagSet,
    /// Innermost open tags this tag closes when it opens.
    pub close_parent: Vec<TagId>,
    /// Open ancestors this tag closes when it opens.
    pub close_ancestor: Vec<TagId>,
    /// Required direct parent.
    pub require_parent: Option<TagId>,
    /// Required open ancestors.
    pub require_ascendant: Vec<TagId>,
    /// Leave everything up to the matching end tag as text.
    pub ignore_tags: bool,
    /// Whitespace absorption.
    pub trim: TrimRules,
    /// See [`TagSpec::auto_close`].
    pub auto_close: bool,
    /// See [`TagSpec::internal`].
    pub internal: bool,
}

impl TagDef {
    /// Declared attribute by (lowercase) name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes
            .binary_search_by(|a| a.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.attributes[i])
    }
}

/// Whitespace absorbed into a tag's span when it is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimRules {
    /// Before a start or self-closing tag.
    pub before: bool,
    /// After an end or self-closing tag.
    pub after: bool,
    /// After a start tag.
    pub ltrim_content: bool,
    /// Before an end tag.
    pub rtrim_content: bool,
}

/// Compiled attribute definition.
#[derive(Debug)]
pub struct AttributeDef {
    /// Lowercase attribute name.
    pub name: String,
    /// Abandon the tag when the attribute is missing after filtering.
    pub required: bool,
    /// Substituted when absent or rejected.
    pub default_value: Option<String>,
    /// Pre-filters, type filter and post-filters, in application order.
    pub chain: Vec<Filter>,
}

/// Compiled tokenizer pass.
#[derive(Debug)]
pub struct PassDef {
    /// Unique name.
    pub name: String,
    /// Candidate limit.
    pub limit: usize,
    /// Policy past the limit.
    pub limit_action: LimitAction,
    /// Kind-specific tables.
    pub kind: PassKind,
}

/// Kind-specific pass tables.
#[derive(Debug)]
pub enum PassKind {
    /// Bracket markup scanner.
    Bracket(BracketPass),
    /// Regexp scanner.
    Regexp(RegexpPass),
    /// Bound to a registered plugin at parser build time.
    Plugin,
}

/// Tables of a bracket pass.
#[derive(Debug)]
pub struct BracketPass {
    /// Matches `[` or `[/` followed by a known name; group 1 is the name.
    /// `None` when the pass has nothing to recognize.
    pub scanner: Option<Regex>,
    bbcodes: HashMap<String, Bbcode>,
}

impl BracketPass {
    /// BBCode by name, case-insensitively.
    pub fn bbcode(&self, name: &str) -> Option<&Bbcode> {
        self.bbcodes.get(&name.to_ascii_uppercase())
    }
}

/// One compiled BBCode.
#[derive(Debug)]
pub struct Bbcode {
    /// Name as configured.
    pub name: String,
    /// Tag produced.
    pub tag: TagId,
    /// Attribute set by `[name=value]`, if configured.
    pub default_attribute: Option<String>,
    /// Attributes filled from the content.
    pub content_attributes: Vec<String>,
    /// Values applied when absent from the source.
    pub predefined_attributes: Vec<(String, String)>,
}

/// Tables of a regexp pass.
#[derive(Debug)]
pub struct RegexpPass {
    /// Compiled pattern.
    pub regex: Regex,
    /// Name given to produced candidates.
    pub tag_name: String,
    /// Capture group name → attribute name.
    pub captures: Vec<(String, String)>,
}

impl Grammar {
    /// Validate `spec` and build the runtime tables.
    ///
    /// Every configuration mistake (unknown tag references, conflicting
    /// names, bad regexps, unregistered filters) is reported here.
    pub fn compile(spec: &GrammarSpec, registry: &FilterRegistry) -> Result<Self, GrammarError> {
        check_version(&spec.schema_version)?;
        if spec.tags.len() > TagId::MAX_TAGS {
            return Err(GrammarError::TooManyTags {
                count: spec.tags.len(),
                max: TagId::MAX_TAGS,
            });
        }

        let mut lookup = HashMap::new();
        let names: Vec<&String> = spec.tags.keys().collect();
        for (index, name) in names.iter().enumerate() {
            check_tag_name(name)?;
            if lookup.insert(name.to_ascii_uppercase(), TagId::new(index)).is_some() {
                return Err(GrammarError::DuplicateTag((*name).clone()));
            }
        }
        let mut builder = Builder {
            names: &names,
            lookup,
            capacity: names.len(),
        };

        for (alias, target) in &spec.aliases {
            let id = builder.resolve(&format!("alias '{alias}'"), target)?;
            builder.bind(alias, id)?;
        }

        let url_policy = Arc::new(spec.filters.url.clone());
        let mut tags = Vec::with_capacity(names.len());
        for (index, (name, tag_spec)) in spec.tags.iter().enumerate() {
            tags.push(builder.tag(TagId::new(index), name, tag_spec, &url_policy, registry)?);
        }

        let root_allowed = builder.permitted(
            "root",
            spec.root.default_rule,
            &spec.root.allow,
            &spec.root.deny,
        )?;

        let mut passes = Vec::with_capacity(spec.passes.len());
        for pass in &spec.passes {
            if pass.name.is_empty() {
                return Err(invalid("passes[].name", "must not be empty"));
            }
            if passes.iter().any(|p: &PassDef| p.name == pass.name) {
                return Err(invalid(
                    &format!("pass '{}'", pass.name),
                    "pass names must be unique",
                ));
            }
            if pass.limit == 0 {
                return Err(invalid(&format!("pass '{}'.limit", pass.name), "must be > 0"));
            }
            let kind = match &pass.kind {
                PassKindSpec::Bracket(bracket) => {
                    PassKind::Bracket(builder.bracket_pass(&pass.name, bracket, &tags)?)
                }
                PassKindSpec::Regexp(regexp) => {
                    PassKind::Regexp(builder.regexp_pass(&pass.name, regexp)?)
                }
                PassKindSpec::Plugin => PassKind::Plugin,
            };
            passes.push(PassDef {
                name: pass.name.clone(),
                limit: pass.limit,
                limit_action: pass.limit_action,
                kind,
            });
        }

        Ok(Self {
            tags,
            lookup: builder.lookup,
            root_allowed,
            passes,
        })
    }

    /// Load a JSON or JSONC grammar and compile it.
    pub fn from_jsonc(source: &str, registry: &FilterRegistry) -> Result<Self, GrammarError> {
        Self::compile(&crate::load_grammar_spec(source)?, registry)
    }

    /// Every tag definition, indexed by [`TagId::index`].
    pub fn tags(&self) -> &[TagDef] {
        &self.tags
    }

    /// Tag definition by id.
    ///
    /// # Panics
    /// Panics if `id` belongs to another grammar with more tags.
    pub fn tag(&self, id: TagId) -> &TagDef {
        &self.tags[id.index()]
    }

    /// Resolve a tag name, alias or BBCode name, case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<TagId> {
        self.lookup.get(&name.to_ascii_uppercase()).copied()
    }

    /// Tag definition by name, alias or BBCode name.
    pub fn tag_by_name(&self, name: &str) -> Option<&TagDef> {
        self.resolve(name).map(|id| self.tag(id))
    }

    /// Allowed set when no tag is open.
    pub fn root_allowed(&self) -> &TagSet {
        &self.root_allowed
    }

    /// Passes in rank order.
    pub fn passes(&self) -> &[PassDef] {
        &self.passes
    }

    /// Names of passes that must be bound to a plugin.
    pub fn plugin_passes(&self) -> impl Iterator<Item = &str> {
        self.passes
            .iter()
            .filter(|p| matches!(p.kind, PassKind::Plugin))
            .map(|p| p.name.as_str())
    }
}

struct Builder<'a> {
    names: &'a [&'a String],
    lookup: HashMap<String, TagId>,
    capacity: usize,
}

impl Builder<'_> {
    fn resolve(&self, context: &str, name: &str) -> Result<TagId, GrammarError> {
        self.lookup
            .get(&name.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| GrammarError::UnknownTag {
                context: context.to_string(),
                name: name.to_string(),
            })
    }

    fn resolve_all(&self, context: &str, names: &[String]) -> Result<Vec<TagId>, GrammarError> {
        names.iter().map(|n| self.resolve(context, n)).collect()
    }

    /// Register an extra name for `id`; rebinding to the same tag is fine.
    fn bind(&mut self, name: &str, id: TagId) -> Result<(), GrammarError> {
        let key = name.to_ascii_uppercase();
        match self.lookup.get(&key) {
            Some(&existing) if existing != id => Err(GrammarError::ConflictingAlias {
                name: name.to_string(),
                first: self.names[existing.index()].clone(),
                second: self.names[id.index()].clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.lookup.insert(key, id);
                Ok(())
            }
        }
    }

    fn permitted(
        &self,
        context: &str,
        default_rule: DefaultRule,
        allow: &[String],
        deny: &[String],
    ) -> Result<TagSet, GrammarError> {
        let mut set = match default_rule {
            DefaultRule::Allow => TagSet::full(self.capacity),
            DefaultRule::Deny => TagSet::empty(self.capacity),
        };
        for id in self.resolve_all(&format!("{context} allow"), allow)? {
            set.insert(id);
        }
        for id in self.resolve_all(&format!("{context} deny"), deny)? {
            set.remove(id);
        }
        Ok(set)
    }

    fn tag(
        &self,
        id: TagId,
        name: &str,
        spec: &TagSpec,
        url_policy: &Arc<UrlPolicy>,
        registry: &FilterRegistry,
    ) -> Result<TagDef, GrammarError> {
        let context = format!("tag '{name}'");
        if spec.nesting_limit == 0 {
            return Err(invalid(&format!("{context}.nestingLimit"), "must be > 0"));
        }
        if spec.tag_limit == 0 {
            return Err(invalid(&format!("{context}.tagLimit"), "must be > 0"));
        }

        let mut attributes = Vec::with_capacity(spec.attributes.len());
        for (attr_name, attr) in &spec.attributes {
            check_attribute_name(&context, attr_name)?;
            let attr_context = format!("{context} attribute '{attr_name}'");
            let chain = attr
                .pre_filters
                .iter()
                .chain(attr.filter.iter())
                .chain(attr.post_filters.iter())
                .map(|f| compile_filter(&attr_context, f, url_policy, registry))
                .collect::<Result<Vec<_>, _>>()?;
            attributes.push(AttributeDef {
                name: attr_name.clone(),
                required: attr.required,
                default_value: attr.default_value.clone(),
                chain,
            });
        }

        let tag_filters = |names: &[String]| -> Result<Vec<TagFilter>, GrammarError> {
            names
                .iter()
                .map(|n| {
                    registry.tag_filter(n).map_err(|source| GrammarError::Filter {
                        context: context.clone(),
                        source,
                    })
                })
                .collect()
        };

        let rules: &RuleSpec = &spec.rules;
        if rules.require_parent.len() > 1 {
            return Err(GrammarError::ConflictingRequireParent {
                tag: name.to_string(),
                targets: rules.require_parent.join(", "),
            });
        }
        let require_parent = rules
            .require_parent
            .first()
            .map(|p| self.resolve(&format!("{context} requireParent"), p))
            .transpose()?;

        let permitted_descendants =
            self.permitted(&context, spec.default_rule, &rules.allow, &rules.deny)?;
        let mut denied_children = TagSet::empty(self.capacity);
        for child in self.resolve_all(&format!("{context} denyChild"), &rules.deny_child)? {
            denied_children.insert(child);
        }

        Ok(TagDef {
            id,
            name: name.to_string(),
            nesting_limit: spec.nesting_limit,
            tag_limit: spec.tag_limit,
            attributes,
            pre_filters: tag_filters(&spec.filters.pre)?,
            post_filters: tag_filters(&spec.filters.post)?,
            restricts_descendants: permitted_descendants != TagSet::full(self.capacity),
            permitted_descendants,
            denied_children,
            close_parent: self.resolve_all(&format!("{context} closeParent"), &rules.close_parent)?,
            close_ancestor: self
                .resolve_all(&format!("{context} closeAncestor"), &rules.close_ancestor)?,
            require_parent,
            require_ascendant: self
                .resolve_all(&format!("{context} requireAscendant"), &rules.require_ascendant)?,
            ignore_tags: rules.ignore_tags,
            trim: TrimRules {
                before: rules.trim_before,
                after: rules.trim_after,
                ltrim_content: rules.ltrim_content,
                rtrim_content: rules.rtrim_content,
            },
            auto_close: spec.auto_close,
            internal: spec.internal,
        })
    }

    fn bracket_pass(
        &mut self,
        pass: &str,
        spec: &BracketPassSpec,
        tags: &[TagDef],
    ) -> Result<BracketPass, GrammarError> {
        let mut bbcodes = HashMap::new();
        for (bbcode_name, bbcode) in &spec.bbcodes {
            let context = format!("pass '{pass}' bbcode '{bbcode_name}'");
            check_bbcode_name(&context, bbcode_name)?;
            let tag_name = bbcode
                .tag_name
                .clone()
                .unwrap_or_else(|| bbcode_name.to_ascii_uppercase());
            let tag = self.resolve(&context, &tag_name)?;
            self.bind(bbcode_name, tag)?;

            let def = &tags[tag.index()];
            let declared = |field: &str, attr: &str| {
                if def.attribute(attr).is_some() {
                    Ok(())
                } else {
                    Err(invalid(
                        &format!("{context}.{field}"),
                        &format!("attribute '{attr}' is not declared on tag '{}'", def.name),
                    ))
                }
            };
            if let Some(attr) = &bbcode.default_attribute {
                declared("defaultAttribute", attr)?;
            }
            for attr in &bbcode.content_attributes {
                declared("contentAttributes", attr)?;
            }
            for attr in bbcode.predefined_attributes.keys() {
                declared("predefinedAttributes", attr)?;
            }

            let previous = bbcodes.insert(
                bbcode_name.to_ascii_uppercase(),
                Bbcode {
                    name: bbcode_name.clone(),
                    tag,
                    default_attribute: bbcode.default_attribute.clone(),
                    content_attributes: bbcode.content_attributes.clone(),
                    predefined_attributes: bbcode
                        .predefined_attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                },
            );
            if previous.is_some() {
                return Err(invalid(&context, "BBCode names must be unique case-insensitively"));
            }
        }

        let mut scanned: Vec<String> = bbcodes.keys().cloned().collect();
        for def in tags.iter().filter(|t| t.internal) {
            let key = def.name.to_ascii_uppercase();
            if !bbcodes.contains_key(&key) {
                scanned.push(key);
            }
        }
        let scanner = if scanned.is_empty() {
            None
        } else {
            // Longest first, so a name never stops at a shorter prefix.
            scanned.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation: Vec<String> = scanned.iter().map(|n| regex::escape(n)).collect();
            let pattern = format!(r"(?i)\[/?({})", alternation.join("|"));
            Some(Regex::new(&pattern).map_err(|source| GrammarError::InvalidRegex {
                context: format!("pass '{pass}' scanner"),
                source,
            })?)
        };

        Ok(BracketPass { scanner, bbcodes })
    }

    fn regexp_pass(&self, pass: &str, spec: &RegexpPassSpec) -> Result<RegexpPass, GrammarError> {
        let context = format!("pass '{pass}'");
        let regex = Regex::new(&spec.regexp).map_err(|source| GrammarError::InvalidRegex {
            context: context.clone(),
            source,
        })?;
        let tag = self.resolve(&format!("{context} tagName"), &spec.tag_name)?;
        let group_names: Vec<&str> = regex.capture_names().flatten().collect();
        let mut captures = Vec::with_capacity(spec.attributes.len());
        for (group, attribute) in &spec.attributes {
            if !group_names.contains(&group.as_str()) {
                return Err(invalid(
                    &format!("{context}.attributes"),
                    &format!("capture group '{group}' does not exist in the regexp"),
                ));
            }
            captures.push((group.clone(), attribute.clone()));
        }
        Ok(RegexpPass {
            regex,
            tag_name: self.names[tag.index()].clone(),
            captures,
        })
    }
}

fn compile_filter(
    context: &str,
    spec: &FilterSpec,
    url_policy: &Arc<UrlPolicy>,
    registry: &FilterRegistry,
) -> Result<Filter, GrammarError> {
    Filter::compile(spec, url_policy, registry).map_err(|source| GrammarError::Filter {
        context: context.to_string(),
        source,
    })
}

fn invalid(field: &str, reason: &str) -> GrammarError {
    GrammarError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_version(version: &str) -> Result<(), GrammarError> {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    if major(version) == major(GRAMMAR_FORMAT_VERSION) {
        Ok(())
    } else {
        Err(GrammarError::UnsupportedVersion(version.to_string()))
    }
}

fn check_tag_name(name: &str) -> Result<(), GrammarError> {
    let mut bytes = name.bytes();
    let valid = bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(invalid(
            &format!("tag name '{name}'"),
            "must match [A-Za-z_][A-Za-z0-9_-]*",
        ));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(invalid(
            &format!("tag name '{name}'"),
            "is reserved by the output format",
        ));
    }
    Ok(())
}

fn check_attribute_name(context: &str, name: &str) -> Result<(), GrammarError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(invalid(
            &format!("{context} attribute '{name}'"),
            "must be lowercase [a-z0-9_-]+",
        ))
    }
}

fn check_bbcode_name(context: &str, name: &str) -> Result<(), GrammarError> {
    let valid = !name.is_empty()
        && !name
            .bytes()
            .any(|b| b.is_ascii_whitespace() || matches!(b, b'[' | b']' | b'=' | b'/' | b':' | b'"' | b'\''));
    if valid {
        Ok(())
    } else {
        Err(invalid(context, "BBCode names cannot contain whitespace or [ ] = / : quotes"))
    }
}

