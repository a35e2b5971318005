use std::collections::BTreeMap;

use tagweave_diagnostics::{Logger, codes};
use tagweave_filters::apply_chain;
use tagweave_grammar::TagDef;

use crate::context::params;

/// Run the attribute pipeline of `def` over `params`.
///
/// Returns `None` when the tag must be abandoned: a tag filter rejected
/// it, or a required attribute is missing once every filter has run.
pub(super) fn filter_attributes(
    def: &TagDef,
    mut params: BTreeMap<String, String>,
    pos: usize,
    log: &mut Logger,
) -> Option<BTreeMap<String, String>> {
    params.retain(|name, _| def.attribute(name).is_some());
    for attr in &def.attributes {
        if let Some(default) = &attr.default_value {
            params
                .entry(attr.name.clone())
                .or_insert_with(|| default.clone());
        }
    }

    for filter in &def.pre_filters {
        if !filter.apply(&mut params) {
            log.log(
                codes::TAG_FILTER_REJECTED,
                pos,
                params![def.name, filter.name()],
            );
            return None;
        }
    }

    for attr in &def.attributes {
        let Some(raw) = params.get(&attr.name).cloned() else {
            continue;
        };
        match apply_chain(&attr.chain, &raw) {
            Ok(filtered) => {
                if filtered.adjusted {
                    log.log(
                        codes::VALUE_ADJUSTED,
                        pos,
                        params![def.name, attr.name, raw, filtered.value],
                    );
                }
                params.insert(attr.name.clone(), filtered.value);
            }
            Err(err) => {
                log.log(
                    codes::INVALID_ATTRIBUTE,
                    pos,
                    params![def.name, attr.name, err],
                );
                match &attr.default_value {
                    Some(default) => {
                        log.log(
                            codes::DEFAULT_SUBSTITUTED,
                            pos,
                            params![def.name, attr.name, default],
                        );
                        params.insert(attr.name.clone(), default.clone());
                    }
                    None => {
                        params.remove(&attr.name);
                    }
                }
            }
        }
    }

    for filter in &def.post_filters {
        if !filter.apply(&mut params) {
            log.log(
                codes::TAG_FILTER_REJECTED,
                pos,
                params![def.name, filter.name()],
            );
            return None;
        }
    }

    if let Some(missing) = def
        .attributes
        .iter()
        .find(|attr| attr.required && !params.contains_key(&attr.name))
    {
        log.log(
            codes::MISSING_ATTRIBUTE,
            pos,
            params![def.name, missing.name],
        );
        return None;
    }
    Some(params)
}
