use tagweave_grammar::RegexpPass;

use super::PassSink;
use crate::tag::{Candidate, TagType};

/// Every non-empty match becomes a self-closing candidate spanning the
/// match; named capture groups fill the mapped attributes.
pub(super) fn scan(text: &str, pass: &RegexpPass, sink: &mut PassSink<'_>) {
    for caps in pass.regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.is_empty() {
            continue;
        }
        let mut candidate = Candidate::new(
            pass.tag_name.as_str(),
            whole.start(),
            whole.len(),
            TagType::SELF_CLOSING,
        );
        for (group, attribute) in &pass.captures {
            if let Some(m) = caps.name(group) {
                candidate.set_param(attribute.as_str(), m.as_str());
            }
        }
        if !sink.push(candidate) {
            break;
        }
    }
}
