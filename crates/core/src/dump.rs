use crate::parser::ParseResult;

/// Serialize a parse result to a pretty-printed JSON string.
pub fn to_pretty_json(result: &ParseResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}
