//! Build script generating the log entry catalogue from `data/diagnostics.jsonc`.
//!
//! Generated files (in `OUT_DIR`):
//! - `generated_codes.rs`: one `pub const` per entry, mapping the constant name to its ID
//! - `generated_explain.rs`: ID → long description
//! - `generated_severity.rs`: ID → default severity
//! - `generated_templates.rs`: ID → positional message template

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use tagweave_jsonc_strip::strip_jsonc;

fn main() {
    let table_path = Path::new("data/diagnostics.jsonc");
    println!("cargo:rerun-if-changed={}", table_path.display());

    let raw = fs::read_to_string(table_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", table_path.display()));

    let table: serde_json::Value = serde_json::from_str(&strip_jsonc(&raw))
        .expect("failed to parse diagnostics.jsonc as JSON");

    let entries = table["diagnostics"]
        .as_array()
        .expect("diagnostics.jsonc: expected `diagnostics` array");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let out_path = Path::new(&out_dir);

    let header = "// Generated from data/diagnostics.jsonc. Do not edit.\n\n";
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_names: HashSet<&str> = HashSet::new();

    let mut codes = String::from(header);
    let mut explain = String::from("match id {\n");
    let mut severity = format!("{header}match id {{\n");
    let mut templates = format!("{header}match id {{\n");

    for (i, entry) in entries.iter().enumerate() {
        let field = |name: &str| {
            entry[name]
                .as_str()
                .unwrap_or_else(|| panic!("diagnostics[{i}] missing string field `{name}`"))
        };
        let id = field("id");
        let const_name = field("constName");

        assert!(
            !const_name.is_empty()
                && const_name.as_bytes()[0].is_ascii_uppercase()
                && const_name
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_'),
            "diagnostics[{i}] (id={id}): constName '{const_name}' is not SCREAMING_SNAKE_CASE"
        );
        assert!(seen_ids.insert(id), "diagnostics[{i}]: duplicate id '{id}'");
        assert!(
            seen_names.insert(const_name),
            "diagnostics[{i}] (id={id}): duplicate constName '{const_name}'"
        );

        codes.push_str(&format!("/// {}\n", field("summary")));
        codes.push_str(&format!("pub const {const_name}: &str = \"{id}\";\n\n"));

        explain.push_str(&format!(
            "    \"{id}\" => Some(\"{}\"),\n",
            escape_rust_string_literal(field("description"))
        ));

        let sev_rs = match field("severity") {
            "debug" => "Severity::Debug",
            "info" => "Severity::Info",
            "warn" => "Severity::Warn",
            "error" => "Severity::Error",
            other => panic!("diagnostics[{i}] (id={id}): invalid severity '{other}'"),
        };
        severity.push_str(&format!("    \"{id}\" => Some({sev_rs}),\n"));

        let param_count = entry["params"]
            .as_array()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `params` array"))
            .len();
        let template = field("template");
        for index in template_placeholders(template) {
            assert!(
                index < param_count,
                "diagnostics[{i}] (id={id}): template placeholder {{{index}}} has no matching param ({param_count} declared)"
            );
        }
        templates.push_str(&format!(
            "    \"{id}\" => Some(\"{}\"),\n",
            escape_rust_string_literal(template)
        ));
    }

    for text in [&mut explain, &mut severity, &mut templates] {
        text.push_str("    _ => None,\n}\n");
    }

    for (name, contents) in [
        ("generated_codes.rs", &codes),
        ("generated_explain.rs", &explain),
        ("generated_severity.rs", &severity),
        ("generated_templates.rs", &templates),
    ] {
        fs::write(out_path.join(name), contents)
            .unwrap_or_else(|e| panic!("failed to write {name}: {e}"));
    }
}

fn escape_rust_string_literal(value: &str) -> String {
    value.chars().flat_map(char::escape_default).collect()
}

/// Positional placeholder indexes (`{0}`, `{1}`, ...) used by a template.
fn template_placeholders(template: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let key = after[..close].trim();
        let index = key
            .parse::<usize>()
            .unwrap_or_else(|_| panic!("template placeholder '{{{key}}}' is not a positional index"));
        found.push(index);
        rest = &after[close + 1..];
    }
    found
}
