//! Build script for the tagweave CLI binary.
//!
//! Embeds the default grammar so that `tagweave parse` works without a
//! `--grammar` flag.
//!
//! Grammar resolution order:
//!   1. `../../grammars/bbcode.jsonc` (workspace copy, freshest during dev)
//!   2. `data/bbcode.jsonc` (in-crate copy for packaged builds)
//!
//! If neither exists the binary is built without a grammar and every
//! command that parses requires `--grammar <PATH>`.

use std::path::Path;

fn main() {
    println!("cargo::rustc-check-cfg=cfg(has_embedded_grammar)");

    let workspace = Path::new("../../grammars/bbcode.jsonc");
    let in_crate = Path::new("data/bbcode.jsonc");

    println!("cargo:rerun-if-changed=../../grammars/bbcode.jsonc");
    println!("cargo:rerun-if-changed=data/bbcode.jsonc");

    let grammar_path = if workspace.exists() {
        workspace
    } else if in_crate.exists() {
        in_crate
    } else {
        return;
    };

    println!("cargo:rustc-cfg=has_embedded_grammar");

    // Copy into OUT_DIR so include_str! has a stable, absolute path.
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest = Path::new(&out_dir).join("bbcode.jsonc");
    std::fs::copy(grammar_path, &dest).expect("failed to copy bbcode.jsonc to OUT_DIR");
}
