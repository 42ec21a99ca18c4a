//! The import manifest: an imperative script adopting existing live
//! objects under their declarative addresses.

use std::fmt::Write;

/// Default engine command used in the generated script.
pub const DEFAULT_ENGINE: &str = "terraform";

/// One adoption instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportManifestEntry {
    pub address: String,
    pub external_id: String,
    /// Human-readable name, carried for auditability.
    pub comment: String,
}

/// Render the manifest script. Entries are emitted in the order given,
/// which matches the deterministic order of the owning files.
pub fn render_manifest(entries: &[ImportManifestEntry], engine: &str) -> String {
    let mut out = String::from("#!/bin/sh\n");
    out.push_str("# Generated by moor export. Adopts existing objects into the workspace.\n");
    out.push_str("set -e\n\n");
    for entry in entries {
        let _ = writeln!(
            out,
            "{} import {} {} # {}",
            engine, entry.address, entry.external_id, entry.comment
        );
    }
    out
}

/// Parse a manifest script back into entries. Used by the verifier,
/// which treats exported artifacts as opaque input.
pub fn parse_manifest(text: &str) -> Vec<ImportManifestEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("set ") {
            continue;
        }
        let (instruction, comment) = match line.split_once('#') {
            Some((i, c)) => (i.trim(), c.trim()),
            None => (line, ""),
        };
        let tokens: Vec<&str> = instruction.split_whitespace().collect();
        // <engine> import <address> <external_id>
        if tokens.len() == 4 && tokens[1] == "import" {
            entries.push(ImportManifestEntry {
                address: tokens[2].to_string(),
                external_id: tokens[3].to_string(),
                comment: comment.to_string(),
            });
        }
    }
    entries
}
