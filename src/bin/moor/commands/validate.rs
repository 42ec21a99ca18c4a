//! `moor validate` command

use anyhow::{Context, Result};

use moor::validate::{Validator, ValidatorTables};
use moor::{ObjectKind, SchemaCatalog};

use crate::cli::ValidateArgs;

pub fn execute(args: ValidateArgs) -> Result<()> {
    let kind: ObjectKind = args
        .kind
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let text = std::fs::read_to_string(&args.mapping)
        .with_context(|| format!("failed to read {}", args.mapping.display()))?;
    let mapping: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", args.mapping.display()))?;

    let catalog = SchemaCatalog::builtin();
    let validator = Validator::new(ValidatorTables::builtin());
    let outcome = validator.validate(&mapping, catalog.schema(kind));

    if outcome.valid {
        println!("mapping is valid for kind `{}`", kind);
        return Ok(());
    }

    let path = outcome.offending_path.unwrap_or_default();
    eprintln!(
        "error: {}",
        outcome
            .detail
            .unwrap_or_else(|| format!("unknown field `{}`", path))
    );
    if let Some(suggestion) = outcome.suggestion {
        eprintln!("  help: did you mean `{}`?", suggestion);
    }
    std::process::exit(1);
}
