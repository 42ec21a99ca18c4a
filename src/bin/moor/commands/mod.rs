//! Command implementations.

pub mod completions;
pub mod export;
pub mod validate;
pub mod verify;

use anyhow::{anyhow, Result};
use moor::api::{Credentials, HttpPlatformApi};
use moor::util::diagnostic::suggestions;

use crate::cli::CredentialArgs;

/// Build the real API client from the shared credential args.
pub fn platform_api(args: &CredentialArgs) -> Result<HttpPlatformApi> {
    let credentials = Credentials::resolve(
        args.api_key.clone(),
        args.partner_key.clone(),
        args.deployment_key.clone(),
    )
    .map_err(|e| anyhow!("{}\n{}", e, suggestions::NO_CREDENTIALS))?;
    Ok(HttpPlatformApi::new(&args.deployment_url, credentials)?)
}
