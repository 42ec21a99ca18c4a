//! Credential resolution.
//!
//! Two authentication modes exist: a per-user API key, or a partner key
//! paired with a deployment key for partner-managed deployments. Flags
//! win over environment variables (the env fallback is wired through
//! clap's `env` attribute on the CLI side).

use miette::Diagnostic;
use thiserror::Error;

/// No usable credential combination was supplied.
#[derive(Debug, Error, Diagnostic)]
#[error("no credentials provided")]
#[diagnostic(
    code(moor::auth::missing),
    help("Pass --api-key, or --partner-key together with --deployment-key; MOOR_API_KEY, MOOR_PARTNER_KEY and MOOR_DEPLOYMENT_KEY work as fallbacks")
)]
pub struct CredentialsError {
    pub detail: String,
}

/// Resolved authentication material for one run.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(String),
    Deployment {
        partner_key: String,
        deployment_key: String,
    },
}

impl Credentials {
    /// Resolve credentials from the CLI surface. An API key wins when
    /// both modes are supplied; partner and deployment keys are only
    /// valid as a pair.
    pub fn resolve(
        api_key: Option<String>,
        partner_key: Option<String>,
        deployment_key: Option<String>,
    ) -> Result<Self, CredentialsError> {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            return Ok(Credentials::ApiKey(key));
        }
        match (partner_key, deployment_key) {
            (Some(p), Some(d)) if !p.is_empty() && !d.is_empty() => Ok(Credentials::Deployment {
                partner_key: p,
                deployment_key: d,
            }),
            (Some(_), None) => Err(CredentialsError {
                detail: "partner key given without a deployment key".into(),
            }),
            (None, Some(_)) => Err(CredentialsError {
                detail: "deployment key given without a partner key".into(),
            }),
            _ => Err(CredentialsError {
                detail: "neither an API key nor a partner/deployment key pair".into(),
            }),
        }
    }

    /// The `Authorization` header value for this credential mode.
    pub fn authorization_header(&self) -> String {
        match self {
            Credentials::ApiKey(key) => format!("Bearer {}", key),
            Credentials::Deployment {
                partner_key,
                deployment_key,
            } => format!("Deployment {}:{}", partner_key, deployment_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_wins() {
        let creds = Credentials::resolve(
            Some("ak".into()),
            Some("pk".into()),
            Some("dk".into()),
        )
        .unwrap();
        assert!(matches!(creds, Credentials::ApiKey(ref k) if k == "ak"));
    }

    #[test]
    fn test_deployment_pair_required_together() {
        assert!(Credentials::resolve(None, Some("pk".into()), None).is_err());
        assert!(Credentials::resolve(None, None, Some("dk".into())).is_err());
        assert!(Credentials::resolve(None, Some("pk".into()), Some("dk".into())).is_ok());
    }

    #[test]
    fn test_nothing_resolves_to_error() {
        assert!(Credentials::resolve(None, None, None).is_err());
    }

    #[test]
    fn test_authorization_header_shapes() {
        let api = Credentials::ApiKey("ak".into());
        assert_eq!(api.authorization_header(), "Bearer ak");

        let dep = Credentials::Deployment {
            partner_key: "pk".into(),
            deployment_key: "dk".into(),
        };
        assert_eq!(dep.authorization_header(), "Deployment pk:dk");
    }
}
