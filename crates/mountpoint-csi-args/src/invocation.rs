//! Builds the mounter process's full argv/env, keeping secret material out
//! of argv.

use crate::options::MountOptions;

/// Fixed allow-list of environment variable names the mounter invocation
/// may set. Nothing outside this list is ever written into the child's
/// environment, so an auditor can confirm no secret leaks by grepping for
/// these names alone.
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// See [`ENV_ACCESS_KEY_ID`].
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// See [`ENV_ACCESS_KEY_ID`].
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
/// See [`ENV_ACCESS_KEY_ID`].
pub const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
/// See [`ENV_ACCESS_KEY_ID`].
pub const ENV_REGION: &str = "AWS_REGION";

/// The credential triple carried in the environment, never in argv.
#[derive(Clone)]
pub struct MounterCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Optional session token.
    pub session_token: Option<String>,
}

impl std::fmt::Debug for MounterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MounterCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The full invocation handed to the mounter-workload manager (component
/// F): argv and environment for the mounter binary.
#[derive(Debug, Clone)]
pub struct MounterInvocation {
    /// The mounter binary's argv, in order: bucket, target path, then the
    /// normalized mounter-binary flags.
    pub argv: Vec<String>,
    /// The mounter binary's environment, as `KEY=VALUE` pairs restricted
    /// to the allow-list above.
    pub env: Vec<(String, String)>,
}

/// Builds the argv/env for a single mount, given the already-built
/// [`MountOptions`], the resolved credentials, and the driver-wide
/// endpoint/region defaults.
#[must_use]
pub fn build_invocation(
    bucket: &str,
    target_path: &str,
    endpoint: &str,
    default_region: &str,
    options: &MountOptions,
    credentials: &MounterCredentials,
) -> MounterInvocation {
    let mut argv = vec![bucket.to_string(), target_path.to_string()];
    argv.extend(options.mounter_argv());

    let mut env = vec![
        (ENV_ACCESS_KEY_ID.to_string(), credentials.access_key_id.clone()),
        (
            ENV_SECRET_ACCESS_KEY.to_string(),
            credentials.secret_access_key.clone(),
        ),
        (ENV_ENDPOINT_URL.to_string(), endpoint.to_string()),
        (ENV_REGION.to_string(), default_region.to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        env.push((ENV_SESSION_TOKEN.to_string(), token.clone()));
    }

    MounterInvocation { argv, env }
}
