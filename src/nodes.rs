/*!
 * Values exchanged with the pipeline host
 *
 * A [`ProfileHandle`] is what the profile node hands to downstream nodes and
 * the only value of this crate that is ever serialized into a graph. It names
 * a profile and carries the non-secret overrides; credentials are resolved
 * again, from scratch, each time a node connects.
 */

use crate::error::Result;
use crate::factory::ResolvedConnection;
use crate::profile::{
    CredentialProfile, NamedProfileStore, PartialProfile, ProfileResolver, ENV_PROFILE_SENTINEL,
};
use serde::{Deserialize, Serialize};

/// Secret-free reference to a profile plus per-node overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileHandle {
    /// Named profile, or `(env vars)`
    #[serde(default = "default_profile_name")]
    pub profile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

fn default_profile_name() -> String {
    ENV_PROFILE_SENTINEL.to_string()
}

impl Default for ProfileHandle {
    fn default() -> Self {
        Self::named(ENV_PROFILE_SENTINEL)
    }
}

impl ProfileHandle {
    pub fn named(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            bucket: None,
            path_prefix: None,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(path_prefix.into());
        self
    }

    /// The node layer of the merge
    pub fn overrides(&self) -> PartialProfile {
        PartialProfile {
            bucket: self.bucket.clone(),
            path_prefix: self.path_prefix.clone(),
            ..Default::default()
        }
    }

    pub fn resolve(&self, resolver: &ProfileResolver) -> Result<CredentialProfile> {
        resolver.resolve(Some(&self.profile), Some(&self.overrides()))
    }

    /// Resolve and wrap in a connection; the client is built on first use
    pub fn connect(&self, resolver: &ProfileResolver) -> Result<ResolvedConnection> {
        self.resolve(resolver).map(ResolvedConnection::new)
    }
}

/// Options for the profile picker: `(env vars)` followed by the named profiles
pub fn profile_choices(store: &NamedProfileStore) -> Vec<String> {
    std::iter::once(ENV_PROFILE_SENTINEL.to_string())
        .chain(store.names())
        .collect()
}

/// One-line, secret-free description of a resolved profile
pub fn describe(profile: &CredentialProfile) -> String {
    let mut text = format!(
        "{} bucket '{}' at {} (region {})",
        profile.provider,
        profile.bucket,
        profile.display_endpoint(),
        profile.region
    );
    if !profile.path_prefix.is_empty() {
        text.push_str(&format!(", prefix '{}'", profile.path_prefix));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::EnvLayer;
    use std::collections::BTreeMap;

    fn resolver() -> ProfileResolver {
        let env = EnvLayer::from_pairs([
            ("COMFY_S3_ACCESS_KEY", "AKIDSECRETVALUE"),
            ("COMFY_S3_SECRET_KEY", "wJalrSECRETVALUE"),
            ("COMFY_S3_BUCKET", "env-bucket"),
        ]);
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "wasabi".to_string(),
            PartialProfile {
                provider: Some("Wasabi".to_string()),
                path_prefix: Some("shared/".to_string()),
                ..Default::default()
            },
        );
        ProfileResolver::new(env, NamedProfileStore::from_profiles(profiles))
    }

    #[test]
    fn test_default_handle_uses_env() {
        let handle = ProfileHandle::default();
        assert_eq!(handle.profile, "(env vars)");
        let profile = handle.resolve(&resolver()).unwrap();
        assert_eq!(profile.bucket, "env-bucket");
        assert_eq!(profile.profile_name, None);
    }

    #[test]
    fn test_handle_overrides() {
        let handle = ProfileHandle::named("wasabi")
            .with_bucket("renders")
            .with_path_prefix("run7/");
        let profile = handle.resolve(&resolver()).unwrap();
        assert_eq!(profile.provider, "Wasabi");
        assert_eq!(profile.bucket, "renders");
        assert_eq!(profile.path_prefix, "run7/");
        assert_eq!(
            profile.display_endpoint(),
            "https://s3.us-east-1.wasabisys.com"
        );
    }

    #[test]
    fn test_handle_json_carries_no_secrets() {
        let handle = ProfileHandle::named("wasabi").with_bucket("renders");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"profile":"wasabi","bucket":"renders"}"#);

        let connection = handle.connect(&resolver()).unwrap();
        assert!(!connection.is_connected());
        let description = describe(connection.profile());
        assert!(!description.contains("SECRETVALUE"));
        assert!(description.contains("prefix 'shared/'"));
    }

    #[test]
    fn test_handle_from_json_defaults() {
        let handle: ProfileHandle = serde_json::from_str("{}").unwrap();
        assert_eq!(handle, ProfileHandle::default());
    }

    #[test]
    fn test_profile_choices() {
        let resolver = resolver();
        assert_eq!(
            profile_choices(resolver.store()),
            vec!["(env vars)".to_string(), "wasabi".to_string()]
        );
    }
}
