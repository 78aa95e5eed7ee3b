/*!
 * Credential profile resolution
 *
 * A profile is merged from three layers, later layers winning field by field:
 *
 * 1. Environment variables (`COMFY_S3_*`)
 * 2. A named profile from the profile file
 * 3. Per-node overrides, limited to `bucket` and `path_prefix`
 *
 * Empty strings count as unset at every layer. The merged result is checked
 * against the provider registry before it is handed to the client factory.
 */

mod store;

pub use store::{default_profiles_path, NamedProfileStore, PROFILE_DIR, PROFILE_FILE};

use crate::error::{CloudError, Result};
use crate::provider::{self, ProviderPreset, CUSTOM_PROVIDER, DEFAULT_PROVIDER};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Prefix shared by every credential environment variable
pub const ENV_PREFIX: &str = "COMFY_S3_";

/// Profile name meaning "environment variables only"
pub const ENV_PROFILE_SENTINEL: &str = "(env vars)";

/// A profile layer in which any field may be unset
///
/// This is the shape of one record in the profile file and of the
/// environment layer.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PartialProfile {
    pub provider: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub account_id: Option<String>,
    pub path_prefix: Option<String>,
}

impl std::fmt::Debug for PartialProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PartialProfile")
            .field("provider", &self.provider)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("account_id", &self.account_id)
            .field("path_prefix", &self.path_prefix)
            .finish()
    }
}

fn pick(lower: Option<String>, upper: Option<String>) -> Option<String> {
    match upper {
        Some(value) if !value.is_empty() => Some(value),
        _ => lower.filter(|value| !value.is_empty()),
    }
}

impl PartialProfile {
    /// Overlay `upper` on top of `self`, field by field
    pub fn overlay(self, upper: PartialProfile) -> PartialProfile {
        PartialProfile {
            provider: pick(self.provider, upper.provider),
            access_key: pick(self.access_key, upper.access_key),
            secret_key: pick(self.secret_key, upper.secret_key),
            bucket: pick(self.bucket, upper.bucket),
            region: pick(self.region, upper.region),
            endpoint_url: pick(self.endpoint_url, upper.endpoint_url),
            account_id: pick(self.account_id, upper.account_id),
            path_prefix: pick(self.path_prefix, upper.path_prefix),
        }
    }

    /// Names of the fields that hold a non-empty value
    fn set_fields(&self) -> Vec<&'static str> {
        [
            ("provider", &self.provider),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("endpoint_url", &self.endpoint_url),
            ("account_id", &self.account_id),
            ("path_prefix", &self.path_prefix),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_some_and(|v| !v.is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Restrict a per-node layer to the fields a node may override
///
/// Everything except `bucket` and `path_prefix` is dropped here, so a node
/// can never inject credentials, endpoints or providers.
pub fn node_layer(overrides: &PartialProfile) -> PartialProfile {
    let dropped: Vec<&str> = overrides
        .set_fields()
        .into_iter()
        .filter(|name| !matches!(*name, "bucket" | "path_prefix"))
        .collect();
    if !dropped.is_empty() {
        debug!("Ignoring node overrides for fields: {}", dropped.join(", "));
    }

    PartialProfile {
        bucket: overrides.bucket.clone(),
        path_prefix: overrides.path_prefix.clone(),
        ..Default::default()
    }
}

/// Environment layer of the merge
#[derive(Debug, Clone, Default)]
pub struct EnvLayer(PartialProfile);

impl EnvLayer {
    /// Read the `COMFY_S3_*` variables from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the layer from explicit `(variable, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix)).filter(|value| !value.is_empty())
        };
        EnvLayer(PartialProfile {
            provider: var("PROVIDER"),
            access_key: var("ACCESS_KEY"),
            secret_key: var("SECRET_KEY"),
            bucket: var("BUCKET"),
            region: var("REGION"),
            endpoint_url: var("ENDPOINT_URL"),
            account_id: var("ACCOUNT_ID"),
            path_prefix: var("PATH_PREFIX"),
        })
    }

    pub fn layer(&self) -> &PartialProfile {
        &self.0
    }
}

/// Read the environment layer from the process environment
pub fn environment_layer() -> EnvLayer {
    EnvLayer::from_env()
}

/// A fully resolved and validated profile
///
/// Never serialized; secrets are redacted from `Debug` output.
#[derive(Debug)]
pub struct CredentialProfile {
    pub provider: String,
    pub access_key: SecretString,
    pub secret_key: SecretString,
    pub bucket: String,
    pub region: String,

    /// Effective endpoint: the explicit override or the rendered preset
    /// template. `None` leaves endpoint resolution to the SDK (AWS).
    pub endpoint_url: Option<String>,

    pub account_id: Option<String>,

    /// Prepended verbatim to every object key; may be empty
    pub path_prefix: String,

    /// Named profile this was resolved from, if any
    pub profile_name: Option<String>,
}

impl CredentialProfile {
    /// Endpoint for display, including the implicit AWS endpoint
    pub fn display_endpoint(&self) -> String {
        match &self.endpoint_url {
            Some(endpoint) => endpoint.clone(),
            None => provider::aws_display_endpoint(&self.region),
        }
    }

    /// Prefix `key` with the profile's path prefix
    pub fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.path_prefix, key)
    }

    /// Registry entry for this profile's provider
    pub fn preset(&self) -> Result<&'static ProviderPreset> {
        provider::lookup(&self.provider)
            .ok_or_else(|| CloudError::UnknownProvider(self.provider.clone()))
    }
}

/// Merges the environment, named-profile and node layers
#[derive(Debug)]
pub struct ProfileResolver {
    env: EnvLayer,
    store: NamedProfileStore,
}

impl ProfileResolver {
    pub fn new(env: EnvLayer, store: NamedProfileStore) -> Self {
        Self { env, store }
    }

    /// Resolver over the process environment and the default profile file
    pub fn from_environment() -> Self {
        Self::new(environment_layer(), NamedProfileStore::open_default())
    }

    pub fn store(&self) -> &NamedProfileStore {
        &self.store
    }

    /// Resolve a complete profile
    ///
    /// `profile_name` of `None`, `""` or `"(env vars)"` skips the named
    /// layer. A name missing from the store is logged and skipped.
    pub fn resolve(
        &self,
        profile_name: Option<&str>,
        node_overrides: Option<&PartialProfile>,
    ) -> Result<CredentialProfile> {
        let profile_name = profile_name.filter(|n| !n.is_empty() && *n != ENV_PROFILE_SENTINEL);

        let mut merged = self.env.layer().clone();

        if let Some(name) = profile_name {
            match self.store.get(name) {
                Some(named) => merged = merged.overlay(named.clone()),
                None => warn!("Cloud storage profile '{}' not found", name),
            }
        }

        if let Some(overrides) = node_overrides {
            merged = merged.overlay(node_layer(overrides));
        }

        self.validate(merged, profile_name)
    }

    fn validate(
        &self,
        merged: PartialProfile,
        profile_name: Option<&str>,
    ) -> Result<CredentialProfile> {
        let provider_name = merged
            .provider
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let preset = provider::lookup(&provider_name)
            .ok_or_else(|| CloudError::UnknownProvider(provider_name.clone()))?;

        let region = merged
            .region
            .unwrap_or_else(|| preset.default_region.to_string());

        let endpoint_url = match merged.endpoint_url {
            Some(endpoint) => Some(endpoint),
            None if preset.is_custom() => {
                return Err(CloudError::config(format!(
                    "Provider '{}' requires an endpoint URL. Set COMFY_S3_ENDPOINT_URL or \
                     endpoint_url in the profile.",
                    CUSTOM_PROVIDER
                )));
            }
            None if preset.requires_account_id && merged.account_id.is_none() => {
                return Err(CloudError::config(format!(
                    "Provider '{}' requires an account id. Set COMFY_S3_ACCOUNT_ID or \
                     account_id in the profile.",
                    preset.name
                )));
            }
            None => preset.render_endpoint(&region, merged.account_id.as_deref()),
        };

        let access_key = merged.access_key.ok_or_else(|| {
            CloudError::config(format!(
                "Cloud storage access key not configured. Set COMFY_S3_ACCESS_KEY env var, \
                 create a profile in {}, or connect a CloudStorageProfile node.",
                self.store.path().display()
            ))
        })?;
        let secret_key = merged.secret_key.ok_or_else(|| {
            CloudError::config(
                "Cloud storage secret key not configured. Set COMFY_S3_SECRET_KEY env var \
                 or configure a profile.",
            )
        })?;
        let bucket = merged.bucket.ok_or_else(|| {
            CloudError::config(
                "Cloud storage bucket not configured. Set COMFY_S3_BUCKET env var or \
                 configure a profile.",
            )
        })?;

        Ok(CredentialProfile {
            provider: provider_name,
            access_key: SecretString::from(access_key),
            secret_key: SecretString::from(secret_key),
            bucket,
            region,
            endpoint_url,
            account_id: merged.account_id,
            path_prefix: merged.path_prefix.unwrap_or_default(),
            profile_name: profile_name.map(str::to_string),
        })
    }
}
