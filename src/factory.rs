/*!
 * Storage client factory
 *
 * Turns a resolved profile into a connected object store. Construction is
 * deferred to first use and never touches the network, so a misconfigured
 * profile is only reported when a node actually talks to storage.
 */

use crate::error::{CloudError, Result};
use crate::profile::CredentialProfile;
use crate::protocol::s3::{S3ClientConfig, S3Store};
use crate::protocol::ObjectStore;
use once_cell::sync::OnceCell;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Build an S3 client for `profile`
///
/// Addressing style comes from the provider preset. Fails with a
/// configuration error for unknown providers and malformed endpoints.
pub fn build_client(profile: &CredentialProfile) -> Result<S3Store> {
    let preset = profile.preset()?;

    let endpoint = match &profile.endpoint_url {
        Some(endpoint) => Some(endpoint.clone()),
        None if preset.is_custom() => {
            return Err(CloudError::config(
                "Provider 'Custom' requires an endpoint URL",
            ));
        }
        None if preset.requires_account_id && profile.account_id.is_none() => {
            return Err(CloudError::config(format!(
                "Provider '{}' requires an account id",
                preset.name
            )));
        }
        None => preset.render_endpoint(&profile.region, profile.account_id.as_deref()),
    };

    if let Some(endpoint) = &endpoint {
        validate_endpoint(endpoint)?;
    }

    let config = S3ClientConfig {
        bucket: profile.bucket.clone(),
        region: profile.region.clone(),
        endpoint,
        access_key: SecretString::from(profile.access_key.expose_secret()),
        secret_key: SecretString::from(profile.secret_key.expose_secret()),
        addressing: preset.addressing,
    };

    debug!(
        "Building S3 client for provider '{}' at {}",
        profile.provider,
        profile.display_endpoint()
    );

    S3Store::new(&config).map_err(|e| CloudError::config(format!("Invalid client settings: {}", e)))
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint)
        .map_err(|e| CloudError::config(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(CloudError::config(format!(
            "Invalid endpoint URL '{}': expected http(s)://host",
            endpoint
        ))),
    }
}

/// A resolved profile plus its lazily built client
///
/// Owned by a single node execution. The client is created on the first
/// call to [`ResolvedConnection::store`] and reused afterwards.
pub struct ResolvedConnection {
    profile: CredentialProfile,
    store: OnceCell<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("profile", &self.profile)
            .field("connected", &self.store.get().is_some())
            .finish()
    }
}

impl ResolvedConnection {
    pub fn new(profile: CredentialProfile) -> Self {
        Self {
            profile,
            store: OnceCell::new(),
        }
    }

    /// Connection over an already built store (tests, dry runs)
    pub fn with_store(profile: CredentialProfile, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            profile,
            store: OnceCell::with_value(store),
        }
    }

    pub fn profile(&self) -> &CredentialProfile {
        &self.profile
    }

    pub fn bucket(&self) -> &str {
        &self.profile.bucket
    }

    /// Remote key for `key` under the profile's path prefix
    pub fn full_key(&self, key: &str) -> String {
        self.profile.full_key(key)
    }

    /// True once the client has been built
    pub fn is_connected(&self) -> bool {
        self.store.get().is_some()
    }

    /// The object store, built on first call
    pub fn store(&self) -> Result<&dyn ObjectStore> {
        let store = self.store.get_or_try_init(|| {
            build_client(&self.profile).map(|s3| Arc::new(s3) as Arc<dyn ObjectStore>)
        })?;
        Ok(store.as_ref())
    }
}
