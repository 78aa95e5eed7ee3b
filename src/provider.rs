/*!
 * Built-in S3-compatible provider presets
 *
 * Each preset knows how to form its endpoint, which region to fall back to
 * and whether requests must use path-style addressing. The table is static
 * and looked up by the display name shown in the host's provider picker.
 */

use crate::protocol::s3::AddressingStyle;

/// Provider used when none is configured
pub const DEFAULT_PROVIDER: &str = "AWS S3";

/// Identifier for a user-supplied endpoint
pub const CUSTOM_PROVIDER: &str = "Custom";

/// Static description of one S3-compatible provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    /// Display name, also the lookup key
    pub name: &'static str,

    /// Endpoint with `{region}` and `{account_id}` placeholders.
    /// `None` means the SDK resolves the endpoint itself (AWS) or, for
    /// `Custom`, that an explicit endpoint is mandatory.
    pub endpoint_template: Option<&'static str>,

    pub default_region: &'static str,

    pub addressing: AddressingStyle,

    /// The endpoint cannot be formed without an account id
    pub requires_account_id: bool,
}

impl ProviderPreset {
    /// Fill the endpoint template for `region` and `account_id`
    ///
    /// Returns `None` when the preset has no template.
    pub fn render_endpoint(&self, region: &str, account_id: Option<&str>) -> Option<String> {
        self.endpoint_template.map(|template| {
            template
                .replace("{region}", region)
                .replace("{account_id}", account_id.unwrap_or_default())
        })
    }

    /// True for the preset that only works with an explicit endpoint
    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_PROVIDER
    }
}

static PROVIDERS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "AWS S3",
        endpoint_template: None,
        default_region: "us-east-1",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
    ProviderPreset {
        name: "Backblaze B2",
        endpoint_template: Some("https://s3.{region}.backblazeb2.com"),
        default_region: "us-west-004",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
    ProviderPreset {
        name: "Cloudflare R2",
        endpoint_template: Some("https://{account_id}.r2.cloudflarestorage.com"),
        default_region: "auto",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: true,
    },
    ProviderPreset {
        name: "MinIO",
        endpoint_template: Some("http://localhost:9000"),
        default_region: "us-east-1",
        addressing: AddressingStyle::Path,
        requires_account_id: false,
    },
    ProviderPreset {
        name: "Wasabi",
        endpoint_template: Some("https://s3.{region}.wasabisys.com"),
        default_region: "us-east-1",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
    ProviderPreset {
        name: "DigitalOcean Spaces",
        endpoint_template: Some("https://{region}.digitaloceanspaces.com"),
        default_region: "nyc3",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
    ProviderPreset {
        name: "GCS (S3 interop)",
        endpoint_template: Some("https://storage.googleapis.com"),
        default_region: "auto",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
    ProviderPreset {
        name: CUSTOM_PROVIDER,
        endpoint_template: None,
        default_region: "us-east-1",
        addressing: AddressingStyle::VirtualHost,
        requires_account_id: false,
    },
];

/// Find a preset by its exact identifier
pub fn lookup(name: &str) -> Option<&'static ProviderPreset> {
    PROVIDERS.iter().find(|p| p.name == name)
}

/// All preset identifiers in display order
pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

/// All presets in display order
pub fn presets() -> &'static [ProviderPreset] {
    PROVIDERS
}

/// Endpoint shown to users when the SDK resolves it natively
pub fn aws_display_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_in_display_order() {
        let names = provider_names();
        assert_eq!(names.first(), Some(&DEFAULT_PROVIDER));
        assert_eq!(names.last(), Some(&CUSTOM_PROVIDER));
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_lookup_is_exact() {
        assert!(lookup("MinIO").is_some());
        assert!(lookup("minio").is_none());
        assert!(lookup("Azure").is_none());
    }

    #[test]
    fn test_render_region_template() {
        let b2 = lookup("Backblaze B2").unwrap();
        assert_eq!(
            b2.render_endpoint("us-west-002", None).as_deref(),
            Some("https://s3.us-west-002.backblazeb2.com")
        );

        let spaces = lookup("DigitalOcean Spaces").unwrap();
        assert_eq!(
            spaces.render_endpoint(spaces.default_region, None).as_deref(),
            Some("https://nyc3.digitaloceanspaces.com")
        );
    }

    #[test]
    fn test_render_account_template() {
        let r2 = lookup("Cloudflare R2").unwrap();
        assert!(r2.requires_account_id);
        assert_eq!(
            r2.render_endpoint("auto", Some("acct1")).as_deref(),
            Some("https://acct1.r2.cloudflarestorage.com")
        );
    }

    #[test]
    fn test_native_and_custom_have_no_template() {
        assert_eq!(lookup("AWS S3").unwrap().render_endpoint("us-east-1", None), None);
        let custom = lookup(CUSTOM_PROVIDER).unwrap();
        assert!(custom.is_custom());
        assert_eq!(custom.render_endpoint("us-east-1", None), None);
    }

    #[test]
    fn test_minio_uses_path_style() {
        for preset in presets() {
            let expected = if preset.name == "MinIO" {
                AddressingStyle::Path
            } else {
                AddressingStyle::VirtualHost
            };
            assert_eq!(preset.addressing, expected, "{}", preset.name);
        }
    }

    #[test]
    fn test_aws_display_endpoint() {
        assert_eq!(
            aws_display_endpoint("eu-west-1"),
            "https://s3.eu-west-1.amazonaws.com"
        );
    }
}
