//! Provider descriptors
//!
//! Both supported services speak the same signing algorithm and error
//! format; they differ only in the values held here.

use http::Method;

use crate::error::{ErrorKind, ErrorRule, ErrorTranslator, RecodePolicy};

/// Values that distinguish one S3-compatible service from another
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    /// Scheme tag placed before the credentials in `Authorization`
    pub signature_id: String,
    /// Prefix of provider headers (`x-amz-`); also the custom-header pattern
    pub header_prefix: String,
    /// Prefix of user metadata headers (`x-amz-meta-`)
    pub metadata_prefix: String,
    pub default_auth_host: String,
    pub rules: Vec<ErrorRule>,
    pub policy: RecodePolicy,
}

impl Provider {
    /// Amazon S3
    pub fn aws() -> Self {
        Self {
            name: "aws".to_string(),
            signature_id: "AWS".to_string(),
            header_prefix: "x-amz-".to_string(),
            metadata_prefix: "x-amz-meta-".to_string(),
            default_auth_host: "s3.amazonaws.com".to_string(),
            rules: s3_rules("BucketAlreadyExists"),
            policy: RecodePolicy::default(),
        }
    }

    /// Google Cloud Storage interoperable API
    pub fn google() -> Self {
        Self {
            name: "google".to_string(),
            signature_id: "GOOG1".to_string(),
            header_prefix: "x-goog-".to_string(),
            metadata_prefix: "x-goog-meta-".to_string(),
            default_auth_host: "commondatastorage.googleapis.com".to_string(),
            rules: s3_rules("BucketNameUnavailable"),
            policy: RecodePolicy::default(),
        }
    }

    /// Look up a built-in provider by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aws" => Some(Self::aws()),
            "google" => Some(Self::google()),
            _ => None,
        }
    }

    pub fn with_policy(mut self, policy: RecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn translator(&self) -> ErrorTranslator {
        ErrorTranslator::new(self.rules.clone())
    }

    /// Whether a header belongs to the provider's signed custom headers
    pub fn is_custom_header(&self, name: &str) -> bool {
        name.as_bytes()
            .get(..self.header_prefix.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(self.header_prefix.as_bytes()))
    }
}

/// Shared S3 error table; only the "owned by another" code differs.
fn s3_rules(other_owner_code: &str) -> Vec<ErrorRule> {
    use ErrorKind::*;

    vec![
        ErrorRule::new("container_not_found", 404, "NoSuchBucket", "Container not found.", &[NotFound])
            .with_html("Not Found"),
        ErrorRule::new("container_not_empty", 409, "BucketNotEmpty", "Container not empty.", &[NotEmpty]),
        // Invalid container name on GET is both not found and invalid.
        ErrorRule::new("container_invalid_name", 400, "InvalidBucketName", "Invalid container name.", &[InvalidName])
            .with_override(Method::GET, &[NotFound, InvalidName]),
        ErrorRule::new("container_other_owner", 409, other_owner_code, "Container already owned by another.", &[NotOwner]),
        ErrorRule::new(
            "container_already_owned_by_you",
            409,
            "BucketAlreadyOwnedByYou",
            "Container already owned by you.",
            &[AlreadyOwnedByYou],
        ),
        ErrorRule::new("blob_not_found", 404, "NoSuchKey", "Blob not found.", &[NotFound])
            .with_html("Not Found"),
    ]
}
