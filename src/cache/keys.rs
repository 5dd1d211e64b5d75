//! src/cache/keys.rs
//!
//! Deterministic mapping from identifiers and variant descriptors to
//! object keys. All functions here are pure; identical logical inputs
//! always produce identical keys.
//!
//! Key layout:
//! - info records: `<prefix>info/<md5(identifier)>.json`
//! - variant bodies: `<prefix>image/<md5(identifier)>/<md5(token)><.ext>`

use crate::models::variant::{Identifier, VariantDescriptor};

const INFO_KEY_PREFIX: &str = "info/";
const IMAGE_KEY_PREFIX: &str = "image/";
const INFO_EXTENSION: &str = ".json";

/// The cache's key namespace under a normalized prefix.
#[derive(Clone, Debug)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
        }
    }

    /// The normalized prefix: empty, or ending in exactly one `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the serialized info record for an identifier.
    pub fn info_key(&self, identifier: &Identifier) -> String {
        format!(
            "{}{}{}{}",
            self.prefix,
            INFO_KEY_PREFIX,
            md5_hex(identifier.as_str()),
            INFO_EXTENSION
        )
    }

    /// Prefix under which every info record lives.
    pub fn info_prefix(&self) -> String {
        format!("{}{}", self.prefix, INFO_KEY_PREFIX)
    }

    /// Key of the variant body for a descriptor. The extension is omitted
    /// when the descriptor declares no output format.
    pub fn image_key(&self, descriptor: &VariantDescriptor) -> String {
        let extension = descriptor
            .output_format()
            .map(|format| format!(".{}", format.preferred_extension()))
            .unwrap_or_default();
        format!(
            "{}{}{}/{}{}",
            self.prefix,
            IMAGE_KEY_PREFIX,
            md5_hex(descriptor.identifier().as_str()),
            md5_hex(&descriptor.token()),
            extension
        )
    }

    /// Prefix under which every variant of one identifier lives.
    pub fn image_prefix(&self, identifier: &Identifier) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            IMAGE_KEY_PREFIX,
            md5_hex(identifier.as_str())
        )
    }
}

/// Normalizes a configured prefix to either empty or a value ending in
/// exactly one `/`.
fn normalize_prefix(raw: &str) -> String {
    let stripped = raw.trim_end_matches('/');
    if stripped.is_empty() {
        String::new()
    } else {
        format!("{}/", stripped)
    }
}

pub(crate) fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}
