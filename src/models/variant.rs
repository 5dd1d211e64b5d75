//! Logical identifiers and variant descriptors.

use crate::models::format::Format;
use std::fmt;

/// Logical identifier of a source image, as presented by callers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Describes one derivative of a source image: the identifier, the ordered
/// operations applied to it, and the output format if one was requested.
///
/// Two descriptors with the same identifier, operations, and format are
/// the same variant; [`VariantDescriptor::token`] is the stable string
/// the cache keyspace hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantDescriptor {
    identifier: Identifier,
    operations: Vec<String>,
    output_format: Option<Format>,
}

impl VariantDescriptor {
    pub fn new(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            operations: Vec::new(),
            output_format: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operations.push(operation.into());
        self
    }

    pub fn with_output_format(mut self, format: Format) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    pub fn output_format(&self) -> Option<Format> {
        self.output_format
    }

    /// Deterministic string form: identical descriptors always yield the
    /// same token, and any change to identifier, operations, or format
    /// changes it.
    pub fn token(&self) -> String {
        let mut token = self.identifier.to_string();
        for operation in &self.operations {
            token.push('_');
            token.push_str(operation);
        }
        if let Some(format) = self.output_format {
            token.push('.');
            token.push_str(format.preferred_extension());
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_deterministic_and_order_sensitive() {
        let a = VariantDescriptor::new("cats")
            .with_operation("scale:50%")
            .with_operation("rotate:90")
            .with_output_format(Format::Jpeg);
        let b = VariantDescriptor::new("cats")
            .with_operation("scale:50%")
            .with_operation("rotate:90")
            .with_output_format(Format::Jpeg);
        let reordered = VariantDescriptor::new("cats")
            .with_operation("rotate:90")
            .with_operation("scale:50%")
            .with_output_format(Format::Jpeg);
        assert_eq!(a.token(), b.token());
        assert_ne!(a.token(), reordered.token());
    }
}
