//! Core data models: object references and attributes, list results,
//! image formats, variant descriptors, and the serialized info record.

pub mod format;
pub mod info;
pub mod object;
pub mod reference;
pub mod variant;
