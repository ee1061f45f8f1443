//! Core shared types and utilities for roster
//!
//! This crate contains the service descriptor model and the key/value codec
//! shared by the registry and anything else that reads roster keys directly.

pub mod codec;
pub mod descriptor;
pub mod keys;

pub use codec::{decode, decode_all, encode, DecodeError};
pub use descriptor::{DescriptorInput, ServiceDescriptor, DEFAULT_PROTOCOL};
pub use keys::{fingerprint, normalize_name, KeySpace, DEFAULT_NAMESPACE};
