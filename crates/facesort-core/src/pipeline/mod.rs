//! Image processing pipeline components.
//!
//! - **discovery**: find candidate photo files under a source directory
//! - **validate**: magic-byte sanity check before decode
//! - **decode**: load a source file and encode a vision-ready payload
//! - **metadata**: extract the best-available capture timestamp
//! - **hash**: content hash used as the analysis-cache key

pub(crate) mod decode;
pub(crate) mod discovery;
pub(crate) mod hash;
pub(crate) mod metadata;
pub(crate) mod validate;

pub use decode::{DecodedImage, EncodedPayload, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use hash::Hasher;
pub use metadata::MetadataExtractor;
pub use validate::Validator;
