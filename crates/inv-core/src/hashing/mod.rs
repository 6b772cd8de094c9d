//! Hashing de contenido: JSON canónico + blake3.
//!
//! La identidad de un artifact es el hash de su payload canonicalizado, lo
//! que habilita deduplicación y trazabilidad estable entre backends.
pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};
