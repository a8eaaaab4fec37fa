//! Memoization key derivation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Derives a cache key from a function name and its arguments.
///
/// The pair is serialized to JSON and hashed with SHA-256, giving a
/// 64-character lowercase hex string. Arguments must serialize
/// deterministically: prefer `BTreeMap` over `HashMap` in argument types.
pub fn derive_key<A>(name: &str, args: &A) -> Result<String>
where
    A: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(&(name, args))?;
    Ok(format!("{:x}", Sha256::digest(&payload)))
}
