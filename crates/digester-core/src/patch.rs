//! JSON Patch synthesis

use json_patch::{Patch, PatchOperation};
use serde_json::Value as JsonValue;

use crate::error::{DigesterError, Result};

/// Compute the RFC 6902 operations that turn `before` into `after`
///
/// Both snapshots must be JSON documents. Identical snapshots produce an
/// empty list.
pub fn create_patch(before: &[u8], after: &[u8]) -> Result<Vec<PatchOperation>> {
    let before: JsonValue = serde_json::from_slice(before)
        .map_err(|e| DigesterError::Serialization(format!("before snapshot: {}", e)))?;
    let after: JsonValue = serde_json::from_slice(after)
        .map_err(|e| DigesterError::Serialization(format!("after snapshot: {}", e)))?;
    Ok(diff(&before, &after))
}

/// Structural diff of two JSON values
pub fn diff(before: &JsonValue, after: &JsonValue) -> Vec<PatchOperation> {
    let Patch(operations) = json_patch::diff(before, after);
    operations
}
