use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::GenerationError;
use crate::region::RegionId;

pub const CHILD_LOGICAL_ID_PREFIX: &str = "RegionalBucket";

/// Resource name inside a deployment document. Only ASCII alphanumerics are
/// legal there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(raw: impl Into<String>) -> Result<Self, GenerationError> {
        let raw = raw.into();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GenerationError::InvalidSettings(format!(
                "logical id '{raw}' must be non-empty and alphanumeric"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `us-east-1` becomes `RegionalBucketuseast1`.
pub fn derive_logical_id(region: &RegionId) -> LogicalId {
    let suffix: String = region
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    LogicalId(format!("{CHILD_LOGICAL_ID_PREFIX}{suffix}"))
}

/// Derives every id up front and fails on the first collision instead of
/// letting a later region overwrite an earlier one.
pub fn derive_unique_ids(regions: &[RegionId]) -> Result<Vec<LogicalId>, GenerationError> {
    let mut owners: BTreeMap<LogicalId, &RegionId> = BTreeMap::new();
    let mut ids = Vec::with_capacity(regions.len());

    for region in regions {
        let logical_id = derive_logical_id(region);
        if let Some(first) = owners.get(&logical_id) {
            return Err(GenerationError::DerivationCollision {
                logical_id: logical_id.to_string(),
                first: first.to_string(),
                second: region.to_string(),
            });
        }
        owners.insert(logical_id.clone(), region);
        ids.push(logical_id);
    }

    Ok(ids)
}
