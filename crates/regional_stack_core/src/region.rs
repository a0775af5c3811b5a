use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ResolutionError;
use crate::logging::log_warn;

/// A validated region token such as `us-east-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ResolutionError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolutionError::Malformed(
                "region identifiers cannot be empty".to_string(),
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ResolutionError::Malformed(format!(
                "region identifier '{trimmed}' may only contain lowercase letters, digits and '-'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// For compile-time constants already known to be valid.
    pub(crate) fn known(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RegionId {
    type Error = ResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RegionId> for String {
    fn from(value: RegionId) -> Self {
        value.0
    }
}

/// External directory that knows which regions currently exist.
pub trait RegionDirectory {
    fn list_regions(&self) -> Result<Vec<String>, ResolutionError>;
}

/// Directory backed by a fixed list, used for explicit region overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRegionDirectory {
    regions: Vec<String>,
}

impl StaticRegionDirectory {
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
        }
    }
}

impl RegionDirectory for StaticRegionDirectory {
    fn list_regions(&self) -> Result<Vec<String>, ResolutionError> {
        Ok(self.regions.clone())
    }
}

/// Queries the directory once and validates the answer. Duplicates collapse
/// onto their first occurrence so the result order stays stable.
pub fn resolve_regions(directory: &dyn RegionDirectory) -> Result<Vec<RegionId>, ResolutionError> {
    let listed = directory.list_regions()?;
    let mut seen = BTreeSet::new();
    let mut regions = Vec::with_capacity(listed.len());

    for raw in listed {
        let region = RegionId::parse(raw)?;
        if !seen.insert(region.clone()) {
            log_warn(
                "region_resolver",
                "duplicate_region_dropped",
                json!({ "region": region.as_str() }),
            );
            continue;
        }
        regions.push(region);
    }

    Ok(regions)
}

/// Parses a JSON array of region names, the shape returned by
/// `aws ec2 describe-regions --query 'Regions[].RegionName'`.
pub fn parse_region_listing(payload: &[u8]) -> Result<Vec<String>, ResolutionError> {
    serde_json::from_slice::<Vec<String>>(payload)
        .map_err(|error| ResolutionError::Malformed(format!("expected a JSON string array: {error}")))
}

/// Splits a comma separated list, ignoring blank entries.
pub fn parse_region_csv(raw: &str) -> Result<Vec<RegionId>, ResolutionError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(RegionId::parse)
        .collect()
}
