use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract::stable_contract_json;
use crate::error::GenerationError;
use crate::intrinsic::{Intrinsic, ACCOUNT_ID_PSEUDO_PARAMETER, REGION_PSEUDO_PARAMETER};
use crate::naming::{derive_logical_id, LogicalId};
use crate::region::RegionId;

pub const DEFAULT_SOURCE_BUCKET_PARAMETER: &str = "SourceBucket";
pub const DEFAULT_TEMPLATE_KEY: &str = "cloudformation/regional_test_stack.json";
pub const DEFAULT_ENABLED_REGIONS: [&str; 4] =
    ["us-east-1", "ap-southeast-2", "eu-central-1", "ca-central-1"];
pub const BUCKET_NAME_SUFFIX: &str = ".regionalcf.test";

/// Which region goes into the per-child bucket name.
///
/// `DeploymentRegion` resolves to the region the parent stack is deployed
/// in, so every child carries the same value. `TargetRegion` uses each
/// child's own region instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScope {
    #[default]
    DeploymentRegion,
    TargetRegion,
}

/// Account values the engine resolves at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: Intrinsic,
    pub deployment_region: Intrinsic,
}

impl Default for AccountContext {
    fn default() -> Self {
        Self {
            account_id: Intrinsic::reference(ACCOUNT_ID_PSEUDO_PARAMETER),
            deployment_region: Intrinsic::reference(REGION_PSEUDO_PARAMETER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutConfig {
    pub source_bucket_parameter: String,
    pub template_key: String,
    pub enabled_regions: Vec<RegionId>,
    pub naming_scope: NamingScope,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            source_bucket_parameter: DEFAULT_SOURCE_BUCKET_PARAMETER.to_string(),
            template_key: DEFAULT_TEMPLATE_KEY.to_string(),
            enabled_regions: DEFAULT_ENABLED_REGIONS
                .iter()
                .map(|raw| RegionId::known(raw))
                .collect(),
            naming_scope: NamingScope::default(),
        }
    }
}

impl FanOutConfig {
    pub fn validate(&self) -> Result<(), GenerationError> {
        LogicalId::new(self.source_bucket_parameter.clone())?;
        let key = self.template_key.trim_matches('/');
        if key.is_empty() {
            return Err(GenerationError::InvalidSettings(
                "template key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Comma-joined in configured order.
    pub fn enabled_regions_value(&self) -> String {
        self.enabled_regions
            .iter()
            .map(RegionId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn template_url(&self) -> Intrinsic {
        Intrinsic::concat(vec![
            Intrinsic::literal("https://"),
            Intrinsic::reference(self.source_bucket_parameter.clone()),
            Intrinsic::literal(format!(
                ".s3.amazonaws.com/{}",
                self.template_key.trim_matches('/')
            )),
        ])
    }
}

/// Everything the handler needs for one region, minus the service token and
/// the forced-update token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildParameters {
    #[serde(rename = "StackName")]
    pub stack_name: LogicalId,
    #[serde(rename = "Region")]
    pub region: RegionId,
    #[serde(rename = "TemplateUrl")]
    pub template_url: Intrinsic,
    #[serde(rename = "EnabledRegions")]
    pub enabled_regions: String,
    #[serde(rename = "StackParam_BucketName")]
    pub bucket_name: Intrinsic,
}

pub fn compose_child_parameters(
    region: &RegionId,
    account: &AccountContext,
    config: &FanOutConfig,
) -> ChildParameters {
    let naming_region = match config.naming_scope {
        NamingScope::DeploymentRegion => account.deployment_region.clone(),
        NamingScope::TargetRegion => Intrinsic::literal(region.as_str()),
    };

    ChildParameters {
        stack_name: derive_logical_id(region),
        region: region.clone(),
        template_url: config.template_url(),
        enabled_regions: config.enabled_regions_value(),
        bucket_name: Intrinsic::concat(vec![
            account.account_id.clone(),
            Intrinsic::literal("."),
            naming_region,
            Intrinsic::literal(BUCKET_NAME_SUFFIX),
        ]),
    }
}

/// Stable hash of a child's declared parameters. Two runs with equal
/// fingerprints differ only by their forced-update token.
pub fn parameters_fingerprint(parameters: &ChildParameters) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(parameters));
    format!("{:x}", hasher.finalize())
}
