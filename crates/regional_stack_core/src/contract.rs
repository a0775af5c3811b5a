use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CAPABILITIES: &str = "CAPABILITY_IAM";
pub const DEFAULT_ON_FAILURE: &str = "DELETE";
pub const STACK_PARAMETER_PREFIX: &str = "StackParam_";
pub const FORCE_UPDATE_PROPERTY: &str = "StackParam_Second";
pub const STACK_NOT_FOUND_REASON: &str =
    "CloudFormation stack has not been found, may be removed manually";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// Lifecycle event delivered by the deployment engine, plus the handler's
/// own `WaitComplete` marker for self re-invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_type: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    pub resource_properties: ResourceProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wait_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    pub stack_name: String,
    pub region: String,
    pub template_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_regions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResourceProperties {
    /// `None` when the property is absent, meaning every region is enabled.
    pub fn enabled_region_list(&self) -> Option<Vec<&str>> {
        self.enabled_regions.as_deref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .collect()
        })
    }

    pub fn is_region_enabled(&self) -> bool {
        self.enabled_region_list()
            .map(|enabled| enabled.contains(&self.region.as_str()))
            .unwrap_or(true)
    }

    pub fn capability_list(&self) -> Vec<String> {
        self.capabilities
            .as_deref()
            .unwrap_or(DEFAULT_CAPABILITIES)
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn on_failure_action(&self) -> &str {
        self.on_failure.as_deref().unwrap_or(DEFAULT_ON_FAILURE)
    }

    /// `StackParam_<Key>` properties with the prefix stripped.
    pub fn stack_parameters(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(STACK_PARAMETER_PREFIX)?;
                let rendered = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Some((name.to_string(), rendered))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl CustomResourceResponse {
    pub fn success(request: &CustomResourceRequest, physical_resource_id: impl Into<String>) -> Self {
        Self::new(request, ResponseStatus::Success, physical_resource_id.into(), None)
    }

    pub fn failed(
        request: &CustomResourceRequest,
        physical_resource_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            request,
            ResponseStatus::Failed,
            physical_resource_id.into(),
            Some(reason.into()),
        )
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    fn new(
        request: &CustomResourceRequest,
        status: ResponseStatus,
        physical_resource_id: String,
        reason: Option<String>,
    ) -> Self {
        Self {
            status,
            reason,
            physical_resource_id,
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data: BTreeMap::new(),
        }
    }
}

impl CustomResourceRequest {
    /// Physical id to report when the request has none yet (a failed
    /// create); the stack name is what a later delete will look up.
    pub fn physical_id_or_stack_name(&self) -> &str {
        self.physical_resource_id
            .as_deref()
            .unwrap_or(&self.resource_properties.stack_name)
    }
}

/// Physical id reported for regions outside the enabled list. Differs from
/// any stack id, so re-enabling a region replaces the resource.
pub fn disabled_physical_id(region: &str, stack_name: &str) -> String {
    let compact: String = region.chars().filter(|c| *c != '-').collect();
    format!("Disabled{compact}{stack_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackProgress {
    Succeeded,
    Failed,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalStates {
    pub success: &'static [&'static str],
    pub failure: &'static [&'static str],
}

const CREATE_STATES: TerminalStates = TerminalStates {
    success: &["CREATE_COMPLETE"],
    failure: &[
        "CREATE_FAILED",
        "DELETE_FAILED",
        "UPDATE_FAILED",
        "ROLLBACK_FAILED",
        "DELETE_COMPLETE",
        "ROLLBACK_COMPLETE",
    ],
};

const UPDATE_STATES: TerminalStates = TerminalStates {
    success: &["CREATE_COMPLETE", "UPDATE_COMPLETE"],
    failure: &[
        "CREATE_FAILED",
        "DELETE_FAILED",
        "UPDATE_FAILED",
        "ROLLBACK_COMPLETE",
        "UPDATE_ROLLBACK_COMPLETE",
    ],
};

const DELETE_STATES: TerminalStates = TerminalStates {
    success: &["DELETE_COMPLETE"],
    failure: &["DELETE_FAILED"],
};

impl TerminalStates {
    pub fn for_request(request_type: RequestType) -> Self {
        match request_type {
            RequestType::Create => CREATE_STATES,
            RequestType::Update => UPDATE_STATES,
            RequestType::Delete => DELETE_STATES,
        }
    }

    pub fn classify(&self, stack_status: &str) -> StackProgress {
        if self.success.contains(&stack_status) {
            StackProgress::Succeeded
        } else if self.failure.contains(&stack_status) {
            StackProgress::Failed
        } else {
            StackProgress::InProgress
        }
    }
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
