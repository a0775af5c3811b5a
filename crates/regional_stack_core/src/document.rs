use std::collections::BTreeSet;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::json;

use crate::compose::ChildParameters;
use crate::error::GenerationError;
use crate::intrinsic::Intrinsic;
use crate::naming::LogicalId;
use crate::update_token::ForceUpdateToken;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const HANDLER_LOGICAL_ID: &str = "BackingLambda";
pub const ROLE_LOGICAL_ID: &str = "BackingLambdaRole";
pub const CHILD_RESOURCE_TYPE: &str = "Custom::SingleBucket";
pub const DEFAULT_CODE_KEY: &str = "cloudformation/lambdas/regionalcfn.zip";
pub const DEFAULT_RUNTIME: &str = "provided.al2023";
pub const DEFAULT_ENTRY_POINT: &str = "bootstrap";
pub const DEFAULT_HANDLER_TIMEOUT_SECS: u32 = 300;
/// The handler hands a wait off to a fresh invocation once less than 10 s
/// remain; shorter timeouts would re-invoke without ever sleeping.
pub const MIN_HANDLER_TIMEOUT_SECS: u32 = 30;
pub const MAX_HANDLER_TIMEOUT_SECS: u32 = 900;
pub const DEFAULT_MANAGED_POLICY: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub code_key: String,
    pub runtime: String,
    pub entry_point: String,
    pub timeout_secs: u32,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            code_key: DEFAULT_CODE_KEY.to_string(),
            runtime: DEFAULT_RUNTIME.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            timeout_secs: DEFAULT_HANDLER_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSettings {
    pub managed_policy_arns: Vec<String>,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            managed_policy_arns: vec![DEFAULT_MANAGED_POLICY.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDeclaration {
    pub logical_id: LogicalId,
    pub managed_policy_arns: Vec<String>,
}

impl RoleDeclaration {
    pub fn new(settings: &RoleSettings) -> Result<Self, GenerationError> {
        Ok(Self {
            logical_id: LogicalId::new(ROLE_LOGICAL_ID)?,
            managed_policy_arns: settings.managed_policy_arns.clone(),
        })
    }

    pub fn arn(&self) -> Intrinsic {
        Intrinsic::get_att(self.logical_id.as_str(), "Arn")
    }
}

/// The single function every child's lifecycle events are routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDeclaration {
    pub logical_id: LogicalId,
    pub code_bucket: Intrinsic,
    pub code_key: String,
    pub runtime: String,
    pub entry_point: String,
    pub timeout_secs: u32,
    pub role: Intrinsic,
}

impl HandlerDeclaration {
    pub fn new(
        settings: &HandlerSettings,
        source_bucket_parameter: &str,
        role: &RoleDeclaration,
    ) -> Result<Self, GenerationError> {
        if !(MIN_HANDLER_TIMEOUT_SECS..=MAX_HANDLER_TIMEOUT_SECS).contains(&settings.timeout_secs) {
            return Err(GenerationError::InvalidSettings(format!(
                "handler timeout must be between {MIN_HANDLER_TIMEOUT_SECS} and {MAX_HANDLER_TIMEOUT_SECS} seconds, got {}",
                settings.timeout_secs
            )));
        }
        if settings.code_key.trim_matches('/').is_empty() {
            return Err(GenerationError::InvalidSettings(
                "handler code key cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            logical_id: LogicalId::new(HANDLER_LOGICAL_ID)?,
            code_bucket: Intrinsic::reference(source_bucket_parameter),
            code_key: settings.code_key.trim_matches('/').to_string(),
            runtime: settings.runtime.clone(),
            entry_point: settings.entry_point.clone(),
            timeout_secs: settings.timeout_secs,
            role: role.arn(),
        })
    }

    pub fn service_token(&self) -> Intrinsic {
        Intrinsic::get_att(self.logical_id.as_str(), "Arn")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDeclaration {
    pub logical_id: LogicalId,
    /// Logical id of the handler this child's events go to.
    pub handler: LogicalId,
    pub parameters: ChildParameters,
    pub token: ForceUpdateToken,
}

impl ChildDeclaration {
    pub fn new(
        handler: &HandlerDeclaration,
        parameters: ChildParameters,
        token: ForceUpdateToken,
    ) -> Self {
        Self {
            logical_id: parameters.stack_name.clone(),
            handler: handler.logical_id.clone(),
            parameters,
            token,
        }
    }
}

/// One generation run's output. Built only through [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDocument {
    description: String,
    source_bucket_parameter: String,
    source_bucket_default: Option<String>,
    role: RoleDeclaration,
    handler: HandlerDeclaration,
    children: Vec<ChildDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHeader {
    pub description: String,
    pub source_bucket_parameter: String,
    pub source_bucket_default: Option<String>,
}

/// Merges the handler, its role and every child into one document. Fails on
/// repeated logical ids and on children routed to any other handler.
pub fn assemble(
    header: DocumentHeader,
    role: RoleDeclaration,
    handler: HandlerDeclaration,
    children: Vec<ChildDeclaration>,
) -> Result<DeploymentDocument, GenerationError> {
    let mut taken = BTreeSet::new();
    taken.insert(role.logical_id.clone());
    if !taken.insert(handler.logical_id.clone()) {
        return Err(GenerationError::DuplicateIdentifier(
            handler.logical_id.to_string(),
        ));
    }

    for child in &children {
        if child.handler != handler.logical_id {
            return Err(GenerationError::ForeignHandler {
                child: child.logical_id.to_string(),
                referenced: child.handler.to_string(),
                expected: handler.logical_id.to_string(),
            });
        }
        if !taken.insert(child.logical_id.clone()) {
            return Err(GenerationError::DuplicateIdentifier(
                child.logical_id.to_string(),
            ));
        }
    }

    Ok(DeploymentDocument {
        description: header.description,
        source_bucket_parameter: header.source_bucket_parameter,
        source_bucket_default: header.source_bucket_default,
        role,
        handler,
        children,
    })
}

impl DeploymentDocument {
    pub fn handler(&self) -> &HandlerDeclaration {
        &self.handler
    }

    pub fn role(&self) -> &RoleDeclaration {
        &self.role
    }

    /// Children in resolver order.
    pub fn children(&self) -> &[ChildDeclaration] {
        &self.children
    }

    pub fn child(&self, logical_id: &str) -> Option<&ChildDeclaration> {
        self.children
            .iter()
            .find(|child| child.logical_id.as_str() == logical_id)
    }

    pub fn source_bucket_parameter(&self) -> &str {
        &self.source_bucket_parameter
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Serialize)]
struct Resource<'a, P: Serialize> {
    #[serde(rename = "Type")]
    resource_type: &'a str,
    #[serde(rename = "Properties")]
    properties: P,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties<'a> {
    assume_role_policy_document: serde_json::Value,
    managed_policy_arns: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties<'a> {
    code: FunctionCode<'a>,
    runtime: &'a str,
    handler: &'a str,
    timeout: u32,
    role: &'a Intrinsic,
}

#[derive(Serialize)]
struct FunctionCode<'a> {
    #[serde(rename = "S3Bucket")]
    bucket: &'a Intrinsic,
    #[serde(rename = "S3Key")]
    key: &'a str,
}

#[derive(Serialize)]
struct ChildProperties<'a> {
    #[serde(rename = "ServiceToken")]
    service_token: Intrinsic,
    #[serde(flatten)]
    parameters: &'a ChildParameters,
    #[serde(rename = "StackParam_Second")]
    token: ForceUpdateToken,
}

struct Resources<'a>(&'a DeploymentDocument);

impl Serialize for Resources<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let document = self.0;
        let mut map = serializer.serialize_map(Some(2 + document.children.len()))?;

        map.serialize_entry(
            document.role.logical_id.as_str(),
            &Resource {
                resource_type: "AWS::IAM::Role",
                properties: RoleProperties {
                    assume_role_policy_document: json!({
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": {"Service": ["lambda.amazonaws.com"]},
                            "Action": ["sts:AssumeRole"]
                        }]
                    }),
                    managed_policy_arns: &document.role.managed_policy_arns,
                },
            },
        )?;

        let handler = &document.handler;
        map.serialize_entry(
            handler.logical_id.as_str(),
            &Resource {
                resource_type: "AWS::Lambda::Function",
                properties: FunctionProperties {
                    code: FunctionCode {
                        bucket: &handler.code_bucket,
                        key: &handler.code_key,
                    },
                    runtime: &handler.runtime,
                    handler: &handler.entry_point,
                    timeout: handler.timeout_secs,
                    role: &handler.role,
                },
            },
        )?;

        let service_token = handler.service_token();
        for child in &document.children {
            map.serialize_entry(
                child.logical_id.as_str(),
                &Resource {
                    resource_type: CHILD_RESOURCE_TYPE,
                    properties: ChildProperties {
                        service_token: service_token.clone(),
                        parameters: &child.parameters,
                        token: child.token,
                    },
                },
            )?;
        }

        map.end()
    }
}

impl Serialize for DeploymentDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut parameter = serde_json::Map::new();
        parameter.insert("Type".to_string(), json!("String"));
        if let Some(default) = &self.source_bucket_default {
            parameter.insert("Default".to_string(), json!(default));
        }

        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("AWSTemplateFormatVersion", TEMPLATE_FORMAT_VERSION)?;
        map.serialize_entry("Description", &self.description)?;
        let mut parameters = serde_json::Map::new();
        parameters.insert(
            self.source_bucket_parameter.clone(),
            serde_json::Value::Object(parameter),
        );
        map.serialize_entry("Parameters", &parameters)?;
        map.serialize_entry("Resources", &Resources(self))?;
        map.end()
    }
}
