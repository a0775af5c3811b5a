use serde_json::json;

use crate::compose::{
    compose_child_parameters, parameters_fingerprint, AccountContext, FanOutConfig,
};
use crate::document::{
    assemble, ChildDeclaration, DeploymentDocument, DocumentHeader, HandlerDeclaration,
    HandlerSettings, RoleDeclaration, RoleSettings,
};
use crate::error::GenerationError;
use crate::logging::{log_error, log_info};
use crate::naming::derive_unique_ids;
use crate::region::{resolve_regions, RegionDirectory};
use crate::update_token::{ForceUpdateToken, UpdateClock};

pub const DEFAULT_DESCRIPTION: &str =
    "Provisions one regional stack per region through a custom resource handler";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub description: String,
    pub source_bucket_default: Option<String>,
    pub fan_out: FanOutConfig,
    pub account: AccountContext,
    pub handler: HandlerSettings,
    pub role: RoleSettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            source_bucket_default: None,
            fan_out: FanOutConfig::default(),
            account: AccountContext::default(),
            handler: HandlerSettings::default(),
            role: RoleSettings::default(),
        }
    }
}

/// Runs one generation: resolve, derive, compose, stamp, assemble. Any error
/// aborts the run before a document exists.
pub fn generate_document(
    directory: &dyn RegionDirectory,
    settings: &GenerationSettings,
    clock: &dyn UpdateClock,
) -> Result<DeploymentDocument, GenerationError> {
    match build_document(directory, settings, clock) {
        Ok(document) => {
            log_info(
                "generator",
                "document_generated",
                json!({
                    "children": document.children().len(),
                    "force_update_token": document
                        .children()
                        .first()
                        .map(|child| child.token.value()),
                }),
            );
            Ok(document)
        }
        Err(error) => {
            log_error(
                "generator",
                "generation_failed",
                json!({ "error": error.to_string() }),
            );
            Err(error)
        }
    }
}

fn build_document(
    directory: &dyn RegionDirectory,
    settings: &GenerationSettings,
    clock: &dyn UpdateClock,
) -> Result<DeploymentDocument, GenerationError> {
    settings.fan_out.validate()?;

    let regions = resolve_regions(directory)?;
    log_info(
        "generator",
        "regions_resolved",
        json!({
            "count": regions.len(),
            "regions": regions.iter().map(|region| region.as_str()).collect::<Vec<_>>(),
        }),
    );

    derive_unique_ids(&regions)?;

    let token = ForceUpdateToken::issue(clock);
    let role = RoleDeclaration::new(&settings.role)?;
    let handler = HandlerDeclaration::new(
        &settings.handler,
        &settings.fan_out.source_bucket_parameter,
        &role,
    )?;

    let children = regions
        .iter()
        .map(|region| {
            let parameters = compose_child_parameters(region, &settings.account, &settings.fan_out);
            log_info(
                "generator",
                "child_composed",
                json!({
                    "logical_id": parameters.stack_name.as_str(),
                    "region": region.as_str(),
                    "parameters_fingerprint": parameters_fingerprint(&parameters),
                }),
            );
            ChildDeclaration::new(&handler, parameters, token)
        })
        .collect();

    assemble(
        DocumentHeader {
            description: settings.description.clone(),
            source_bucket_parameter: settings.fan_out.source_bucket_parameter.clone(),
            source_bucket_default: settings.source_bucket_default.clone(),
        },
        role,
        handler,
        children,
    )
}
