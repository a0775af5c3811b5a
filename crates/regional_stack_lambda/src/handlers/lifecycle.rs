use regional_stack_core::contract::{
    disabled_physical_id, CustomResourceRequest, CustomResourceResponse, RequestType,
    ResourceProperties, ResponseStatus, STACK_NOT_FOUND_REASON,
};
use regional_stack_core::logging::{log_error, log_info, log_warn};
use serde::Serialize;
use serde_json::json;

use crate::adapters::invoke::SelfInvoker;
use crate::adapters::response::ResponseChannel;
use crate::adapters::stacks::{StackRequest, StackService, StackSnapshot, UpdateOutcome};
use crate::error::HandlerError;
use crate::handlers::config::{ExecutionBudget, HandlerConfig};
use crate::handlers::respond::send_response;
use crate::handlers::wait::await_terminal_state;

pub struct HandlerDependencies<'a> {
    pub stacks: &'a dyn StackService,
    pub responses: &'a dyn ResponseChannel,
    pub invoker: &'a dyn SelfInvoker,
    pub budget: &'a dyn ExecutionBudget,
}

/// What one invocation did. Returned to the runtime for its logs only; the
/// engine learns the result through the response channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandlerOutcome {
    Responded {
        status: ResponseStatus,
        physical_resource_id: String,
    },
    WaitScheduled {
        physical_resource_id: String,
    },
    Reinvoked {
        physical_resource_id: String,
    },
}

impl HandlerOutcome {
    pub fn responded(response: &CustomResourceResponse) -> Self {
        Self::Responded {
            status: response.status,
            physical_resource_id: response.physical_resource_id.clone(),
        }
    }
}

/// Runtime entry point. A configuration that failed to load is reported to
/// the engine as FAILED like any other handler error.
pub fn handle_configured_event(
    request: CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
    config: Result<HandlerConfig, HandlerError>,
) -> Result<HandlerOutcome, HandlerError> {
    match config {
        Ok(config) => handle_lifecycle_event(request, deps, &config),
        Err(error) => Err(report_failure(&request, deps, error)),
    }
}

/// Entry point for engine events and `WaitComplete` re-invocations. Every
/// error is reported to the engine as FAILED before it is returned.
pub fn handle_lifecycle_event(
    request: CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
    config: &HandlerConfig,
) -> Result<HandlerOutcome, HandlerError> {
    let mut request = request;
    log_info(
        "lifecycle_handler",
        "event_received",
        json!({
            "request_type": request.request_type,
            "logical_resource_id": request.logical_resource_id,
            "region": request.resource_properties.region,
            "physical_resource_id": request.physical_resource_id,
            "wait_complete": request.wait_complete,
        }),
    );

    let disabled = !request.resource_properties.is_region_enabled();
    if disabled && request.request_type != RequestType::Delete {
        return Ok(respond_disabled_region(&request, deps));
    }

    let result = if request.wait_complete {
        await_terminal_state(&request, deps, config)
    } else {
        reconcile_stack(&mut request, deps)
    };

    result.map_err(|error| report_failure(&request, deps, error))
}

fn report_failure(
    request: &CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
    error: HandlerError,
) -> HandlerError {
    log_error(
        "lifecycle_handler",
        "event_failed",
        json!({
            "request_type": request.request_type,
            "logical_resource_id": request.logical_resource_id,
            "error": error.to_string(),
        }),
    );
    let response = CustomResourceResponse::failed(
        request,
        request.physical_id_or_stack_name(),
        error.to_string(),
    );
    send_response(deps.responses, request, &response);
    error
}

/// Regions outside the enabled list get a placeholder resource on create and
/// update. A placeholder reported on update changes the physical id, so the
/// engine follows up with a delete for the stack that used to back it; deletes
/// therefore always go through.
fn respond_disabled_region(
    request: &CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
) -> HandlerOutcome {
    let properties = &request.resource_properties;
    let physical_resource_id = disabled_physical_id(&properties.region, &properties.stack_name);

    log_info(
        "lifecycle_handler",
        "region_disabled",
        json!({
            "region": properties.region,
            "enabled_regions": properties.enabled_regions,
            "physical_resource_id": physical_resource_id,
        }),
    );

    let response = CustomResourceResponse::success(request, physical_resource_id);
    send_response(deps.responses, request, &response);
    HandlerOutcome::responded(&response)
}

fn reconcile_stack(
    request: &mut CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
) -> Result<HandlerOutcome, HandlerError> {
    let region = request.resource_properties.region.clone();

    let stack_id = match request.request_type {
        RequestType::Create | RequestType::Update => {
            let stack_request = stack_request(&request.resource_properties);
            let existing = find_live_stack(deps.stacks, &region, &stack_request.stack_name)?;

            match existing {
                Some(snapshot) => {
                    if request.request_type == RequestType::Create {
                        log_warn(
                            "lifecycle_handler",
                            "create_converted_to_update",
                            json!({ "stack_id": snapshot.stack_id }),
                        );
                        request.request_type = RequestType::Update;
                    }

                    match deps
                        .stacks
                        .update_stack(&region, &snapshot.stack_id, &stack_request)
                        .map_err(HandlerError::Stack)?
                    {
                        UpdateOutcome::Started => snapshot.stack_id,
                        UpdateOutcome::NoChanges => {
                            log_info(
                                "lifecycle_handler",
                                "stack_unchanged",
                                json!({ "stack_id": snapshot.stack_id }),
                            );
                            let response = snapshot.outputs.iter().fold(
                                CustomResourceResponse::success(request, snapshot.stack_id.clone()),
                                |response, (key, value)| {
                                    response.with_data(key.clone(), value.clone())
                                },
                            );
                            send_response(deps.responses, request, &response);
                            return Ok(HandlerOutcome::responded(&response));
                        }
                    }
                }
                None => {
                    if request.request_type == RequestType::Update {
                        log_warn(
                            "lifecycle_handler",
                            "update_converted_to_create",
                            json!({ "stack_name": stack_request.stack_name }),
                        );
                        request.request_type = RequestType::Create;
                    }
                    deps.stacks
                        .create_stack(&region, &stack_request)
                        .map_err(HandlerError::Stack)?
                }
            }
        }
        RequestType::Delete => {
            let target = request.physical_id_or_stack_name().to_string();
            match find_live_stack(deps.stacks, &region, &target)? {
                Some(snapshot) => {
                    deps.stacks
                        .delete_stack(&region, &snapshot.stack_id)
                        .map_err(HandlerError::Stack)?;
                    snapshot.stack_id
                }
                None => {
                    log_warn(
                        "lifecycle_handler",
                        "stack_not_found_on_delete",
                        json!({ "stack": target }),
                    );
                    let response = CustomResourceResponse::success(request, target)
                        .with_reason(STACK_NOT_FOUND_REASON);
                    send_response(deps.responses, request, &response);
                    return Ok(HandlerOutcome::responded(&response));
                }
            }
        }
    };

    schedule_wait(request, stack_id, deps)
}

fn schedule_wait(
    request: &mut CustomResourceRequest,
    stack_id: String,
    deps: &HandlerDependencies<'_>,
) -> Result<HandlerOutcome, HandlerError> {
    request.physical_resource_id = Some(stack_id.clone());
    request.wait_complete = true;

    let payload = serde_json::to_vec(request)?;
    deps.invoker
        .invoke_self_async(&payload)
        .map_err(HandlerError::Invoke)?;

    log_info(
        "lifecycle_handler",
        "wait_scheduled",
        json!({
            "request_type": request.request_type,
            "stack_id": stack_id,
        }),
    );
    Ok(HandlerOutcome::WaitScheduled {
        physical_resource_id: stack_id,
    })
}

fn find_live_stack(
    stacks: &dyn StackService,
    region: &str,
    stack: &str,
) -> Result<Option<StackSnapshot>, HandlerError> {
    Ok(stacks
        .describe_stack(region, stack)
        .map_err(HandlerError::Stack)?
        .filter(StackSnapshot::is_live))
}

pub fn stack_request(properties: &ResourceProperties) -> StackRequest {
    StackRequest {
        stack_name: properties.stack_name.clone(),
        template_url: properties.template_url.clone(),
        parameters: properties.stack_parameters(),
        capabilities: properties.capability_list(),
        on_failure: properties.on_failure_action().to_string(),
    }
}
