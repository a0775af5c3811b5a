use regional_stack_core::contract::{
    stable_contract_json, CustomResourceRequest, CustomResourceResponse,
};
use regional_stack_core::logging::{log_error, log_info};
use serde_json::json;

use crate::adapters::response::ResponseChannel;

/// Delivery failures are logged only; the engine's own timeout covers a
/// response that never arrives.
pub fn send_response(
    channel: &dyn ResponseChannel,
    request: &CustomResourceRequest,
    response: &CustomResourceResponse,
) {
    let body = stable_contract_json(response);
    log_info(
        "lifecycle_handler",
        "response_sending",
        json!({
            "request_type": request.request_type,
            "logical_resource_id": request.logical_resource_id.clone(),
            "status": response.status,
            "physical_resource_id": response.physical_resource_id.clone(),
            "reason": response.reason.clone(),
        }),
    );

    if let Err(error) = channel.put_response(&request.response_url, body.as_bytes()) {
        log_error(
            "lifecycle_handler",
            "response_delivery_failed",
            json!({
                "logical_resource_id": request.logical_resource_id.clone(),
                "error": error,
            }),
        );
    }
}
