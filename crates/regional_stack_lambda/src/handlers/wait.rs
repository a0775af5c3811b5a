use regional_stack_core::contract::{
    CustomResourceRequest, CustomResourceResponse, RequestType, StackProgress, TerminalStates,
};
use regional_stack_core::logging::{log_info, log_warn};
use serde_json::json;

use crate::adapters::stacks::{StackEvent, StackService};
use crate::error::HandlerError;
use crate::handlers::config::HandlerConfig;
use crate::handlers::lifecycle::{HandlerDependencies, HandlerOutcome};
use crate::handlers::respond::send_response;

const MAX_FAILURE_REASONS: usize = 3;

/// Polls the stack named by the request's physical id until it reaches a
/// terminal state for the request type, then responds. Hands off to a fresh
/// invocation when the remaining budget drops below the configured minimum.
pub fn await_terminal_state(
    request: &CustomResourceRequest,
    deps: &HandlerDependencies<'_>,
    config: &HandlerConfig,
) -> Result<HandlerOutcome, HandlerError> {
    let stack_id = request.physical_resource_id.as_deref().ok_or_else(|| {
        HandlerError::InvalidRequest("WaitComplete requires a PhysicalResourceId".to_string())
    })?;
    let region = request.resource_properties.region.as_str();
    let states = TerminalStates::for_request(request.request_type);

    log_info(
        "lifecycle_handler",
        "wait_started",
        json!({
            "request_type": request.request_type,
            "region": region,
            "stack_id": stack_id,
        }),
    );

    loop {
        let snapshot = match deps
            .stacks
            .describe_stack(region, stack_id)
            .map_err(HandlerError::Stack)?
        {
            Some(snapshot) => snapshot,
            None if request.request_type == RequestType::Delete => {
                let response = CustomResourceResponse::success(request, stack_id);
                send_response(deps.responses, request, &response);
                return Ok(HandlerOutcome::responded(&response));
            }
            None => {
                return Err(HandlerError::Stack(format!(
                    "stack {stack_id} disappeared while waiting"
                )));
            }
        };

        match states.classify(&snapshot.status) {
            StackProgress::Succeeded => {
                let response = snapshot.outputs.iter().fold(
                    CustomResourceResponse::success(request, stack_id),
                    |response, (key, value)| response.with_data(key.clone(), value.clone()),
                );
                log_info(
                    "lifecycle_handler",
                    "stack_succeeded",
                    json!({ "stack_id": stack_id, "status": snapshot.status }),
                );
                send_response(deps.responses, request, &response);
                return Ok(HandlerOutcome::responded(&response));
            }
            StackProgress::Failed => {
                let reason = failure_reason(deps.stacks, region, stack_id, &snapshot.status);
                log_warn(
                    "lifecycle_handler",
                    "stack_failed",
                    json!({
                        "stack_id": stack_id,
                        "status": snapshot.status,
                        "reason": reason,
                    }),
                );
                let response = CustomResourceResponse::failed(request, stack_id, reason);
                send_response(deps.responses, request, &response);
                return Ok(HandlerOutcome::responded(&response));
            }
            StackProgress::InProgress => {
                let remaining = deps.budget.remaining();
                if remaining < config.min_remaining {
                    log_info(
                        "lifecycle_handler",
                        "wait_handed_off",
                        json!({
                            "stack_id": stack_id,
                            "status": snapshot.status,
                            "remaining_ms": remaining.as_millis() as u64,
                        }),
                    );
                    let payload = serde_json::to_vec(request)?;
                    deps.invoker
                        .invoke_self_async(&payload)
                        .map_err(HandlerError::Invoke)?;
                    return Ok(HandlerOutcome::Reinvoked {
                        physical_resource_id: stack_id.to_string(),
                    });
                }

                log_info(
                    "lifecycle_handler",
                    "stack_in_progress",
                    json!({
                        "stack_id": stack_id,
                        "status": snapshot.status,
                        "remaining_ms": remaining.as_millis() as u64,
                    }),
                );
                tokio::task::block_in_place(|| std::thread::sleep(config.poll_interval));
            }
        }
    }
}

/// Reasons from the first few failed events, most recent first.
pub fn failure_reason(
    stacks: &dyn StackService,
    region: &str,
    stack_id: &str,
    status: &str,
) -> String {
    match stacks.stack_events(region, stack_id) {
        Ok(events) => summarize_failures(&events)
            .unwrap_or_else(|| format!("Stack {stack_id} reached {status}")),
        Err(error) => {
            log_warn(
                "lifecycle_handler",
                "stack_events_unavailable",
                json!({ "stack_id": stack_id, "error": error }),
            );
            format!("Stack {stack_id} reached {status}; failure events unavailable: {error}")
        }
    }
}

fn summarize_failures(events: &[StackEvent]) -> Option<String> {
    let reasons: Vec<&str> = events
        .iter()
        .filter(|event| event.resource_status.ends_with("FAILED"))
        .take(MAX_FAILURE_REASONS)
        .filter_map(|event| event.resource_status_reason.as_deref())
        .filter(|reason| !reason.is_empty())
        .collect();

    (!reasons.is_empty()).then(|| reasons.join("; "))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regional_stack_core::contract::ResponseStatus;

    use super::*;
    use crate::test_support::{
        fast_config, request, FakeStacks, FixedBudget, RecordingInvoker, RecordingResponses,
    };

    const STACK_ID: &str = "arn:aws:cloudformation:us-east-1:123456789012:stack/RegionalBucketuseast1/abc";

    fn waiting(request_type: &str) -> CustomResourceRequest {
        let mut request = request(request_type, "us-east-1");
        request.physical_resource_id = Some(STACK_ID.to_string());
        request.wait_complete = true;
        request
    }

    #[test]
    fn polls_until_create_completes_and_returns_outputs() {
        let stacks = FakeStacks::new()
            .with_stack(
                "us-east-1",
                "RegionalBucketuseast1",
                STACK_ID,
                &["CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_COMPLETE"],
            )
            .with_output(STACK_ID, "BucketArn", "arn:aws:s3:::bucket");
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_secs(200));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };

        let outcome = await_terminal_state(&waiting("Create"), &deps, &fast_config())
            .expect("wait should finish");

        assert_eq!(
            outcome,
            HandlerOutcome::Responded {
                status: ResponseStatus::Success,
                physical_resource_id: STACK_ID.to_string(),
            }
        );
        let response = responses.single();
        assert_eq!(response.data.get("BucketArn").map(String::as_str), Some("arn:aws:s3:::bucket"));
        assert_eq!(stacks.calls().len(), 3);
        assert!(invoker.payloads().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poll_sleep_runs_inside_the_lambda_runtime() {
        let stacks = FakeStacks::new().with_stack(
            "us-east-1",
            "RegionalBucketuseast1",
            STACK_ID,
            &["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"],
        );
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_secs(200));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };
        let config = HandlerConfig {
            poll_interval: Duration::from_millis(5),
            ..fast_config()
        };

        let outcome =
            await_terminal_state(&waiting("Update"), &deps, &config).expect("wait should finish");

        assert_eq!(
            outcome,
            HandlerOutcome::Responded {
                status: ResponseStatus::Success,
                physical_resource_id: STACK_ID.to_string(),
            }
        );
        assert_eq!(stacks.calls().len(), 2);
    }

    #[test]
    fn update_rollback_reports_first_failure_reasons() {
        let stacks = FakeStacks::new()
            .with_stack("us-east-1", "RegionalBucketuseast1", STACK_ID, &["UPDATE_ROLLBACK_COMPLETE"])
            .with_events(&[
                ("UPDATE_ROLLBACK_COMPLETE", None),
                ("UPDATE_FAILED", Some("Bucket already exists")),
                ("CREATE_FAILED", Some("Resource creation cancelled")),
                ("UPDATE_IN_PROGRESS", Some("User Initiated")),
                ("UPDATE_FAILED", Some("Access denied")),
                ("DELETE_FAILED", Some("Dropped fourth reason")),
            ]);
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_secs(200));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };

        await_terminal_state(&waiting("Update"), &deps, &fast_config()).expect("wait should finish");

        let response = responses.single();
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(
            response.reason.as_deref(),
            Some("Bucket already exists; Resource creation cancelled; Access denied")
        );
    }

    #[test]
    fn hands_off_when_budget_runs_low() {
        let stacks = FakeStacks::new().with_stack(
            "us-east-1",
            "RegionalBucketuseast1",
            STACK_ID,
            &["DELETE_IN_PROGRESS"],
        );
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_millis(9_999));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };
        let request = waiting("Delete");

        let outcome =
            await_terminal_state(&request, &deps, &fast_config()).expect("wait should hand off");

        assert_eq!(
            outcome,
            HandlerOutcome::Reinvoked {
                physical_resource_id: STACK_ID.to_string(),
            }
        );
        assert!(responses.responses().is_empty());
        assert_eq!(invoker.payloads(), vec![request]);
    }

    #[test]
    fn delete_of_vanished_stack_succeeds() {
        let stacks = FakeStacks::new();
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_secs(200));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };

        await_terminal_state(&waiting("Delete"), &deps, &fast_config()).expect("wait should finish");
        assert_eq!(responses.single().status, ResponseStatus::Success);
    }

    #[test]
    fn wait_without_physical_id_is_rejected() {
        let stacks = FakeStacks::new();
        let responses = RecordingResponses::new();
        let invoker = RecordingInvoker::new();
        let budget = FixedBudget(Duration::from_secs(200));
        let deps = HandlerDependencies {
            stacks: &stacks,
            responses: &responses,
            invoker: &invoker,
            budget: &budget,
        };
        let mut request = waiting("Create");
        request.physical_resource_id = None;

        let error = await_terminal_state(&request, &deps, &fast_config())
            .expect_err("wait should fail");
        assert!(matches!(error, HandlerError::InvalidRequest(_)));
    }

    #[test]
    fn failure_reason_falls_back_to_status_when_events_fail() {
        let stacks = FakeStacks::new().with_events_error("throttled");
        let reason = failure_reason(&stacks, "us-east-1", STACK_ID, "ROLLBACK_COMPLETE");
        assert!(reason.contains("ROLLBACK_COMPLETE"));
        assert!(reason.contains("throttled"));
    }

    #[test]
    fn failure_reason_skips_events_without_reason() {
        let events = vec![StackEvent {
            resource_status: "CREATE_FAILED".to_string(),
            resource_status_reason: None,
        }];
        assert_eq!(summarize_failures(&events), None);
    }
}
