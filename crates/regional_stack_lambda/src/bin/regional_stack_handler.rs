use std::collections::BTreeMap;
use std::time::Duration;

use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter};
use aws_sdk_lambda::types::InvocationType;
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use regional_stack_core::contract::CustomResourceRequest;
use regional_stack_core::logging::log_error;
use regional_stack_lambda::adapters::invoke::SelfInvoker;
use regional_stack_lambda::adapters::response::ResponseChannel;
use regional_stack_lambda::adapters::stacks::{
    StackEvent, StackRequest, StackService, StackSnapshot, UpdateOutcome,
};
use regional_stack_lambda::handlers::config::{ExecutionBudget, HandlerConfig};
use regional_stack_lambda::handlers::lifecycle::{
    handle_configured_event, HandlerDependencies, HandlerOutcome,
};
use serde_json::{json, Value};

const STACK_MISSING_MESSAGE: &str = "does not exist";
const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

struct CloudFormationStacks {
    sdk_config: aws_config::SdkConfig,
}

impl CloudFormationStacks {
    fn client(&self, region: &str) -> aws_sdk_cloudformation::Client {
        let config = aws_sdk_cloudformation::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_cloudformation::Client::from_conf(config)
    }
}

fn sdk_error_message<E>(error: &E) -> String
where
    E: std::error::Error,
{
    DisplayErrorContext(error).to_string()
}

fn stack_parameters(parameters: &BTreeMap<String, String>) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn stack_capabilities(capabilities: &[String]) -> Vec<Capability> {
    capabilities
        .iter()
        .map(|capability| Capability::from(capability.as_str()))
        .collect()
}

impl StackService for CloudFormationStacks {
    fn describe_stack(&self, region: &str, stack: &str) -> Result<Option<StackSnapshot>, String> {
        let client = self.client(region);
        let stack_name = stack.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = match client.describe_stacks().stack_name(stack_name).send().await {
                    Ok(output) => output,
                    Err(error) => {
                        let message = sdk_error_message(&error);
                        if message.contains(STACK_MISSING_MESSAGE) {
                            return Ok(None);
                        }
                        return Err(format!("failed to describe stack: {message}"));
                    }
                };

                Ok(output.stacks().first().map(|stack| StackSnapshot {
                    stack_id: stack.stack_id().unwrap_or_default().to_string(),
                    status: stack
                        .stack_status()
                        .map(|status| status.as_str().to_string())
                        .unwrap_or_default(),
                    outputs: stack
                        .outputs()
                        .iter()
                        .filter_map(|output| {
                            Some((
                                output.output_key()?.to_string(),
                                output.output_value()?.to_string(),
                            ))
                        })
                        .collect(),
                }))
            })
        })
    }

    fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String, String> {
        let client = self.client(region);
        let request = request.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .create_stack()
                    .stack_name(&request.stack_name)
                    .template_url(&request.template_url)
                    .set_parameters(Some(stack_parameters(&request.parameters)))
                    .set_capabilities(Some(stack_capabilities(&request.capabilities)))
                    .on_failure(OnFailure::from(request.on_failure.as_str()))
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to create stack: {}", sdk_error_message(&error))
                    })?;

                output
                    .stack_id()
                    .map(str::to_string)
                    .ok_or_else(|| "create stack response did not include a stack id".to_string())
            })
        })
    }

    fn update_stack(
        &self,
        region: &str,
        stack_id: &str,
        request: &StackRequest,
    ) -> Result<UpdateOutcome, String> {
        let client = self.client(region);
        let stack_id = stack_id.to_string();
        let request = request.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                match client
                    .update_stack()
                    .stack_name(stack_id)
                    .template_url(&request.template_url)
                    .set_parameters(Some(stack_parameters(&request.parameters)))
                    .set_capabilities(Some(stack_capabilities(&request.capabilities)))
                    .send()
                    .await
                {
                    Ok(_) => Ok(UpdateOutcome::Started),
                    Err(error) => {
                        let message = sdk_error_message(&error);
                        if message.contains(NO_UPDATES_MESSAGE) {
                            Ok(UpdateOutcome::NoChanges)
                        } else {
                            Err(format!("failed to update stack: {message}"))
                        }
                    }
                }
            })
        })
    }

    fn delete_stack(&self, region: &str, stack_id: &str) -> Result<(), String> {
        let client = self.client(region);
        let stack_id = stack_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_stack()
                    .stack_name(stack_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        format!("failed to delete stack: {}", sdk_error_message(&error))
                    })
            })
        })
    }

    fn stack_events(&self, region: &str, stack_id: &str) -> Result<Vec<StackEvent>, String> {
        let client = self.client(region);
        let stack_id = stack_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .describe_stack_events()
                    .stack_name(stack_id)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to describe stack events: {}", sdk_error_message(&error))
                    })?;

                Ok(output
                    .stack_events()
                    .iter()
                    .map(|event| StackEvent {
                        resource_status: event
                            .resource_status()
                            .map(|status| status.as_str().to_string())
                            .unwrap_or_default(),
                        resource_status_reason: event.resource_status_reason().map(str::to_string),
                    })
                    .collect())
            })
        })
    }
}

struct HttpResponseChannel {
    client: reqwest::Client,
}

impl ResponseChannel for HttpResponseChannel {
    fn put_response(&self, response_url: &str, body: &[u8]) -> Result<(), String> {
        let client = self.client.clone();
        let url = response_url.to_string();
        let body = body.to_vec();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                // The pre-signed URL is signed without a content type.
                let response = client
                    .put(url)
                    .header(reqwest::header::CONTENT_TYPE, "")
                    .body(body)
                    .send()
                    .await
                    .map_err(|error| format!("failed to send response: {error}"))?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(format!("response rejected with status {}", response.status()))
                }
            })
        })
    }
}

struct LambdaSelfInvoker {
    lambda_client: aws_sdk_lambda::Client,
    function_arn: String,
}

impl SelfInvoker for LambdaSelfInvoker {
    fn invoke_self_async(&self, payload: &[u8]) -> Result<(), String> {
        let request_payload = payload.to_vec();
        let client = self.lambda_client.clone();
        let function_name = self.function_arn.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .invoke()
                    .function_name(function_name)
                    .invocation_type(InvocationType::Event)
                    .set_payload(Some(request_payload.into()))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to invoke handler: {error}"))
            })
        })
    }
}

/// Remaining time derived from the invocation deadline (epoch millis).
struct DeadlineBudget {
    deadline_millis: u64,
}

impl ExecutionBudget for DeadlineBudget {
    fn remaining(&self) -> Duration {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Duration::from_millis(self.deadline_millis.saturating_sub(now))
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<HandlerOutcome, Error> {
    let request: CustomResourceRequest = serde_json::from_value(event.payload).map_err(|error| {
        log_error(
            "lifecycle_handler",
            "event_rejected",
            json!({ "error": error.to_string() }),
        );
        Error::from(format!("malformed custom resource event: {error}"))
    })?;
    let config = HandlerConfig::from_env();

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let stacks = CloudFormationStacks {
        sdk_config: sdk_config.clone(),
    };
    let responses = HttpResponseChannel {
        client: reqwest::Client::new(),
    };
    let invoker = LambdaSelfInvoker {
        lambda_client: aws_sdk_lambda::Client::new(&sdk_config),
        function_arn: event.context.invoked_function_arn.clone(),
    };
    let budget = DeadlineBudget {
        deadline_millis: event.context.deadline,
    };

    let deps = HandlerDependencies {
        stacks: &stacks,
        responses: &responses,
        invoker: &invoker,
        budget: &budget,
    };
    handle_configured_event(request, &deps, config).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
