use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use regional_stack_core::contract::{CustomResourceRequest, CustomResourceResponse};
use serde_json::json;

use crate::adapters::invoke::SelfInvoker;
use crate::adapters::response::ResponseChannel;
use crate::adapters::stacks::{StackEvent, StackRequest, StackService, StackSnapshot, UpdateOutcome};
use crate::handlers::config::{ExecutionBudget, HandlerConfig};

pub(crate) const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response.example/signed";

pub(crate) fn request(request_type: &str, region: &str) -> CustomResourceRequest {
    serde_json::from_value(json!({
        "RequestType": request_type,
        "ResponseURL": RESPONSE_URL,
        "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/master/guid",
        "RequestId": "req-1",
        "ResourceType": "Custom::SingleBucket",
        "LogicalResourceId": "RegionalBucketuseast1",
        "ResourceProperties": {
            "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:backing",
            "StackName": "RegionalBucketuseast1",
            "Region": region,
            "TemplateUrl": "https://bucket.s3.amazonaws.com/cloudformation/regional_test_stack.json",
            "EnabledRegions": "us-east-1,ap-southeast-2,eu-central-1,ca-central-1",
            "StackParam_BucketName": "123456789012.us-east-1.regionalcf.test",
            "StackParam_Second": "1700000000"
        }
    }))
    .expect("test request should parse")
}

pub(crate) fn fast_config() -> HandlerConfig {
    HandlerConfig {
        poll_interval: Duration::ZERO,
        min_remaining: Duration::from_millis(10_000),
    }
}

#[derive(Debug, Clone)]
struct FakeStack {
    name: String,
    region: String,
    statuses: VecDeque<String>,
    outputs: BTreeMap<String, String>,
}

#[derive(Default)]
struct FakeStackState {
    stacks: BTreeMap<String, FakeStack>,
    calls: Vec<String>,
    events: Vec<StackEvent>,
    update_outcome: Option<UpdateOutcome>,
    create_error: Option<String>,
    describe_error: Option<String>,
    events_error: Option<String>,
    created: usize,
}

/// In-memory stack service. Each describe consumes the next scripted status
/// until one remains, which then sticks.
#[derive(Default)]
pub(crate) struct FakeStacks {
    state: Mutex<FakeStackState>,
}

impl FakeStacks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stack(self, region: &str, name: &str, stack_id: &str, statuses: &[&str]) -> Self {
        self.state.lock().expect("poisoned mutex").stacks.insert(
            stack_id.to_string(),
            FakeStack {
                name: name.to_string(),
                region: region.to_string(),
                statuses: statuses.iter().map(|status| status.to_string()).collect(),
                outputs: BTreeMap::new(),
            },
        );
        self
    }

    pub(crate) fn with_output(self, stack_id: &str, key: &str, value: &str) -> Self {
        if let Some(stack) = self
            .state
            .lock()
            .expect("poisoned mutex")
            .stacks
            .get_mut(stack_id)
        {
            stack.outputs.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub(crate) fn with_update_outcome(self, outcome: UpdateOutcome) -> Self {
        self.state.lock().expect("poisoned mutex").update_outcome = Some(outcome);
        self
    }

    pub(crate) fn with_create_error(self, message: &str) -> Self {
        self.state.lock().expect("poisoned mutex").create_error = Some(message.to_string());
        self
    }

    pub(crate) fn with_describe_error(self, message: &str) -> Self {
        self.state.lock().expect("poisoned mutex").describe_error = Some(message.to_string());
        self
    }

    pub(crate) fn with_events_error(self, message: &str) -> Self {
        self.state.lock().expect("poisoned mutex").events_error = Some(message.to_string());
        self
    }

    pub(crate) fn with_events(self, events: &[(&str, Option<&str>)]) -> Self {
        self.state.lock().expect("poisoned mutex").events = events
            .iter()
            .map(|(status, reason)| StackEvent {
                resource_status: status.to_string(),
                resource_status_reason: reason.map(str::to_string),
            })
            .collect();
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().expect("poisoned mutex").calls.clone()
    }

    pub(crate) fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("describe:") && !call.starts_with("events:"))
            .collect()
    }
}

impl StackService for FakeStacks {
    fn describe_stack(&self, region: &str, stack: &str) -> Result<Option<StackSnapshot>, String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.calls.push(format!("describe:{region}:{stack}"));
        if let Some(error) = state.describe_error.clone() {
            return Err(error);
        }

        let matched = state
            .stacks
            .iter_mut()
            .filter(|(_, fake)| fake.region == region)
            .find(|(id, fake)| {
                id.as_str() == stack
                    || (fake.name == stack
                        && fake.statuses.front().map(String::as_str) != Some("DELETE_COMPLETE"))
            });

        Ok(matched.map(|(stack_id, fake)| {
            let status = if fake.statuses.len() > 1 {
                fake.statuses.pop_front().unwrap_or_default()
            } else {
                fake.statuses.front().cloned().unwrap_or_default()
            };
            StackSnapshot {
                stack_id: stack_id.clone(),
                status,
                outputs: fake.outputs.clone(),
            }
        }))
    }

    fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String, String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.calls.push(format!("create:{region}:{}", request.stack_name));
        if let Some(error) = state.create_error.clone() {
            return Err(error);
        }

        state.created += 1;
        let stack_id = format!(
            "arn:aws:cloudformation:{region}:123456789012:stack/{}/new-{}",
            request.stack_name, state.created
        );
        state.stacks.insert(
            stack_id.clone(),
            FakeStack {
                name: request.stack_name.clone(),
                region: region.to_string(),
                statuses: VecDeque::from(["CREATE_IN_PROGRESS".to_string()]),
                outputs: BTreeMap::new(),
            },
        );
        Ok(stack_id)
    }

    fn update_stack(
        &self,
        region: &str,
        stack_id: &str,
        _request: &StackRequest,
    ) -> Result<UpdateOutcome, String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.calls.push(format!("update:{region}:{stack_id}"));
        Ok(state.update_outcome.unwrap_or(UpdateOutcome::Started))
    }

    fn delete_stack(&self, region: &str, stack_id: &str) -> Result<(), String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.calls.push(format!("delete:{region}:{stack_id}"));
        Ok(())
    }

    fn stack_events(&self, region: &str, stack_id: &str) -> Result<Vec<StackEvent>, String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.calls.push(format!("events:{region}:{stack_id}"));
        if let Some(error) = state.events_error.clone() {
            return Err(error);
        }
        Ok(state.events.clone())
    }
}

#[derive(Default)]
pub(crate) struct RecordingResponses {
    responses: Mutex<Vec<(String, CustomResourceResponse)>>,
    fail_with: Option<String>,
}

impl RecordingResponses {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub(crate) fn responses(&self) -> Vec<(String, CustomResourceResponse)> {
        self.responses.lock().expect("poisoned mutex").clone()
    }

    pub(crate) fn single(&self) -> CustomResourceResponse {
        let responses = self.responses();
        assert_eq!(responses.len(), 1, "expected exactly one response");
        responses[0].1.clone()
    }
}

impl ResponseChannel for RecordingResponses {
    fn put_response(&self, response_url: &str, body: &[u8]) -> Result<(), String> {
        let response: CustomResourceResponse =
            serde_json::from_slice(body).expect("response body should be valid json");
        self.responses
            .lock()
            .expect("poisoned mutex")
            .push((response_url.to_string(), response));
        match &self.fail_with {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingInvoker {
    payloads: Mutex<Vec<CustomResourceRequest>>,
    fail_with: Option<String>,
}

impl RecordingInvoker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub(crate) fn payloads(&self) -> Vec<CustomResourceRequest> {
        self.payloads.lock().expect("poisoned mutex").clone()
    }
}

impl SelfInvoker for RecordingInvoker {
    fn invoke_self_async(&self, payload: &[u8]) -> Result<(), String> {
        if let Some(message) = &self.fail_with {
            return Err(message.clone());
        }
        let request: CustomResourceRequest =
            serde_json::from_slice(payload).expect("invoke payload should be a request");
        self.payloads.lock().expect("poisoned mutex").push(request);
        Ok(())
    }
}

pub(crate) struct FixedBudget(pub Duration);

impl ExecutionBudget for FixedBudget {
    fn remaining(&self) -> Duration {
        self.0
    }
}
