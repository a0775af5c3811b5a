use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_url: String,
    pub parameters: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    pub on_failure: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSnapshot {
    pub stack_id: String,
    pub status: String,
    pub outputs: BTreeMap<String, String>,
}

impl StackSnapshot {
    /// Deleted stacks stay describable by id but no longer exist.
    pub fn is_live(&self) -> bool {
        self.status != "DELETE_COMPLETE"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
    pub resource_status: String,
    pub resource_status_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started,
    NoChanges,
}

/// Stack operations in one target region.
pub trait StackService {
    /// `Ok(None)` when no stack with that name or id exists.
    fn describe_stack(&self, region: &str, stack: &str) -> Result<Option<StackSnapshot>, String>;

    /// Returns the new stack id.
    fn create_stack(&self, region: &str, request: &StackRequest) -> Result<String, String>;

    fn update_stack(
        &self,
        region: &str,
        stack_id: &str,
        request: &StackRequest,
    ) -> Result<UpdateOutcome, String>;

    fn delete_stack(&self, region: &str, stack_id: &str) -> Result<(), String>;

    /// Most recent first.
    fn stack_events(&self, region: &str, stack_id: &str) -> Result<Vec<StackEvent>, String>;
}
