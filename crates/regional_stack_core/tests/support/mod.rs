use std::sync::Mutex;

use regional_stack_core::{RegionDirectory, ResolutionError};

/// Directory double that serves a canned answer and counts queries.
pub struct ScriptedDirectory {
    answer: Result<Vec<String>, ResolutionError>,
    calls: Mutex<usize>,
}

impl ScriptedDirectory {
    pub fn regions(regions: &[&str]) -> Self {
        Self {
            answer: Ok(regions.iter().map(|region| region.to_string()).collect()),
            calls: Mutex::new(0),
        }
    }

    pub fn failing(error: ResolutionError) -> Self {
        Self {
            answer: Err(error),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("poisoned mutex")
    }
}

impl RegionDirectory for ScriptedDirectory {
    fn list_regions(&self) -> Result<Vec<String>, ResolutionError> {
        *self.calls.lock().expect("poisoned mutex") += 1;
        self.answer.clone()
    }
}
