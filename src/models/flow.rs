//! # Flow Model
//!
//! A flow is a named, ordered list of steps. The runner executes one step of a flow per
//! run; the flow itself is never mutated while a run is in progress and is shared with the
//! runner through an `Arc`.

use serde::{Deserialize, Serialize};

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    /// 1-based position of the step within its flow
    pub number: u32,
    pub name: String,
    /// Kind of processing the step performs (ingestion, mapping, custom, ...)
    pub step_type: String,
}

/// Unit of data-processing work applied to each item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

impl Flow {
    /// Create a flow with no steps
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step; its number is its 1-based position
    pub fn with_step(mut self, name: impl Into<String>, step_type: impl Into<String>) -> Self {
        let number = self.steps.len() as u32 + 1;
        self.steps.push(FlowStep {
            number,
            name: name.into(),
            step_type: step_type.into(),
        });
        self
    }

    /// Look up a step by number
    pub fn step(&self, number: u32) -> Option<&FlowStep> {
        self.steps.iter().find(|step| step.number == number)
    }

    /// Whether `number` can be run against this flow.
    ///
    /// Flows that declare no steps accept any step number; the processor owns the
    /// step definitions in that case.
    pub fn accepts_step(&self, number: u32) -> bool {
        self.steps.is_empty() || self.step(number).is_some()
    }
}
