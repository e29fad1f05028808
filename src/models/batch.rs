//! # Batch Model
//!
//! A batch is a contiguous slice of the collected item identifiers handed to exactly one
//! processor invocation. `BatchRequest` is what the processor receives; `BatchResult` is
//! the structured outcome it reports back (camelCase on the wire).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::option_keys;

/// Item identifiers assigned to one worker invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position of the batch in source order
    pub index: usize,
    pub items: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Everything a processor needs to run one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub job_id: String,
    pub flow_name: String,
    pub step: u32,
    pub target_database: Option<String>,
    /// Run options, including the flow name and this batch's identifiers
    pub options: Map<String, Value>,
}

impl BatchRequest {
    /// Build the request for `batch`, layering the flow name and the batch's items over
    /// the run's base options
    pub fn new(
        job_id: impl Into<String>,
        flow_name: impl Into<String>,
        step: u32,
        target_database: Option<String>,
        base_options: &Map<String, Value>,
        batch: &Batch,
    ) -> Self {
        let flow_name = flow_name.into();
        let mut options = base_options.clone();
        options.insert(option_keys::FLOW.to_string(), Value::String(flow_name.clone()));
        options.insert(
            option_keys::ITEMS.to_string(),
            Value::Array(batch.items.iter().cloned().map(Value::String).collect()),
        );

        Self {
            job_id: job_id.into(),
            flow_name,
            step,
            target_database,
            options,
        }
    }

    /// Identifiers carried under the items option key
    pub fn items(&self) -> Vec<&str> {
        self.options
            .get(option_keys::ITEMS)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Outcome of one batch as reported by the processor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchResult {
    pub total_count: u64,
    pub error_count: u64,
    pub errors: Vec<Value>,
    pub completed_items: Vec<String>,
    pub failed_items: Vec<String>,
}

impl BatchResult {
    /// Items the processor reported as succeeded
    pub fn success_count(&self) -> u64 {
        self.total_count.saturating_sub(self.error_count)
    }

    /// A batch counts as successful when at least one of its items succeeded
    pub fn is_successful_batch(&self) -> bool {
        self.error_count < self.total_count
    }

    /// Error payloads rendered as compact JSON strings
    pub fn error_messages(&self) -> impl Iterator<Item = String> + '_ {
        self.errors.iter().map(|error| match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        })
    }
}
