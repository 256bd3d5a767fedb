//! Sequence and step validation.
//!
//! The `parse_*` functions work on the raw JSON payload accepted at the API
//! boundary (camelCase keys) so that type errors produce the same messages
//! as range errors. `validate_*` re-check already-typed values.

use cadence_core::types::Channel;
use cadence_core::{CadenceError, CadenceResult};
use serde_json::Value;

use crate::types::{NewSequence, SequenceUpdate, Step};

pub const NAME_REQUIRED: &str = "name is required";
pub const STEPS_REQUIRED: &str = "steps must be a non-empty array";
pub const DELAY_INVALID: &str = "delayDays must be a non-negative number";

fn invalid(msg: impl Into<String>) -> CadenceError {
    CadenceError::Validation(msg.into())
}

fn invalid_channel(raw: &Value) -> CadenceError {
    let shown = match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    invalid(format!("Invalid channel \"{shown}\""))
}

fn optional_text(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses one step object, rejecting unknown channels and negative or
/// non-numeric delays.
pub fn parse_step(raw: &Value) -> CadenceResult<Step> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("each step must be an object"))?;

    let channel_raw = obj.get("channel").unwrap_or(&Value::Null);
    let channel = channel_raw
        .as_str()
        .and_then(Channel::parse)
        .ok_or_else(|| invalid_channel(channel_raw))?;

    let delay_days = obj
        .get("delayDays")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| invalid(DELAY_INVALID))?;

    Ok(Step {
        channel,
        delay_days,
        template: optional_text(obj, "template"),
        tone: optional_text(obj, "tone"),
        notes: optional_text(obj, "notes"),
    })
}

/// Parses a non-empty step array, failing on the first invalid step.
pub fn parse_steps(raw: &Value) -> CadenceResult<Vec<Step>> {
    let items = raw
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| invalid(STEPS_REQUIRED))?;
    items.iter().map(parse_step).collect()
}

/// Parses a full sequence creation payload.
pub fn parse_new_sequence(raw: &Value, created_by: &str) -> CadenceResult<NewSequence> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("request body must be a JSON object"))?;

    let name = optional_text(obj, "name").ok_or_else(|| invalid(NAME_REQUIRED))?;
    let steps = parse_steps(obj.get("steps").unwrap_or(&Value::Null))?;

    Ok(NewSequence {
        name,
        description: optional_text(obj, "description"),
        steps,
        is_template: obj
            .get("isTemplate")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        created_by: optional_text(obj, "createdBy").unwrap_or_else(|| created_by.to_string()),
    })
}

/// Parses a partial update. Only keys present in the payload are validated
/// and applied.
pub fn parse_sequence_update(raw: &Value) -> CadenceResult<SequenceUpdate> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("request body must be a JSON object"))?;

    let name = match obj.get("name") {
        None => None,
        Some(_) => Some(optional_text(obj, "name").ok_or_else(|| invalid(NAME_REQUIRED))?),
    };
    let steps = obj.get("steps").map(parse_steps).transpose()?;

    Ok(SequenceUpdate {
        name,
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        steps,
        is_template: obj.get("isTemplate").and_then(Value::as_bool),
    })
}

pub fn validate_step(step: &Step) -> CadenceResult<()> {
    if !step.delay_days.is_finite() || step.delay_days < 0.0 {
        return Err(invalid(DELAY_INVALID));
    }
    Ok(())
}

pub fn validate_steps(steps: &[Step]) -> CadenceResult<()> {
    if steps.is_empty() {
        return Err(invalid(STEPS_REQUIRED));
    }
    steps.iter().try_for_each(validate_step)
}

pub fn validate_name(name: &str) -> CadenceResult<()> {
    if name.trim().is_empty() {
        return Err(invalid(NAME_REQUIRED));
    }
    Ok(())
}

pub fn validate_new_sequence(seq: &NewSequence) -> CadenceResult<()> {
    validate_name(&seq.name)?;
    validate_steps(&seq.steps)
}
