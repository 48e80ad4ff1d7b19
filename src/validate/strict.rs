//! JSON-schema validation backed by `jsonschema`.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

use crate::model::JobType;

use super::ValidationError;
use super::schema::{job_schema, payload_schema};

type Compiled = Result<jsonschema::Validator, String>;

fn compile(schema: &Value) -> Compiled {
    jsonschema::options()
        .build(schema)
        .map_err(|e| format!("invalid schema: {e}"))
}

fn job_validator() -> &'static Compiled {
    static VALIDATOR: OnceLock<Compiled> = OnceLock::new();
    VALIDATOR.get_or_init(|| compile(&job_schema()))
}

fn payload_validators() -> &'static HashMap<JobType, Compiled> {
    static VALIDATORS: OnceLock<HashMap<JobType, Compiled>> = OnceLock::new();
    VALIDATORS.get_or_init(|| {
        JobType::all()
            .iter()
            .map(|t| (*t, compile(&payload_schema(*t))))
            .collect()
    })
}

fn run(compiled: &Compiled, value: &Value, path: &str) -> Result<(), ValidationError> {
    let validator = compiled
        .as_ref()
        .map_err(|e| ValidationError::new(path, e.clone()))?;
    validator
        .validate(value)
        .map_err(|e| ValidationError::new(path, e.to_string()))
}

pub(super) fn check_job(document: &Value) -> Result<(), ValidationError> {
    run(job_validator(), document, "job")
}

pub(super) fn check_payload(job_type: &str, payload: &Value) -> Result<(), ValidationError> {
    let job_type: JobType = job_type.parse().map_err(|()| {
        ValidationError::new("job_type", format!("unknown job type '{job_type}'"))
    })?;
    match payload_validators().get(&job_type) {
        Some(compiled) => run(compiled, payload, "payload"),
        None => Err(ValidationError::new(
            "payload",
            format!("no schema for {job_type}"),
        )),
    }
}
