//! Job validation: reject malformed jobs before they touch the ledger.
//!
//! Two modes share one contract. The lite checks in [`lite`] are the
//! contract itself and always run. With the `strict-schema` feature the
//! JSON schemas in [`schema`] are checked first, so strict mode can only
//! ever reject more, never accept more.

mod lite;
mod schema;
#[cfg(feature = "strict-schema")]
mod strict;

use std::fmt;

use serde_json::Value;

use crate::model::Job;

/// A job or payload failed validation.
///
/// `path` is a dotted location inside the job document (e.g. `budgets.max_tool_calls`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Which validator accepted a job. Recorded in every `enqueue` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorMode {
    Strict,
    Lite,
}

impl ValidatorMode {
    /// The mode this build runs in.
    pub const fn active() -> Self {
        if cfg!(feature = "strict-schema") {
            Self::Strict
        } else {
            Self::Lite
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lite => "lite",
        }
    }
}

impl fmt::Display for ValidatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a raw job document and return it typed.
///
/// Fails on missing required fields, unknown keys, out-of-range budgets,
/// a malformed `job_id`, a non-UTC `created_at_utc`, or a payload that does
/// not fit its `job_type`.
pub fn validate_job(document: &Value) -> Result<Job, ValidationError> {
    #[cfg(feature = "strict-schema")]
    {
        strict::check_job(document)?;
        if let Some(job_type) = document["job_type"].as_str() {
            strict::check_payload(job_type, &document["payload"])?;
        }
    }

    lite::check_job(document)?;

    serde_json::from_value(document.clone()).map_err(|e| ValidationError::new("job", e.to_string()))
}

/// Validate a payload against the schema its job type selects.
pub fn validate_payload_for_job_type(job_type: &str, payload: &Value) -> Result<(), ValidationError> {
    #[cfg(feature = "strict-schema")]
    strict::check_payload(job_type, payload)?;

    lite::check_payload(job_type, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn valid_job() -> Value {
        json!({
            "job_id": "job-validate-0001",
            "job_type": "doc_compactor_task",
            "created_at_utc": "2026-03-01T12:00:00Z",
            "payload": {
                "inputs": ["README.md"],
                "max_input_bytes": 1024,
                "max_output_bytes": 2048
            },
            "budgets": {
                "max_wall_time_sec": 60,
                "max_tool_calls": 0,
                "max_output_bytes": 65536,
                "max_concurrency_slots": 1
            },
            "tool_policy": {
                "allow_network": false,
                "allow_subprocess": false,
                "allowed_tools": []
            }
        })
    }

    #[test]
    fn accepts_valid_job() {
        let job = validate_job(&valid_job()).unwrap();
        assert_eq!(job.job_id, "job-validate-0001");
    }

    #[test]
    fn rejects_missing_field() {
        let mut doc = valid_job();
        doc.as_object_mut().unwrap().remove("budgets");
        let err = validate_job(&doc).unwrap_err();
        assert!(err.to_string().contains("budgets"), "{err}");
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let mut doc = valid_job();
        doc["priority"] = json!(5);
        assert!(validate_job(&doc).is_err());
    }

    #[test]
    fn rejects_out_of_range_budget() {
        for (key, bad) in [
            ("max_wall_time_sec", json!(0)),
            ("max_wall_time_sec", json!(7201)),
            ("max_tool_calls", json!(501)),
            ("max_output_bytes", json!(1023)),
            ("max_concurrency_slots", json!(9)),
            ("max_tool_calls", json!(-1)),
            ("max_tool_calls", json!(1.5)),
        ] {
            let mut doc = valid_job();
            doc["budgets"][key] = bad.clone();
            assert!(validate_job(&doc).is_err(), "{key}={bad} should be rejected");
        }
    }

    #[test]
    fn rejects_uppercase_job_id() {
        let mut doc = valid_job();
        doc["job_id"] = json!("job-Validate-0001");
        assert!(validate_job(&doc).is_err());
    }

    #[test]
    fn rejects_job_id_outside_length_bounds() {
        let mut doc = valid_job();
        doc["job_id"] = json!("job-short");
        assert!(validate_job(&doc).is_err());

        doc["job_id"] = json!(format!("job-{}", "a".repeat(37)));
        assert!(validate_job(&doc).is_err());

        doc["job_id"] = json!(format!("job-{}", "a".repeat(36)));
        assert!(validate_job(&doc).is_ok());
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let mut doc = valid_job();
        doc["created_at_utc"] = json!("2026-03-01T12:00:00+02:00");
        assert!(validate_job(&doc).is_err());

        doc["created_at_utc"] = json!("2026-03-01 12:00:00Z");
        assert!(validate_job(&doc).is_err());
    }

    #[test]
    fn rejects_unknown_job_type() {
        let mut doc = valid_job();
        doc["job_type"] = json!("shell_task");
        assert!(validate_job(&doc).is_err());
    }

    #[test]
    fn repo_index_payload_bounds() {
        let ok = json!({"include_globs": ["**/*.rs"], "max_files": 10, "max_file_bytes": 128});
        validate_payload_for_job_type("repo_index_task", &ok).unwrap();

        let no_globs = json!({"include_globs": [], "max_files": 10, "max_file_bytes": 128});
        assert!(validate_payload_for_job_type("repo_index_task", &no_globs).is_err());

        let tiny_bytes = json!({"include_globs": ["*"], "max_files": 10, "max_file_bytes": 127});
        assert!(validate_payload_for_job_type("repo_index_task", &tiny_bytes).is_err());

        let long_keyword = json!({
            "include_globs": ["*"], "max_files": 10, "max_file_bytes": 128,
            "keywords": ["k".repeat(65)]
        });
        assert!(validate_payload_for_job_type("repo_index_task", &long_keyword).is_err());
    }

    #[test]
    fn test_runner_payload_bounds() {
        let ok = json!({"commands": [["echo", "hi"]], "timeout_sec": 5, "env_allow": ["HOME"]});
        validate_payload_for_job_type("test_runner_task", &ok).unwrap();

        let empty_argv = json!({"commands": [[]], "timeout_sec": 5});
        assert!(validate_payload_for_job_type("test_runner_task", &empty_argv).is_err());

        let slow = json!({"commands": [["true"]], "timeout_sec": 3601});
        assert!(validate_payload_for_job_type("test_runner_task", &slow).is_err());

        let not_strings = json!({"commands": [["echo", 1]], "timeout_sec": 5});
        assert!(validate_payload_for_job_type("test_runner_task", &not_strings).is_err());
    }

    #[test]
    fn doc_compactor_payload_bounds() {
        let long_title = json!({
            "inputs": ["a.md"], "max_input_bytes": 128, "max_output_bytes": 128,
            "title": "t".repeat(121)
        });
        assert!(validate_payload_for_job_type("doc_compactor_task", &long_title).is_err());

        let extra = json!({
            "inputs": ["a.md"], "max_input_bytes": 128, "max_output_bytes": 128,
            "format": "html"
        });
        assert!(validate_payload_for_job_type("doc_compactor_task", &extra).is_err());
    }

    #[test]
    fn active_mode_matches_build() {
        let expected = if cfg!(feature = "strict-schema") {
            "strict"
        } else {
            "lite"
        };
        assert_eq!(ValidatorMode::active().as_str(), expected);
    }
}
