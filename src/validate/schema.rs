//! Field specifications for jobs and payloads, and the JSON schemas built from them.
//!
//! Both validators read the same tables, so a bound changed here changes
//! in strict and lite mode together.

use serde_json::{Map, Value, json};

use crate::model::JobType;

/// `job-` followed by 8 to 36 lowercase alphanumerics or dashes.
pub(super) const JOB_ID_PATTERN: &str = "^job-[a-z0-9-]{8,36}$";
pub(super) const JOB_ID_PREFIX: &str = "job-";
pub(super) const JOB_ID_LEN: (usize, usize) = (12, 40);

/// ISO-8601 UTC with an explicit `Z` and optional fractional seconds.
pub(super) const UTC_TIMESTAMP_PATTERN: &str =
    r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?Z$";

pub(super) const JOB_KEYS: &[&str] = &[
    "job_id",
    "job_type",
    "created_at_utc",
    "payload",
    "budgets",
    "tool_policy",
];

#[derive(Debug, Clone, Copy)]
pub(super) enum FieldKind {
    Bool,
    Int {
        min: u64,
        max: u64,
    },
    Str {
        max_len: usize,
    },
    StrList {
        min_items: usize,
        max_items: usize,
        max_len: usize,
    },
    /// A list of argv lists.
    ArgvList {
        min_items: usize,
        max_items: usize,
        min_args: usize,
        max_args: usize,
        max_len: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub(super) struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        kind,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        kind,
    }
}

pub(super) const BUDGET_FIELDS: &[FieldSpec] = &[
    required("max_wall_time_sec", FieldKind::Int { min: 1, max: 7200 }),
    required("max_tool_calls", FieldKind::Int { min: 0, max: 500 }),
    required(
        "max_output_bytes",
        FieldKind::Int {
            min: 1024,
            max: 104_857_600,
        },
    ),
    required("max_concurrency_slots", FieldKind::Int { min: 1, max: 8 }),
];

pub(super) const TOOL_POLICY_FIELDS: &[FieldSpec] = &[
    required("allow_network", FieldKind::Bool),
    required("allow_subprocess", FieldKind::Bool),
    required(
        "allowed_tools",
        FieldKind::StrList {
            min_items: 0,
            max_items: 32,
            max_len: 128,
        },
    ),
];

const REPO_INDEX_FIELDS: &[FieldSpec] = &[
    required(
        "include_globs",
        FieldKind::StrList {
            min_items: 1,
            max_items: 16,
            max_len: 128,
        },
    ),
    optional(
        "exclude_globs",
        FieldKind::StrList {
            min_items: 0,
            max_items: 16,
            max_len: 128,
        },
    ),
    required("max_files", FieldKind::Int { min: 1, max: 50_000 }),
    required(
        "max_file_bytes",
        FieldKind::Int {
            min: 128,
            max: 1_048_576,
        },
    ),
    optional(
        "keywords",
        FieldKind::StrList {
            min_items: 0,
            max_items: 32,
            max_len: 64,
        },
    ),
];

const TEST_RUNNER_FIELDS: &[FieldSpec] = &[
    required(
        "commands",
        FieldKind::ArgvList {
            min_items: 1,
            max_items: 32,
            min_args: 1,
            max_args: 64,
            max_len: 256,
        },
    ),
    required("timeout_sec", FieldKind::Int { min: 1, max: 3600 }),
    optional("cwd", FieldKind::Str { max_len: 512 }),
    optional(
        "env_allow",
        FieldKind::StrList {
            min_items: 0,
            max_items: 64,
            max_len: 128,
        },
    ),
];

const DOC_COMPACTOR_FIELDS: &[FieldSpec] = &[
    required(
        "inputs",
        FieldKind::StrList {
            min_items: 1,
            max_items: 64,
            max_len: 512,
        },
    ),
    required(
        "max_input_bytes",
        FieldKind::Int {
            min: 128,
            max: 10_485_760,
        },
    ),
    required(
        "max_output_bytes",
        FieldKind::Int {
            min: 128,
            max: 1_048_576,
        },
    ),
    optional("title", FieldKind::Str { max_len: 120 }),
];

pub(super) const fn payload_fields(job_type: JobType) -> &'static [FieldSpec] {
    match job_type {
        JobType::RepoIndex => REPO_INDEX_FIELDS,
        JobType::TestRunner => TEST_RUNNER_FIELDS,
        JobType::DocCompactor => DOC_COMPACTOR_FIELDS,
    }
}

// ── Schema construction (strict mode) ──

#[cfg_attr(not(feature = "strict-schema"), allow(dead_code))]
pub(super) fn job_schema() -> Value {
    let job_types: Vec<&str> = JobType::all().iter().map(|t| t.as_str()).collect();
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": JOB_KEYS,
        "additionalProperties": false,
        "properties": {
            "job_id": {"type": "string", "pattern": JOB_ID_PATTERN},
            "job_type": {"type": "string", "enum": job_types},
            "created_at_utc": {"type": "string", "pattern": UTC_TIMESTAMP_PATTERN},
            "payload": {"type": "object"},
            "budgets": object_schema(BUDGET_FIELDS),
            "tool_policy": object_schema(TOOL_POLICY_FIELDS),
        }
    })
}

#[cfg_attr(not(feature = "strict-schema"), allow(dead_code))]
pub(super) fn payload_schema(job_type: JobType) -> Value {
    let mut schema = object_schema(payload_fields(job_type));
    schema["$schema"] = json!("https://json-schema.org/draft/2020-12/schema");
    schema
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name)
        .collect();
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), kind_schema(f.kind)))
        .collect();
    json!({
        "type": "object",
        "required": required,
        "additionalProperties": false,
        "properties": properties,
    })
}

fn kind_schema(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Bool => json!({"type": "boolean"}),
        FieldKind::Int { min, max } => json!({"type": "integer", "minimum": min, "maximum": max}),
        FieldKind::Str { max_len } => json!({"type": "string", "maxLength": max_len}),
        FieldKind::StrList {
            min_items,
            max_items,
            max_len,
        } => json!({
            "type": "array",
            "minItems": min_items,
            "maxItems": max_items,
            "items": {"type": "string", "maxLength": max_len},
        }),
        FieldKind::ArgvList {
            min_items,
            max_items,
            min_args,
            max_args,
            max_len,
        } => json!({
            "type": "array",
            "minItems": min_items,
            "maxItems": max_items,
            "items": {
                "type": "array",
                "minItems": min_args,
                "maxItems": max_args,
                "items": {"type": "string", "maxLength": max_len},
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_length_bounds_match_pattern() {
        // "job-" plus the {8,36} quantifier.
        assert_eq!(JOB_ID_LEN, (JOB_ID_PREFIX.len() + 8, JOB_ID_PREFIX.len() + 36));
    }

    #[test]
    fn payload_schema_lists_required_fields() {
        let schema = payload_schema(JobType::TestRunner);
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["commands", "timeout_sec"]);
        assert_eq!(schema["additionalProperties"], json!(false));
    }
}
