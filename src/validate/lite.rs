//! Hand-coded validation. Always runs; this is the contract.

use serde_json::{Map, Value};

use crate::model::JobType;

use super::ValidationError;
use super::schema::{
    BUDGET_FIELDS, FieldKind, FieldSpec, JOB_ID_LEN, JOB_ID_PREFIX, JOB_KEYS, TOOL_POLICY_FIELDS,
    payload_fields,
};

type Result<T> = core::result::Result<T, ValidationError>;

pub(super) fn check_job(document: &Value) -> Result<()> {
    let obj = as_object(document, "job")?;
    check_keys(obj, "job", JOB_KEYS, JOB_KEYS)?;

    let job_id = as_str(&document["job_id"], "job_id")?;
    check_job_id(job_id)?;

    let job_type = as_str(&document["job_type"], "job_type")?;
    let created_at = as_str(&document["created_at_utc"], "created_at_utc")?;
    check_utc_timestamp(created_at, "created_at_utc")?;

    check_fields(&document["budgets"], "budgets", BUDGET_FIELDS)?;
    check_fields(&document["tool_policy"], "tool_policy", TOOL_POLICY_FIELDS)?;

    check_payload(job_type, &document["payload"])
}

pub(super) fn check_payload(job_type: &str, payload: &Value) -> Result<()> {
    let job_type: JobType = job_type.parse().map_err(|()| {
        ValidationError::new("job_type", format!("unknown job type '{job_type}'"))
    })?;
    check_fields(payload, "payload", payload_fields(job_type))
}

fn check_job_id(job_id: &str) -> Result<()> {
    let (min, max) = JOB_ID_LEN;
    if !job_id.starts_with(JOB_ID_PREFIX) {
        return Err(ValidationError::new("job_id", "must start with 'job-'"));
    }
    if job_id.len() < min || job_id.len() > max {
        return Err(ValidationError::new(
            "job_id",
            format!("length must be {min}-{max}, got {}", job_id.len()),
        ));
    }
    if !job_id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(ValidationError::new(
            "job_id",
            "must be lowercase alphanumeric with dashes",
        ));
    }
    Ok(())
}

/// Shape check mirroring the schema pattern, then a real calendar parse.
fn check_utc_timestamp(value: &str, path: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let digits = |range: std::ops::Range<usize>| {
        bytes
            .get(range)
            .is_some_and(|s| s.iter().all(u8::is_ascii_digit))
    };
    let shape_ok = bytes.len() >= 20
        && digits(0..4)
        && bytes[4] == b'-'
        && digits(5..7)
        && bytes[7] == b'-'
        && digits(8..10)
        && bytes[10] == b'T'
        && digits(11..13)
        && bytes[13] == b':'
        && digits(14..16)
        && bytes[16] == b':'
        && digits(17..19)
        && bytes[bytes.len() - 1] == b'Z'
        && match &bytes[19..bytes.len() - 1] {
            [] => true,
            [b'.', rest @ ..] => !rest.is_empty() && rest.iter().all(u8::is_ascii_digit),
            _ => false,
        };
    if !shape_ok {
        return Err(ValidationError::new(
            path,
            "must be an ISO-8601 UTC timestamp ending in 'Z'",
        ));
    }
    value
        .parse::<jiff::Timestamp>()
        .map_err(|e| ValidationError::new(path, format!("invalid timestamp: {e}")))?;
    Ok(())
}

fn check_fields(value: &Value, path: &str, fields: &[FieldSpec]) -> Result<()> {
    let obj = as_object(value, path)?;
    let all: Vec<&str> = fields.iter().map(|f| f.name).collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name)
        .collect();
    check_keys(obj, path, &all, &required)?;

    for field in fields {
        if let Some(v) = obj.get(field.name) {
            check_kind(v, &format!("{path}.{}", field.name), field.kind)?;
        }
    }
    Ok(())
}

fn check_keys(obj: &Map<String, Value>, path: &str, allowed: &[&str], required: &[&str]) -> Result<()> {
    for key in required {
        if !obj.contains_key(*key) {
            return Err(ValidationError::new(
                format!("{path}.{key}"),
                "missing required field",
            ));
        }
    }
    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ValidationError::new(
            format!("{path}.{unknown}"),
            "unknown field",
        ));
    }
    Ok(())
}

fn check_kind(value: &Value, path: &str, kind: FieldKind) -> Result<()> {
    match kind {
        FieldKind::Bool => {
            if !value.is_boolean() {
                return Err(ValidationError::new(path, "must be a boolean"));
            }
        }
        FieldKind::Int { min, max } => {
            let n = value
                .as_u64()
                .ok_or_else(|| ValidationError::new(path, "must be a non-negative integer"))?;
            if n < min || n > max {
                return Err(ValidationError::new(
                    path,
                    format!("must be between {min} and {max}, got {n}"),
                ));
            }
        }
        FieldKind::Str { max_len } => {
            check_str(value, path, max_len)?;
        }
        FieldKind::StrList {
            min_items,
            max_items,
            max_len,
        } => {
            let items = check_array(value, path, min_items, max_items)?;
            for (i, item) in items.iter().enumerate() {
                check_str(item, &format!("{path}[{i}]"), max_len)?;
            }
        }
        FieldKind::ArgvList {
            min_items,
            max_items,
            min_args,
            max_args,
            max_len,
        } => {
            let commands = check_array(value, path, min_items, max_items)?;
            for (i, argv) in commands.iter().enumerate() {
                let argv_path = format!("{path}[{i}]");
                let args = check_array(argv, &argv_path, min_args, max_args)?;
                for (j, arg) in args.iter().enumerate() {
                    check_str(arg, &format!("{argv_path}[{j}]"), max_len)?;
                }
            }
        }
    }
    Ok(())
}

fn check_array<'a>(value: &'a Value, path: &str, min: usize, max: usize) -> Result<&'a Vec<Value>> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::new(path, "must be an array"))?;
    if items.len() < min || items.len() > max {
        return Err(ValidationError::new(
            path,
            format!("must have {min}-{max} items, got {}", items.len()),
        ));
    }
    Ok(items)
}

fn check_str(value: &Value, path: &str, max_len: usize) -> Result<()> {
    let s = as_str(value, path)?;
    // Schema `maxLength` counts code points, not bytes.
    let len = s.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            path,
            format!("must be at most {max_len} characters, got {len}"),
        ));
    }
    Ok(())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::new(path, "must be an object"))
}

fn as_str<'a>(value: &'a Value, path: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ValidationError::new(path, "must be a string"))
}
