//! Job identity and output location, shared by every trigger that submits
//! backend jobs.

use chrono::{DateTime, NaiveDate, Utc};

/// Backend limit on job identifiers.
pub const MAX_JOB_NAME_LEN: usize = 128;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Final path segment of `work_ref` without its extension, with every
/// character outside `[alnum-_]` replaced by `-`.
pub fn sanitize_base_name(work_ref: &str) -> String {
    let filename = work_ref.rsplit('/').next().unwrap_or(work_ref);
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    };

    stem.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// `{base}-{YYYYMMDD-HHMMSS}`; the base is truncated so the whole name fits
/// in [`MAX_JOB_NAME_LEN`], the timestamp never is.
pub fn generate_job_name(work_ref: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
    let max_base_len = MAX_JOB_NAME_LEN - timestamp.len() - 1;
    let base: String = sanitize_base_name(work_ref).chars().take(max_base_len).collect();

    format!("{}-{}", base, timestamp)
}

pub fn output_prefix(job_name: &str, date: NaiveDate) -> String {
    format!("results/{}/{}/", date.format("%Y-%m-%d"), job_name)
}
