//! Transform definitions and the dry-run diff engine
//!
//! A transform is an ordered list of typed steps applied to a feed's rows.
//! Dry runs execute the steps over a bounded sample and diff the before and
//! after frames; the resulting report feeds job execution and gives the
//! manifest builder a column preview for the transform's target table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One sampled row: column name to JSON value, in column order
pub type Row = IndexMap<String, Value>;

/// Rows a dry run will sample at most
const SAMPLE_LIMIT: usize = 500;

/// Rows retained in each dry-run preview
const PREVIEW_ROWS: usize = 5;

/// Errors raised while applying transform steps
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Dry runs need at least one sample row
    #[error("sample rows must contain at least one row")]
    EmptySample,

    /// A step referenced a column the frame does not have
    #[error("column {column:?} not present in sample rows")]
    UnknownColumn { column: String },

    /// A cast could not convert a value
    #[error("cannot cast column {column:?} to {dtype:?}")]
    CastFailed { column: String, dtype: String },

    /// A date failed to parse under `errors = raise`
    #[error("cannot parse dates in column {column:?}")]
    DateParseFailed { column: String },

    /// A join step was missing its right-hand dataset
    #[error("join dataset {name:?} not provided in context")]
    MissingJoinDataset { name: String },

    /// A step's parameters are structurally invalid
    #[error("invalid transform step: {0}")]
    InvalidStep(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimMethod {
    #[default]
    Both,
    Left,
    Right,
}

/// Failure policy for date parsing, mirroring the ingest profiler's modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    Raise,
    #[default]
    Coerce,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepRule {
    #[default]
    First,
    Last,
    /// Drop every row whose key occurs more than once
    Any,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
    Right,
    Outer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    #[default]
    Append,
    Replace,
}

/// One typed transform step; the set is closed and each variant has exactly
/// one handler in [`apply_steps`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    Rename {
        column: String,
        new_name: String,
    },
    Cast {
        column: String,
        dtype: String,
    },
    Trim {
        column: String,
        #[serde(default)]
        method: TrimMethod,
    },
    ParseDate {
        column: String,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        errors: DatePolicy,
    },
    #[serde(rename = "fillna")]
    FillNa {
        column: String,
        value: Value,
    },
    MapValues {
        column: String,
        mapping: IndexMap<String, Value>,
        #[serde(default)]
        default: Option<Value>,
    },
    SplitColumn {
        column: String,
        into: Vec<String>,
        delimiter: String,
        #[serde(default)]
        drop_original: bool,
    },
    MergeColumns {
        columns: Vec<String>,
        into: String,
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default)]
        drop_sources: bool,
    },
    Deduplicate {
        subset: Vec<String>,
        #[serde(default)]
        keep: KeepRule,
    },
    Join {
        right_dataset: String,
        left_on: Vec<String>,
        right_on: Vec<String>,
        #[serde(default)]
        how: JoinKind,
        #[serde(default)]
        select: Option<Vec<String>>,
    },
}

fn default_separator() -> String {
    " ".to_string()
}

/// A named transform over one source feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDefinition {
    pub name: String,
    pub feed_identifier: String,
    pub target_table: String,
    pub steps: Vec<TransformStep>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub load_strategy: LoadStrategy,
    #[serde(default)]
    pub unique_key: Option<Vec<String>>,
    #[serde(default)]
    pub incremental: bool,
}

/// A column dtype change observed between the before and after frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChange {
    pub column: String,
    pub before: String,
    pub after: String,
}

/// Diff between the sampled frame and its transformed counterpart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DryRunReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub row_delta: i64,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    pub type_changes: Vec<TypeChange>,
    pub preview_before: Vec<Row>,
    pub preview_after: Vec<Row>,
}

impl DryRunReport {
    /// Column names of the transformed output, from the first preview row
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        self.preview_after
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Apply transform steps to a bounded sample and diff the frames
///
/// # Errors
/// Returns [`TransformError`] when the sample is empty, a step is
/// structurally invalid, or a handler fails under its failure policy.
pub fn run_dry_run(
    sample_rows: &[Row],
    steps: &[TransformStep],
    context_samples: &HashMap<String, Vec<Row>>,
) -> Result<DryRunReport, TransformError> {
    if sample_rows.is_empty() {
        return Err(TransformError::EmptySample);
    }
    let before: Vec<Row> = sample_rows.iter().take(SAMPLE_LIMIT).cloned().collect();
    let after = apply_steps(&before, steps, context_samples)?;
    Ok(diff_rows(&before, &after))
}

/// Run every step handler in order over a copy of the rows
pub fn apply_steps(
    rows: &[Row],
    steps: &[TransformStep],
    context: &HashMap<String, Vec<Row>>,
) -> Result<Vec<Row>, TransformError> {
    let mut out: Vec<Row> = rows.to_vec();
    for step in steps {
        out = match step {
            TransformStep::Rename { column, new_name } => apply_rename(out, column, new_name),
            TransformStep::Cast { column, dtype } => apply_cast(out, column, dtype)?,
            TransformStep::Trim { column, method } => apply_trim(out, column, *method),
            TransformStep::ParseDate {
                column,
                format,
                errors,
            } => apply_parse_date(out, column, format.as_deref(), *errors)?,
            TransformStep::FillNa { column, value } => apply_fillna(out, column, value),
            TransformStep::MapValues {
                column,
                mapping,
                default,
            } => apply_map_values(out, column, mapping, default.as_ref()),
            TransformStep::SplitColumn {
                column,
                into,
                delimiter,
                drop_original,
            } => apply_split(out, column, into, delimiter, *drop_original)?,
            TransformStep::MergeColumns {
                columns,
                into,
                separator,
                drop_sources,
            } => apply_merge(out, columns, into, separator, *drop_sources)?,
            TransformStep::Deduplicate { subset, keep } => apply_dedup(out, subset, *keep)?,
            TransformStep::Join {
                right_dataset,
                left_on,
                right_on,
                how,
                select,
            } => apply_join(
                out,
                context,
                right_dataset,
                left_on,
                right_on,
                *how,
                select.as_deref(),
            )?,
        };
    }
    Ok(out)
}

fn apply_rename(rows: Vec<Row>, column: &str, new_name: &str) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, value)| {
                    if key == column {
                        (new_name.to_string(), value)
                    } else {
                        (key, value)
                    }
                })
                .collect()
        })
        .collect()
}

fn apply_cast(mut rows: Vec<Row>, column: &str, dtype: &str) -> Result<Vec<Row>, TransformError> {
    ensure_column(&rows, column)?;
    for row in &mut rows {
        let Some(value) = row.get(column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let cast = cast_value(value, dtype).ok_or_else(|| TransformError::CastFailed {
            column: column.to_string(),
            dtype: dtype.to_string(),
        })?;
        row.insert(column.to_string(), cast);
    }
    Ok(rows)
}

fn cast_value(value: &Value, dtype: &str) -> Option<Value> {
    match dtype {
        "string" | "str" | "text" => Some(Value::String(stringify(value))),
        "int" | "integer" | "int64" => match value {
            Value::Number(num) => num
                .as_i64()
                .or_else(|| num.as_f64().map(|f| f as i64))
                .map(Value::from),
            Value::String(text) => text.trim().parse::<i64>().ok().map(Value::from),
            Value::Bool(flag) => Some(Value::from(i64::from(*flag))),
            _ => None,
        },
        "float" | "float64" | "double" => match value {
            Value::Number(num) => num.as_f64().map(Value::from),
            Value::String(text) => text.trim().parse::<f64>().ok().map(Value::from),
            Value::Bool(flag) => Some(Value::from(f64::from(u8::from(*flag)))),
            _ => None,
        },
        "bool" | "boolean" => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(text) => match text.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(num) => num.as_f64().map(|f| Value::Bool(f != 0.0)),
            _ => None,
        },
        _ => None,
    }
}

fn apply_trim(mut rows: Vec<Row>, column: &str, method: TrimMethod) -> Vec<Row> {
    for row in &mut rows {
        let Some(value) = row.get(column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = stringify(value);
        let trimmed = match method {
            TrimMethod::Both => text.trim().to_string(),
            TrimMethod::Left => text.trim_start().to_string(),
            TrimMethod::Right => text.trim_end().to_string(),
        };
        row.insert(column.to_string(), Value::String(trimmed));
    }
    rows
}

fn apply_parse_date(
    mut rows: Vec<Row>,
    column: &str,
    format: Option<&str>,
    policy: DatePolicy,
) -> Result<Vec<Row>, TransformError> {
    ensure_column(&rows, column)?;
    for row in &mut rows {
        let Some(value) = row.get(column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = stringify(value);
        match parse_date_text(&text, format) {
            Some(parsed) => {
                row.insert(column.to_string(), Value::String(parsed));
            }
            None => match policy {
                DatePolicy::Coerce => {
                    row.insert(column.to_string(), Value::Null);
                }
                DatePolicy::Ignore => {}
                DatePolicy::Raise => {
                    return Err(TransformError::DateParseFailed {
                        column: column.to_string(),
                    })
                }
            },
        }
    }
    Ok(rows)
}

fn parse_date_text(text: &str, format: Option<&str>) -> Option<String> {
    let text = text.trim();
    if let Some(fmt) = format {
        if let Ok(stamp) = chrono::NaiveDateTime::parse_from_str(text, fmt) {
            return Some(stamp.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(text, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
        return None;
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(stamp.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    if let Ok(stamp) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(stamp.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn apply_fillna(mut rows: Vec<Row>, column: &str, fill: &Value) -> Vec<Row> {
    for row in &mut rows {
        let missing = row.get(column).map_or(true, Value::is_null);
        if missing {
            row.insert(column.to_string(), fill.clone());
        }
    }
    rows
}

fn apply_map_values(
    mut rows: Vec<Row>,
    column: &str,
    mapping: &IndexMap<String, Value>,
    default: Option<&Value>,
) -> Vec<Row> {
    for row in &mut rows {
        let Some(value) = row.get(column) else {
            continue;
        };
        let key = stringify(value);
        let mapped = match mapping.get(&key) {
            Some(mapped) => mapped.clone(),
            None => match default {
                Some(fallback) => fallback.clone(),
                None => value.clone(),
            },
        };
        row.insert(column.to_string(), mapped);
    }
    rows
}

fn apply_split(
    mut rows: Vec<Row>,
    column: &str,
    into: &[String],
    delimiter: &str,
    drop_original: bool,
) -> Result<Vec<Row>, TransformError> {
    if into.len() < 2 {
        return Err(TransformError::InvalidStep(
            "split_column needs at least two target columns".to_string(),
        ));
    }
    ensure_column(&rows, column)?;
    for row in &mut rows {
        let text = row.get(column).map(stringify).unwrap_or_default();
        let parts: Vec<&str> = text.split(delimiter).collect();
        for (idx, target) in into.iter().enumerate() {
            let piece = parts
                .get(idx)
                .map_or(Value::Null, |part| Value::String((*part).to_string()));
            row.insert(target.clone(), piece);
        }
        if drop_original {
            row.shift_remove(column);
        }
    }
    Ok(rows)
}

fn apply_merge(
    mut rows: Vec<Row>,
    columns: &[String],
    into: &str,
    separator: &str,
    drop_sources: bool,
) -> Result<Vec<Row>, TransformError> {
    if columns.len() < 2 {
        return Err(TransformError::InvalidStep(
            "merge_columns needs at least two source columns".to_string(),
        ));
    }
    for row in &mut rows {
        let merged = columns
            .iter()
            .map(|col| match row.get(col) {
                Some(Value::Null) | None => String::new(),
                Some(value) => stringify(value),
            })
            .collect::<Vec<_>>()
            .join(separator);
        row.insert(into.to_string(), Value::String(merged));
        if drop_sources {
            for col in columns {
                if col != into {
                    row.shift_remove(col);
                }
            }
        }
    }
    Ok(rows)
}

fn apply_dedup(rows: Vec<Row>, subset: &[String], keep: KeepRule) -> Result<Vec<Row>, TransformError> {
    if subset.is_empty() {
        return Err(TransformError::InvalidStep(
            "deduplicate subset cannot be empty".to_string(),
        ));
    }
    let key_of = |row: &Row| -> String {
        subset
            .iter()
            .map(|col| row.get(col).map(stringify).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    };
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        *occurrences.entry(key_of(row)).or_default() += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for row in rows {
        let key = key_of(&row);
        let position = seen.entry(key.clone()).or_default();
        *position += 1;
        let total = occurrences[&key];
        let kept = match keep {
            KeepRule::First => *position == 1,
            KeepRule::Last => *position == total,
            KeepRule::Any => total == 1,
        };
        if kept {
            out.push(row);
        }
    }
    Ok(out)
}

fn apply_join(
    rows: Vec<Row>,
    context: &HashMap<String, Vec<Row>>,
    right_dataset: &str,
    left_on: &[String],
    right_on: &[String],
    how: JoinKind,
    select: Option<&[String]>,
) -> Result<Vec<Row>, TransformError> {
    if left_on.is_empty() || right_on.is_empty() || left_on.len() != right_on.len() {
        return Err(TransformError::InvalidStep(
            "join keys must be non-empty and pair up".to_string(),
        ));
    }
    let right_rows = context
        .get(right_dataset)
        .ok_or_else(|| TransformError::MissingJoinDataset {
            name: right_dataset.to_string(),
        })?;
    let right_rows: Vec<Row> = match select {
        Some(cols) => right_rows
            .iter()
            .map(|row| {
                cols.iter()
                    .filter_map(|col| row.get(col).map(|v| (col.clone(), v.clone())))
                    .collect()
            })
            .collect(),
        None => right_rows.clone(),
    };
    let right_columns: Vec<String> = right_rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    let key_of = |row: &Row, keys: &[String]| -> String {
        keys.iter()
            .map(|col| row.get(col).map(stringify).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    };

    let merge = |left: &Row, right: Option<&Row>| -> Row {
        let mut merged = left.clone();
        for col in &right_columns {
            let incoming = right.and_then(|row| row.get(col)).cloned();
            if merged.contains_key(col) {
                merged.insert(format!("{col}_right"), incoming.unwrap_or(Value::Null));
            } else {
                merged.insert(col.clone(), incoming.unwrap_or(Value::Null));
            }
        }
        merged
    };

    let mut out = Vec::new();
    let mut matched_right: Vec<bool> = vec![false; right_rows.len()];
    for left in &rows {
        let key = key_of(left, left_on);
        let mut hit = false;
        for (idx, right) in right_rows.iter().enumerate() {
            if key_of(right, right_on) == key {
                hit = true;
                matched_right[idx] = true;
                out.push(merge(left, Some(right)));
            }
        }
        if !hit && matches!(how, JoinKind::Left | JoinKind::Outer) {
            out.push(merge(left, None));
        }
    }
    if matches!(how, JoinKind::Right | JoinKind::Outer) {
        let left_columns: Vec<String> = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        for (idx, right) in right_rows.iter().enumerate() {
            if matched_right[idx] {
                continue;
            }
            let mut shell: Row = left_columns
                .iter()
                .map(|col| (col.clone(), Value::Null))
                .collect();
            for (col, value) in right {
                if shell.contains_key(col) {
                    shell.insert(format!("{col}_right"), value.clone());
                } else {
                    shell.insert(col.clone(), value.clone());
                }
            }
            out.push(shell);
        }
    }
    Ok(out)
}

fn ensure_column(rows: &[Row], column: &str) -> Result<(), TransformError> {
    let present = rows.first().is_some_and(|row| row.contains_key(column));
    if present {
        Ok(())
    } else {
        Err(TransformError::UnknownColumn {
            column: column.to_string(),
        })
    }
}

/// Diff two frames into a [`DryRunReport`]
#[must_use]
pub fn diff_rows(before: &[Row], after: &[Row]) -> DryRunReport {
    let before_cols = frame_columns(before);
    let after_cols = frame_columns(after);

    let mut columns_added: Vec<String> = after_cols
        .iter()
        .filter(|col| !before_cols.contains(*col))
        .cloned()
        .collect();
    columns_added.sort();
    let mut columns_removed: Vec<String> = before_cols
        .iter()
        .filter(|col| !after_cols.contains(*col))
        .cloned()
        .collect();
    columns_removed.sort();

    let mut common: Vec<&String> = before_cols
        .iter()
        .filter(|col| after_cols.contains(*col))
        .collect();
    common.sort();
    let mut type_changes = Vec::new();
    for col in common {
        let before_ty = column_dtype(before, col);
        let after_ty = column_dtype(after, col);
        if before_ty != after_ty {
            type_changes.push(TypeChange {
                column: col.clone(),
                before: before_ty,
                after: after_ty,
            });
        }
    }

    DryRunReport {
        rows_before: before.len(),
        rows_after: after.len(),
        row_delta: after.len() as i64 - before.len() as i64,
        columns_added,
        columns_removed,
        type_changes,
        preview_before: before.iter().take(PREVIEW_ROWS).cloned().collect(),
        preview_after: after.iter().take(PREVIEW_ROWS).cloned().collect(),
    }
}

fn frame_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn column_dtype(rows: &[Row], column: &str) -> String {
    for row in rows {
        match row.get(column) {
            Some(Value::Null) | None => continue,
            Some(Value::Bool(_)) => return "bool".to_string(),
            Some(Value::Number(num)) => {
                return if num.is_i64() || num.is_u64() {
                    "int".to_string()
                } else {
                    "float".to_string()
                }
            }
            Some(Value::String(_)) => return "str".to_string(),
            Some(Value::Array(_)) => return "list".to_string(),
            Some(Value::Object(_)) => return "object".to_string(),
        }
    }
    "null".to_string()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn no_context() -> HashMap<String, Vec<Row>> {
        HashMap::new()
    }

    #[test]
    fn rename_preserves_column_position() {
        let rows = vec![row(&[("a", json!(1)), ("b", json!(2))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::Rename {
                column: "a".to_string(),
                new_name: "alpha".to_string(),
            }],
            &no_context(),
        )
        .unwrap();
        let keys: Vec<_> = out[0].keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "b"]);
    }

    #[test]
    fn cast_to_int_parses_strings() {
        let rows = vec![row(&[("n", json!(" 42 "))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::Cast {
                column: "n".to_string(),
                dtype: "int".to_string(),
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["n"], json!(42));
    }

    #[test]
    fn cast_failure_is_an_error() {
        let rows = vec![row(&[("n", json!("not a number"))])];
        let result = apply_steps(
            &rows,
            &[TransformStep::Cast {
                column: "n".to_string(),
                dtype: "int".to_string(),
            }],
            &no_context(),
        );
        assert!(matches!(result, Err(TransformError::CastFailed { .. })));
    }

    #[test]
    fn trim_strips_whitespace() {
        let rows = vec![row(&[("name", json!("  ada  "))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::Trim {
                column: "name".to_string(),
                method: TrimMethod::Both,
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["name"], json!("ada"));
    }

    #[test]
    fn parse_date_coerces_bad_values_to_null() {
        let rows = vec![
            row(&[("day", json!("2026-03-01"))]),
            row(&[("day", json!("garbage"))]),
        ];
        let out = apply_steps(
            &rows,
            &[TransformStep::ParseDate {
                column: "day".to_string(),
                format: None,
                errors: DatePolicy::Coerce,
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["day"], json!("2026-03-01"));
        assert_eq!(out[1]["day"], Value::Null);
    }

    #[test]
    fn fillna_fills_nulls_and_missing_keys() {
        let rows = vec![row(&[("x", Value::Null)]), row(&[("y", json!(1))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::FillNa {
                column: "x".to_string(),
                value: json!(0),
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["x"], json!(0));
        assert_eq!(out[1]["x"], json!(0));
    }

    #[test]
    fn map_values_uses_default_for_unmapped() {
        let mut mapping = IndexMap::new();
        mapping.insert("open".to_string(), json!("OPEN"));
        let rows = vec![
            row(&[("status", json!("open"))]),
            row(&[("status", json!("weird"))]),
        ];
        let out = apply_steps(
            &rows,
            &[TransformStep::MapValues {
                column: "status".to_string(),
                mapping,
                default: Some(json!("OTHER")),
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["status"], json!("OPEN"));
        assert_eq!(out[1]["status"], json!("OTHER"));
    }

    #[test]
    fn split_column_pads_missing_pieces_with_null() {
        let rows = vec![row(&[("full", json!("ada lovelace"))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::SplitColumn {
                column: "full".to_string(),
                into: vec!["first".to_string(), "last".to_string(), "suffix".to_string()],
                delimiter: " ".to_string(),
                drop_original: true,
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["first"], json!("ada"));
        assert_eq!(out[0]["last"], json!("lovelace"));
        assert_eq!(out[0]["suffix"], Value::Null);
        assert!(!out[0].contains_key("full"));
    }

    #[test]
    fn merge_columns_joins_with_separator() {
        let rows = vec![row(&[("a", json!("x")), ("b", Value::Null), ("c", json!("z"))])];
        let out = apply_steps(
            &rows,
            &[TransformStep::MergeColumns {
                columns: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                into: "merged".to_string(),
                separator: "-".to_string(),
                drop_sources: false,
            }],
            &no_context(),
        )
        .unwrap();
        assert_eq!(out[0]["merged"], json!("x--z"));
    }

    #[test]
    fn deduplicate_keeps_first_by_default() {
        let rows = vec![
            row(&[("k", json!("a")), ("v", json!(1))]),
            row(&[("k", json!("a")), ("v", json!(2))]),
            row(&[("k", json!("b")), ("v", json!(3))]),
        ];
        let out = apply_dedup(rows, &["k".to_string()], KeepRule::First).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["v"], json!(1));
    }

    #[test]
    fn deduplicate_any_drops_all_duplicates() {
        let rows = vec![
            row(&[("k", json!("a"))]),
            row(&[("k", json!("a"))]),
            row(&[("k", json!("b"))]),
        ];
        let out = apply_dedup(rows, &["k".to_string()], KeepRule::Any).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["k"], json!("b"));
    }

    #[test]
    fn left_join_fills_unmatched_with_null() {
        let rows = vec![
            row(&[("id", json!(1)), ("name", json!("a"))]),
            row(&[("id", json!(2)), ("name", json!("b"))]),
        ];
        let mut context = HashMap::new();
        context.insert(
            "regions".to_string(),
            vec![row(&[("id", json!(1)), ("region", json!("eu"))])],
        );
        let out = apply_steps(
            &rows,
            &[TransformStep::Join {
                right_dataset: "regions".to_string(),
                left_on: vec!["id".to_string()],
                right_on: vec!["id".to_string()],
                how: JoinKind::Left,
                select: None,
            }],
            &context,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["region"], json!("eu"));
        assert_eq!(out[1]["region"], Value::Null);
        // the colliding right key lands under a suffix
        assert_eq!(out[0]["id_right"], json!(1));
    }

    #[test]
    fn join_without_context_dataset_fails() {
        let rows = vec![row(&[("id", json!(1))])];
        let result = apply_steps(
            &rows,
            &[TransformStep::Join {
                right_dataset: "missing".to_string(),
                left_on: vec!["id".to_string()],
                right_on: vec!["id".to_string()],
                how: JoinKind::Inner,
                select: None,
            }],
            &no_context(),
        );
        assert!(matches!(
            result,
            Err(TransformError::MissingJoinDataset { .. })
        ));
    }

    #[test]
    fn dry_run_reports_removed_columns_and_row_delta() {
        let rows = vec![
            row(&[("k", json!("a")), ("junk", json!(1))]),
            row(&[("k", json!("a")), ("junk", json!(2))]),
        ];
        let steps = vec![
            TransformStep::Deduplicate {
                subset: vec!["k".to_string()],
                keep: KeepRule::First,
            },
            TransformStep::SplitColumn {
                column: "k".to_string(),
                into: vec!["k1".to_string(), "k2".to_string()],
                delimiter: "-".to_string(),
                drop_original: true,
            },
        ];
        let report = run_dry_run(&rows, &steps, &no_context()).unwrap();
        assert_eq!(report.rows_before, 2);
        assert_eq!(report.rows_after, 1);
        assert_eq!(report.row_delta, -1);
        assert_eq!(report.columns_removed, vec!["k"]);
        assert_eq!(report.columns_added, vec!["k1", "k2"]);
        assert_eq!(report.output_columns(), vec!["junk", "k1", "k2"]);
    }

    #[test]
    fn dry_run_rejects_empty_sample() {
        let result = run_dry_run(&[], &[], &no_context());
        assert!(matches!(result, Err(TransformError::EmptySample)));
    }

    #[test]
    fn definition_round_trips_through_json() {
        let definition = TransformDefinition {
            name: "clean_tickets".to_string(),
            feed_identifier: "tickets".to_string(),
            target_table: "tickets_clean".to_string(),
            steps: vec![TransformStep::Trim {
                column: "status".to_string(),
                method: TrimMethod::Both,
            }],
            description: None,
            load_strategy: LoadStrategy::Append,
            unique_key: Some(vec!["id".to_string()]),
            incremental: false,
        };
        let encoded = serde_json::to_value(&definition).unwrap();
        assert_eq!(encoded["steps"][0]["type"], json!("trim"));
        let decoded: TransformDefinition = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, definition);
    }
}
