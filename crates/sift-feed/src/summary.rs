//! Typed feed summary model
//!
//! A feed version stores a profiled summary: analysis hints, per-column
//! value counts, pre-computed aggregates, and free text. The agent core
//! only ever reads this model; it is produced once per ingestion event.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `label: count` row from a value-counts profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub label: String,
    pub count: i64,
}

/// One ranked `label = value` row inside an aggregate entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub label: String,
    pub value: f64,
}

/// A pre-computed aggregate over `value` grouped by `group`
///
/// The executor trusts these rankings verbatim; it never re-aggregates.
/// `stat` stays optional: plan derivation treats a missing stat differently
/// from an explicit one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub group: String,
    pub value: String,
    #[serde(default)]
    pub stat: Option<String>,
    #[serde(default)]
    pub best: Vec<RankedValue>,
    #[serde(default)]
    pub worst: Vec<RankedValue>,
}

/// A generic profiling metric; only `value_counts` metrics are consumed here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub column: String,
    #[serde(default)]
    pub values: Vec<ValueCount>,
}

/// Per-column profile captured at ingestion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(default)]
    pub dtype: Option<String>,
    #[serde(default)]
    pub top_values: Vec<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
}

/// One typed, parameterized unit of analysis work
///
/// Recognized kinds are modeled as variants; anything else is preserved
/// verbatim in [`PlanStep::Other`] and executed generically. Serde goes
/// through the raw JSON shape so malformed recognized steps degrade to
/// `Other` instead of failing the whole summary.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    CountBy {
        column: String,
    },
    AvgBy {
        group: String,
        value: String,
        stat: String,
    },
    MeanBy {
        group: String,
        value: String,
        stat: String,
    },
    Other(Value),
}

impl PlanStep {
    /// Classify a raw plan entry
    fn from_value(raw: Value) -> Self {
        let kind = raw.get("type").and_then(Value::as_str).map(ToString::to_string);
        match kind.as_deref() {
            Some("count_by") => {
                if let Some(column) = raw.get("column").and_then(Value::as_str) {
                    return PlanStep::CountBy {
                        column: column.to_string(),
                    };
                }
            }
            Some(tag @ ("avg_by" | "mean_by")) => {
                let group = raw.get("group").and_then(Value::as_str);
                let value = raw.get("value").and_then(Value::as_str);
                if let (Some(group), Some(value)) = (group, value) {
                    let stat = raw
                        .get("stat")
                        .and_then(Value::as_str)
                        .unwrap_or("mean")
                        .to_string();
                    return if tag == "avg_by" {
                        PlanStep::AvgBy {
                            group: group.to_string(),
                            value: value.to_string(),
                            stat,
                        }
                    } else {
                        PlanStep::MeanBy {
                            group: group.to_string(),
                            value: value.to_string(),
                            stat,
                        }
                    };
                }
            }
            _ => {}
        }
        PlanStep::Other(raw)
    }

    fn to_value(&self) -> Value {
        match self {
            PlanStep::CountBy { column } => serde_json::json!({
                "type": "count_by",
                "column": column,
            }),
            PlanStep::AvgBy { group, value, stat } => serde_json::json!({
                "type": "avg_by",
                "group": group,
                "value": value,
                "stat": stat,
            }),
            PlanStep::MeanBy { group, value, stat } => serde_json::json!({
                "type": "mean_by",
                "group": group,
                "value": value,
                "stat": stat,
            }),
            PlanStep::Other(raw) => raw.clone(),
        }
    }
}

impl Serialize for PlanStep {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PlanStep {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(PlanStep::from_value(Value::deserialize(deserializer)?))
    }
}

impl PlanStep {
    /// The step's kind tag as written in the plan
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            PlanStep::CountBy { .. } => "count_by",
            PlanStep::AvgBy { .. } => "avg_by",
            PlanStep::MeanBy { .. } => "mean_by",
            PlanStep::Other(raw) => raw
                .get("type")
                .and_then(Value::as_str)
                .filter(|tag| !tag.is_empty())
                .unwrap_or("task"),
        }
    }

    /// Whether the step carries a usable kind tag
    ///
    /// Stored analysis plans may contain malformed entries; only entries
    /// with a truthy `type` key participate in plan derivation.
    #[must_use]
    pub fn has_kind_tag(&self) -> bool {
        match self {
            PlanStep::Other(raw) => match raw.get("type") {
                Some(Value::String(tag)) => !tag.is_empty(),
                Some(Value::Bool(flag)) => *flag,
                Some(Value::Number(num)) => num.as_f64().is_some_and(|n| n != 0.0),
                Some(Value::Null) | None => false,
                Some(_) => true,
            },
            _ => true,
        }
    }

    /// Named string field from the step payload, for generic execution
    #[must_use]
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        match self {
            PlanStep::Other(raw) => raw.get(key).and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Profiled summary for one feed version
///
/// All fields tolerate absence in the stored JSON; `insights` keeps the
/// stored key order because plan derivation iterates it in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    #[serde(default)]
    pub analysis_plan: Vec<PlanStep>,
    #[serde(default)]
    pub insights: IndexMap<String, Vec<ValueCount>>,
    #[serde(default)]
    pub aggregates: Vec<AggregateEntry>,
    #[serde(default)]
    pub metrics: Vec<MetricEntry>,
    #[serde(default)]
    pub columns: Vec<ColumnProfile>,
    #[serde(default)]
    pub relationships: IndexMap<String, Value>,
    #[serde(default)]
    pub text: Option<String>,
}

impl FeedSummary {
    /// Value counts for `column`: insights first, then `value_counts` metrics
    #[must_use]
    pub fn column_counts(&self, column: &str) -> Vec<ValueCount> {
        if let Some(counts) = self.insights.get(column) {
            if !counts.is_empty() {
                return counts.clone();
            }
        }
        for metric in &self.metrics {
            if metric.kind == "value_counts" && metric.column == column {
                return metric.values.clone();
            }
        }
        Vec::new()
    }

    /// Exact `(group, value)` aggregate match, if any
    #[must_use]
    pub fn aggregate_stats(&self, group: &str, value: &str) -> Option<&AggregateEntry> {
        self.aggregates
            .iter()
            .find(|agg| agg.group == group && agg.value == value)
    }

    /// Column profile by name
    #[must_use]
    pub fn column_profile(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|col| col.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn plan_step_round_trip() {
        let step: PlanStep = serde_json::from_value(json!({
            "type": "count_by",
            "column": "status",
        }))
        .unwrap();
        assert_eq!(
            step,
            PlanStep::CountBy {
                column: "status".to_string()
            }
        );
        assert_eq!(step.kind(), "count_by");
    }

    #[test]
    fn plan_step_aggregate_defaults_stat() {
        let step: PlanStep = serde_json::from_value(json!({
            "type": "avg_by",
            "group": "region",
            "value": "latency",
        }))
        .unwrap();
        match step {
            PlanStep::AvgBy { stat, .. } => assert_eq!(stat, "mean"),
            other => panic!("expected AvgBy, got {other:?}"),
        }
    }

    #[test]
    fn plan_step_unknown_kind_is_preserved() {
        let raw = json!({"type": "trend", "column": "created_at"});
        let step: PlanStep = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(step, PlanStep::Other(raw));
        assert_eq!(step.kind(), "trend");
        assert!(step.has_kind_tag());
    }

    #[test]
    fn plan_step_without_type_has_no_kind_tag() {
        let step: PlanStep = serde_json::from_value(json!({"column": "status"})).unwrap();
        assert!(!step.has_kind_tag());
        assert_eq!(step.kind(), "task");
    }

    #[test]
    fn column_counts_fall_back_to_metrics() {
        let summary: FeedSummary = serde_json::from_value(json!({
            "metrics": [
                {"type": "value_counts", "column": "status",
                 "values": [{"label": "open", "count": 3}]},
                {"type": "null_ratio", "column": "status"},
            ],
        }))
        .unwrap();
        let counts = summary.column_counts("status");
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].label, "open");
        assert!(summary.column_counts("missing").is_empty());
    }

    #[test]
    fn insights_win_over_metrics() {
        let summary: FeedSummary = serde_json::from_value(json!({
            "insights": {"status": [{"label": "closed", "count": 7}]},
            "metrics": [
                {"type": "value_counts", "column": "status",
                 "values": [{"label": "open", "count": 3}]},
            ],
        }))
        .unwrap();
        assert_eq!(summary.column_counts("status")[0].label, "closed");
    }

    #[test]
    fn aggregate_stats_requires_exact_match() {
        let summary: FeedSummary = serde_json::from_value(json!({
            "aggregates": [
                {"group": "region", "value": "latency", "stat": "mean",
                 "best": [{"label": "eu", "value": 1.5}],
                 "worst": [{"label": "us", "value": 9.0}]},
            ],
        }))
        .unwrap();
        assert!(summary.aggregate_stats("region", "latency").is_some());
        assert!(summary.aggregate_stats("region", "throughput").is_none());
        assert!(summary.aggregate_stats("zone", "latency").is_none());
    }

    #[test]
    fn summary_tolerates_empty_payload() {
        let summary: FeedSummary = serde_json::from_value(json!({})).unwrap();
        assert!(summary.analysis_plan.is_empty());
        assert!(summary.insights.is_empty());
        assert!(summary.text.is_none());
    }
}
