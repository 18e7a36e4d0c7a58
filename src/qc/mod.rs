//! Quality-control categories, their launch forms and the launcher that
//! wires a stream to the execution store.

mod launcher;

pub use launcher::{LaunchedTask, QcLauncher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::progress::StepDescriptor;

/// Form-level validation failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A data source must be selected")]
    MissingDataSource,
    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("Table name cannot be blank")]
    BlankTableName,
    #[error("Unknown QC category: {0}")]
    UnknownCategory(String),
}

static COMPLETENESS_STEPS: [StepDescriptor; 1] = [StepDescriptor::new(
    0,
    "Completeness",
    "CompletenessQC",
    "Checks required fields and records for missing values",
)];

static CONSISTENCY_STEPS: [StepDescriptor; 1] = [StepDescriptor::new(
    0,
    "Consistency",
    "ConsistencyQC",
    "Cross-checks related fields and tables for contradictions",
)];

static ACCURACY_STEPS: [StepDescriptor; 1] = [StepDescriptor::new(
    0,
    "Accuracy",
    "AccuracyQC",
    "Validates values against dictionaries and value ranges",
)];

static TIMELINESS_STEPS: [StepDescriptor; 1] = [StepDescriptor::new(
    0,
    "Timeliness",
    "TimelinessQC",
    "Checks that records arrive within the expected reporting window",
)];

static CORE_DATA_STEPS: [StepDescriptor; 1] = [StepDescriptor::new(
    0,
    "Core data",
    "CoreDataQC",
    "Checks the core clinical data set for coverage",
)];

static FLOW_STEPS: [StepDescriptor; 4] = [
    StepDescriptor::new(
        0,
        "Completeness",
        "CompletenessQC",
        "Checks required fields and records for missing values",
    ),
    StepDescriptor::new(
        1,
        "Timeliness",
        "TimelinessQC",
        "Checks that records arrive within the expected reporting window",
    ),
    StepDescriptor::new(
        2,
        "Consistency",
        "ConsistencyQC",
        "Cross-checks related fields and tables for contradictions",
    ),
    StepDescriptor::new(
        3,
        "Accuracy",
        "AccuracyQC",
        "Validates values against dictionaries and value ranges",
    ),
];

/// Kind of QC task, one per console page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcCategory {
    Completeness,
    Consistency,
    Accuracy,
    Timeliness,
    CoreData,
    /// Full pipeline: completeness, timeliness, consistency, accuracy
    Flow,
}

impl QcCategory {
    pub const ALL: [QcCategory; 6] = [
        Self::Completeness,
        Self::Consistency,
        Self::Accuracy,
        Self::Timeliness,
        Self::CoreData,
        Self::Flow,
    ];

    pub fn steps(self) -> &'static [StepDescriptor] {
        match self {
            Self::Completeness => &COMPLETENESS_STEPS,
            Self::Consistency => &CONSISTENCY_STEPS,
            Self::Accuracy => &ACCURACY_STEPS,
            Self::Timeliness => &TIMELINESS_STEPS,
            Self::CoreData => &CORE_DATA_STEPS,
            Self::Flow => &FLOW_STEPS,
        }
    }

    /// Streaming launch endpoint
    pub fn launch_endpoint(self) -> &'static str {
        match self {
            Self::Completeness => "/data/qc/completenessQc",
            Self::Consistency => "/data/qc/consistencyQc",
            Self::Accuracy => "/data/qc/accuracyQc",
            Self::Timeliness => "/data/qc/timelinessQc",
            Self::CoreData => "/data/qc/coreDataQc",
            Self::Flow => "/data/qc/qcFlow",
        }
    }

    /// Value of the `qcType` filter on the result listing
    pub fn result_type(self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Consistency => "consistency",
            Self::Accuracy => "accuracy",
            Self::Timeliness => "timeliness",
            Self::CoreData => "coreData",
            Self::Flow => "flow",
        }
    }
}

impl std::fmt::Display for QcCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completeness => write!(f, "completeness"),
            Self::Consistency => write!(f, "consistency"),
            Self::Accuracy => write!(f, "accuracy"),
            Self::Timeliness => write!(f, "timeliness"),
            Self::CoreData => write!(f, "core-data"),
            Self::Flow => write!(f, "flow"),
        }
    }
}

impl std::str::FromStr for QcCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "completeness" => Ok(Self::Completeness),
            "consistency" => Ok(Self::Consistency),
            "accuracy" => Ok(Self::Accuracy),
            "timeliness" => Ok(Self::Timeliness),
            "core-data" | "coredata" => Ok(Self::CoreData),
            "flow" => Ok(Self::Flow),
            _ => Err(ValidationError::UnknownCategory(s.to_string())),
        }
    }
}

/// Filters submitted from a launch form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcLaunchRequest {
    pub data_source_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl QcLaunchRequest {
    pub fn new(data_source_id: impl Into<String>) -> Self {
        Self {
            data_source_id: data_source_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_names = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data_source_id.trim().is_empty() {
            return Err(ValidationError::MissingDataSource);
        }
        if self.table_names.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::BlankTableName);
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::InvertedDateRange { start, end });
            }
        }
        Ok(())
    }

    /// JSON body for the launch endpoint
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// One row of a QC result listing. Columns differ per category, so
/// anything not modelled here is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcResultRow {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub rule_name: Option<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub error_count: Option<u64>,
    #[serde(default)]
    pub pass_rate: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_ends_with_accuracy() {
        let steps = QcCategory::Flow.steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].node_type, "CompletenessQC");
        assert_eq!(steps[3].node_type, "AccuracyQC");
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.step_index, i);
        }
    }

    #[test]
    fn test_every_category_has_steps_and_endpoint() {
        for category in QcCategory::ALL {
            assert!(!category.steps().is_empty());
            assert!(category.launch_endpoint().starts_with("/data/qc/"));
        }
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Accuracy".parse::<QcCategory>().unwrap(), QcCategory::Accuracy);
        assert_eq!("core_data".parse::<QcCategory>().unwrap(), QcCategory::CoreData);
        assert_eq!(
            QcCategory::CoreData.to_string().parse::<QcCategory>().unwrap(),
            QcCategory::CoreData
        );
        assert!("lineage".parse::<QcCategory>().is_err());
    }

    #[test]
    fn test_launch_request_validation() {
        assert_eq!(
            QcLaunchRequest::new("  ").validate(),
            Err(ValidationError::MissingDataSource)
        );

        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let req = QcLaunchRequest::new("ds-1").with_date_range(Some(start), Some(end));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvertedDateRange { .. })
        ));

        let req = QcLaunchRequest::new("ds-1").with_tables(["patient", " "]);
        assert_eq!(req.validate(), Err(ValidationError::BlankTableName));

        let req = QcLaunchRequest::new("ds-1")
            .with_tables(["patient"])
            .with_date_range(Some(end), Some(start));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_launch_body_is_camel_case() {
        let req = QcLaunchRequest::new("ds-1")
            .with_tables(["patient_visit"])
            .with_date_range(NaiveDate::from_ymd_opt(2024, 1, 1), None);
        let body = req.to_body();
        assert_eq!(body["dataSourceId"], "ds-1");
        assert_eq!(body["tableNames"][0], "patient_visit");
        assert_eq!(body["startDate"], "2024-01-01");
        assert!(body.get("endDate").is_none());
    }

    #[test]
    fn test_result_row_keeps_extra_columns() {
        let row: QcResultRow = serde_json::from_str(
            r#"{"tableName": "lab_result", "errorCount": 3, "ruleCode": "R-12"}"#,
        )
        .unwrap();
        assert_eq!(row.table_name.as_deref(), Some("lab_result"));
        assert_eq!(row.error_count, Some(3));
        assert_eq!(row.extra["ruleCode"], "R-12");
    }
}
