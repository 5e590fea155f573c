use std::fmt;

use actix_web::web;

use crate::error::{ControllerError, Result};

/// A learning task a learner is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Classification,
    PlLaClassification,
    Regression,
    PlLaRegression,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Classification,
        TaskType::PlLaClassification,
        TaskType::Regression,
        TaskType::PlLaRegression,
    ];

    /// Wire name, also the name of the task's model directory.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::PlLaClassification => "pllaclassification",
            TaskType::Regression => "regression",
            TaskType::PlLaRegression => "pllaregression",
        }
    }

    /// Parses a wire name. `none` and unknown names have no task.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|task| task.as_str() == name)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Testing,
    Comparison,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Training => "training",
            Mode::Testing => "testing",
            Mode::Comparison => "comparison",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "training" => Some(Mode::Training),
            "testing" => Some(Mode::Testing),
            "comparison" => Some(Mode::Comparison),
            _ => None,
        }
    }
}

/// Query parameters of a request, checked for shape but not yet for the
/// combination they form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub task_type: Option<String>,
    pub mode: Mode,
    pub cycle: Option<u32>,
    pub delete_models: Option<bool>,
}

impl RequestParams {
    /// Parses `task-type`, `mode`, `cycle` and `delete-models` from a raw
    /// query string. When a key is repeated the first value wins.
    ///
    /// # Errors
    /// `BadRequest` if the query is malformed, `mode` is missing, or `cycle` /
    /// `delete-models` do not parse. `UnsupportedTaskMode` if `mode` is not a
    /// known mode.
    pub fn from_query(query: &str) -> Result<Self> {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(query)
            .map_err(|e| ControllerError::BadRequest(format!("malformed query: {e}")))?
            .into_inner();

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let task_type = get("task-type").map(str::to_string);

        let raw_mode = get("mode").ok_or_else(|| missing("mode"))?;
        let mode = Mode::from_name(raw_mode).ok_or_else(|| ControllerError::UnsupportedTaskMode {
            task_type: task_type.clone().unwrap_or_default(),
            mode: raw_mode.to_string(),
        })?;

        // Cycles are counted from 1.
        let cycle = get("cycle")
            .map(|raw| {
                raw.parse::<u32>()
                    .ok()
                    .filter(|cycle| *cycle > 0)
                    .ok_or_else(|| {
                        ControllerError::BadRequest(format!(
                            "cycle must be a positive integer, got '{raw}'"
                        ))
                    })
            })
            .transpose()?;

        let delete_models = get("delete-models")
            .map(|raw| match raw {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(ControllerError::BadRequest(format!(
                    "delete-models must be 'true' or 'false', got '{other}'"
                ))),
            })
            .transpose()?;

        Ok(Self {
            task_type,
            mode,
            cycle,
            delete_models,
        })
    }
}

pub(super) fn missing(param: &str) -> ControllerError {
    ControllerError::BadRequest(format!("missing query parameter '{param}'"))
}
