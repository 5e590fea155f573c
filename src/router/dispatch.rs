use std::{io, sync::Arc};

use actix::prelude::*;
use log::{debug, info};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};

use super::params::{missing, Mode, RequestParams, TaskType};
use crate::{
    error::{ControllerError, Result},
    learners::{Features, Learner, LearnerError, Learners, Targets, TrainingSet},
    storage::{AppendRecord, Metrics, OutcomeRecord, RecordLog, ResetCollectedData, Storage},
};

/// What a request asks for, once its parameters have been checked against
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Comparison {
        cycle: u32,
    },
    Training {
        task: TaskType,
        cycle: u32,
        delete_models: bool,
    },
    Testing {
        task: TaskType,
    },
}

/// State cleared before the first cycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    CollectedData,
    Models(TaskType),
}

impl Route {
    /// Parses a raw query string into a route.
    ///
    /// # Errors
    /// See [`RequestParams::from_query`] and [`Route::resolve`].
    pub fn from_query(query: &str) -> Result<Self> {
        Self::resolve(&RequestParams::from_query(query)?)
    }

    /// Picks the route for a set of parameters.
    ///
    /// Comparison ignores `task-type`. Training needs a task, a `cycle` and
    /// `delete-models`; testing needs only a task.
    ///
    /// # Errors
    /// `BadRequest` if a parameter the mode needs is absent.
    /// `UnsupportedTaskMode` if the task type is `none` or unknown.
    pub fn resolve(params: &RequestParams) -> Result<Self> {
        let cycle = || params.cycle.ok_or_else(|| missing("cycle"));
        let task = || -> Result<TaskType> {
            let raw = params
                .task_type
                .as_deref()
                .ok_or_else(|| missing("task-type"))?;
            TaskType::from_name(raw).ok_or_else(|| ControllerError::UnsupportedTaskMode {
                task_type: raw.to_string(),
                mode: params.mode.as_str().to_string(),
            })
        };

        let route = match params.mode {
            Mode::Comparison => Route::Comparison { cycle: cycle()? },
            Mode::Training => Route::Training {
                task: task()?,
                cycle: cycle()?,
                delete_models: params
                    .delete_models
                    .ok_or_else(|| missing("delete-models"))?,
            },
            Mode::Testing => Route::Testing { task: task()? },
        };
        Ok(route)
    }

    /// The reset this route triggers, if any. Only the first cycle resets.
    pub fn reset(&self) -> Option<Reset> {
        match *self {
            Route::Comparison { cycle: 1 } => Some(Reset::CollectedData),
            Route::Training {
                task,
                cycle: 1,
                delete_models: true,
            } => Some(Reset::Models(task)),
            _ => None,
        }
    }
}

/* -------------------------------------------------------------------------- */
/*                              Request bodies                                */
/* -------------------------------------------------------------------------- */

#[derive(Deserialize)]
struct TestingBody {
    features: Features,
}

#[derive(Deserialize)]
struct ClassesBody {
    features: Features,
    target: Vec<i64>,
}

#[derive(Deserialize)]
struct ValuesBody {
    features: Features,
    target: Vec<f64>,
}

#[derive(Deserialize)]
struct PlLaBody {
    features: Features,
    target_pl: Vec<f64>,
    target_la: Vec<f64>,
}

/// A decoded request, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Append(OutcomeRecord),
    Train {
        task: TaskType,
        cycle: u32,
        set: TrainingSet,
    },
    Test {
        task: TaskType,
        features: Features,
    },
}

impl Job {
    /// Decodes the JSON body the route expects.
    ///
    /// # Errors
    /// `BadRequest` if the body is not JSON or lacks a required field.
    pub fn decode(route: Route, body: &[u8]) -> Result<Self> {
        let job = match route {
            Route::Comparison { cycle } => {
                let metrics: Metrics = decode_object(body)?;
                Job::Append(OutcomeRecord::new(cycle, metrics))
            }
            Route::Training { task, cycle, .. } => Job::Train {
                task,
                cycle,
                set: decode_training_set(task, body)?,
            },
            Route::Testing { task } => {
                let TestingBody { features } = decode_object(body)?;
                Job::Test { task, features }
            }
        };
        Ok(job)
    }
}

/// Parses a body that must be a JSON object.
///
/// Struct fields are never read by position, so an array with the right
/// number of elements is still rejected.
fn decode_object<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let map: Map<String, Value> = serde_json::from_slice(body)?;
    Ok(serde_json::from_value(Value::Object(map))?)
}

fn decode_training_set(task: TaskType, body: &[u8]) -> Result<TrainingSet> {
    let set = match task {
        TaskType::Classification | TaskType::PlLaClassification => {
            let ClassesBody { features, target } = decode_object(body)?;
            TrainingSet::new(features, Targets::Classes(target))
        }
        TaskType::Regression => {
            let ValuesBody { features, target } = decode_object(body)?;
            TrainingSet::new(features, Targets::Values(target))
        }
        TaskType::PlLaRegression => {
            let PlLaBody {
                features,
                target_pl,
                target_la,
            } = decode_object(body)?;
            TrainingSet::new(
                features,
                Targets::PlLa {
                    pl: target_pl,
                    la: target_la,
                },
            )
        }
    };
    Ok(set)
}

/* -------------------------------------------------------------------------- */
/*                                Dispatcher                                  */
/* -------------------------------------------------------------------------- */

/// Runs decoded requests against the record log and the learners.
pub struct Dispatcher {
    storage: Storage,
    records: Addr<RecordLog>,
    learners: Learners,
}

impl Dispatcher {
    pub fn new(storage: Storage, records: Addr<RecordLog>, learners: Learners) -> Self {
        Self {
            storage,
            records,
            learners,
        }
    }

    /// Handles one request end to end.
    ///
    /// The body is decoded before anything is reset, so a rejected request
    /// leaves the filesystem as it was.
    ///
    /// # Returns
    /// The JSON object to answer with.
    pub async fn dispatch(&self, route: Route, body: &[u8]) -> Result<Value> {
        let job = Job::decode(route, body)?;

        if let Some(reset) = route.reset() {
            self.reset(reset).await?;
        }

        self.run(job).await
    }

    async fn reset(&self, reset: Reset) -> Result<()> {
        match reset {
            Reset::CollectedData => {
                self.records
                    .send(ResetCollectedData)
                    .await
                    .map_err(mailbox_error)??;
            }
            Reset::Models(task) => {
                let storage = self.storage.clone();
                let removed = tokio::task::spawn_blocking(move || storage.reset_models(task))
                    .await
                    .map_err(|e| {
                        ControllerError::storage(format!("clearing {task} models"), io::Error::other(e))
                    })??;
                info!(removed = removed; "cleared {task} models");
            }
        }
        Ok(())
    }

    async fn run(&self, job: Job) -> Result<Value> {
        match job {
            Job::Append(record) => {
                self.records
                    .send(AppendRecord(record))
                    .await
                    .map_err(mailbox_error)??;
                Ok(json!({ "message": "successful" }))
            }
            Job::Train { task, cycle, set } => {
                debug!(cycle = cycle, samples = set.len(); "training {task}");
                let learner = self.learners.get(task);
                run_blocking(learner, move |l| l.training(set, cycle)).await
            }
            Job::Test { task, features } => {
                debug!(samples = features.len(); "testing {task}");
                let learner = self.learners.get(task);
                run_blocking(learner, move |l| l.testing(features)).await
            }
        }
    }
}

async fn run_blocking<F>(learner: Arc<dyn Learner>, f: F) -> Result<Value>
where
    F: FnOnce(&dyn Learner) -> std::result::Result<Value, LearnerError> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || f(learner.as_ref()))
        .await
        .map_err(|e| ControllerError::DelegateFailure(format!("learner task aborted: {e}")))?;
    Ok(outcome?)
}

fn mailbox_error(e: MailboxError) -> ControllerError {
    ControllerError::storage("reaching the record log", io::Error::other(e.to_string()))
}
