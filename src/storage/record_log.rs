use std::{
    fs, io,
    path::{Path, PathBuf},
};

use actix::prelude::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Storage;
use crate::error::{ControllerError, Result};

/// Cycles up to and including this one belong to the training phase of an
/// experiment; later cycles belong to the testing phase.
pub const TRAINING_PHASE_CYCLES: u32 = 30;

pub fn is_training_phase(cycle: u32) -> bool {
    cycle <= TRAINING_PHASE_CYCLES
}

fn empty_sequence() -> Value {
    Value::Array(Vec::new())
}

/// Quality and prediction figures reported by the simulator for one cycle.
/// Values are stored as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "packetLoss")]
    pub packet_loss: Value,
    #[serde(rename = "energyConsumption")]
    pub energy_consumption: Value,
    #[serde(default = "empty_sequence")]
    pub latency: Value,
    #[serde(rename = "classificationBefore")]
    pub classification_before: Value,
    #[serde(rename = "classificationAfter")]
    pub classification_after: Value,
    #[serde(rename = "regressionPLBefore")]
    pub regression_pl_before: Value,
    #[serde(rename = "regressionPLAfter")]
    pub regression_pl_after: Value,
    #[serde(rename = "regressionLABefore", default = "empty_sequence")]
    pub regression_la_before: Value,
    #[serde(rename = "regressionLAAfter", default = "empty_sequence")]
    pub regression_la_after: Value,
}

/// One row of the comparison log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub cycle: u32,
    #[serde(rename = "isTrainingPhase")]
    pub is_training_phase: bool,
    #[serde(flatten)]
    pub metrics: Metrics,
}

impl OutcomeRecord {
    pub fn new(cycle: u32, metrics: Metrics) -> Self {
        Self {
            cycle,
            is_training_phase: is_training_phase(cycle),
            metrics,
        }
    }
}

/// Appends `record` to the JSON array stored at `path`, creating the file if
/// needed. Rows already in the file are kept verbatim.
///
/// The whole array is rewritten through a sibling temporary file that is
/// renamed over `path`, so the log is either the old or the new version.
///
/// # Returns
/// The number of records in the log after the append.
///
/// # Errors
/// Returns `StorageFailure` if the log cannot be read, does not hold a JSON
/// array, or cannot be written. A log that fails to parse is not touched.
pub fn append_record(path: &Path, record: OutcomeRecord) -> Result<usize> {
    let mut records = load_records(path)?;

    let record = serde_json::to_value(record)
        .map_err(|e| ControllerError::storage("encoding record", io::Error::other(e)))?;
    records.push(record);

    persist_records(path, &records)?;
    Ok(records.len())
}

fn load_records(path: &Path) -> Result<Vec<Value>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ControllerError::storage(reading(path), e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        ControllerError::storage(reading(path), io::Error::new(io::ErrorKind::InvalidData, e))
    })
}

fn persist_records(path: &Path, records: &[Value]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records)
        .map_err(|e| ControllerError::storage("encoding log", io::Error::other(e)))?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| ControllerError::storage(writing(&tmp), e))?;
    fs::rename(&tmp, path).map_err(|e| ControllerError::storage(writing(path), e))
}

fn reading(path: &Path) -> String {
    format!("reading {}", path.display())
}

fn writing(path: &Path) -> String {
    format!("writing {}", path.display())
}

/* -------------------------------------------------------------------------- */
/*                                Actix messages                              */
/* -------------------------------------------------------------------------- */

#[derive(Message)]
#[rtype(result = "Result<usize>")]
pub struct AppendRecord(pub OutcomeRecord);

#[derive(Message)]
#[rtype(result = "Result<usize>")]
pub struct ResetCollectedData;

/* -------------------------------------------------------------------------- */
/*                               Record log actor                             */
/* -------------------------------------------------------------------------- */

/// Sole owner of `collected_data/`. Running on a single sync arbiter thread,
/// it handles resets and appends one at a time.
pub struct RecordLog {
    storage: Storage,
    path: PathBuf,
}

impl RecordLog {
    pub fn new(storage: Storage) -> Self {
        let path = storage.overall_log_path();
        Self { storage, path }
    }

    /// Spawns the actor on its own thread.
    pub fn start(storage: Storage) -> Addr<Self> {
        SyncArbiter::start(1, move || Self::new(storage.clone()))
    }
}

impl Actor for RecordLog {
    type Context = SyncContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        debug!("record log started at {}", self.path.display());
    }
}

impl Handler<AppendRecord> for RecordLog {
    type Result = Result<usize>;

    fn handle(&mut self, msg: AppendRecord, _ctx: &mut Self::Context) -> Self::Result {
        let cycle = msg.0.cycle;
        let total = append_record(&self.path, msg.0)?;
        info!(cycle = cycle, records = total; "appended outcome record");
        Ok(total)
    }
}

impl Handler<ResetCollectedData> for RecordLog {
    type Result = Result<usize>;

    fn handle(&mut self, _msg: ResetCollectedData, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.storage.reset_collected_data()?;
        info!(removed = removed; "cleared collected data");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metrics() -> Metrics {
        serde_json::from_value(json!({
            "packetLoss": 0.1,
            "energyConsumption": 5.2,
            "classificationBefore": "A",
            "classificationAfter": "B",
            "regressionPLBefore": 1,
            "regressionPLAfter": 2,
        }))
        .unwrap()
    }

    fn read_log(path: &Path) -> Vec<Value> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn phase_boundary_is_inclusive() {
        assert!(is_training_phase(1));
        assert!(is_training_phase(30));
        assert!(!is_training_phase(31));
    }

    #[test]
    fn omitted_optional_metrics_become_empty_sequences() {
        let record = serde_json::to_value(OutcomeRecord::new(1, metrics())).unwrap();

        assert_eq!(
            record,
            json!({
                "cycle": 1,
                "isTrainingPhase": true,
                "packetLoss": 0.1,
                "energyConsumption": 5.2,
                "latency": [],
                "classificationBefore": "A",
                "classificationAfter": "B",
                "regressionPLBefore": 1,
                "regressionPLAfter": 2,
                "regressionLABefore": [],
                "regressionLAAfter": [],
            })
        );
    }

    #[test]
    fn missing_required_metric_is_rejected() {
        let res: serde_json::Result<Metrics> =
            serde_json::from_value(json!({ "packetLoss": 0.1 }));
        assert!(res.is_err());
    }

    #[test]
    fn appends_keep_call_order_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");

        for cycle in [29, 30, 31, 31] {
            append_record(&path, OutcomeRecord::new(cycle, metrics())).unwrap();
        }

        let log = read_log(&path);
        let cycles: Vec<_> = log.iter().map(|r| r["cycle"].as_u64().unwrap()).collect();
        let phases: Vec<_> = log
            .iter()
            .map(|r| r["isTrainingPhase"].as_bool().unwrap())
            .collect();

        assert_eq!(cycles, [29, 30, 31, 31]);
        assert_eq!(phases, [true, true, false, false]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn existing_rows_are_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, br#"[{"cycle": 0, "legacy": true}]"#).unwrap();

        let total = append_record(&path, OutcomeRecord::new(1, metrics())).unwrap();

        let log = read_log(&path);
        assert_eq!(total, 2);
        assert_eq!(log[0], json!({"cycle": 0, "legacy": true}));
    }

    #[test]
    fn persisted_keys_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, br#"[{"zeta": 1, "alpha": 2}]"#).unwrap();

        append_record(&path, OutcomeRecord::new(3, metrics())).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let at = |key: &str| {
            text.find(&format!("\"{key}\""))
                .unwrap_or_else(|| panic!("{key} missing from {text}"))
        };

        assert!(at("zeta") < at("alpha"));
        let order = [
            "cycle",
            "isTrainingPhase",
            "packetLoss",
            "energyConsumption",
            "latency",
            "classificationBefore",
            "classificationAfter",
            "regressionPLBefore",
            "regressionPLAfter",
            "regressionLABefore",
            "regressionLAAfter",
        ];
        for pair in order.windows(2) {
            assert!(at(pair[0]) < at(pair[1]), "{} before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn corrupt_log_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, b"{not json").unwrap();

        let err = append_record(&path, OutcomeRecord::new(1, metrics())).unwrap_err();

        assert!(matches!(err, ControllerError::StorageFailure { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"{not json");
    }

    #[actix_rt::test]
    async fn actor_resets_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_layout().unwrap();
        fs::write(storage.collected_data_dir().join("old.txt"), b"x").unwrap();
        fs::write(storage.overall_log_path(), b"[{}, {}]").unwrap();

        let log = RecordLog::start(storage.clone());

        let removed = log.send(ResetCollectedData).await.unwrap().unwrap();
        let total = log
            .send(AppendRecord(OutcomeRecord::new(1, metrics())))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(total, 1);
        assert_eq!(read_log(&storage.overall_log_path()).len(), 1);
    }
}
