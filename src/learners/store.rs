use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use super::LearnerError;

/// JSON file holding one learner's state between cycles.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored model, if there is one.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, LearnerError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the stored model, failing with `NotTrained` if there is none.
    pub fn load_trained<T: DeserializeOwned>(&self) -> Result<T, LearnerError> {
        self.load()?
            .ok_or_else(|| LearnerError::NotTrained(self.path.clone()))
    }

    /// Replaces the stored model.
    ///
    /// The model is staged in a uniquely named file next to the target and
    /// renamed over it, so concurrent saves never share a staging file.
    pub fn save<T: Serialize>(&self, model: &T) -> Result<(), LearnerError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&serde_json::to_vec(model)?)?;
        staged.persist(&self.path).map_err(io::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.pkl"));

        assert!(store.load::<Vec<f64>>().unwrap().is_none());
        assert!(matches!(
            store.load_trained::<Vec<f64>>(),
            Err(LearnerError::NotTrained(_))
        ));
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("regression").join("model.pkl"));

        store.save(&vec![1.5_f64, 2.5]).unwrap();

        assert_eq!(store.load_trained::<Vec<f64>>().unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn concurrent_saves_leave_one_whole_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.pkl"));

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || store.save(&vec![i as f64; 64]).unwrap());
            }
        });

        let model: Vec<f64> = store.load_trained().unwrap();
        assert_eq!(model.len(), 64);
        assert!(model.iter().all(|v| *v == model[0]));

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
