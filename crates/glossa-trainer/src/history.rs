//! Per-epoch training metrics and the statistics files written with a model.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Metrics recorded at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f32,
    pub binary_accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_binary_accuracy: Option<f32>,
    /// Learning rate used during the epoch.
    pub lr: f64,
}

impl EpochLogs {
    /// The quantity callbacks watch: validation loss, or training loss when
    /// no validation data was given.
    pub fn monitored(&self) -> f32 {
        self.val_loss.unwrap_or(self.loss)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochLogs>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, logs: EpochLogs) {
        self.epochs.push(logs);
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn last(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }

    /// Last validation loss, else last training loss.
    pub fn final_loss(&self) -> Option<f32> {
        self.last().map(EpochLogs::monitored)
    }

    /// Last validation accuracy, else last training accuracy.
    pub fn final_accuracy(&self) -> Option<f32> {
        self.last()
            .map(|l| l.val_binary_accuracy.unwrap_or(l.binary_accuracy))
    }

    /// Directory name for the trained model, e.g. `lstm_0.0523_0.9811`.
    pub fn model_dir_name(&self) -> Option<String> {
        let loss = self.final_loss()?;
        let acc = self.final_accuracy()?;
        Some(format!("lstm_{loss:.4}_{acc:.4}"))
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// One row per epoch; missing validation values are left empty.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for logs in &self.epochs {
            writer.serialize(logs)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(epoch: usize, loss: f32, val_loss: Option<f32>) -> EpochLogs {
        EpochLogs {
            epoch,
            loss,
            binary_accuracy: 0.9,
            val_loss,
            val_binary_accuracy: val_loss.map(|_| 0.95),
            lr: 1e-3,
        }
    }

    #[test]
    fn test_model_dir_name_prefers_validation() {
        let mut history = History::new();
        assert_eq!(history.model_dir_name(), None);

        history.push(logs(1, 0.5, Some(0.4)));
        history.push(logs(2, 0.3, Some(0.123_46)));
        assert_eq!(history.model_dir_name().as_deref(), Some("lstm_0.1235_0.9500"));
    }

    #[test]
    fn test_model_dir_name_without_validation() {
        let mut history = History::new();
        history.push(logs(1, 0.25, None));
        assert_eq!(history.model_dir_name().as_deref(), Some("lstm_0.2500_0.9000"));
    }

    #[test]
    fn test_write_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::new();
        history.push(logs(1, 0.5, Some(0.4)));
        history.push(logs(2, 0.3, None));

        history.write_json(dir.path().join("history.json")).unwrap();
        let loaded = History::read_json(dir.path().join("history.json")).unwrap();
        assert_eq!(loaded, history);

        history.write_csv(dir.path().join("history.csv")).unwrap();
        let csv = fs::read_to_string(dir.path().join("history.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "epoch,loss,binary_accuracy,val_loss,val_binary_accuracy,lr"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,0.3,0.9,,,"));
    }
}
