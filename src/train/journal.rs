use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::warn;
use serde::{Serialize, Deserialize};

use crate::math::Matrix;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 }
}

fn std_dev(v: &[f64]) -> f64 {
    let m = mean(v);
    mean(&v.iter().map(|x| (x - m).powi(2)).collect::<Vec<_>>()).sqrt()
}

fn min(v: &[f64]) -> f64 {
    v.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(v: &[f64]) -> f64 {
    v.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn abs(m: &Matrix) -> Vec<f64> {
    m.as_slice().iter().map(|x| x.abs()).collect()
}

/// Per-layer magnitude of one parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub bias_mean: Vec<f64>,
    pub bias_max: Vec<f64>,
    pub weight_mean: Vec<f64>,
    pub weight_max: Vec<f64>,
}

impl DeltaStats {
    pub fn from_deltas(weight_deltas: &[Matrix], bias_deltas: &[Matrix]) -> Self {
        DeltaStats {
            bias_mean: bias_deltas.iter().map(|d| mean(&abs(d))).collect(),
            bias_max: bias_deltas.iter().map(|d| max(&abs(d))).collect(),
            weight_mean: weight_deltas.iter().map(|d| mean(&abs(d))).collect(),
            weight_max: weight_deltas.iter().map(|d| max(&abs(d))).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub layer: usize,
    pub weight_mean: f64,
    pub weight_std: f64,
    pub weight_min: f64,
    pub weight_max: f64,
    pub bias_mean: f64,
    pub bias_std: f64,
}

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEntry {
    EpochStart {
        timestamp_ms: u64,
        epoch: usize,
        total_epochs: usize,
    },
    MiniBatch {
        timestamp_ms: u64,
        epoch: usize,
        batch_idx: usize,
        batch_size: usize,
        gradient_stats: DeltaStats,
    },
    WeightSnapshot {
        timestamp_ms: u64,
        epoch: usize,
        layers: Vec<LayerSnapshot>,
    },
    EpochEnd {
        timestamp_ms: u64,
        epoch: usize,
        test_accuracy: Option<usize>,
        test_total: Option<usize>,
        accuracy_percent: Option<f64>,
        duration_seconds: f64,
    },
    TrainingComplete {
        timestamp_ms: u64,
        total_duration_seconds: f64,
        session_id: String,
    },
}

/// Headline numbers of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalSummary {
    pub session_id: String,
    pub total_epochs: usize,
    pub final_accuracy: Option<f64>,
    pub best_accuracy: Option<f64>,
    pub accuracy_improvement: Option<f64>,
    pub log_file: PathBuf,
}

/// Append-only JSONL record of a training run, one file per session.
///
/// Write failures are logged and otherwise ignored; the journal never aborts
/// training.
#[derive(Debug)]
pub struct TrainingJournal {
    session_id: String,
    path: PathBuf,
    epoch_accuracies: Vec<Option<f64>>,
}

impl TrainingJournal {
    /// Opens `<dir>/training_<session>.jsonl`, creating `dir` if needed.
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let session_id = format!("{}_{:08x}", now_ms(), rand::random::<u32>());
        let path = dir.as_ref().join(format!("training_{session_id}.jsonl"));
        Ok(TrainingJournal { session_id, path, epoch_accuracies: Vec::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn epoch_start(&mut self, epoch: usize, total_epochs: usize) {
        self.write(&JournalEntry::EpochStart { timestamp_ms: now_ms(), epoch, total_epochs });
    }

    pub fn mini_batch(&mut self, epoch: usize, batch_idx: usize, batch_size: usize, stats: DeltaStats) {
        self.write(&JournalEntry::MiniBatch {
            timestamp_ms: now_ms(),
            epoch,
            batch_idx,
            batch_size,
            gradient_stats: stats,
        });
    }

    pub fn weights_snapshot(&mut self, epoch: usize, weights: &[Matrix], biases: &[Matrix]) {
        let layers = weights.iter().zip(biases).enumerate()
            .map(|(layer, (w, b))| LayerSnapshot {
                layer,
                weight_mean: mean(w.as_slice()),
                weight_std: std_dev(w.as_slice()),
                weight_min: min(w.as_slice()),
                weight_max: max(w.as_slice()),
                bias_mean: mean(b.as_slice()),
                bias_std: std_dev(b.as_slice()),
            })
            .collect();
        self.write(&JournalEntry::WeightSnapshot { timestamp_ms: now_ms(), epoch, layers });
    }

    pub fn epoch_end(
        &mut self,
        epoch: usize,
        test_accuracy: Option<usize>,
        test_total: Option<usize>,
        duration: Duration,
    ) {
        let accuracy_percent = match (test_accuracy, test_total) {
            (Some(correct), Some(total)) if total > 0 => Some(correct as f64 / total as f64 * 100.0),
            _ => None,
        };
        self.epoch_accuracies.push(accuracy_percent);
        self.write(&JournalEntry::EpochEnd {
            timestamp_ms: now_ms(),
            epoch,
            test_accuracy,
            test_total,
            accuracy_percent,
            duration_seconds: duration.as_secs_f64(),
        });
    }

    pub fn training_complete(&mut self, total: Duration) {
        self.write(&JournalEntry::TrainingComplete {
            timestamp_ms: now_ms(),
            total_duration_seconds: total.as_secs_f64(),
            session_id: self.session_id.clone(),
        });
    }

    /// `None` until at least one epoch has ended.
    pub fn summary(&self) -> Option<JournalSummary> {
        if self.epoch_accuracies.is_empty() {
            return None;
        }
        let accuracies: Vec<f64> = self.epoch_accuracies.iter().flatten().copied().collect();
        Some(JournalSummary {
            session_id: self.session_id.clone(),
            total_epochs: self.epoch_accuracies.len(),
            final_accuracy: accuracies.last().copied(),
            best_accuracy: accuracies.iter().copied().reduce(f64::max),
            accuracy_improvement: match accuracies.as_slice() {
                [first, .., last] => Some(last - first),
                _ => None,
            },
            log_file: self.path.clone(),
        })
    }

    fn write(&self, entry: &JournalEntry) {
        if let Err(e) = append_json_line(&self.path, entry) {
            warn!("could not write training journal {}: {}", self.path.display(), e);
        }
    }
}

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

/// Reads every entry of a journal file.
pub fn read_journal<P: AsRef<Path>>(path: P) -> io::Result<Vec<JournalEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(
            serde_json::from_str(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        );
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journals_opened_together_get_their_own_files() {
        let dir = std::env::temp_dir().join(format!("neurite-journal-ids-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut a = TrainingJournal::create(&dir).unwrap();
        let mut b = TrainingJournal::create(&dir).unwrap();
        assert_ne!(a.session_id(), b.session_id());
        assert_ne!(a.path(), b.path());

        a.epoch_start(1, 1);
        b.epoch_start(1, 2);
        b.epoch_start(2, 2);
        assert_eq!(read_journal(a.path()).unwrap().len(), 1);
        assert_eq!(read_journal(b.path()).unwrap().len(), 2);
        let _ = fs::remove_dir_all(&dir);
    }
}
