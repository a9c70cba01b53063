//! Evaluation log and criteria-weight persistence
//!
//! The log is append-only. Ids are 1-based, increase in append order and
//! are never reused.

use crate::scorer::{
    CriteriaWeights, CriterionResult, EconomicAnalysis, LocationDetails, RiskAssessment,
    SiteEvaluation,
};
use crate::{Result, SelectorError};
use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default page size for history listings
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// A stored evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: u64,
    pub coordinates: GeoPoint,
    pub overall_score: u8,
    pub criteria: Vec<CriterionResult>,
    pub location_details: LocationDetails,
    pub risk_assessment: RiskAssessment,
    pub economic_analysis: EconomicAnalysis,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(id: u64, evaluation: &SiteEvaluation) -> Self {
        Self {
            id,
            coordinates: evaluation.coordinates,
            overall_score: evaluation.overall_score,
            criteria: evaluation.criteria.clone(),
            location_details: evaluation.location_details.clone(),
            risk_assessment: evaluation.risk_assessment.clone(),
            economic_analysis: evaluation.economic_analysis.clone(),
            timestamp: evaluation.created_at,
        }
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            id: self.id,
            latitude: self.coordinates.lat,
            longitude: self.coordinates.lng,
            score: self.overall_score,
            timestamp: self.timestamp,
        }
    }
}

/// One row of the history listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
}

/// Append-only store of evaluations
pub trait EvaluationLog {
    /// Store an evaluation and return its id
    fn append(&mut self, evaluation: &SiteEvaluation) -> Result<u64>;
    /// Newest first
    fn recent(&self, limit: usize) -> Result<Vec<EvaluationSummary>>;
    fn get(&self, id: u64) -> Result<Option<EvaluationRecord>>;
}

/// Persisted criteria weights
pub trait WeightStore {
    /// Stored weights, or the defaults when nothing has been saved
    fn load(&self) -> Result<CriteriaWeights>;
    fn save(&mut self, weights: &CriteriaWeights) -> Result<()>;
}

/// Run a write, retrying once; a second failure becomes `Persistence`
pub fn with_retry<T>(operation: &str, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    match f() {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!("{} failed, retrying once: {}", operation, first);
            f().map_err(|second| SelectorError::Persistence(format!("{operation}: {second}")))
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// JSON-lines evaluation log, one record per line
#[derive(Debug, Clone)]
pub struct JsonlEvaluationLog {
    path: PathBuf,
}

impl JsonlEvaluationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every readable record. Unparseable lines, including a torn
    /// trailing write, are skipped with a warning.
    fn read_all(&self) -> Result<Vec<EvaluationRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EvaluationRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {} line {}: {}", self.path.display(), i + 1, e),
            }
        }
        Ok(records)
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self
            .read_all()?
            .iter()
            .map(|r| r.id)
            .max()
            .map_or(1, |id| id + 1))
    }

    /// True when the log is non-empty and its last byte is not a newline
    fn has_unterminated_tail(&self) -> Result<bool> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }
}

impl EvaluationLog for JsonlEvaluationLog {
    fn append(&mut self, evaluation: &SiteEvaluation) -> Result<u64> {
        ensure_parent(&self.path)?;
        let record = EvaluationRecord::new(self.next_id()?, evaluation);

        let torn = self.has_unterminated_tail()?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        if torn {
            warn!("Terminating partial line in {}", self.path.display());
            writer.write_all(b"\n")?;
        }
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!("Stored evaluation {} (score {})", record.id, record.overall_score);
        Ok(record.id)
    }

    fn recent(&self, limit: usize) -> Result<Vec<EvaluationSummary>> {
        Ok(self
            .read_all()?
            .iter()
            .rev()
            .take(limit)
            .map(EvaluationRecord::summary)
            .collect())
    }

    fn get(&self, id: u64) -> Result<Option<EvaluationRecord>> {
        Ok(self.read_all()?.into_iter().find(|r| r.id == id))
    }
}

/// In-memory evaluation log
#[derive(Debug, Clone, Default)]
pub struct MemoryEvaluationLog {
    records: Vec<EvaluationRecord>,
}

impl MemoryEvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EvaluationLog for MemoryEvaluationLog {
    fn append(&mut self, evaluation: &SiteEvaluation) -> Result<u64> {
        let id = self.records.len() as u64 + 1;
        self.records.push(EvaluationRecord::new(id, evaluation));
        Ok(id)
    }

    fn recent(&self, limit: usize) -> Result<Vec<EvaluationSummary>> {
        Ok(self.records.iter().rev().take(limit).map(EvaluationRecord::summary).collect())
    }

    fn get(&self, id: u64) -> Result<Option<EvaluationRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }
}

/// Pretty-printed JSON weights file
#[derive(Debug, Clone)]
pub struct JsonWeightStore {
    path: PathBuf,
}

impl JsonWeightStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeightStore for JsonWeightStore {
    fn load(&self) -> Result<CriteriaWeights> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CriteriaWeights::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn save(&mut self, weights: &CriteriaWeights) -> Result<()> {
        ensure_parent(&self.path)?;
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, weights)?;
        writer.flush()?;
        Ok(())
    }
}

/// In-memory weight store
#[derive(Debug, Clone, Default)]
pub struct MemoryWeightStore {
    weights: Option<CriteriaWeights>,
}

impl MemoryWeightStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WeightStore for MemoryWeightStore {
    fn load(&self) -> Result<CriteriaWeights> {
        Ok(self.weights.clone().unwrap_or_default())
    }

    fn save(&mut self, weights: &CriteriaWeights) -> Result<()> {
        self.weights = Some(weights.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{evaluate_site, NearestCity, NearestWater, SiteContext};
    use crate::reference::{curated_cities, curated_water_sources};
    use crate::scorer::Criterion;
    use geo_kernel::{ExclusionCheck, SeismicAssessment};
    use std::cell::Cell;
    use tempfile::TempDir;

    fn evaluation(lat: f64) -> SiteEvaluation {
        let ctx = SiteContext {
            site: GeoPoint::new(lat, 70.0),
            nearest_city: NearestCity {
                city: curated_cities()[1].clone(),
                distance_km: 120.0,
            },
            nearest_water: NearestWater {
                source: curated_water_sources()[4].clone(),
                distance_km: 80.0,
            },
            seismic: SeismicAssessment::unknown(),
            exclusion: ExclusionCheck::clear(),
            elevation_m: 500.0,
        };
        evaluate_site(ctx, &CriteriaWeights::default(), Utc::now())
    }

    #[test]
    fn test_jsonl_log_ids_and_order() {
        let dir = TempDir::new().unwrap();
        let mut log = JsonlEvaluationLog::new(dir.path().join("nested/evals.jsonl"));

        assert_eq!(log.append(&evaluation(45.0)).unwrap(), 1);
        assert_eq!(log.append(&evaluation(46.0)).unwrap(), 2);
        assert_eq!(log.append(&evaluation(47.0)).unwrap(), 3);

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(recent[0].latitude, 47.0);

        let record = log.get(2).unwrap().unwrap();
        assert_eq!(record.coordinates.lat, 46.0);
        assert_eq!(record.criteria.len(), Criterion::COUNT);
        assert!(log.get(9).unwrap().is_none());
    }

    #[test]
    fn test_jsonl_log_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = JsonlEvaluationLog::new(dir.path().join("none.jsonl"));
        assert!(log.recent(DEFAULT_HISTORY_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_log_skips_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evals.jsonl");
        let mut log = JsonlEvaluationLog::new(&path);
        assert_eq!(log.append(&evaluation(45.0)).unwrap(), 1);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":2,"coordi"#).unwrap();
        drop(file);

        assert_eq!(log.recent(5).unwrap().len(), 1);
        assert_eq!(log.get(1).unwrap().unwrap().coordinates.lat, 45.0);

        assert_eq!(log.append(&evaluation(46.0)).unwrap(), 2);
        let recent = log.recent(5).unwrap();
        assert_eq!(recent.iter().map(|s| s.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(log.get(2).unwrap().unwrap().coordinates.lat, 46.0);
    }

    #[test]
    fn test_jsonl_log_skips_garbage_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evals.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        let mut log = JsonlEvaluationLog::new(&path);
        assert!(log.recent(5).unwrap().is_empty());
        assert_eq!(log.append(&evaluation(45.0)).unwrap(), 1);
    }

    #[test]
    fn test_memory_log() {
        let mut log = MemoryEvaluationLog::new();
        log.append(&evaluation(45.0)).unwrap();
        log.append(&evaluation(46.0)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.recent(10).unwrap()[0].id, 2);
    }

    #[test]
    fn test_weight_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonWeightStore::new(dir.path().join("weights.json"));
        assert_eq!(store.load().unwrap(), CriteriaWeights::default());

        let mut weights = CriteriaWeights::default();
        weights.set(Criterion::SeismicSafety, 0.5);
        store.save(&weights).unwrap();
        assert_eq!(store.load().unwrap().get(Criterion::SeismicSafety), 0.5);
    }

    #[test]
    fn test_retry_recovers_once() {
        let calls = Cell::new(0);
        let result = with_retry("append", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(SelectorError::Io(std::io::Error::other("disk busy")))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_retry_gives_up_after_second_failure() {
        let result: Result<()> = with_retry("append", || {
            Err(SelectorError::Io(std::io::Error::other("disk full")))
        });
        assert!(matches!(result, Err(SelectorError::Persistence(_))));
    }
}
