//! Prediction history backed by SQLite.
//!
//! Every served prediction is stored together with the request that produced
//! it. Recent entries and summary statistics over the stored totals can be
//! queried back.

use crate::error::HistoryError;
use crate::types::request::{CareLevel, Gender, PredictionRequest};
use crate::types::response::EnsembleResponse;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS prediction_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        input_gender INTEGER NOT NULL,
        input_age REAL NOT NULL,
        input_bmi REAL NOT NULL,
        input_care_level INTEGER NOT NULL,
        input_days_from_onset REAL NOT NULL,
        input_motion_values TEXT NOT NULL,
        input_cognitive_values TEXT NOT NULL,
        predicted_motion TEXT NOT NULL,
        predicted_cognitive TEXT NOT NULL,
        predicted_motion_total REAL NOT NULL,
        predicted_cognitive_total REAL NOT NULL,
        predicted_total REAL NOT NULL
    )";

const INSERT_ENTRY: &str = "
    INSERT INTO prediction_history (
        created_at,
        input_gender,
        input_age,
        input_bmi,
        input_care_level,
        input_days_from_onset,
        input_motion_values,
        input_cognitive_values,
        predicted_motion,
        predicted_cognitive,
        predicted_motion_total,
        predicted_cognitive_total,
        predicted_total
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

// Timestamps are fixed-width UTC strings, so text order is time order.
const SELECT_RECENT: &str = "
    SELECT * FROM prediction_history
    ORDER BY created_at DESC, id DESC
    LIMIT ?1 OFFSET ?2";

const SELECT_STATS: &str = "
    SELECT
        COUNT(*),
        AVG(predicted_motion_total),
        AVG(predicted_cognitive_total),
        AVG(predicted_total),
        MIN(predicted_total),
        MAX(predicted_total)
    FROM prediction_history";

/// One stored prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub input: PredictionRequest,
    pub prediction: EnsembleResponse,
}

/// A page of recent entries, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub count: usize,
    pub data: Vec<HistoryEntry>,
}

/// Averages and range of the stored totals. All `None` while the history is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStatistics {
    pub avg_motion_total: Option<f64>,
    pub avg_cognitive_total: Option<f64>,
    pub avg_total: Option<f64>,
    pub min_total: Option<f64>,
    pub max_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Number of stored predictions
    pub total: u64,
    pub statistics: HistoryStatistics,
}

/// Paging parameters of a history request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl HistoryQuery {
    /// Decode a request payload; an empty payload means the defaults.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(payload)
    }
}

/// SQLite store of served predictions
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database. `":memory:"` opens a private
    /// in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute(CREATE_TABLE, [])?;

        info!(path = %path.as_ref().display(), "Prediction history opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn.lock().map_err(|_| HistoryError::Poisoned)
    }

    /// Store one served prediction and return its row id.
    pub fn record(
        &self,
        request: &PredictionRequest,
        prediction: &EnsembleResponse,
    ) -> Result<i64, HistoryError> {
        let motion_values = serde_json::to_string(&request.motion_values)?;
        let cognitive_values = serde_json::to_string(&request.cognitive_values)?;
        let motion = serde_json::to_string(&prediction.motion)?;
        let cognitive = serde_json::to_string(&prediction.cognitive)?;

        let conn = self.connection()?;
        conn.execute(
            INSERT_ENTRY,
            params![
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                request.gender.code(),
                request.age,
                request.bmi,
                request.care_level.code(),
                request.days_from_onset,
                motion_values,
                cognitive_values,
                motion,
                cognitive,
                prediction.motion_total,
                prediction.cognitive_total,
                prediction.total,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id = id, "Prediction stored in history");
        Ok(id)
    }

    /// Most recent entries first, skipping `offset` of them.
    pub fn recent(&self, limit: usize, offset: usize) -> Result<HistoryPage, HistoryError> {
        let rows = {
            let conn = self.connection()?;
            let mut statement = conn.prepare(SELECT_RECENT)?;
            let rows = statement
                .query_map(params![limit as i64, offset as i64], StoredRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let data = rows
            .into_iter()
            .map(StoredRow::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HistoryPage {
            count: data.len(),
            data,
        })
    }

    /// Entry count plus averages and range of the stored totals.
    pub fn stats(&self) -> Result<HistoryStats, HistoryError> {
        let conn = self.connection()?;
        let stats = conn.query_row(SELECT_STATS, [], |row| {
            Ok(HistoryStats {
                total: row.get::<_, i64>(0)?.max(0) as u64,
                statistics: HistoryStatistics {
                    avg_motion_total: row.get(1)?,
                    avg_cognitive_total: row.get(2)?,
                    avg_total: row.get(3)?,
                    min_total: row.get(4)?,
                    max_total: row.get(5)?,
                },
            })
        })?;
        Ok(stats)
    }
}

/// Raw table row before the JSON columns are decoded
struct StoredRow {
    id: i64,
    created_at: String,
    gender: i64,
    age: f64,
    bmi: f64,
    care_level: i64,
    days_from_onset: f64,
    motion_values: String,
    cognitive_values: String,
    motion: String,
    cognitive: String,
    motion_total: f64,
    cognitive_total: f64,
    total: f64,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            gender: row.get("input_gender")?,
            age: row.get("input_age")?,
            bmi: row.get("input_bmi")?,
            care_level: row.get("input_care_level")?,
            days_from_onset: row.get("input_days_from_onset")?,
            motion_values: row.get("input_motion_values")?,
            cognitive_values: row.get("input_cognitive_values")?,
            motion: row.get("predicted_motion")?,
            cognitive: row.get("predicted_cognitive")?,
            motion_total: row.get("predicted_motion_total")?,
            cognitive_total: row.get("predicted_cognitive_total")?,
            total: row.get("predicted_total")?,
        })
    }

    fn into_entry(self) -> Result<HistoryEntry, HistoryError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| HistoryError::Timestamp(self.created_at.clone()))?
            .with_timezone(&Utc);

        let mut input = PredictionRequest::new(
            Gender::from_code(self.gender),
            self.age,
            self.bmi,
            CareLevel::from_code(self.care_level),
            self.days_from_onset,
        );
        input.motion_values = serde_json::from_str(&self.motion_values)?;
        input.cognitive_values = serde_json::from_str(&self.cognitive_values)?;

        Ok(HistoryEntry {
            id: self.id,
            created_at,
            input,
            prediction: EnsembleResponse {
                motion: serde_json::from_str(&self.motion)?,
                cognitive: serde_json::from_str(&self.cognitive)?,
                motion_total: self.motion_total,
                cognitive_total: self.cognitive_total,
                total: self.total,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::open(":memory:").unwrap()
    }

    fn request(age: f64) -> PredictionRequest {
        PredictionRequest::new(Gender::Female, age, 21.0, CareLevel::Yes, 14.0)
            .with_motion("食事", 5.0)
            .with_motion("歩行", 2.0)
            .with_cognitive("記憶", 4.0)
    }

    fn prediction(motion_total: f64, cognitive_total: f64) -> EnsembleResponse {
        EnsembleResponse::assemble(
            [4.0; 12],
            [5.0; 5],
            motion_total,
            cognitive_total,
            motion_total + cognitive_total,
        )
    }

    #[test]
    fn test_record_and_read_back() {
        let store = store();
        let id = store.record(&request(72.0), &prediction(48.0, 25.0)).unwrap();

        let page = store.recent(50, 0).unwrap();
        assert_eq!(page.count, 1);

        let entry = &page.data[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.input.gender, Gender::Female);
        assert_eq!(entry.input.care_level, CareLevel::Yes);
        assert_eq!(entry.input.age, 72.0);
        assert_eq!(entry.input.motion_values.get("歩行"), Some(&2.0));
        assert_eq!(entry.input.cognitive_values.get("記憶"), Some(&4.0));
        assert_eq!(entry.prediction, prediction(48.0, 25.0));
    }

    #[test]
    fn test_recent_is_newest_first_and_paged() {
        let store = store();
        for age in [60.0, 70.0, 80.0] {
            store.record(&request(age), &prediction(40.0, 20.0)).unwrap();
        }

        let ages: Vec<f64> = store
            .recent(2, 0)
            .unwrap()
            .data
            .iter()
            .map(|entry| entry.input.age)
            .collect();
        assert_eq!(ages, vec![80.0, 70.0]);

        let rest = store.recent(2, 2).unwrap();
        assert_eq!(rest.count, 1);
        assert_eq!(rest.data[0].input.age, 60.0);
    }

    #[test]
    fn test_stats() {
        let store = store();

        let empty = store.stats().unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.statistics, HistoryStatistics::default());

        store.record(&request(70.0), &prediction(50.0, 30.0)).unwrap();
        store.record(&request(75.0), &prediction(40.0, 20.0)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.statistics.avg_motion_total, Some(45.0));
        assert_eq!(stats.statistics.avg_cognitive_total, Some(25.0));
        assert_eq!(stats.statistics.avg_total, Some(70.0));
        assert_eq!(stats.statistics.min_total, Some(60.0));
        assert_eq!(stats.statistics.max_total, Some(80.0));
    }

    #[test]
    fn test_query_from_payload() {
        let query = HistoryQuery::from_payload(b"").unwrap();
        assert_eq!(query.limit, None);
        assert_eq!(query.offset, 0);

        let query = HistoryQuery::from_payload(br#"{"limit": 10, "offset": 20}"#).unwrap();
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 20);

        assert!(HistoryQuery::from_payload(b"{not json").is_err());
    }
}
