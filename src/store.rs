//! Result persistence and history queries.
//!
//! [`ResultSink`] is what the campaign writes to. [`SqliteStore`] keeps one
//! row per tested server in a SQLite table and answers history and stats
//! queries in SQL.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{Result, SpeedtestError};
use crate::result::{HistoryRecord, ServerStats, SpeedTestResult};

/// Accepts validated results and answers history queries.
pub trait ResultSink {
    /// Validate and persist `result`. The store assigns the id and the
    /// timestamp.
    fn save(&mut self, result: &SpeedTestResult) -> Result<HistoryRecord>;

    /// Up to `limit` records, newest first, optionally for one server name.
    fn history(&self, limit: usize, server_name: Option<&str>) -> Result<Vec<HistoryRecord>>;

    /// Averages over all records for `server_url`.
    fn stats(&self, server_url: &str) -> Result<ServerStats>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS speedtest_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        server_name TEXT NOT NULL,
        server_url TEXT NOT NULL,
        test_timestamp TEXT NOT NULL,
        download_speed REAL,
        upload_speed REAL,
        ping REAL,
        jitter REAL,
        server_info TEXT NOT NULL DEFAULT '{}',
        errors TEXT NOT NULL DEFAULT '[]',
        notes TEXT NOT NULL DEFAULT '[]'
    );

    CREATE INDEX IF NOT EXISTS idx_server_url ON speedtest_results(server_url);
    CREATE INDEX IF NOT EXISTS idx_test_timestamp ON speedtest_results(test_timestamp);
    CREATE INDEX IF NOT EXISTS idx_server_name ON speedtest_results(server_name);
"#;

const SELECT_RECORD: &str = "SELECT id, server_name, server_url, test_timestamp, \
     download_speed, upload_speed, ping, jitter, server_info, errors, notes \
     FROM speedtest_results";

/// SQLite-backed store.
///
/// The connection is held from [`open`](SqliteStore::open) until
/// [`close`](SqliteStore::close); every operation after `close` fails with
/// [`SpeedtestError::StoreClosed`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Option<Connection>,
    location: PathBuf,
}

impl SqliteStore {
    /// Open the database at `path`, creating the file and schema when
    /// missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let location = path.as_ref().to_path_buf();
        let conn = Connection::open(&location)?;
        Self::init_schema(&conn)?;
        info!(path = %location.display(), "result store opened");

        Ok(SqliteStore {
            conn: Some(conn),
            location,
        })
    }

    /// A throwaway database that lives as long as the handle.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(SqliteStore {
            conn: Some(conn),
            location: PathBuf::from(":memory:"),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Number of stored results.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM speedtest_results", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// True when nothing has been stored yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Release the connection.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
            info!(path = %self.location.display(), "result store closed");
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SpeedtestError::StoreClosed)
    }
}

/// Columns as read back from the table, before JSON and timestamp decoding.
struct StoredRow {
    id: i64,
    server_name: String,
    server_url: String,
    test_timestamp: String,
    download_speed: Option<f64>,
    upload_speed: Option<f64>,
    ping: Option<f64>,
    jitter: Option<f64>,
    server_info: String,
    errors: String,
    notes: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            id: row.get(0)?,
            server_name: row.get(1)?,
            server_url: row.get(2)?,
            test_timestamp: row.get(3)?,
            download_speed: row.get(4)?,
            upload_speed: row.get(5)?,
            ping: row.get(6)?,
            jitter: row.get(7)?,
            server_info: row.get(8)?,
            errors: row.get(9)?,
            notes: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<HistoryRecord> {
        let test_timestamp = DateTime::parse_from_rfc3339(&self.test_timestamp)
            .map_err(|e| {
                SpeedtestError::Store(format!(
                    "row {}: bad timestamp {:?}: {e}",
                    self.id, self.test_timestamp
                ))
            })?
            .with_timezone(&Utc);

        Ok(HistoryRecord {
            id: self.id as u64,
            test_timestamp,
            result: SpeedTestResult {
                server_name: self.server_name,
                server_url: self.server_url,
                download_speed: self.download_speed,
                upload_speed: self.upload_speed,
                ping: self.ping,
                jitter: self.jitter,
                server_info: serde_json::from_str(&self.server_info)?,
                errors: serde_json::from_str(&self.errors)?,
                notes: serde_json::from_str(&self.notes)?,
            },
        })
    }
}

/// Fixed-width UTC text so that string order matches time order.
fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ResultSink for SqliteStore {
    fn save(&mut self, result: &SpeedTestResult) -> Result<HistoryRecord> {
        let conn = self.conn()?;
        result.validate()?;

        let test_timestamp = Utc::now().trunc_subsecs(6);
        conn.execute(
            "INSERT INTO speedtest_results
             (server_name, server_url, test_timestamp, download_speed, upload_speed,
              ping, jitter, server_info, errors, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.server_name,
                result.server_url,
                timestamp_text(&test_timestamp),
                result.download_speed,
                result.upload_speed,
                result.ping,
                result.jitter,
                serde_json::to_string(&result.server_info)?,
                serde_json::to_string(&result.errors)?,
                serde_json::to_string(&result.notes)?,
            ],
        )?;
        let id = conn.last_insert_rowid() as u64;
        debug!(id, "result inserted");

        Ok(HistoryRecord {
            id,
            test_timestamp,
            result: result.clone(),
        })
    }

    fn history(&self, limit: usize, server_name: Option<&str>) -> Result<Vec<HistoryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_RECORD}
             WHERE ?1 IS NULL OR server_name = ?1
             ORDER BY test_timestamp DESC, id DESC
             LIMIT ?2"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![server_name, limit], StoredRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(StoredRow::into_record).collect()
    }

    fn stats(&self, server_url: &str) -> Result<ServerStats> {
        let conn = self.conn()?;
        // an aggregate query always yields exactly one row
        let stats = conn.query_row(
            "SELECT AVG(download_speed), AVG(upload_speed), AVG(ping), AVG(jitter),
                    COUNT(id)
             FROM speedtest_results
             WHERE server_url = ?1",
            params![server_url],
            |row| {
                Ok(ServerStats {
                    server_url: server_url.to_string(),
                    avg_download: row.get(0)?,
                    avg_upload: row.get(1)?,
                    avg_ping: row.get(2)?,
                    avg_jitter: row.get(3)?,
                    count: row.get::<_, i64>(4)? as usize,
                })
            },
        )?;
        Ok(stats)
    }
}
