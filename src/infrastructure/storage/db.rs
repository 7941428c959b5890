use crate::domain::entities::EntitySet;
use crate::domain::error::FinsightError;
use crate::domain::model::{CacheEntry, VideoCacheEntry, VideoMetadata};
use crate::domain::traits::{CacheStore, VideoStore};
use async_trait::async_trait;
use rusqlite::OptionalExtension;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_rusqlite::{params, Connection};
use zstd::stream::{decode_all, encode_all};

const ENTRY_COLUMNS: &str =
    "query_hash, original_query, normalized_query, intent, entities, response, created_at, cache_ttl";

const VIDEO_COLUMNS: &str = "video_hash, video_url, video_info, transcript, analysis, title, \
     channel, duration, view_count, transcript_length, word_count, created_at, cache_ttl";

/// SQLite-backed store for both caches
///
/// Responses and video payloads are kept as zstd-compressed JSON, entities
/// as plain JSON text so old rows stay readable.
pub struct SqliteStore {
    conn: Connection,
    query_table: String,
    video_table: String,
    closed: AtomicBool,
}

impl SqliteStore {
    pub async fn open(
        db_path: &Path,
        query_table: &str,
        video_table: &str,
    ) -> Result<Self, FinsightError> {
        let conn = Connection::open(db_path.to_path_buf()).await?;
        Self::init(conn, query_table, video_table).await
    }

    pub async fn open_in_memory(query_table: &str, video_table: &str) -> Result<Self, FinsightError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, query_table, video_table).await
    }

    async fn init(
        conn: Connection,
        query_table: &str,
        video_table: &str,
    ) -> Result<Self, FinsightError> {
        let schema = format!(
            "CREATE TABLE IF NOT EXISTS {q} (
                query_hash TEXT PRIMARY KEY,
                original_query TEXT NOT NULL,
                normalized_query TEXT NOT NULL,
                intent TEXT NOT NULL,
                entities TEXT,
                response BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                cache_ttl INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{q}_intent ON {q}(intent, created_at);
            CREATE INDEX IF NOT EXISTS idx_{q}_created ON {q}(created_at);
            CREATE TABLE IF NOT EXISTS {v} (
                video_hash TEXT PRIMARY KEY,
                video_url TEXT NOT NULL,
                video_info BLOB NOT NULL,
                transcript BLOB NOT NULL,
                analysis BLOB NOT NULL,
                title TEXT NOT NULL,
                channel TEXT NOT NULL,
                duration REAL NOT NULL,
                view_count INTEGER NOT NULL,
                transcript_length INTEGER NOT NULL,
                word_count INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                cache_ttl INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{v}_url ON {v}(video_url);
            CREATE INDEX IF NOT EXISTS idx_{v}_created ON {v}(created_at);",
            q = query_table,
            v = video_table,
        );

        conn.call(move |conn| conn.execute_batch(&schema)).await?;

        Ok(Self {
            conn,
            query_table: query_table.to_string(),
            video_table: video_table.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    async fn close_connection(&self) -> Result<(), FinsightError> {
        // 两个缓存共享同一个连接，只关闭一次
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.conn.clone().close().await?;
        Ok(())
    }

    async fn execute(&self, sql: String, value: i64) -> Result<usize, FinsightError> {
        let changed = self
            .conn
            .call(move |conn| conn.execute(&sql, params![value]))
            .await?;
        Ok(changed)
    }
}

fn compress_json<T: Serialize>(value: &T) -> Result<Vec<u8>, FinsightError> {
    let serialized = serde_json::to_vec(value)?;
    Ok(encode_all(Cursor::new(&serialized), 0)?)
}

fn decompress_json<T: DeserializeOwned>(data: &[u8]) -> Result<T, FinsightError> {
    let decompressed = decode_all(Cursor::new(data))?;
    Ok(serde_json::from_slice(&decompressed)?)
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

struct EntryRow {
    query_hash: String,
    original_query: String,
    normalized_query: String,
    intent: String,
    entities: Option<String>,
    response: Vec<u8>,
    created_at: i64,
    cache_ttl: i64,
}

fn read_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        query_hash: row.get(0)?,
        original_query: row.get(1)?,
        normalized_query: row.get(2)?,
        intent: row.get(3)?,
        entities: row.get(4)?,
        response: row.get(5)?,
        created_at: row.get(6)?,
        cache_ttl: row.get(7)?,
    })
}

impl EntryRow {
    fn decode(self) -> Result<CacheEntry, FinsightError> {
        let entities = self
            .entities
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<EntitySet>(raw) {
                Ok(entities) => Some(entities),
                Err(e) => {
                    tracing::debug!("Unreadable entities for {}: {}", self.query_hash, e);
                    None
                }
            });

        Ok(CacheEntry {
            response: decompress_json(&self.response)?,
            entities,
            query_hash: self.query_hash,
            original_query: self.original_query,
            normalized_query: self.normalized_query,
            intent: self.intent,
            created_at: self.created_at,
            cache_ttl: from_sql_int(self.cache_ttl),
        })
    }
}

struct VideoRow {
    video_hash: String,
    video_url: String,
    video_info: Vec<u8>,
    transcript: Vec<u8>,
    analysis: Vec<u8>,
    title: String,
    channel: String,
    duration: f64,
    view_count: i64,
    transcript_length: i64,
    word_count: i64,
    created_at: i64,
    cache_ttl: i64,
}

fn read_video_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        video_hash: row.get(0)?,
        video_url: row.get(1)?,
        video_info: row.get(2)?,
        transcript: row.get(3)?,
        analysis: row.get(4)?,
        title: row.get(5)?,
        channel: row.get(6)?,
        duration: row.get(7)?,
        view_count: row.get(8)?,
        transcript_length: row.get(9)?,
        word_count: row.get(10)?,
        created_at: row.get(11)?,
        cache_ttl: row.get(12)?,
    })
}

impl VideoRow {
    fn decode(self) -> Result<VideoCacheEntry, FinsightError> {
        Ok(VideoCacheEntry {
            video_info: decompress_json(&self.video_info)?,
            transcript: decompress_json(&self.transcript)?,
            analysis: decompress_json(&self.analysis)?,
            metadata: VideoMetadata {
                title: self.title,
                channel: self.channel,
                duration: self.duration,
                view_count: from_sql_int(self.view_count),
                transcript_length: from_sql_int(self.transcript_length),
                word_count: from_sql_int(self.word_count),
            },
            video_hash: self.video_hash,
            video_url: self.video_url,
            created_at: self.created_at,
            cache_ttl: from_sql_int(self.cache_ttl),
        })
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn find_entry(&self, query_hash: &str) -> Result<Option<CacheEntry>, FinsightError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE query_hash = ?1",
            self.query_table
        );
        let query_hash = query_hash.to_string();
        let row = self
            .conn
            .call(move |conn| {
                conn.query_row(&sql, params![query_hash], read_entry_row)
                    .optional()
            })
            .await?;

        row.map(EntryRow::decode).transpose()
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), FinsightError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            self.query_table
        );
        let entities = entry
            .entities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let response = compress_json(&entry.response)?;
        let query_hash = entry.query_hash.clone();
        let original_query = entry.original_query.clone();
        let normalized_query = entry.normalized_query.clone();
        let intent = entry.intent.clone();
        let created_at = entry.created_at;
        let cache_ttl = to_sql_int(entry.cache_ttl);

        self.conn
            .call(move |conn| {
                conn.execute(
                    &sql,
                    params![
                        query_hash,
                        original_query,
                        normalized_query,
                        intent,
                        entities,
                        response,
                        created_at,
                        cache_ttl
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn delete_entry(&self, query_hash: &str) -> Result<bool, FinsightError> {
        let sql = format!("DELETE FROM {} WHERE query_hash = ?1", self.query_table);
        let query_hash = query_hash.to_string();
        let deleted = self
            .conn
            .call(move |conn| conn.execute(&sql, params![query_hash]))
            .await?;
        Ok(deleted > 0)
    }

    async fn live_entries_for_intent(
        &self,
        intent: &str,
        now: i64,
    ) -> Result<Vec<CacheEntry>, FinsightError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE intent = ?1 AND created_at + cache_ttl > ?2
             ORDER BY created_at DESC, rowid DESC",
            self.query_table
        );
        let intent = intent.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![intent, now], read_entry_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let entries = rows
            .into_iter()
            .filter_map(|row| {
                let query_hash = row.query_hash.clone();
                match row.decode() {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable cache entry {}: {}", query_hash, e);
                        None
                    }
                }
            })
            .collect();

        Ok(entries)
    }

    async fn count_live(&self, now: i64) -> Result<usize, FinsightError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE created_at + cache_ttl > ?1",
            self.query_table
        );
        let count: i64 = self
            .conn
            .call(move |conn| conn.query_row(&sql, params![now], |row| row.get(0)))
            .await?;
        Ok(count as usize)
    }

    async fn intent_distribution(&self, now: i64) -> Result<BTreeMap<String, usize>, FinsightError> {
        let sql = format!(
            "SELECT intent, COUNT(*) FROM {} WHERE created_at + cache_ttl > ?1 GROUP BY intent",
            self.query_table
        );
        let rows: Vec<(String, i64)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![now], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(intent, count)| (intent, count as usize))
            .collect())
    }

    async fn created_range(&self, now: i64) -> Result<Option<(i64, i64)>, FinsightError> {
        let sql = format!(
            "SELECT MIN(created_at), MAX(created_at) FROM {} WHERE created_at + cache_ttl > ?1",
            self.query_table
        );
        let (oldest, newest): (Option<i64>, Option<i64>) = self
            .conn
            .call(move |conn| {
                conn.query_row(&sql, params![now], |row| Ok((row.get(0)?, row.get(1)?)))
            })
            .await?;
        Ok(oldest.zip(newest))
    }

    async fn delete_created_before(&self, cutoff: i64) -> Result<usize, FinsightError> {
        let sql = format!("DELETE FROM {} WHERE created_at < ?1", self.query_table);
        self.execute(sql, cutoff).await
    }

    async fn delete_expired(&self, now: i64) -> Result<usize, FinsightError> {
        let sql = format!(
            "DELETE FROM {} WHERE created_at + cache_ttl <= ?1",
            self.query_table
        );
        self.execute(sql, now).await
    }

    async fn close(&self) -> Result<(), FinsightError> {
        self.close_connection().await
    }
}

#[async_trait]
impl VideoStore for SqliteStore {
    async fn find_video(&self, video_hash: &str) -> Result<Option<VideoCacheEntry>, FinsightError> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM {} WHERE video_hash = ?1",
            self.video_table
        );
        let video_hash = video_hash.to_string();
        let row = self
            .conn
            .call(move |conn| {
                conn.query_row(&sql, params![video_hash], read_video_row)
                    .optional()
            })
            .await?;

        row.map(VideoRow::decode).transpose()
    }

    async fn upsert_video(&self, entry: &VideoCacheEntry) -> Result<(), FinsightError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({VIDEO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            self.video_table
        );
        let video_info = compress_json(&entry.video_info)?;
        let transcript = compress_json(&entry.transcript)?;
        let analysis = compress_json(&entry.analysis)?;
        let video_hash = entry.video_hash.clone();
        let video_url = entry.video_url.clone();
        let metadata = entry.metadata.clone();
        let created_at = entry.created_at;
        let cache_ttl = to_sql_int(entry.cache_ttl);

        self.conn
            .call(move |conn| {
                conn.execute(
                    &sql,
                    params![
                        video_hash,
                        video_url,
                        video_info,
                        transcript,
                        analysis,
                        metadata.title,
                        metadata.channel,
                        metadata.duration,
                        to_sql_int(metadata.view_count),
                        to_sql_int(metadata.transcript_length),
                        to_sql_int(metadata.word_count),
                        created_at,
                        cache_ttl
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn delete_video(&self, video_hash: &str) -> Result<bool, FinsightError> {
        let sql = format!("DELETE FROM {} WHERE video_hash = ?1", self.video_table);
        let video_hash = video_hash.to_string();
        let deleted = self
            .conn
            .call(move |conn| conn.execute(&sql, params![video_hash]))
            .await?;
        Ok(deleted > 0)
    }

    async fn live_videos(&self, now: i64) -> Result<Vec<VideoCacheEntry>, FinsightError> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM {} WHERE created_at + cache_ttl > ?1
             ORDER BY created_at DESC, rowid DESC",
            self.video_table
        );
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![now], read_video_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let videos = rows
            .into_iter()
            .filter_map(|row| {
                let video_hash = row.video_hash.clone();
                match row.decode() {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable video entry {}: {}", video_hash, e);
                        None
                    }
                }
            })
            .collect();

        Ok(videos)
    }

    async fn delete_videos_created_before(&self, cutoff: i64) -> Result<usize, FinsightError> {
        let sql = format!("DELETE FROM {} WHERE created_at < ?1", self.video_table);
        self.execute(sql, cutoff).await
    }

    async fn delete_expired_videos(&self, now: i64) -> Result<usize, FinsightError> {
        let sql = format!(
            "DELETE FROM {} WHERE created_at + cache_ttl <= ?1",
            self.video_table
        );
        self.execute(sql, now).await
    }

    async fn close(&self) -> Result<(), FinsightError> {
        self.close_connection().await
    }
}
