use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::PersistenceError;
use crate::record::{CommentRecord, PostRecord};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id           INTEGER PRIMARY KEY,
            collected_at TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            community    TEXT NOT NULL,
            title        TEXT NOT NULL,
            url          TEXT NOT NULL,
            score        INTEGER NOT NULL,
            body         TEXT NOT NULL,
            comments     TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_posts_community ON posts(community);
        ",
    )?;
    Ok(())
}

// ── Writing ──

/// Append-only sink for assembled records.
pub trait RecordStore {
    fn insert(&self, record: &PostRecord) -> Result<i64, PersistenceError>;
}

impl RecordStore for Connection {
    fn insert(&self, record: &PostRecord) -> Result<i64, PersistenceError> {
        insert_post(self, record)
    }
}

/// One INSERT per record; comments ride along as a JSON array.
pub fn insert_post(conn: &Connection, r: &PostRecord) -> Result<i64, PersistenceError> {
    let comments = serde_json::to_string(&r.comments)?;
    conn.execute(
        "INSERT INTO posts (collected_at, created_at, community, title, url, score, body, comments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            r.collected_at, r.created_at, r.community, r.title, r.url, r.score, r.body, comments,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Reading ──

struct PostRow {
    collected_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    community: String,
    title: String,
    url: String,
    score: i64,
    body: String,
    comments: String,
}

/// All records for a community, in insertion order.
pub fn fetch_by_community(conn: &Connection, community: &str) -> Result<Vec<PostRecord>> {
    let mut stmt = conn.prepare(
        "SELECT collected_at, created_at, community, title, url, score, body, comments
         FROM posts
         WHERE community = ?1
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([community], |row| {
            Ok(PostRow {
                collected_at: row.get(0)?,
                created_at: row.get(1)?,
                community: row.get(2)?,
                title: row.get(3)?,
                url: row.get(4)?,
                score: row.get(5)?,
                body: row.get(6)?,
                comments: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|r| {
            let comments: Vec<CommentRecord> = serde_json::from_str(&r.comments)
                .with_context(|| format!("Bad comments document on post {:?}", r.title))?;
            Ok(PostRecord {
                collected_at: r.collected_at,
                created_at: r.created_at,
                community: r.community,
                title: r.title,
                url: r.url,
                score: r.score,
                body: r.body,
                comments,
            })
        })
        .collect()
}

// ── Stats ──

pub struct CommunityStats {
    pub community: String,
    pub posts: usize,
    pub comments: usize,
    pub last_collected: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Vec<CommunityStats>> {
    let mut stmt = conn.prepare(
        "SELECT community, COUNT(*), COALESCE(SUM(json_array_length(comments)), 0), MAX(collected_at)
         FROM posts
         GROUP BY community
         ORDER BY community",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CommunityStats {
                community: row.get(0)?,
                posts: row.get(1)?,
                comments: row.get(2)?,
                last_collected: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    pub(crate) fn record(community: &str, title: &str, comments: &[(&str, i64)]) -> PostRecord {
        PostRecord {
            collected_at: Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 11, 20, 6, 30, 0).unwrap(),
            community: community.into(),
            title: title.into(),
            url: format!("https://example.com/{}", title),
            score: 120,
            body: "body".into(),
            comments: comments
                .iter()
                .map(|(t, s)| CommentRecord {
                    text: t.to_string(),
                    score: *s,
                })
                .collect(),
        }
    }

    #[test]
    fn insert_then_fetch_by_community() {
        let conn = memory();
        let a = record("Bitcoin", "a", &[("gm", 5), ("wagmi", 9)]);
        let b = record("dogecoin", "b", &[]);
        let c = record("Bitcoin", "c", &[]);
        for r in [&a, &b, &c] {
            conn.insert(r).unwrap();
        }

        let got = fetch_by_community(&conn, "Bitcoin").unwrap();
        assert_eq!(got, vec![a, c]);
        assert!(fetch_by_community(&conn, "ethereum").unwrap().is_empty());
    }

    #[test]
    fn partial_comment_documents_default() {
        let conn = memory();
        conn.execute(
            "INSERT INTO posts (collected_at, created_at, community, title, url, score, body, comments)
             VALUES ('2024-11-20 08:00:00+00:00', '2024-11-20 06:30:00+00:00', 'Bitcoin', 't', 'u', 1, 'b', '[{\"score\": 4}]')",
            [],
        )
        .unwrap();
        let got = fetch_by_community(&conn, "Bitcoin").unwrap();
        assert_eq!(got[0].comments[0].text, "No Comment");
        assert_eq!(got[0].comments[0].score, 4);
    }

    #[test]
    fn stats_per_community() {
        let conn = memory();
        conn.insert(&record("Bitcoin", "a", &[("x", 1), ("y", 2)])).unwrap();
        conn.insert(&record("Bitcoin", "b", &[("z", 3)])).unwrap();
        conn.insert(&record("dogecoin", "c", &[])).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].community.as_str(), stats[0].posts, stats[0].comments), ("Bitcoin", 2, 3));
        assert_eq!((stats[1].community.as_str(), stats[1].posts, stats[1].comments), ("dogecoin", 1, 0));
        assert!(stats[0].last_collected.is_some());
    }

    #[test]
    fn connect_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/reddit.sqlite");
        let conn = connect(&path).unwrap();
        init_schema(&conn).unwrap();
        assert!(path.exists());
    }
}
