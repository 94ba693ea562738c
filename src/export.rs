use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::record::CommentRecord;

const HEADER: [&str; 6] = ["Created On", "Title", "Score", "Text", "Comments", "URL"];
const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One flattened CSV row per stored post.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub created_on: String,
    pub title: String,
    pub score: i64,
    pub text: String,
    pub comments: String,
    pub url: String,
}

/// `"<text> (Likes: <score>)"` joined with `" | "`.
pub fn flatten_comments(comments: &[CommentRecord]) -> String {
    comments
        .iter()
        .map(|c| format!("{} (Likes: {})", c.text, c.score))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn export(conn: &Connection, community: &str) -> Result<Vec<ExportRow>> {
    let rows = db::fetch_by_community(conn, community)?
        .into_iter()
        .map(|r| ExportRow {
            created_on: r.created_at.format(CREATED_FORMAT).to_string(),
            comments: flatten_comments(&r.comments),
            title: r.title,
            score: r.score,
            text: r.body,
            url: r.url,
        })
        .collect();
    Ok(rows)
}

/// Quote only when the field contains a delimiter, a quote or a line break.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

fn write_record<W: Write>(w: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(w, "{}", line)
}

pub fn write_csv(path: &Path, rows: &[ExportRow]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);

    write_record(&mut w, &HEADER)?;
    for r in rows {
        let score = r.score.to_string();
        write_record(
            &mut w,
            &[&r.created_on, &r.title, &score, &r.text, &r.comments, &r.url].map(String::as_str),
        )?;
    }
    w.flush()?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Export one community to `<out_dir>/<community>.csv`.
/// Returns `None` when nothing is stored for it.
pub fn export_community(conn: &Connection, community: &str, out_dir: &Path) -> Result<Option<(usize, PathBuf)>> {
    let rows = export(conn, community)?;
    if rows.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join(format!("{}.csv", community));
    write_csv(&path, &rows)?;
    Ok(Some((rows.len(), path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{memory, record};
    use crate::db::RecordStore;

    #[test]
    fn flatten_single() {
        let c = vec![CommentRecord {
            text: "nice".into(),
            score: 5,
        }];
        assert_eq!(flatten_comments(&c), "nice (Likes: 5)");
    }

    #[test]
    fn flatten_empty() {
        assert_eq!(flatten_comments(&[]), "");
    }

    #[test]
    fn flatten_many_keeps_order() {
        let c = vec![
            CommentRecord { text: "a".into(), score: 3 },
            CommentRecord { text: "b".into(), score: 1 },
        ];
        assert_eq!(flatten_comments(&c), "a (Likes: 3) | b (Likes: 1)");
    }

    #[test]
    fn quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn rows_from_store() {
        let conn = memory();
        conn.insert(&record("Bitcoin", "halving", &[("nice", 5)])).unwrap();
        conn.insert(&record("Bitcoin", "empty", &[])).unwrap();

        let rows = export(&conn, "Bitcoin").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_on, "2024-11-20 06:30:00");
        assert_eq!(rows[0].comments, "nice (Likes: 5)");
        assert_eq!(rows[0].score, 120);
        assert_eq!(rows[1].comments, "");
    }

    #[test]
    fn writes_community_file() {
        let conn = memory();
        let mut r = record("Bitcoin", "halving", &[("to the moon, again", 5)]);
        r.body = "line one\nline two".into();
        conn.insert(&r).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let (n, path) = export_community(&conn, "Bitcoin", dir.path()).unwrap().unwrap();
        assert_eq!(n, 1);
        assert_eq!(path, dir.path().join("Bitcoin.csv"));

        let csv = std::fs::read_to_string(&path).unwrap();
        let expected = "Created On,Title,Score,Text,Comments,URL\n\
            2024-11-20 06:30:00,halving,120,\"line one\nline two\",\"to the moon, again (Likes: 5)\",https://example.com/halving\n";
        assert_eq!(csv, expected);
    }

    #[test]
    fn no_records_no_file() {
        let conn = memory();
        let dir = tempfile::tempdir().unwrap();
        assert!(export_community(&conn, "dogecoin", dir.path()).unwrap().is_none());
        assert!(!dir.path().join("dogecoin.csv").exists());
    }
}
