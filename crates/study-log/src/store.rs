use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use study_core::{sanitize_participant_id, Event, LogStream};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::csv::encode_record;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to create log directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type LogResult<T> = std::result::Result<T, LogError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub saved: usize,
    pub failed: usize,
}

/// Append-only per-participant CSV logs.
///
/// Each participant gets one file per [`LogStream`], named
/// `<participant>.csv`. Appends to the same file are serialized through a
/// per-file async mutex, so the "is this file new" check, the optional header
/// and the row are written as one critical section. Share a single logger per
/// process (behind an `Arc`); two loggers over the same directory do not
/// coordinate.
#[derive(Debug)]
pub struct EventLogger {
    visits_dir: PathBuf,
    conversation_dir: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl EventLogger {
    pub fn new(visits_dir: impl AsRef<Path>, conversation_dir: impl AsRef<Path>) -> Self {
        Self {
            visits_dir: visits_dir.as_ref().to_path_buf(),
            conversation_dir: conversation_dir.as_ref().to_path_buf(),
            locks: DashMap::new(),
        }
    }

    /// Create both log directories if absent.
    pub async fn init(&self) -> LogResult<()> {
        for dir in [&self.visits_dir, &self.conversation_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| LogError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn log_path(&self, stream: LogStream, participant_id: &str) -> PathBuf {
        let dir = match stream {
            LogStream::Visits => &self.visits_dir,
            LogStream::Conversation => &self.conversation_dir,
        };
        dir.join(format!("{}.csv", sanitize_participant_id(participant_id)))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Durably append one event, writing the header first if the file is new.
    pub async fn append(&self, event: &Event) -> LogResult<()> {
        let stream = event.kind.stream();
        let path = self.log_path(stream, &event.participant_id);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        let write_err = |source| LogError::Write {
            path: path.clone(),
            source,
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        let is_new = file.metadata().await.map_err(write_err)?.len() == 0;

        let mut buf = String::new();
        if is_new {
            buf.push_str(&encode_record(stream.header()));
        }
        buf.push_str(&encode_record(&event.row()));

        file.write_all(buf.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(())
    }

    /// Append each event independently; one failure does not stop the rest.
    pub async fn append_batch(&self, events: &[Event]) -> BatchReport {
        let mut report = BatchReport::default();
        for event in events {
            match self.append(event).await {
                Ok(()) => report.saved += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!("[{}] Dropping {} event: {}", event.participant_id, event.kind.as_str(), e);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use study_core::EventKind;

    async fn logger_in(dir: &Path) -> EventLogger {
        let logger = EventLogger::new(dir.join("visits"), dir.join("chat"));
        logger.init().await.expect("init");
        logger
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .expect("log file")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn first_append_writes_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path()).await;

        logger
            .append(&Event::url_visit("P1", "t1", "http://x", "Q1", "ext"))
            .await
            .unwrap();

        let path = dir.path().join("visits").join("P1.csv");
        assert_eq!(
            read_lines(&path),
            vec!["timestamp_iso,url,question_id,source", "t1,http://x,Q1,ext"]
        );
    }

    #[tokio::test]
    async fn n_appends_yield_one_header_and_n_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path()).await;

        for i in 0..5 {
            logger
                .append(&Event::url_visit("P2", format!("t{i}"), "http://x", "Q1", "new_tab"))
                .await
                .unwrap();
        }

        let lines = read_lines(&logger.log_path(LogStream::Visits, "P2"));
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "timestamp_iso,url,question_id,source");
        for (i, line) in lines[1..].iter().enumerate() {
            assert_eq!(line, &format!("t{i},http://x,Q1,new_tab"));
        }
    }

    #[tokio::test]
    async fn concurrent_appends_never_duplicate_header_or_split_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(logger_in(dir.path()).await);

        let tasks: Vec<_> = (0..2)
            .flat_map(|writer| {
                let logger = Arc::clone(&logger);
                (0..50).map(move |i| {
                    let logger = Arc::clone(&logger);
                    tokio::spawn(async move {
                        let url = format!("http://writer{writer}/page{i}");
                        logger
                            .append(&Event::url_visit("P3", "ts", url, "Q1", "same_tab"))
                            .await
                    })
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.expect("task").expect("append");
        }

        let lines = read_lines(&logger.log_path(LogStream::Visits, "P3"));
        assert_eq!(lines.len(), 101);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp_iso")).count(), 1);
        for line in &lines[1..] {
            let cols: Vec<&str> = line.split(',').collect();
            assert_eq!(cols.len(), 4, "malformed row: {line}");
            assert!(cols[1].starts_with("http://writer"));
        }
    }

    #[tokio::test]
    async fn chat_events_go_to_conversation_log() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path()).await;
        let payload = json!({"text": "hello, there", "q": "Q1"});

        logger
            .append(&Event::now("P4", EventKind::ChatUser, payload.as_object().unwrap().clone()))
            .await
            .unwrap();

        assert!(!logger.log_path(LogStream::Visits, "P4").exists());
        let content = std::fs::read_to_string(dir.path().join("chat").join("P4.csv")).unwrap();
        assert!(content.starts_with("timestamp_iso,kind,question_id,payload\r\n"));
        assert!(content.contains(",chat_user,Q1,"));
    }

    #[tokio::test]
    async fn batch_counts_partial_success() {
        let dir = tempfile::tempdir().unwrap();
        // Conversation directory is never created, so chat events fail.
        let visits = dir.path().join("visits");
        std::fs::create_dir_all(&visits).unwrap();
        let logger = EventLogger::new(&visits, dir.path().join("missing").join("chat"));

        let events = vec![
            Event::url_visit("P5", "t1", "http://a", "Q1", "ext"),
            Event::now("P5", EventKind::ChatUser, Map::new()),
            Event::url_visit("P5", "t2", "http://b", "Q1", "ext"),
        ];

        let report = logger.append_batch(&events).await;

        assert_eq!(report, BatchReport { saved: 2, failed: 1 });
        assert_eq!(read_lines(&visits.join("P5.csv")).len(), 3);
    }

    #[tokio::test]
    async fn participant_ids_cannot_escape_the_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path()).await;

        let path = logger.log_path(LogStream::Visits, "../escape");

        assert_eq!(path.parent().unwrap(), dir.path().join("visits"));
    }

    #[tokio::test]
    async fn existing_file_gets_no_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let first = logger_in(dir.path()).await;
        first
            .append(&Event::url_visit("P6", "t1", "http://a", "Q1", "ext"))
            .await
            .unwrap();
        drop(first);

        // A restarted process sees the file on disk and only appends rows.
        let second = logger_in(dir.path()).await;
        second
            .append(&Event::url_visit("P6", "t2", "http://b", "Q1", "ext"))
            .await
            .unwrap();

        let lines = read_lines(&second.log_path(LogStream::Visits, "P6"));
        assert_eq!(lines.len(), 3);
    }
}
