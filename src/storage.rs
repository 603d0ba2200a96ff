//! JSON-file store
//!
//! One JSON file per collection under the data directory, mirroring the
//! flat-file layout the service inherited (`users.json`, `messages.json`,
//! `tasks.json`, `quiz_scores.json`, `dna.json`). Every mutation is a
//! read-modify-rewrite of the whole file; writes go to a temp file first and
//! are renamed into place, and a store-wide mutex serializes the cycles so
//! concurrent handlers cannot interleave them.

use crate::config::MESSAGE_LOG_CAP;
use crate::dna::DnaState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A known Telegram user, upserted on every incoming update
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub message_count: u64,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Per-update snapshot appended to the capped message log
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRecord {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A scheduled reminder
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskRecord {
    pub id: uuid::Uuid,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
    pub due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub done: bool,
}

/// Per-user quiz tally
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuizScore {
    pub user_id: i64,
    pub name: String,
    pub asked: u64,
    pub correct: u64,
}

/// Identity fields extracted from an incoming update, used for upserts
#[derive(Debug, Clone)]
pub struct UserSeen {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// Collection counts for the stats endpoints
#[derive(Debug, Serialize, Default)]
pub struct StoreCounts {
    pub users: usize,
    pub messages: usize,
    pub pending_tasks: usize,
    pub quiz_players: usize,
}

const USERS_FILE: &str = "users.json";
const MESSAGES_FILE: &str = "messages.json";
const TASKS_FILE: &str = "tasks.json";
const QUIZ_SCORES_FILE: &str = "quiz_scores.json";
const DNA_FILE: &str = "dna.json";

/// Flat-file JSON store rooted at a data directory
pub struct JsonStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles across all collections
    lock: Mutex<()>,
}

impl JsonStore {
    /// Open (and create if missing) the store directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("JSON store opened at {}", dir.display());
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load a collection, returning `None` when the file does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, StorageError> {
        let path = self.path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save a collection atomically (temp file + rename)
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    async fn save_json<T: Serialize + Sync>(
        &self,
        name: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(data)?;
        let path = self.path(name);
        let tmp = tmp_path(&path);
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Modify a collection under the store lock using a closure
    ///
    /// # Errors
    ///
    /// Returns an error if loading or saving fails.
    async fn modify<T, F, R>(&self, name: &str, modifier: F) -> Result<R, StorageError>
    where
        T: serde::de::DeserializeOwned + Serialize + Default + Sync,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.lock.lock().await;
        let mut data: T = self.load_json(name).await?.unwrap_or_default();
        let out = modifier(&mut data);
        self.save_json(name, &data).await?;
        Ok(out)
    }

    // --- Users ---

    /// Upsert a user on an incoming update and bump its message counter
    ///
    /// # Errors
    ///
    /// Returns an error if the users file cannot be updated.
    pub async fn record_user(&self, seen: &UserSeen, is_admin: bool) -> Result<(), StorageError> {
        let seen = seen.clone();
        self.modify(USERS_FILE, move |users: &mut Vec<UserRecord>| {
            let now = Utc::now();
            if let Some(existing) = users.iter_mut().find(|u| u.id == seen.id) {
                existing.username = seen.username;
                existing.first_name = seen.first_name;
                existing.last_name = seen.last_name;
                existing.message_count += 1;
                existing.last_seen = now;
                existing.is_admin = is_admin;
            } else {
                users.push(UserRecord {
                    id: seen.id,
                    username: seen.username,
                    first_name: seen.first_name,
                    last_name: seen.last_name,
                    message_count: 1,
                    last_seen: now,
                    is_admin,
                });
            }
        })
        .await
    }

    /// All known users
    ///
    /// # Errors
    ///
    /// Returns an error if the users file cannot be read.
    pub async fn users(&self) -> Result<Vec<UserRecord>, StorageError> {
        Ok(self.load_json(USERS_FILE).await?.unwrap_or_default())
    }

    // --- Message log ---

    /// Append to the message log, dropping the oldest entries beyond the cap
    ///
    /// # Errors
    ///
    /// Returns an error if the message log cannot be updated.
    pub async fn append_message(&self, record: MessageRecord) -> Result<(), StorageError> {
        self.modify(MESSAGES_FILE, move |log: &mut Vec<MessageRecord>| {
            log.push(record);
            if log.len() > MESSAGE_LOG_CAP {
                let excess = log.len() - MESSAGE_LOG_CAP;
                log.drain(..excess);
            }
        })
        .await
    }

    /// Current message log length
    ///
    /// # Errors
    ///
    /// Returns an error if the message log cannot be read.
    pub async fn message_count(&self) -> Result<usize, StorageError> {
        let log: Vec<MessageRecord> = self.load_json(MESSAGES_FILE).await?.unwrap_or_default();
        Ok(log.len())
    }

    // --- Tasks ---

    /// Persist a new reminder task
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks file cannot be updated.
    pub async fn add_task(&self, task: TaskRecord) -> Result<(), StorageError> {
        self.modify(TASKS_FILE, move |tasks: &mut Vec<TaskRecord>| {
            tasks.push(task);
        })
        .await
    }

    /// Pending (not yet fired) tasks
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks file cannot be read.
    pub async fn pending_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        let tasks: Vec<TaskRecord> = self.load_json(TASKS_FILE).await?.unwrap_or_default();
        Ok(tasks.into_iter().filter(|t| !t.done).collect())
    }

    /// Pending tasks whose due time has passed
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks file cannot be read.
    pub async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>, StorageError> {
        Ok(self
            .pending_tasks()
            .await?
            .into_iter()
            .filter(|t| t.due <= now)
            .collect())
    }

    /// Mark a task done after its reminder was delivered
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks file cannot be updated.
    pub async fn complete_task(&self, id: uuid::Uuid) -> Result<(), StorageError> {
        self.modify(TASKS_FILE, move |tasks: &mut Vec<TaskRecord>| {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.done = true;
            }
        })
        .await
    }

    // --- Quiz scores ---

    /// Record a quiz answer for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the scores file cannot be updated.
    pub async fn record_quiz_answer(
        &self,
        user_id: i64,
        name: &str,
        correct: bool,
    ) -> Result<QuizScore, StorageError> {
        let name = name.to_string();
        self.modify(QUIZ_SCORES_FILE, move |scores: &mut Vec<QuizScore>| {
            let idx = match scores.iter().position(|s| s.user_id == user_id) {
                Some(idx) => idx,
                None => {
                    scores.push(QuizScore {
                        user_id,
                        name: name.clone(),
                        asked: 0,
                        correct: 0,
                    });
                    scores.len() - 1
                }
            };
            let entry = &mut scores[idx];
            entry.name = name;
            entry.asked += 1;
            if correct {
                entry.correct += 1;
            }
            entry.clone()
        })
        .await
    }

    /// All quiz scores, best first
    ///
    /// # Errors
    ///
    /// Returns an error if the scores file cannot be read.
    pub async fn quiz_scores(&self) -> Result<Vec<QuizScore>, StorageError> {
        let mut scores: Vec<QuizScore> = self.load_json(QUIZ_SCORES_FILE).await?.unwrap_or_default();
        scores.sort_by(|a, b| b.correct.cmp(&a.correct).then(a.asked.cmp(&b.asked)));
        Ok(scores)
    }

    // --- DNA ---

    /// Apply a mutation to the persisted DNA state and return the new state
    ///
    /// # Errors
    ///
    /// Returns an error if the DNA file cannot be updated.
    pub async fn modify_dna<F>(&self, modifier: F) -> Result<DnaState, StorageError>
    where
        F: FnOnce(&mut DnaState),
    {
        self.modify(DNA_FILE, move |dna: &mut DnaState| {
            modifier(dna);
            dna.clone()
        })
        .await
    }

    /// Current DNA state
    ///
    /// # Errors
    ///
    /// Returns an error if the DNA file cannot be read.
    pub async fn dna(&self) -> Result<DnaState, StorageError> {
        Ok(self.load_json(DNA_FILE).await?.unwrap_or_default())
    }

    // --- Stats ---

    /// Collection counts for the health/stats surfaces
    ///
    /// # Errors
    ///
    /// Returns an error if any collection cannot be read.
    pub async fn counts(&self) -> Result<StoreCounts, StorageError> {
        Ok(StoreCounts {
            users: self.users().await?.len(),
            messages: self.message_count().await?,
            pending_tasks: self.pending_tasks().await?.len(),
            quiz_players: self.quiz_scores().await?.len(),
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_store() -> (JsonStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("railbot-store-{}", uuid::Uuid::new_v4()));
        let store = JsonStore::open(&dir).expect("create store dir");
        (store, dir)
    }

    fn seen(id: i64, first_name: &str) -> UserSeen {
        UserSeen {
            id,
            username: Some(format!("user{id}")),
            first_name: first_name.to_string(),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_user_upsert_deduplicates_and_counts() -> Result<(), StorageError> {
        let (store, dir) = test_store();

        store.record_user(&seen(1, "Alice"), false).await?;
        store.record_user(&seen(1, "Alice"), false).await?;
        store.record_user(&seen(2, "Bob"), true).await?;

        let users = store.users().await?;
        assert_eq!(users.len(), 2);
        let alice = users.iter().find(|u| u.id == 1).expect("alice present");
        assert_eq!(alice.message_count, 2);
        assert!(!alice.is_admin);
        let bob = users.iter().find(|u| u.id == 2).expect("bob present");
        assert!(bob.is_admin);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[tokio::test]
    async fn test_message_log_is_capped() -> Result<(), StorageError> {
        let (store, dir) = test_store();

        // The cap applies per append, so preload a full log directly.
        let log: Vec<MessageRecord> = (0..MESSAGE_LOG_CAP as i64)
            .map(|i| MessageRecord {
                update_id: i,
                chat_id: 7,
                user_id: 7,
                text: None,
                timestamp: Utc::now(),
            })
            .collect();
        store.save_json("messages.json", &log).await?;

        store
            .append_message(MessageRecord {
                update_id: 9999,
                chat_id: 7,
                user_id: 7,
                text: Some("newest".into()),
                timestamp: Utc::now(),
            })
            .await?;

        let stored: Vec<MessageRecord> = store
            .load_json("messages.json")
            .await?
            .expect("log present");
        assert_eq!(stored.len(), MESSAGE_LOG_CAP);
        // Oldest entry dropped, newest kept
        assert_eq!(stored.first().map(|m| m.update_id), Some(1));
        assert_eq!(stored.last().map(|m| m.update_id), Some(9999));

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[tokio::test]
    async fn test_task_lifecycle() -> Result<(), StorageError> {
        let (store, dir) = test_store();
        let now = Utc::now();

        let due_task = TaskRecord {
            id: uuid::Uuid::new_v4(),
            chat_id: 1,
            user_id: 1,
            text: "standup".into(),
            due: now - Duration::minutes(1),
            created_at: now,
            done: false,
        };
        let future_task = TaskRecord {
            id: uuid::Uuid::new_v4(),
            chat_id: 1,
            user_id: 1,
            text: "later".into(),
            due: now + Duration::hours(1),
            created_at: now,
            done: false,
        };
        store.add_task(due_task.clone()).await?;
        store.add_task(future_task).await?;

        let due = store.due_tasks(now).await?;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, due_task.id);

        store.complete_task(due_task.id).await?;
        assert!(store.due_tasks(now).await?.is_empty());
        assert_eq!(store.pending_tasks().await?.len(), 1);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[tokio::test]
    async fn test_quiz_scores_accumulate_and_sort() -> Result<(), StorageError> {
        let (store, dir) = test_store();

        store.record_quiz_answer(1, "Alice", true).await?;
        store.record_quiz_answer(1, "Alice", false).await?;
        store.record_quiz_answer(2, "Bob", true).await?;
        store.record_quiz_answer(2, "Bob", true).await?;

        let scores = store.quiz_scores().await?;
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].user_id, 2);
        assert_eq!(scores[0].correct, 2);
        assert_eq!(scores[1].asked, 2);
        assert_eq!(scores[1].correct, 1);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() -> Result<(), StorageError> {
        let (store, dir) = test_store();

        assert!(store.users().await?.is_empty());
        assert_eq!(store.message_count().await?, 0);
        assert!(store.pending_tasks().await?.is_empty());
        let counts = store.counts().await?;
        assert_eq!(counts.users, 0);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_tmp_path_keeps_directory() {
        let p = Path::new("/data/users.json");
        assert_eq!(tmp_path(p), Path::new("/data/users.json.tmp"));
    }
}
