use crate::domain::ports::SnapshotStore;
use crate::domain::receipt::PaymentReceipt;
use crate::domain::user::User;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const USERS_FILE: &str = "users.txt";
pub const WITHDRAWALS_FILE: &str = "withdrawals.txt";
pub const RECEIPTS_FILE: &str = "receipts.txt";

/// Flat-file snapshot storage: one pretty-printed JSON array per collection
/// under a data directory.
///
/// Writes go to a temporary sibling first and are renamed over the target,
/// so the durable file is replaced atomically or not at all. Reads tolerate
/// missing files, empty files, individually corrupt records, and fully
/// corrupt files (quarantined under a timestamped backup name).
#[derive(Debug, Clone)]
pub struct FileSnapshots {
    dir: PathBuf,
}

impl FileSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    async fn save_collection<T: Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        let target = self.path(file);
        let temp = self.dir.join(format!("{file}.tmp"));

        let result: Result<()> = async {
            let json = serde_json::to_string_pretty(records)?;
            tokio::fs::write(&temp, json).await?;
            tokio::fs::rename(&temp, &target).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(file, records = records.len(), "snapshot saved");
                Ok(())
            }
            Err(err) => {
                // Never leave a partial temp artifact next to the good file.
                let _ = tokio::fs::remove_file(&temp).await;
                error!(file, %err, "failed to save snapshot");
                Err(err)
            }
        }
    }

    async fn load_collection<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let target = self.path(file);
        if !target.exists() {
            return Ok(Vec::new());
        }

        let data = match tokio::fs::read_to_string(&target).await {
            Ok(data) => data,
            Err(err) => {
                error!(file, %err, "failed to read snapshot; starting empty");
                return Ok(Vec::new());
            }
        };
        if data.trim().is_empty() {
            info!(file, "snapshot file empty; starting empty");
            return Ok(Vec::new());
        }

        let parsed: serde_json::Value = match serde_json::from_str(&data) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(file, %err, "snapshot unparseable; quarantining and starting empty");
                self.quarantine(&target, file).await;
                return Ok(Vec::new());
            }
        };
        let serde_json::Value::Array(items) = parsed else {
            // Parsed but not a collection: keep defaults, no partial load.
            error!(file, "snapshot has unexpected top-level shape; starting empty");
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<T>(item) {
                Ok(record) => records.push(record),
                Err(err) => warn!(file, %err, "skipping undecodable snapshot record"),
            }
        }
        info!(file, records = records.len(), "snapshot loaded");
        Ok(records)
    }

    /// Copies a corrupt snapshot aside so it can be inspected later. The
    /// corrupt file stays in place; the next save replaces it.
    async fn quarantine(&self, target: &Path, file: &str) {
        let backup = self
            .dir
            .join(format!("{file}.backup.{}", Utc::now().timestamp_millis()));
        match tokio::fs::copy(target, &backup).await {
            Ok(_) => info!(file, backup = %backup.display(), "corrupt snapshot backed up"),
            Err(err) => error!(file, %err, "failed to back up corrupt snapshot"),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshots {
    async fn save_users(&self, users: &[User]) -> Result<()> {
        self.save_collection(USERS_FILE, users).await
    }

    async fn load_users(&self) -> Result<Vec<User>> {
        self.load_collection(USERS_FILE).await
    }

    async fn save_withdrawals(&self, withdrawals: &[WithdrawalRequest]) -> Result<()> {
        self.save_collection(WITHDRAWALS_FILE, withdrawals).await
    }

    async fn load_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        self.load_collection(WITHDRAWALS_FILE).await
    }

    async fn save_receipts(&self, receipts: &[PaymentReceipt]) -> Result<()> {
        self.save_collection(RECEIPTS_FILE, receipts).await
    }

    async fn load_receipts(&self) -> Result<Vec<PaymentReceipt>> {
        self.load_collection(RECEIPTS_FILE).await
    }
}
