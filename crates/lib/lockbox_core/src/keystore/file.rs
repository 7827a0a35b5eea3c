//! Append-only key-custody file.
//!
//! One line per identity: `{id} {base64 key} {base64 iv}`. The file is read
//! once into an in-memory index at open; afterwards lines are only ever
//! appended. A single process owns the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use super::KeyCustody;
use crate::auth::AuthError;
use crate::ids::IdentityId;
use crate::models::keys::{EnvelopeKey, IV_SIZE, KEY_SIZE};

/// Key custody backed by an append-only text file.
#[derive(Debug)]
pub struct FileKeyCustody {
    path: PathBuf,
    // Held across the append so check-then-write is atomic per process.
    keys: Mutex<HashMap<IdentityId, EnvelopeKey>>,
}

impl FileKeyCustody {
    /// Open (or lazily create) the custody file at `path` and index it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let keys = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), keys = keys.len(), "key custody file opened");
        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyCustody for FileKeyCustody {
    async fn get(&self, identity_id: IdentityId) -> Result<Option<EnvelopeKey>, AuthError> {
        Ok(self.keys.lock().await.get(&identity_id).cloned())
    }

    async fn create(&self, key: &EnvelopeKey) -> Result<(), AuthError> {
        let mut keys = self.keys.lock().await;
        if keys.contains_key(&key.identity_id) {
            return Err(AuthError::KeyAlreadyProvisioned(key.identity_id));
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await?;
        file.write_all(format_line(key).as_bytes()).await?;
        file.sync_data().await?;

        keys.insert(key.identity_id, key.clone());
        Ok(())
    }
}

fn format_line(key: &EnvelopeKey) -> String {
    format!(
        "{} {} {}\n",
        key.identity_id,
        STANDARD.encode(key.key),
        STANDARD.encode(key.iv)
    )
}

fn parse(contents: &str) -> Result<HashMap<IdentityId, EnvelopeKey>, AuthError> {
    let mut keys = HashMap::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let key = parse_line(line).map_err(|reason| {
            AuthError::CorruptRecord(format!("key custody line {}: {reason}", index + 1))
        })?;
        if keys.contains_key(&key.identity_id) {
            return Err(AuthError::CorruptRecord(format!(
                "key custody line {}: second key for identity {}",
                index + 1,
                key.identity_id
            )));
        }
        keys.insert(key.identity_id, key);
    }
    Ok(keys)
}

fn parse_line(line: &str) -> Result<EnvelopeKey, String> {
    let mut parts = line.split_whitespace();
    let (Some(id), Some(key), Some(iv), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected three space-separated fields".into());
    };

    let identity_id = id
        .parse::<IdentityId>()
        .map_err(|e| format!("bad identity id: {e}"))?;
    let key: [u8; KEY_SIZE] = STANDARD
        .decode(key)
        .map_err(|e| format!("bad key encoding: {e}"))?
        .try_into()
        .map_err(|_| format!("key is not {KEY_SIZE} bytes"))?;
    let iv: [u8; IV_SIZE] = STANDARD
        .decode(iv)
        .map_err(|e| format!("bad iv encoding: {e}"))?
        .try_into()
        .map_err(|_| format!("iv is not {IV_SIZE} bytes"))?;

    Ok(EnvelopeKey {
        identity_id,
        key,
        iv,
    })
}
