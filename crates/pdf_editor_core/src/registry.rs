//! crates/pdf_editor_core/src/registry.rs
//!
//! The session registry: maps session ids to the documents being edited.
//!
//! Each record lives behind its own mutex. Pipeline operations hold that lock for
//! their whole duration, so mutations of one session are applied one at a time while
//! different sessions proceed independently.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::domain::SessionRecord;
use crate::error::{EditorError, EditorResult};
use crate::ports::{DocumentStore, PortError};
use crate::workspace::{has_pdf_extension, sanitize_filename, timestamp, Workspace};

/// Shared, lockable handle to one session.
pub type SessionHandle = Arc<Mutex<SessionRecord>>;

pub struct SessionRegistry {
    store: Arc<dyn DocumentStore>,
    workspace: Workspace,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, workspace: Workspace) -> Self {
        Self {
            store,
            workspace,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    //=====================================================================================
    // Session Lifecycle
    //=====================================================================================

    /// Registers an uploaded document and returns a snapshot of the new record.
    pub async fn create(&self, bytes: &[u8], display_name: &str) -> EditorResult<SessionRecord> {
        let filename = stored_filename(display_name)
            .ok_or_else(|| EditorError::InvalidDocument("Invalid file type".to_string()))?;

        let page_count = self.store.page_count(bytes).await.map_err(|e| match e {
            PortError::InvalidInput(msg) => EditorError::InvalidDocument(msg),
            other => EditorError::OperationFailed(other.to_string()),
        })?;

        let stem = &filename[..filename.len() - ".pdf".len()];
        let base_id = format!("{}_{}", timestamp(), stem);

        // The id is reserved under the write lock so concurrent uploads of the same
        // name within one second still get distinct ids.
        let mut sessions = self.sessions.write().await;
        let id = unique_id(&base_id, |candidate| sessions.contains_key(candidate));
        let source_path = self.workspace.upload_dir().join(format!("{id}.pdf"));
        fs::write(&source_path, bytes).await?;

        let record = SessionRecord::new(id.clone(), source_path, filename, page_count);
        sessions.insert(id.clone(), Arc::new(Mutex::new(record.clone())));

        info!(session_id = %id, page_count, "Created editing session");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> EditorResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EditorError::SessionNotFound(id.to_string()))
    }

    /// True while `handle` is still the registered handle for `id`. A request that
    /// waited on a session lock checks this before touching the session's files.
    pub async fn is_registered(&self, id: &str, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// A point-in-time copy of the record. Waits for in-flight mutations to finish.
    pub async fn snapshot(&self, id: &str) -> EditorResult<SessionRecord> {
        let handle = self.get(id).await?;
        let record = handle.lock().await;
        Ok(record.clone())
    }

    /// Forgets a session and removes its files.
    pub async fn destroy(&self, id: &str) -> EditorResult<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| EditorError::SessionNotFound(id.to_string()))?;
        let record = handle.lock().await;
        remove_session_files(&record).await;
        info!(session_id = %id, "Destroyed editing session");
        Ok(())
    }

    /// Destroys every session idle for longer than `ttl`. Sessions locked by an
    /// in-flight operation are skipped.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            for handle in sessions.values() {
                let Ok(record) = handle.clone().try_lock_owned() else {
                    continue;
                };
                let idle = (now - record.last_accessed_at)
                    .to_std()
                    .map(|age| age >= ttl)
                    .unwrap_or(false);
                if idle {
                    expired.push(record);
                }
            }
            for record in &expired {
                sessions.remove(&record.id);
            }
        }

        // The guards are held until the files are gone.
        for record in &expired {
            remove_session_files(record).await;
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), "Evicted idle sessions");
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// The sanitized name a session is stored under, or `None` when the upload is not a
/// `.pdf`. The extension is checked before sanitizing so names made only of
/// characters that sanitizing strips are still accepted.
fn stored_filename(display_name: &str) -> Option<String> {
    if !has_pdf_extension(display_name) {
        return None;
    }
    let stem = sanitize_filename(&display_name[..display_name.len() - ".pdf".len()]);
    let stem = stem.trim_end_matches('.');
    let stem = if stem.is_empty() { "document" } else { stem };
    Some(format!("{stem}.pdf"))
}

fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

async fn remove_session_files(record: &SessionRecord) {
    if let Err(e) = fs::remove_file(&record.source_path).await {
        warn!(session_id = %record.id, "Failed to remove session document: {}", e);
    }
    for placed in record.pending_images.values().flatten() {
        let _ = fs::remove_file(&placed.image_path).await;
    }
}
