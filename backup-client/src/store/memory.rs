//! In-memory [`RemoteStore`] used by unit and integration tests.
//!
//! Behaves like a flat folder tree with tag maps, plus injection knobs:
//! denied authentication, slow authentication, per-filename upload
//! failures, and failing sync triggers.

use super::{Account, ChildEntry, ChildRef, FileRef, FolderRef, RemoteStore, TagMap};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const ROOT_ID: &str = "root";

#[derive(Debug, Default)]
struct FolderData {
    title: String,
    parent: Option<String>,
    tags: TagMap,
    pinned: bool,
}

#[derive(Debug)]
struct FileData {
    title: String,
    folder: String,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Knobs {
    deny_auth: bool,
    auth_delay: Option<Duration>,
    fail_uploads_named: HashSet<String>,
    fail_sync: bool,
}

#[derive(Debug, Default)]
struct State {
    folders: HashMap<String, FolderData>,
    files: HashMap<String, FileData>,
    next_id: u64,
}

#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    knobs: Mutex<Knobs>,
    auth_attempts: AtomicUsize,
    interactive_auths: AtomicUsize,
    sync_requests: AtomicUsize,
    revocations: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        state.folders.insert(
            ROOT_ID.to_string(),
            FolderData {
                title: ROOT_ID.to_string(),
                ..FolderData::default()
            },
        );
        MemoryStore {
            state: Mutex::new(state),
            knobs: Mutex::new(Knobs::default()),
            auth_attempts: AtomicUsize::new(0),
            interactive_auths: AtomicUsize::new(0),
            sync_requests: AtomicUsize::new(0),
            revocations: AtomicUsize::new(0),
        }
    }

    pub fn auth_attempts(&self) -> usize {
        self.auth_attempts.load(Ordering::SeqCst)
    }

    pub fn interactive_auths(&self) -> usize {
        self.interactive_auths.load(Ordering::SeqCst)
    }

    pub fn sync_requests(&self) -> usize {
        self.sync_requests.load(Ordering::SeqCst)
    }

    pub fn revocations(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }

    pub fn set_deny_auth(&self, deny: bool) {
        self.knobs.lock().unwrap().deny_auth = deny;
    }

    /// Delay each authenticate call, so concurrent first-time callers
    /// overlap instead of racing past each other instantly.
    pub fn set_auth_delay(&self, delay: Duration) {
        self.knobs.lock().unwrap().auth_delay = Some(delay);
    }

    /// Make every upload of a local file with this file name fail.
    pub fn fail_upload_of(&self, file_name: &str) {
        self.knobs
            .lock()
            .unwrap()
            .fail_uploads_named
            .insert(file_name.to_string());
    }

    pub fn clear_upload_failures(&self) {
        self.knobs.lock().unwrap().fail_uploads_named.clear();
    }

    pub fn set_fail_sync(&self, fail: bool) {
        self.knobs.lock().unwrap().fail_sync = fail;
    }

    /// Whether a folder was created with the pin/keep flag.
    pub fn is_pinned(&self, folder: &FolderRef) -> bool {
        self.state
            .lock()
            .unwrap()
            .folders
            .get(&folder.0)
            .map(|f| f.pinned)
            .unwrap_or(false)
    }

    /// Titles of a folder's direct subfolders, for assertions on pruning.
    pub fn subfolder_titles(&self, folder: &FolderRef) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut titles: Vec<String> = state
            .folders
            .values()
            .filter(|f| f.parent.as_deref() == Some(folder.0.as_str()))
            .map(|f| f.title.clone())
            .collect();
        titles.sort();
        titles
    }

    fn fresh_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn authenticate(&self, interactive: bool) -> Result<Account, StoreError> {
        let (deny, delay) = {
            let knobs = self.knobs.lock().unwrap();
            (knobs.deny_auth, knobs.auth_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.auth_attempts.fetch_add(1, Ordering::SeqCst);
        if interactive {
            self.interactive_auths.fetch_add(1, Ordering::SeqCst);
        }
        if deny {
            return Err(StoreError::AuthDenied("denied by test knob".into()));
        }
        Ok(Account {
            id: "test-account".to_string(),
        })
    }

    async fn revoke(&self) -> Result<(), StoreError> {
        self.revocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn root_folder(&self, _account: &Account) -> Result<FolderRef, StoreError> {
        Ok(FolderRef(ROOT_ID.to_string()))
    }

    async fn list_children(&self, folder: &FolderRef) -> Result<Vec<ChildEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.folders.contains_key(&folder.0) {
            return Err(StoreError::NotFound(folder.0.clone()));
        }
        let mut children = Vec::new();
        for (id, data) in &state.folders {
            if data.parent.as_deref() == Some(folder.0.as_str()) {
                children.push(ChildEntry {
                    title: data.title.clone(),
                    resource: ChildRef::Folder(FolderRef(id.clone())),
                });
            }
        }
        for (id, data) in &state.files {
            if data.folder == folder.0 {
                children.push(ChildEntry {
                    title: data.title.clone(),
                    resource: ChildRef::File(FileRef(id.clone())),
                });
            }
        }
        Ok(children)
    }

    async fn create_folder(
        &self,
        parent: &FolderRef,
        title: &str,
        pinned: bool,
    ) -> Result<FolderRef, StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.folders.contains_key(&parent.0) {
            return Err(StoreError::NotFound(parent.0.clone()));
        }
        let id = Self::fresh_id(&mut state, "folder");
        state.folders.insert(
            id.clone(),
            FolderData {
                title: title.to_string(),
                parent: Some(parent.0.clone()),
                tags: TagMap::new(),
                pinned,
            },
        );
        Ok(FolderRef(id))
    }

    async fn get_metadata(&self, folder: &FolderRef) -> Result<TagMap, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .folders
            .get(&folder.0)
            .map(|f| f.tags.clone())
            .ok_or_else(|| StoreError::NotFound(folder.0.clone()))
    }

    async fn update_metadata(&self, folder: &FolderRef, changes: TagMap) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let data = state
            .folders
            .get_mut(&folder.0)
            .ok_or_else(|| StoreError::NotFound(folder.0.clone()))?;
        data.tags.extend(changes);
        Ok(())
    }

    async fn upload_file(
        &self,
        folder: &FolderRef,
        local_path: &Path,
    ) -> Result<FileRef, StoreError> {
        let title = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::Remote(format!("not a file path: {}", local_path.display())))?;

        let should_fail = self
            .knobs
            .lock()
            .unwrap()
            .fail_uploads_named
            .contains(&title);
        if should_fail {
            return Err(StoreError::Remote(format!("injected upload failure: {title}")));
        }

        let bytes = tokio::fs::read(local_path).await?;

        let mut state = self.state.lock().unwrap();
        if !state.folders.contains_key(&folder.0) {
            return Err(StoreError::NotFound(folder.0.clone()));
        }
        let id = Self::fresh_id(&mut state, "file");
        state.files.insert(
            id.clone(),
            FileData {
                title,
                folder: folder.0.clone(),
                bytes,
            },
        );
        Ok(FileRef(id))
    }

    async fn download_file(&self, file: &FileRef, dest_dir: &Path) -> Result<PathBuf, StoreError> {
        let (title, bytes) = {
            let state = self.state.lock().unwrap();
            let data = state
                .files
                .get(&file.0)
                .ok_or_else(|| StoreError::NotFound(file.0.clone()))?;
            (data.title.clone(), data.bytes.clone())
        };
        let dest = dest_dir.join(title);
        tokio::fs::write(&dest, bytes).await?;
        Ok(dest)
    }

    async fn delete_folder(&self, folder: &FolderRef) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.folders.remove(&folder.0).is_none() {
            return Err(StoreError::NotFound(folder.0.clone()));
        }
        // Collect the subtree iteratively; folders only nest two deep here
        // but the store should not rely on that.
        let mut doomed = vec![folder.0.clone()];
        let mut frontier = vec![folder.0.clone()];
        while let Some(parent) = frontier.pop() {
            let children: Vec<String> = state
                .folders
                .iter()
                .filter(|(_, f)| f.parent.as_deref() == Some(parent.as_str()))
                .map(|(id, _)| id.clone())
                .collect();
            for child in children {
                state.folders.remove(&child);
                doomed.push(child.clone());
                frontier.push(child);
            }
        }
        state
            .files
            .retain(|_, f| !doomed.iter().any(|d| *d == f.folder));
        Ok(())
    }

    async fn request_sync(&self, _account: &Account) -> Result<(), StoreError> {
        if self.knobs.lock().unwrap().fail_sync {
            return Err(StoreError::Remote("injected sync failure".into()));
        }
        self.sync_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
