//! Folder lifecycle.
//!
//! Every session lives in exactly one folder, and at least one folder exists
//! while any session does. Deleting a folder moves its sessions elsewhere;
//! the last folder cannot be deleted.

use chrono::Utc;
use tracing::{info, warn};

use super::{HiveStore, SessionRecord, AUTO_SESSION_FOLDER_NAME, DEFAULT_FOLDER_NAME};
use crate::error::{HiveError, HiveResult};
use crate::types::{Folder, FolderId};

impl HiveStore {
    pub fn create_folder(&mut self, name: impl Into<String>) -> HiveResult<FolderId> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HiveError::InvalidName(name));
        }
        let folder = Folder::new(name.trim());
        let id = folder.id.clone();
        self.folders.add_one(folder);
        Ok(id)
    }

    pub fn update_folder_name(&mut self, id: &str, name: impl Into<String>) -> HiveResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HiveError::InvalidName(name));
        }
        self.folders
            .update_one(id, |f| {
                f.name = name.trim().to_string();
                f.updated_at = Utc::now();
            })
            .ok_or_else(|| HiveError::FolderNotFound(id.to_string()))
    }

    /// Delete a folder, moving its sessions into the first remaining folder.
    pub fn delete_folder(&mut self, id: &str) -> HiveResult<Folder> {
        if !self.folders.contains(id) {
            return Err(HiveError::FolderNotFound(id.to_string()));
        }
        let target = self
            .folders
            .ids()
            .iter()
            .find(|f| f.as_str() != id)
            .cloned()
            .ok_or_else(|| HiveError::LastFolder(id.to_string()))?;

        let moved = self.reassign_sessions(id, &target);
        let folder = self
            .folders
            .remove_one(id)
            .ok_or_else(|| HiveError::FolderNotFound(id.to_string()))?;
        info!(folder = %id, target = %target, moved, "Deleted folder");
        Ok(folder)
    }

    pub fn move_session_to_folder(&mut self, session_id: &str, folder_id: &str) -> HiveResult<()> {
        if !self.folders.contains(folder_id) {
            return Err(HiveError::FolderNotFound(folder_id.to_string()));
        }
        self.sessions
            .update_one(session_id, |s| s.folder_id = Some(folder_id.to_string()))
            .ok_or_else(|| HiveError::SessionNotFound(session_id.to_string()))
    }

    /// Sessions in a folder, most recent first
    pub fn sessions_in_folder(&self, folder_id: &str) -> Vec<&SessionRecord> {
        self.sessions
            .iter()
            .filter(|s| s.folder_id.as_deref() == Some(folder_id))
            .collect()
    }

    /// Replace all folders, then repair duplicates and orphaned sessions.
    pub fn load_folders(&mut self, folders: impl IntoIterator<Item = Folder>) {
        self.folders.set_all(folders);
        self.merge_default_folders();

        let orphans: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| {
                s.folder_id
                    .as_deref()
                    .map(|f| !self.folders.contains(f))
                    .unwrap_or(true)
            })
            .map(|s| s.id.clone())
            .collect();
        if orphans.is_empty() {
            return;
        }
        let fallback = self.fallback_folder_id();
        for id in orphans {
            self.sessions
                .update_one(&id, |s| s.folder_id = Some(fallback.clone()));
        }
    }

    /// Collapse folders sharing a default name into the oldest of them.
    ///
    /// Returns the number of folders removed.
    pub fn merge_default_folders(&mut self) -> usize {
        let mut removed = 0;
        for name in [DEFAULT_FOLDER_NAME, AUTO_SESSION_FOLDER_NAME] {
            let matching: Vec<FolderId> = self
                .folders
                .iter()
                .filter(|f| f.name.trim().eq_ignore_ascii_case(name))
                .map(|f| f.id.clone())
                .collect();
            let Some((keep, duplicates)) = matching.split_first() else {
                continue;
            };
            for duplicate in duplicates {
                self.reassign_sessions(duplicate, keep);
                self.folders.remove_one(duplicate);
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(removed, "Merged duplicate default folders");
        }
        removed
    }

    /// First folder in creation order, creating `"Default"` if none exist.
    pub(crate) fn fallback_folder_id(&mut self) -> FolderId {
        if let Some(folder) = self.folders.first() {
            return folder.id.clone();
        }
        self.ensure_folder_named(DEFAULT_FOLDER_NAME)
    }

    pub(crate) fn ensure_folder_named(&mut self, name: &str) -> FolderId {
        if let Some(folder) = self
            .folders
            .iter()
            .find(|f| f.name.trim().eq_ignore_ascii_case(name))
        {
            return folder.id.clone();
        }
        let folder = Folder::new(name);
        let id = folder.id.clone();
        self.folders.add_one(folder);
        id
    }

    fn reassign_sessions(&mut self, from: &str, to: &str) -> usize {
        let ids: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.folder_id.as_deref() == Some(from))
            .map(|s| s.id.clone())
            .collect();
        for id in &ids {
            self.sessions
                .update_one(id, |s| s.folder_id = Some(to.to_string()));
        }
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn folder_at(name: &str, minutes_ago: i64) -> Folder {
        let mut folder = Folder::new(name);
        folder.created_at = Utc::now() - Duration::minutes(minutes_ago);
        folder.updated_at = folder.created_at;
        folder
    }

    #[test]
    fn test_delete_only_folder_is_refused() {
        let mut store = HiveStore::new();
        let session = store.create_local_session(None);
        let folder = store.session(&session).unwrap().folder_id.clone().unwrap();

        let result = store.delete_folder(&folder);
        assert!(matches!(result, Err(HiveError::LastFolder(_))));
        assert_eq!(store.folder_count(), 1);
        assert_eq!(store.session(&session).unwrap().folder_id.as_deref(), Some(folder.as_str()));
    }

    #[test]
    fn test_delete_folder_reassigns_sessions() {
        let mut store = HiveStore::new();
        let keep = store.create_folder("Projects").unwrap();
        let doomed = store.create_folder("Scratch").unwrap();
        let session = store.create_local_session(None);
        store.move_session_to_folder(&session, &doomed).unwrap();

        store.delete_folder(&doomed).unwrap();
        assert_eq!(store.session(&session).unwrap().folder_id.as_deref(), Some(keep.as_str()));
        assert!(store.sessions_in_folder(&doomed).is_empty());
    }

    #[test]
    fn test_folder_rename_and_validation() {
        let mut store = HiveStore::new();
        let id = store.create_folder("Q3").unwrap();
        store.update_folder_name(&id, "Q3 planning").unwrap();
        assert_eq!(store.folder(&id).unwrap().name, "Q3 planning");

        assert!(store.create_folder("   ").is_err());
        assert!(matches!(
            store.update_folder_name("missing", "x"),
            Err(HiveError::FolderNotFound(_))
        ));
        assert!(store.move_session_to_folder("missing", &id).is_err());
    }

    #[test]
    fn test_load_merges_duplicate_defaults() {
        let mut store = HiveStore::new();
        let oldest = folder_at("Default", 30);
        let newer = folder_at("default", 10);
        let other = folder_at("Research", 20);
        let oldest_id = oldest.id.clone();
        let newer_id = newer.id.clone();

        let session = store.create_local_session(None);
        store.load_folders(vec![oldest, newer, other]);
        // The session's original folder vanished, so it falls back to the first folder.
        assert_eq!(
            store.session(&session).unwrap().folder_id.as_deref(),
            Some(oldest_id.as_str())
        );

        assert_eq!(store.folder_count(), 2);
        assert!(store.folder(&newer_id).is_none());
    }

    #[test]
    fn test_merge_moves_sessions_to_kept_default() {
        let mut store = HiveStore::new();
        let oldest = folder_at("Default Session", 30);
        let newer = folder_at("Default Session", 5);
        let oldest_id = oldest.id.clone();
        let newer_id = newer.id.clone();
        store.load_folders(vec![oldest, newer.clone()]);
        assert_eq!(store.folder_count(), 1);

        // Reintroduce the duplicate with a session in it, then merge again.
        store.folders.add_one(newer);
        let session = store.create_local_session(None);
        store.move_session_to_folder(&session, &newer_id).unwrap();

        assert_eq!(store.merge_default_folders(), 1);
        assert_eq!(
            store.session(&session).unwrap().folder_id.as_deref(),
            Some(oldest_id.as_str())
        );
    }
}
