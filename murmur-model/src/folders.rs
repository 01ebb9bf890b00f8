//! Folder derivations over `sessions.folder_id` paths.
//!
//! Folders are not rows of their own: the folder tree is derived from the
//! slash-separated paths sessions carry. A session in `A/B` implies both
//! folders `A` and `A/B`, so a folder stays visible while any descendant
//! session exists.

use crate::app::{indexes, AppStore};
use crate::schema::tables;
use murmur_types::Cell;
use std::collections::BTreeSet;

/// All folder paths implied by the current sessions, ancestors included.
pub async fn folder_ids(app: &AppStore) -> BTreeSet<String> {
    app.read(|store| {
        let mut folders = BTreeSet::new();
        store.for_each_row(tables::SESSIONS, |_, row| {
            let Some(path) = row.get("folder_id").and_then(Cell::as_str) else {
                return;
            };
            if path.is_empty() {
                return;
            }
            let mut prefix = String::new();
            for segment in path.split('/') {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                folders.insert(prefix.clone());
            }
        });
        folders
    })
    .await
}

/// Folders with no parent, sorted.
pub async fn top_level_folders(app: &AppStore) -> Vec<String> {
    folder_ids(app)
        .await
        .into_iter()
        .filter(|folder| !folder.contains('/'))
        .collect()
}

/// Direct children of one folder, sorted.
pub async fn child_folders(app: &AppStore, parent: &str) -> Vec<String> {
    let prefix = format!("{parent}/");
    folder_ids(app)
        .await
        .into_iter()
        .filter(|folder| {
            folder
                .strip_prefix(&prefix)
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
        .collect()
}

/// Sessions directly in one folder (non-recursive), ordered by the
/// sessions-by-folder index sort.
pub async fn sessions_in_folder(app: &AppStore, folder: &str) -> Vec<String> {
    app.views(|views| {
        views
            .indexes
            .slice_row_ids(indexes::SESSIONS_BY_FOLDER, folder)
            .to_vec()
    })
    .await
}
