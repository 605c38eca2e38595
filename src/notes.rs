//! Per-user notes, stored as one JSON array under `<email>_dashboard-notes`.
//!
//! Every operation loads the whole list, transforms it and writes it back.
//! Unknown ids are ignored rather than reported.

use chrono::Utc;

use crate::models::{NoteDraft, NoteFilter, NotePatch, NoteRecord};
use crate::store::{KeyValueStore, StoreError};
use crate::utils;

pub const NOTES_KEY: &str = "dashboard-notes";

pub struct NotesRepository<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> NotesRepository<S> {
    pub fn new(store: S, email: &str) -> Self {
        Self {
            store,
            key: utils::namespaced_key(email, NOTES_KEY),
        }
    }

    /// All notes, newest first.
    pub fn all(&self) -> Result<Vec<NoteRecord>, StoreError> {
        Ok(self.store.get_json(&self.key)?.unwrap_or_default())
    }

    pub fn list(&self, filter: &NoteFilter) -> Result<Vec<NoteRecord>, StoreError> {
        Ok(self.all()?.into_iter().filter(|n| filter.matches(n)).collect())
    }

    pub fn get(&self, id: i64) -> Result<Option<NoteRecord>, StoreError> {
        Ok(self.all()?.into_iter().find(|n| n.id == id))
    }

    pub fn create(&self, draft: NoteDraft) -> Result<NoteRecord, StoreError> {
        let mut notes = self.all()?;
        let id = next_id(&notes);

        let note = NoteRecord {
            id,
            title: draft.title,
            content: draft.content,
            category: draft.category,
            tags: normalize_tags(draft.tags),
            created_at: Utc::now().date_naive(),
            is_favorite: draft.is_favorite,
        };
        notes.insert(0, note.clone());
        self.save(&notes)?;

        tracing::debug!(id, key = %self.key, "note created");
        Ok(note)
    }

    pub fn update(&self, id: i64, patch: NotePatch) -> Result<Option<NoteRecord>, StoreError> {
        self.modify(id, |note| {
            if let Some(title) = patch.title {
                note.title = title;
            }
            if let Some(content) = patch.content {
                note.content = content;
            }
            if let Some(category) = patch.category {
                note.category = category;
            }
            if let Some(tags) = patch.tags {
                note.tags = normalize_tags(tags);
            }
            if let Some(is_favorite) = patch.is_favorite {
                note.is_favorite = is_favorite;
            }
        })
    }

    pub fn toggle_favorite(&self, id: i64) -> Result<Option<NoteRecord>, StoreError> {
        self.modify(id, |note| note.is_favorite = !note.is_favorite)
    }

    /// Remove a note. Returns whether anything was removed.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut notes = self.all()?;
        let before = notes.len();
        notes.retain(|n| n.id != id);
        if notes.len() == before {
            return Ok(false);
        }
        self.save(&notes)?;
        Ok(true)
    }

    fn modify<F>(&self, id: i64, edit: F) -> Result<Option<NoteRecord>, StoreError>
    where
        F: FnOnce(&mut NoteRecord),
    {
        let mut notes = self.all()?;
        let Some(note) = notes.iter_mut().find(|n| n.id == id) else {
            tracing::debug!(id, "ignoring edit of unknown note");
            return Ok(None);
        };
        edit(note);
        let updated = note.clone();
        self.save(&notes)?;
        Ok(Some(updated))
    }

    fn save(&self, notes: &[NoteRecord]) -> Result<(), StoreError> {
        self.store.set_json(&self.key, notes)
    }
}

/// One past the highest id; if that overflows, the lowest unused positive id.
fn next_id(notes: &[NoteRecord]) -> i64 {
    let max = notes.iter().map(|n| n.id).max().unwrap_or(0);
    max.checked_add(1).unwrap_or_else(|| {
        (1..i64::MAX)
            .find(|id| notes.iter().all(|n| n.id != *id))
            .unwrap_or(0)
    })
}

/// Trim tags, drop blanks and keep the first occurrence of each.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryFilter};
    use crate::store::MemoryStore;

    fn repo() -> NotesRepository<MemoryStore> {
        NotesRepository::new(MemoryStore::new(), "alice@example.com")
    }

    fn draft(title: &str, category: Category) -> NoteDraft {
        NoteDraft {
            category,
            ..NoteDraft::new(title)
        }
    }

    #[test]
    fn test_ids_follow_max_plus_one() {
        let repo = repo();
        assert_eq!(repo.create(draft("First", Category::Personal)).unwrap().id, 1);
        assert_eq!(repo.create(draft("Second", Category::Work)).unwrap().id, 2);

        repo.delete(1).unwrap();
        assert_eq!(repo.create(draft("Third", Category::Ideas)).unwrap().id, 3);

        repo.delete(3).unwrap();
        repo.delete(2).unwrap();
        assert_eq!(repo.create(draft("Fresh", Category::Ideas)).unwrap().id, 1);
    }

    #[test]
    fn test_id_at_upper_bound_does_not_overflow() {
        let store = MemoryStore::new();
        let stored = vec![NoteRecord {
            id: i64::MAX,
            title: "Imported".into(),
            content: String::new(),
            category: Category::Personal,
            tags: vec![],
            created_at: Utc::now().date_naive(),
            is_favorite: false,
        }];
        store.set_json("alice@example.com_dashboard-notes", &stored).unwrap();

        let repo = NotesRepository::new(store, "alice@example.com");
        let note = repo.create(draft("Next", Category::Work)).unwrap();
        assert_eq!(note.id, 1);
        assert_eq!(repo.all().unwrap().len(), 2);
    }

    #[test]
    fn test_create_prepends_and_stamps_today() {
        let repo = repo();
        repo.create(draft("Older", Category::Personal)).unwrap();
        let newer = repo.create(draft("Newer", Category::Personal)).unwrap();

        let all = repo.all().unwrap();
        assert_eq!(all[0].title, "Newer");
        assert_eq!(all[1].title, "Older");
        assert_eq!(newer.created_at, Utc::now().date_naive());
    }

    #[test]
    fn test_create_then_delete_restores_list() {
        let repo = repo();
        repo.create(draft("Keep", Category::Work)).unwrap();
        let before = repo.all().unwrap();

        let note = repo.create(draft("Temporary", Category::Tasks)).unwrap();
        assert!(repo.delete(note.id).unwrap());
        assert_eq!(repo.all().unwrap(), before);
    }

    #[test]
    fn test_filter_all_and_by_category() {
        let repo = repo();
        repo.create(draft("Standup", Category::Work)).unwrap();
        repo.create(draft("Groceries", Category::Personal)).unwrap();
        repo.create(draft("Retro", Category::Work)).unwrap();

        assert_eq!(repo.list(&NoteFilter::default()).unwrap().len(), 3);

        let work = NoteFilter {
            query: String::new(),
            category: CategoryFilter::Only(Category::Work),
        };
        let found = repo.list(&work).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|n| n.category == Category::Work));

        let retro = NoteFilter {
            query: "RETRO".into(),
            category: CategoryFilter::Only(Category::Work),
        };
        assert_eq!(repo.list(&retro).unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_toggle_favorite() {
        let repo = repo();
        let note = repo.create(draft("Draft", Category::Personal)).unwrap();

        let patch = NotePatch {
            title: Some("Final".into()),
            tags: Some(vec![" rust ".into(), "".into(), "rust".into(), "notes".into()]),
            ..Default::default()
        };
        let updated = repo.update(note.id, patch).unwrap().unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.tags, vec!["rust", "notes"]);
        assert_eq!(updated.category, Category::Personal);

        assert!(repo.toggle_favorite(note.id).unwrap().unwrap().is_favorite);
        assert!(!repo.toggle_favorite(note.id).unwrap().unwrap().is_favorite);
        assert_eq!(repo.get(note.id).unwrap().unwrap().title, "Final");
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let repo = repo();
        repo.create(draft("Only", Category::Learning)).unwrap();
        let before = repo.all().unwrap();

        assert!(repo.update(99, NotePatch::default()).unwrap().is_none());
        assert!(repo.toggle_favorite(99).unwrap().is_none());
        assert!(!repo.delete(99).unwrap());
        assert!(repo.get(99).unwrap().is_none());
        assert_eq!(repo.all().unwrap(), before);
    }

    #[test]
    fn test_notes_are_namespaced_per_user() {
        let store = MemoryStore::new();
        let alice = NotesRepository::new(store.clone(), "alice@example.com");
        let bob = NotesRepository::new(store.clone(), "bob@example.com");

        alice.create(draft("Alice's", Category::Personal)).unwrap();
        assert!(bob.all().unwrap().is_empty());
        assert!(store.get("alice@example.com_dashboard-notes").unwrap().is_some());
    }
}
