use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which path created a user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Local,
    Google,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    /// argon2 PHC string; absent for accounts created from an external credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub provider: AuthProvider,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub total_notes: u32,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash: None,
            picture: None,
            provider: AuthProvider::Local,
            verified: false,
            verification_code: None,
            verification_token: None,
            code_issued_at: None,
            bio: None,
            location: None,
            total_notes: 0,
            created_at: Utc::now(),
        }
    }

    /// Project this record into the "who is signed in" session shape.
    pub fn to_session(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
            verified: self.verified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub verified: bool,
}

/// Profile fields a signed-in user may edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Personal,
    Work,
    Learning,
    Ideas,
    Tasks,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Personal,
        Category::Work,
        Category::Learning,
        Category::Ideas,
        Category::Tasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Work => "Work",
            Category::Learning => "Learning",
            Category::Ideas => "Ideas",
            Category::Tasks => "Tasks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// Category selector used when filtering; `All` matches every note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Everything needed to create a note; the repository assigns id and date.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub is_favorite: bool,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            category: Category::Personal,
            tags: Vec::new(),
            is_favorite: false,
        }
    }
}

/// Partial edit of a note. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteFilter {
    pub query: String,
    pub category: CategoryFilter,
}

impl NoteFilter {
    pub fn matches(&self, note: &NoteRecord) -> bool {
        let query = self.query.to_lowercase();
        let matches_search = note.title.to_lowercase().contains(&query)
            || note.content.to_lowercase().contains(&query);
        matches_search && self.category.matches(note.category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: ChatRole,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            role,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "grid" => Ok(ViewMode::Grid),
            "list" => Ok(ViewMode::List),
            other => Err(format!("Unknown view mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, content: &str, category: Category) -> NoteRecord {
        NoteRecord {
            id: 1,
            title: title.to_string(),
            content: content.to_string(),
            category,
            tags: vec![],
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            is_favorite: false,
        }
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!(" Ideas ".parse::<Category>().unwrap(), Category::Ideas);
        assert!("Groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("All".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "Tasks".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Tasks)
        );
    }

    #[test]
    fn test_filter_matches_title_or_content_case_insensitively() {
        let n = note("Meeting Notes", "Discuss the ROADMAP", Category::Work);

        let by_title = NoteFilter { query: "meeting".into(), category: CategoryFilter::All };
        let by_content = NoteFilter { query: "roadmap".into(), category: CategoryFilter::All };
        let miss = NoteFilter { query: "holiday".into(), category: CategoryFilter::All };

        assert!(by_title.matches(&n));
        assert!(by_content.matches(&n));
        assert!(!miss.matches(&n));
    }

    #[test]
    fn test_filter_requires_category_match() {
        let n = note("Meeting Notes", "", Category::Work);
        let personal = NoteFilter {
            query: String::new(),
            category: CategoryFilter::Only(Category::Personal),
        };
        assert!(!personal.matches(&n));
    }

    #[test]
    fn test_note_serializes_camel_case() {
        let n = note("t", "c", Category::Learning);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["createdAt"], "2024-05-01");
        assert_eq!(json["isFavorite"], false);
        assert_eq!(json["category"], "Learning");
    }

    #[test]
    fn test_session_projection() {
        let mut user = UserRecord::new("Alice".into(), "alice@example.com".into());
        user.verified = true;
        let session = user.to_session();
        assert_eq!(session.email, "alice@example.com");
        assert_eq!(session.id, user.id);
        assert!(session.verified);
    }

    #[test]
    fn test_user_record_tolerates_missing_optional_fields() {
        let raw = r#"{"id":"1","name":"Bob","email":"bob@example.com","verified":false,
                      "createdAt":"2024-05-01T10:00:00Z"}"#;
        let user: UserRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(user.provider, AuthProvider::Local);
        assert_eq!(user.total_notes, 0);
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!("list".parse::<ViewMode>().unwrap(), ViewMode::List);
        assert!("tiles".parse::<ViewMode>().is_err());
    }
}
