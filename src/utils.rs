use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "inkly-dev",
            Profile::Prod => "inkly",
        }
    }
}

/// Get the configuration directory path for Inkly
/// If profile is Dev, uses "inkly-dev" instead of "inkly"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "inkly", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for Inkly
/// If profile is Dev, uses "inkly-dev" instead of "inkly"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "inkly", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Build a per-user storage key, e.g. `alice@example.com_dashboard-notes`
pub fn namespaced_key(email: &str, key: &str) -> String {
    format!("{}_{}", email, key)
}

/// Split a comma-separated tag string into trimmed, non-empty tags
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(
            namespaced_key("alice@example.com", "dashboard-notes"),
            "alice@example.com_dashboard-notes"
        );
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("rust, notes,,  ideas "), vec!["rust", "notes", "ideas"]);
        assert!(parse_tags("  ,").is_empty());
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(expand_path("/tmp/inkly.db"), PathBuf::from("/tmp/inkly.db"));
    }
}
