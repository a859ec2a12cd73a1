use std::env::var;

const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Process-wide configuration read once at startup and handed to connectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub youtube_api_key: Option<String>,
    pub tiktok_ms_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            youtube_api_key: get_optional_var(&lookup, "YOUTUBE_API_KEY"),
            tiktok_ms_token: get_optional_var(&lookup, "TIKTOK_MS_TOKEN"),
        }
    }

    /// The YouTube key, unless it is missing or still the template value.
    pub fn youtube_api_key(&self) -> Option<&str> {
        self.youtube_api_key
            .as_deref()
            .filter(|key| *key != PLACEHOLDER_API_KEY)
    }
}

fn get_optional_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    match lookup(name) {
        Some(value) => match value.trim().is_empty() {
            true => {
                tracing::info!("{} is empty", name);
                None
            }
            false => Some(value.trim().to_string()),
        },
        None => {
            tracing::info!("{} not found in environment", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn reads_both_variables() {
        let settings = settings(&[("YOUTUBE_API_KEY", "abc"), ("TIKTOK_MS_TOKEN", " tok ")]);
        assert_eq!(settings.youtube_api_key(), Some("abc"));
        assert_eq!(settings.tiktok_ms_token.as_deref(), Some("tok"));
    }

    #[test]
    fn empty_and_missing_are_none() {
        let settings = settings(&[("YOUTUBE_API_KEY", "  ")]);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn placeholder_key_is_not_usable() {
        let settings = settings(&[("YOUTUBE_API_KEY", "YOUR_API_KEY_HERE")]);
        assert!(settings.youtube_api_key.is_some());
        assert_eq!(settings.youtube_api_key(), None);
    }
}
