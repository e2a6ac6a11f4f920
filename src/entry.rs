use serde::{Deserialize, Serialize};
use std::fmt;

/// Response text recorded for entries saved before responses were kept.
pub const MISSING_RESPONSE: &str = "No response saved with this entry";

/// Closed set of icon keys understood by the presentation layer.
///
/// Unknown keys decode to [`IconKey::Reflect`], the same icon the journal
/// view falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IconKey {
    #[default]
    Reflect,
    Journey,
    Personalized,
    Meditate,
    Connect,
    Create,
    Move,
    Nature,
    Gratitude,
    Learn,
}

impl IconKey {
    pub fn parse(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "reflect" => IconKey::Reflect,
            "journey" => IconKey::Journey,
            "personalized" => IconKey::Personalized,
            "meditate" => IconKey::Meditate,
            "connect" => IconKey::Connect,
            "create" => IconKey::Create,
            "move" => IconKey::Move,
            "nature" => IconKey::Nature,
            "gratitude" => IconKey::Gratitude,
            "learn" => IconKey::Learn,
            other => {
                log::debug!("Unknown icon key '{other}', using reflect");
                IconKey::Reflect
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IconKey::Reflect => "reflect",
            IconKey::Journey => "journey",
            IconKey::Personalized => "personalized",
            IconKey::Meditate => "meditate",
            IconKey::Connect => "connect",
            IconKey::Create => "create",
            IconKey::Move => "move",
            IconKey::Nature => "nature",
            IconKey::Gratitude => "gratitude",
            IconKey::Learn => "learn",
        }
    }
}

impl From<String> for IconKey {
    fn from(key: String) -> Self {
        IconKey::parse(&key)
    }
}

impl From<IconKey> for String {
    fn from(key: IconKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for IconKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "icon")]
    pub icon_key: IconKey,
}

impl SuggestedAction {
    pub fn new(title: &str, description: &str, icon_key: IconKey) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            icon_key,
        }
    }

    /// Actions shown when an entry carries no suggestions of its own.
    pub fn defaults() -> Vec<SuggestedAction> {
        vec![
            SuggestedAction::new(
                "Gratitude Journal",
                "Write down three things you're grateful for to maintain this positive mood",
                IconKey::Reflect,
            ),
            SuggestedAction::new(
                "Share Your Joy",
                "Consider reaching out to a friend or family member to share your positive feelings",
                IconKey::Connect,
            ),
            SuggestedAction::new(
                "Create a Happy Playlist",
                "Compile songs that match or enhance your current positive mood",
                IconKey::Create,
            ),
        ]
    }
}

/// Presentation reading of the opaque sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentTone {
    Positive,
    Negative,
    Neutral,
}

impl SentimentTone {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_lowercase()).as_deref() {
            Some("positive") => SentimentTone::Positive,
            Some("negative") => SentimentTone::Negative,
            _ => SentimentTone::Neutral,
        }
    }
}

/// A committed journal entry. Never modified after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub content: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    pub is_concerning: bool,
    pub ai_response: String,
    #[serde(default)]
    pub suggestions: Vec<SuggestedAction>,
}

impl JournalEntry {
    pub fn tone(&self) -> SentimentTone {
        SentimentTone::from_label(self.sentiment.as_deref())
    }

    /// Suggestions to display, falling back to the built-in set when the
    /// entry has none. The stored entry is left untouched.
    pub fn displayed_suggestions(&self) -> Vec<SuggestedAction> {
        if self.suggestions.is_empty() {
            SuggestedAction::defaults()
        } else {
            self.suggestions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(suggestions: Vec<SuggestedAction>) -> JournalEntry {
        JournalEntry {
            id: "1".to_string(),
            content: "A calm afternoon".to_string(),
            created_at: "Saturday, October 18, 2026".to_string(),
            sentiment: Some("Positive".to_string()),
            is_concerning: false,
            ai_response: "Glad to hear it".to_string(),
            suggestions,
        }
    }

    #[test]
    fn test_icon_key_parsing() {
        assert_eq!(IconKey::parse("meditate"), IconKey::Meditate);
        assert_eq!(IconKey::parse("  NATURE "), IconKey::Nature);
        assert_eq!(IconKey::parse("rocket"), IconKey::Reflect);
        assert_eq!(IconKey::parse(""), IconKey::Reflect);
    }

    #[test]
    fn test_suggestion_accepts_legacy_icon_field() {
        let action: SuggestedAction = serde_json::from_str(
            r#"{"title": "Walk", "description": "Go outside", "icon": "Move"}"#,
        )
        .unwrap();
        assert_eq!(action.icon_key, IconKey::Move);

        let action: SuggestedAction =
            serde_json::from_str(r#"{"title": "Walk", "iconKey": "unheard-of"}"#).unwrap();
        assert_eq!(action.icon_key, IconKey::Reflect);
        assert_eq!(action.description, "");
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let value = serde_json::to_value(entry(Vec::new())).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("isConcerning").is_some());
        assert!(value.get("aiResponse").is_some());
    }

    #[test]
    fn test_unset_sentiment_is_omitted() {
        let mut e = entry(Vec::new());
        e.sentiment = None;
        let value = serde_json::to_value(&e).unwrap();
        assert!(value.get("sentiment").is_none());
        assert_eq!(e.tone(), SentimentTone::Neutral);
    }

    #[test]
    fn test_sentiment_tone() {
        assert_eq!(
            SentimentTone::from_label(Some("POSITIVE")),
            SentimentTone::Positive
        );
        assert_eq!(
            SentimentTone::from_label(Some("negative")),
            SentimentTone::Negative
        );
        assert_eq!(
            SentimentTone::from_label(Some("balanced")),
            SentimentTone::Neutral
        );
        assert_eq!(SentimentTone::from_label(None), SentimentTone::Neutral);
    }

    #[test]
    fn test_displayed_suggestions_fallback() {
        let empty = entry(Vec::new());
        assert_eq!(empty.displayed_suggestions(), SuggestedAction::defaults());
        assert!(empty.suggestions.is_empty());

        let own = vec![SuggestedAction::new("Stretch", "Five minutes", IconKey::Move)];
        let e = entry(own.clone());
        assert_eq!(e.displayed_suggestions(), own);
    }
}
