use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotline {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

/// Crisis-support information shown alongside a concerning entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub message: String,
    #[serde(default)]
    pub hotlines: Vec<Hotline>,
    #[serde(default)]
    pub advice: String,
}

impl ResourceBundle {
    /// Built-in bundle used when the analysis service supplies none.
    pub fn built_in() -> Self {
        Self {
            message: "It sounds like you're going through something really painful right now. \
                      You don't have to face this alone."
                .to_string(),
            hotlines: vec![
                Hotline {
                    name: "NCMH Crisis Hotline".to_string(),
                    phone: "1553".to_string(),
                    website: "https://ncmh.gov.ph".to_string(),
                },
                Hotline {
                    name: "988 Suicide & Crisis Lifeline".to_string(),
                    phone: "988".to_string(),
                    website: "https://988lifeline.org".to_string(),
                },
                Hotline {
                    name: "Crisis Text Line".to_string(),
                    phone: "Text HOME to 741741".to_string(),
                    website: "https://www.crisistextline.org".to_string(),
                },
            ],
            advice: "If you are in immediate danger, contact your local emergency number or go \
                     to the nearest emergency room. Reaching out to someone you trust can help."
                .to_string(),
        }
    }
}

/// Chooses which resource bundle accompanies a concerning result.
///
/// Never decides *whether* resources are shown; callers only invoke it once
/// the merged risk signal is set.
#[derive(Debug, Clone)]
pub struct ResourceSelector {
    fallback: ResourceBundle,
}

impl ResourceSelector {
    pub fn new() -> Self {
        Self {
            fallback: ResourceBundle::built_in(),
        }
    }

    pub fn with_fallback(fallback: ResourceBundle) -> Self {
        Self { fallback }
    }

    pub fn select(&self, server_bundle: Option<ResourceBundle>) -> ResourceBundle {
        match server_bundle {
            Some(bundle) => bundle,
            None => {
                log::debug!("No server resource bundle, using built-in default");
                self.fallback.clone()
            }
        }
    }
}

impl Default for ResourceSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_bundle_preferred() {
        let selector = ResourceSelector::new();
        let server = ResourceBundle {
            message: "Please reach out".to_string(),
            hotlines: vec![Hotline {
                name: "Local line".to_string(),
                phone: "555-0100".to_string(),
                website: String::new(),
            }],
            advice: "Talk to someone".to_string(),
        };

        assert_eq!(selector.select(Some(server.clone())), server);
    }

    #[test]
    fn test_absent_bundle_falls_back_to_built_in() {
        let selector = ResourceSelector::default();
        let bundle = selector.select(None);

        assert_eq!(bundle, ResourceBundle::built_in());
        assert!(!bundle.hotlines.is_empty());
        assert!(bundle.hotlines.iter().all(|h| !h.phone.is_empty()));
    }

    #[test]
    fn test_custom_fallback() {
        let custom = ResourceBundle {
            message: "Custom".to_string(),
            hotlines: Vec::new(),
            advice: String::new(),
        };
        let selector = ResourceSelector::with_fallback(custom.clone());
        assert_eq!(selector.select(None), custom);
    }

    #[test]
    fn test_bundle_decodes_with_missing_optional_fields() {
        let bundle: ResourceBundle =
            serde_json::from_str(r#"{"message": "We care", "hotlines": [{"name": "A", "phone": "1"}]}"#)
                .unwrap();
        assert_eq!(bundle.hotlines[0].website, "");
        assert_eq!(bundle.advice, "");
    }
}
