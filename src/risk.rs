use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories of concerning language, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    SuicidalIdeation,
    SelfHarm,
    SevereHopelessness,
    DeathStatement,
    ViolenceTowardOthers,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::SuicidalIdeation,
        RiskCategory::SelfHarm,
        RiskCategory::SevereHopelessness,
        RiskCategory::DeathStatement,
        RiskCategory::ViolenceTowardOthers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::SuicidalIdeation => "suicidal ideation",
            RiskCategory::SelfHarm => "self-harm",
            RiskCategory::SevereHopelessness => "severe hopelessness",
            RiskCategory::DeathStatement => "death statement",
            RiskCategory::ViolenceTowardOthers => "violence toward others",
        }
    }

    fn phrases(&self) -> &'static [&'static str] {
        match self {
            RiskCategory::SuicidalIdeation => &[
                "kill myself",
                "killing myself",
                "end my life",
                "ending my life",
                "take my own life",
                "take my life",
                "suicide",
                "suicidal",
                "want to die",
                "wanna die",
                "better off dead",
                "don't want to live",
                "do not want to live",
                "no reason to live",
                "end it all",
            ],
            RiskCategory::SelfHarm => &[
                "hurt myself",
                "hurting myself",
                "harm myself",
                "harming myself",
                "self-harm",
                "self harm",
                "cut myself",
                "cutting myself",
                "burn myself",
                "punish myself",
            ],
            RiskCategory::SevereHopelessness => &[
                "hopeless",
                "hopelessness",
                "no way out",
                "can't go on",
                "cannot go on",
                "can't take it anymore",
                "nothing to live for",
                "no point in living",
                "give up on life",
                "better off without me",
            ],
            RiskCategory::DeathStatement => &[
                "wish i was dead",
                "wish i were dead",
                "want to be dead",
                "ready to die",
                "going to die tonight",
                "plan to die",
                "planning my death",
            ],
            RiskCategory::ViolenceTowardOthers => &[
                "kill him",
                "kill her",
                "kill them",
                "kill you",
                "kill everyone",
                "kill someone",
                "kill somebody",
                "hurt someone",
                "hurt somebody",
                "hurt everyone",
                "murder",
                "stab him",
                "stab her",
                "stab someone",
            ],
        }
    }

    fn compile(&self) -> Regex {
        let alternatives: Vec<String> = self
            .phrases()
            .iter()
            .map(|phrase| {
                phrase
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();
        let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
        Regex::new(&pattern).unwrap()
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref CATEGORY_PATTERNS: Vec<(RiskCategory, Regex)> = RiskCategory::ALL
        .iter()
        .map(|category| (*category, category.compile()))
        .collect();
}

/// Local screen for self-harm and violence language.
///
/// Stateless and deterministic: the same text always yields the same answer,
/// so it is safe to call while a draft is being composed and again at
/// submission time. Any single category match flags the text; there is no
/// scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier;

impl RiskClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn first_match(&self, text: &str) -> Option<RiskCategory> {
        if text.trim().is_empty() {
            return None;
        }
        let normalized = normalize_apostrophes(text);
        CATEGORY_PATTERNS
            .iter()
            .find(|(_, regex)| regex.is_match(&normalized))
            .map(|(category, _)| *category)
    }

    /// Every matched category, in evaluation order.
    pub fn categories(&self, text: &str) -> Vec<RiskCategory> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let normalized = normalize_apostrophes(text);
        CATEGORY_PATTERNS
            .iter()
            .filter(|(_, regex)| regex.is_match(&normalized))
            .map(|(category, _)| *category)
            .collect()
    }
}

// Typographic apostrophes from mobile keyboards and dictation.
fn normalize_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}', '\u{02BC}'], "'")
}
