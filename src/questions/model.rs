use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Difficulty tier of a question, driving its base point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Short time pressure, lowest base points.
    Easy,
    /// Default tier.
    Medium,
    /// Highest base points.
    Hard,
}

impl Difficulty {
    /// Base points awarded for a correct answer of this tier.
    pub fn base_points(self) -> u32 {
        match self {
            Difficulty::Easy => 50,
            Difficulty::Medium => 75,
            Difficulty::Hard => 100,
        }
    }

    /// Canonical lowercase name used in fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

/// Audience bracket a question set is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AgeGroup {
    /// Younger children.
    Kids,
    /// Teenagers.
    Teens,
    /// Adults only.
    Adults,
    /// Mixed family audience.
    AllAges,
}

impl AgeGroup {
    /// Canonical lowercase name used in fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::Kids => "kids",
            AgeGroup::Teens => "teens",
            AgeGroup::Adults => "adults",
            AgeGroup::AllAges => "all-ages",
        }
    }

    /// Whether content rated for `self` can be served to an audience of `requested`.
    pub fn suits(self, requested: AgeGroup) -> bool {
        matches!(
            (self, requested),
            (AgeGroup::AllAges, _)
                | (AgeGroup::Kids, AgeGroup::Kids)
                | (AgeGroup::Teens, AgeGroup::Teens)
                | (AgeGroup::Adults, AgeGroup::Adults)
        )
    }
}

impl Default for AgeGroup {
    fn default() -> Self {
        AgeGroup::AllAges
    }
}

/// A single trivia question with a fixed, closed shape.
///
/// Choices are fixed at generation time and never reshuffled mid-session so
/// answer indices stay stable across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Topic/category label (e.g. "science").
    pub category: String,
    /// The question text shown to players.
    pub prompt: String,
    /// Ordered answer choices; the submitted value is an index into this list.
    pub choices: Vec<String>,
    /// Index of the correct entry in `choices`.
    pub correct_choice: u32,
    /// Difficulty tier.
    pub difficulty: Difficulty,
    /// Seconds players have to answer once the question is delivered.
    pub time_limit_secs: u32,
    /// Base points for a correct answer.
    pub point_value: u32,
    /// Optional trivia shown after the question closes.
    pub fun_fact: Option<String>,
}

/// Bounds accepted for a question's choice list.
const MIN_CHOICES: usize = 2;
const MAX_CHOICES: usize = 6;
/// Bounds accepted for a question's time limit.
const MIN_TIME_LIMIT_SECS: u32 = 5;
const MAX_TIME_LIMIT_SECS: u32 = 120;

impl Question {
    /// Validate and normalise a question coming from an external source.
    ///
    /// Returns `None` when the shape is unusable (empty prompt, too few or
    /// too many choices, correct index out of range). A zero `point_value`
    /// is filled in from the difficulty tier and the time limit is clamped
    /// into the supported range.
    pub fn normalized(mut self) -> Option<Self> {
        self.prompt = self.prompt.trim().to_string();
        if self.prompt.is_empty() {
            return None;
        }

        self.choices
            .iter_mut()
            .for_each(|choice| *choice = choice.trim().to_string());
        if self.choices.len() < MIN_CHOICES
            || self.choices.len() > MAX_CHOICES
            || self.choices.iter().any(|choice| choice.is_empty())
        {
            return None;
        }

        if (self.correct_choice as usize) >= self.choices.len() {
            return None;
        }

        if self.point_value == 0 {
            self.point_value = self.difficulty.base_points();
        }
        self.time_limit_secs = self
            .time_limit_secs
            .clamp(MIN_TIME_LIMIT_SECS, MAX_TIME_LIMIT_SECS);

        Some(self)
    }
}

/// Criteria a question set is generated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCriteria {
    /// Requested topics; empty means "anything".
    pub topics: Vec<String>,
    /// Requested difficulty tier.
    pub difficulty: Difficulty,
    /// Audience bracket.
    pub age_group: AgeGroup,
    /// Optional seasonal/event theme (e.g. "halloween").
    pub theme: Option<String>,
}

impl GenerationCriteria {
    /// Compute the canonical cache key for these criteria.
    ///
    /// Topics are lowercased, trimmed, deduplicated, and sorted so the
    /// fingerprint is order-independent.
    pub fn fingerprint(&self) -> Fingerprint {
        let topics: BTreeSet<String> = self
            .topics
            .iter()
            .map(|topic| topic.trim().to_lowercase())
            .filter(|topic| !topic.is_empty())
            .collect();
        let topics = if topics.is_empty() {
            "any".to_string()
        } else {
            topics.into_iter().collect::<Vec<_>>().join("+")
        };

        let theme = self
            .theme
            .as_deref()
            .map(|theme| theme.trim().to_lowercase())
            .filter(|theme| !theme.is_empty())
            .unwrap_or_else(|| "-".to_string());

        Fingerprint(format!(
            "{topics}|{}|{}|{theme}",
            self.age_group.as_str(),
            self.difficulty.as_str(),
        ))
    }
}

impl Default for GenerationCriteria {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            difficulty: Difficulty::default(),
            age_group: AgeGroup::default(),
            theme: None,
        }
    }
}

/// Canonical key derived from generation criteria, used for cache lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Borrow the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(prompt: &str, choices: &[&str], correct: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            category: "science".into(),
            prompt: prompt.into(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            correct_choice: correct,
            difficulty: Difficulty::Easy,
            time_limit_secs: 20,
            point_value: 0,
            fun_fact: None,
        }
    }

    #[test]
    fn fingerprint_is_order_and_case_independent() {
        let a = GenerationCriteria {
            topics: vec!["Animals".into(), "space ".into()],
            difficulty: Difficulty::Easy,
            age_group: AgeGroup::Kids,
            theme: None,
        };
        let b = GenerationCriteria {
            topics: vec!["SPACE".into(), "animals".into(), "animals".into()],
            ..a.clone()
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str(), "animals+space|kids|easy|-");
    }

    #[test]
    fn fingerprint_distinguishes_difficulty_and_theme() {
        let base = GenerationCriteria::default();
        let harder = GenerationCriteria {
            difficulty: Difficulty::Hard,
            ..base.clone()
        };
        let themed = GenerationCriteria {
            theme: Some("Halloween".into()),
            ..base.clone()
        };
        assert_ne!(base.fingerprint(), harder.fingerprint());
        assert_ne!(base.fingerprint(), themed.fingerprint());
        assert_eq!(themed.fingerprint().as_str(), "any|all-ages|medium|halloween");
    }

    #[test]
    fn normalized_fills_point_value_and_clamps_time_limit() {
        let mut q = question("What is H2O?", &["Water", "Salt"], 0);
        q.time_limit_secs = 600;
        let q = q.normalized().expect("valid question");
        assert_eq!(q.point_value, Difficulty::Easy.base_points());
        assert_eq!(q.time_limit_secs, 120);
    }

    #[test]
    fn normalized_rejects_bad_shapes() {
        assert!(question("  ", &["a", "b"], 0).normalized().is_none());
        assert!(question("p?", &["only one"], 0).normalized().is_none());
        assert!(question("p?", &["a", "b"], 2).normalized().is_none());
        assert!(question("p?", &["a", " "], 0).normalized().is_none());
    }

    #[test]
    fn all_ages_content_suits_every_audience() {
        for requested in [
            AgeGroup::Kids,
            AgeGroup::Teens,
            AgeGroup::Adults,
            AgeGroup::AllAges,
        ] {
            assert!(AgeGroup::AllAges.suits(requested));
        }
        assert!(!AgeGroup::Adults.suits(AgeGroup::Kids));
    }
}
