//! Curated question reserve used when generation is unavailable.

use futures::future::BoxFuture;
use rand::{rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::model::{AgeGroup, Difficulty, GenerationCriteria, Question};

/// Failure to draw from a fallback pool.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The pool cannot cover the requested count for this audience.
    #[error("fallback pool holds {available} usable questions, {requested} requested")]
    Insufficient {
        /// How many questions the caller asked for.
        requested: usize,
        /// How many audience-suitable questions the pool could offer.
        available: usize,
    },
}

/// Abstraction over the curated question reserve.
pub trait FallbackQuestionPool: Send + Sync {
    /// Draw exactly `count` questions suited to `criteria`.
    fn draw(
        &self,
        criteria: GenerationCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<Question>, FallbackError>>;
}

/// One configurable pool entry: question content plus its audience rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolQuestion {
    /// Topic/category label.
    pub category: String,
    /// Question text.
    pub prompt: String,
    /// Ordered answer choices.
    pub choices: Vec<String>,
    /// Index of the correct entry in `choices`.
    pub correct_choice: u32,
    /// Difficulty tier.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Audience the entry is rated for.
    #[serde(default)]
    pub age_group: AgeGroup,
    /// Seconds players get to answer.
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u32,
    /// Optional trivia shown after the question closes.
    #[serde(default)]
    pub fun_fact: Option<String>,
}

fn default_time_limit() -> u32 {
    20
}

impl PoolQuestion {
    fn into_rated_question(self) -> Option<(AgeGroup, Question)> {
        let question = Question {
            id: Uuid::new_v4(),
            category: self.category,
            prompt: self.prompt,
            choices: self.choices,
            correct_choice: self.correct_choice,
            difficulty: self.difficulty,
            time_limit_secs: self.time_limit_secs,
            point_value: 0,
            fun_fact: self.fun_fact,
        };
        question.normalized().map(|q| (self.age_group, q))
    }
}

/// In-memory pool built from the config file or the built-in starter set.
///
/// Age suitability is a hard filter; difficulty and requested topics rank the
/// eligible entries so a draw degrades to off-tier or off-topic questions
/// before it fails.
pub struct StaticQuestionPool {
    entries: Vec<(AgeGroup, Question)>,
}

impl StaticQuestionPool {
    /// Build a pool from `entries`, silently dropping malformed ones.
    pub fn new(entries: Vec<PoolQuestion>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter_map(PoolQuestion::into_rated_question)
                .collect(),
        }
    }

    /// Pool built from the starter set shipped with the binary.
    pub fn starter() -> Self {
        Self::new(starter_pool())
    }

    /// Number of usable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no usable entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn select(&self, criteria: &GenerationCriteria, count: usize) -> Result<Vec<Question>, FallbackError> {
        let topics: Vec<String> = criteria
            .topics
            .iter()
            .map(|topic| topic.trim().to_lowercase())
            .filter(|topic| !topic.is_empty())
            .collect();

        let mut eligible: Vec<&Question> = self
            .entries
            .iter()
            .filter(|(rating, _)| rating.suits(criteria.age_group))
            .map(|(_, question)| question)
            .collect();

        if eligible.len() < count {
            return Err(FallbackError::Insufficient {
                requested: count,
                available: eligible.len(),
            });
        }

        // Shuffle before ranking so ties are broken randomly between draws.
        eligible.shuffle(&mut rng());
        eligible.sort_by_key(|question| {
            let off_topic =
                !topics.is_empty() && !topics.contains(&question.category.to_lowercase());
            let off_tier = question.difficulty != criteria.difficulty;
            (off_topic, off_tier)
        });

        Ok(eligible
            .into_iter()
            .take(count)
            .cloned()
            .collect())
    }
}

impl FallbackQuestionPool for StaticQuestionPool {
    fn draw(
        &self,
        criteria: GenerationCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<Question>, FallbackError>> {
        let result = self.select(&criteria, count);
        Box::pin(async move { result })
    }
}

fn entry(
    category: &str,
    prompt: &str,
    choices: &[&str],
    correct_choice: u32,
    difficulty: Difficulty,
    age_group: AgeGroup,
) -> PoolQuestion {
    PoolQuestion {
        category: category.to_string(),
        prompt: prompt.to_string(),
        choices: choices.iter().map(|choice| choice.to_string()).collect(),
        correct_choice,
        difficulty,
        age_group,
        time_limit_secs: default_time_limit(),
        fun_fact: None,
    }
}

/// Built-in starter set shipped with the binary.
fn starter_pool() -> Vec<PoolQuestion> {
    use AgeGroup::{AllAges, Kids, Teens};
    use Difficulty::{Easy, Hard, Medium};

    vec![
        entry(
            "science",
            "What is the chemical symbol for water?",
            &["H2O", "CO2", "O2", "NaCl"],
            0,
            Easy,
            AllAges,
        ),
        entry(
            "science",
            "Which planet is known as the Red Planet?",
            &["Venus", "Mars", "Jupiter", "Mercury"],
            1,
            Easy,
            AllAges,
        ),
        entry(
            "science",
            "What gas do plants absorb from the atmosphere?",
            &["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"],
            2,
            Medium,
            AllAges,
        ),
        entry(
            "science",
            "What particle carries a negative electric charge?",
            &["Proton", "Neutron", "Electron", "Photon"],
            2,
            Medium,
            AllAges,
        ),
        entry(
            "science",
            "Roughly how fast does light travel in a vacuum?",
            &["300 km/s", "3,000 km/s", "30,000 km/s", "300,000 km/s"],
            3,
            Hard,
            AllAges,
        ),
        entry(
            "space",
            "How many moons does Earth have?",
            &["One", "Two", "Three", "None"],
            0,
            Easy,
            Kids,
        ),
        entry(
            "space",
            "What is the largest planet in our solar system?",
            &["Saturn", "Neptune", "Jupiter", "Uranus"],
            2,
            Easy,
            AllAges,
        ),
        entry(
            "space",
            "Which galaxy contains our solar system?",
            &["Andromeda", "The Milky Way", "Triangulum", "Whirlpool"],
            1,
            Medium,
            AllAges,
        ),
        entry(
            "space",
            "Who was the first person to walk on the Moon?",
            &[
                "Buzz Aldrin",
                "Yuri Gagarin",
                "Neil Armstrong",
                "Michael Collins",
            ],
            2,
            Medium,
            AllAges,
        ),
        entry(
            "geography",
            "What is the largest ocean on Earth?",
            &["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
            Easy,
            AllAges,
        ),
        entry(
            "geography",
            "Which country has the most people?",
            &["India", "China", "United States", "Indonesia"],
            0,
            Medium,
            AllAges,
        ),
        entry(
            "geography",
            "What is the capital of Australia?",
            &["Sydney", "Melbourne", "Canberra", "Perth"],
            2,
            Hard,
            AllAges,
        ),
        entry(
            "geography",
            "Which river is the longest in the world?",
            &["Amazon", "Nile", "Yangtze", "Mississippi"],
            1,
            Hard,
            AllAges,
        ),
        entry(
            "animals",
            "What is the largest animal alive today?",
            &["African elephant", "Blue whale", "Giraffe", "Orca"],
            1,
            Easy,
            Kids,
        ),
        entry(
            "animals",
            "How many legs does a spider have?",
            &["Six", "Eight", "Ten", "Twelve"],
            1,
            Easy,
            Kids,
        ),
        entry(
            "animals",
            "Which bird is known for mimicking human speech?",
            &["Penguin", "Ostrich", "Parrot", "Eagle"],
            2,
            Easy,
            AllAges,
        ),
        entry(
            "history",
            "In which year did the Second World War end?",
            &["1943", "1944", "1945", "1946"],
            2,
            Medium,
            Teens,
        ),
        entry(
            "history",
            "Who painted the Mona Lisa?",
            &[
                "Michelangelo",
                "Leonardo da Vinci",
                "Raphael",
                "Rembrandt",
            ],
            1,
            Easy,
            AllAges,
        ),
        entry(
            "history",
            "Which ancient civilization built Machu Picchu?",
            &["Aztec", "Maya", "Inca", "Olmec"],
            2,
            Hard,
            AllAges,
        ),
        entry(
            "music",
            "How many strings does a standard guitar have?",
            &["Four", "Five", "Six", "Seven"],
            2,
            Easy,
            AllAges,
        ),
        entry(
            "music",
            "Which composer wrote the Ninth Symphony while almost completely deaf?",
            &["Mozart", "Beethoven", "Bach", "Brahms"],
            1,
            Medium,
            AllAges,
        ),
        entry(
            "sports",
            "How many players does a football (soccer) team field at once?",
            &["Nine", "Ten", "Eleven", "Twelve"],
            2,
            Easy,
            AllAges,
        ),
        entry(
            "sports",
            "In which sport would you perform a slam dunk?",
            &["Volleyball", "Basketball", "Tennis", "Cricket"],
            1,
            Easy,
            AllAges,
        ),
        entry(
            "movies",
            "Which animated film features a clownfish searching for his son?",
            &["Shrek", "Finding Nemo", "Madagascar", "Ice Age"],
            1,
            Easy,
            Kids,
        ),
        entry(
            "movies",
            "Who directed the film Jurassic Park?",
            &[
                "James Cameron",
                "George Lucas",
                "Steven Spielberg",
                "Ridley Scott",
            ],
            2,
            Medium,
            Teens,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(topics: &[&str], difficulty: Difficulty, age_group: AgeGroup) -> GenerationCriteria {
        GenerationCriteria {
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
            difficulty,
            age_group,
            theme: None,
        }
    }

    #[tokio::test]
    async fn draw_returns_exactly_the_requested_count() {
        let pool = StaticQuestionPool::starter();
        let questions = pool
            .draw(criteria(&[], Difficulty::Medium, AgeGroup::AllAges), 10)
            .await
            .expect("starter pool covers ten questions");
        assert_eq!(questions.len(), 10);
    }

    #[tokio::test]
    async fn age_rating_is_a_hard_filter() {
        let pool = StaticQuestionPool::new(vec![
            entry(
                "history",
                "Which decade saw the Cuban Missile Crisis?",
                &["1950s", "1960s", "1970s"],
                1,
                Difficulty::Hard,
                AgeGroup::Adults,
            ),
            entry(
                "animals",
                "What sound does a cow make?",
                &["Moo", "Baa", "Oink"],
                0,
                Difficulty::Easy,
                AgeGroup::Kids,
            ),
        ]);

        let questions = pool
            .draw(criteria(&[], Difficulty::Easy, AgeGroup::Kids), 1)
            .await
            .expect("one kids question available");
        assert_eq!(questions[0].category, "animals");

        let short = pool
            .draw(criteria(&[], Difficulty::Easy, AgeGroup::Kids), 2)
            .await;
        assert!(matches!(
            short,
            Err(FallbackError::Insufficient {
                requested: 2,
                available: 1
            })
        ));
    }

    #[tokio::test]
    async fn requested_topics_are_preferred() {
        let pool = StaticQuestionPool::starter();
        let questions = pool
            .draw(criteria(&["space"], Difficulty::Easy, AgeGroup::AllAges), 2)
            .await
            .expect("starter pool has space questions");
        assert!(questions.iter().all(|q| q.category == "space"));
    }

    #[tokio::test]
    async fn matching_difficulty_is_preferred() {
        let pool = StaticQuestionPool::starter();
        let questions = pool
            .draw(criteria(&[], Difficulty::Hard, AgeGroup::AllAges), 3)
            .await
            .expect("starter pool has hard questions");
        assert!(questions.iter().all(|q| q.difficulty == Difficulty::Hard));
    }

    #[tokio::test]
    async fn empty_pool_reports_insufficient() {
        let pool = StaticQuestionPool::new(Vec::new());
        let result = pool
            .draw(criteria(&[], Difficulty::Medium, AgeGroup::AllAges), 1)
            .await;
        assert!(matches!(result, Err(FallbackError::Insufficient { .. })));
    }

    #[test]
    fn malformed_entries_are_dropped_at_construction() {
        let pool = StaticQuestionPool::new(vec![entry(
            "science",
            "  ",
            &["a", "b"],
            0,
            Difficulty::Easy,
            AgeGroup::AllAges,
        )]);
        assert!(pool.is_empty());
    }

    #[test]
    fn starter_pool_entries_all_survive_validation() {
        let pool = StaticQuestionPool::starter();
        assert_eq!(pool.len(), starter_pool().len());
    }
}
