use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Ile ostatnio zadanych pytań sesji jest wykluczanych przy losowaniu kolejnego.
const RECENT_EXCLUSION_WINDOW: usize = 10;

/// (s) Limit czasu nadawany pytaniom, które nie niosą własnego limitu.
const DEFAULT_QUESTION_TIME_LIMIT_S: u32 = 10;

/// Warianty odpowiedzi pytania. Baza pytań zawsze niesie dokładnie trzy opcje A/B/C.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
}

/// * `question_id` - identyfikator pytania w banku
/// * `topic` - temat, np. "JavaScript"
/// * `difficulty` - trudność 1-10
/// * `body_markup` - treść pytania (może zawierać fragmenty kodu w markdown)
/// * `options` - trzy warianty odpowiedzi
/// * `correct_option` - "A"/"B"/"C"; puste przy pytaniach ze zdalnego API (ocena po stronie serwera)
/// * `time_limit` - (s) limit czasu na odpowiedź, 0 = użyj domyślnego
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: i32,
    pub topic: String,
    pub difficulty: u8,
    pub body_markup: String,
    pub options: QuestionOptions,
    #[serde(default)]
    pub correct_option: String,
    #[serde(default)]
    pub time_limit: u32,
}

/// Filtry losowania pytania. session_id włącza wykluczanie ostatnio zadanych pytań.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilters {
    pub topic: Option<String>,
    pub difficulty: Option<u8>,
    pub session_id: Option<i32>,
}

/// Źródło pytań quizowych. Implementacje muszą być bezpieczne dla wątków roboczych.
pub trait QuestionBank: Send + Sync {
    /// Losuje pytanie spełniające filtry.
    fn random_question(&self, filters: &QuestionFilters) -> Result<Question>;

    /// Zwraca posortowaną listę dostępnych tematów.
    fn list_topics(&self) -> Result<Vec<String>>;
}

/// Bank pytań trzymany w pamięci, zasilany z pliku JSON. Pamięta, które pytania padły
/// w której sesji, żeby nie powtarzać ich zbyt szybko.
pub struct LocalQuestionBank {
    questions: Vec<Question>,
    asked_per_session: Mutex<HashMap<i32, Vec<i32>>>,
    rng: Mutex<StdRng>,
}

impl LocalQuestionBank {
    pub fn new(questions: Vec<Question>, seed: u64) -> LocalQuestionBank {
        LocalQuestionBank {
            questions,
            asked_per_session: Mutex::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl QuestionBank for LocalQuestionBank {
    fn random_question(&self, filters: &QuestionFilters) -> Result<Question> {
        if self.questions.is_empty() {
            bail!("The question bank is empty!");
        }

        // filtr tematu i trudności
        let filtered: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| {
                filters
                    .topic
                    .as_ref()
                    .map_or(true, |topic| q.topic.eq_ignore_ascii_case(topic))
            })
            .filter(|q| {
                filters
                    .difficulty
                    .map_or(true, |difficulty| q.difficulty == difficulty)
            })
            .collect();

        // nic nie pasuje do filtrów: wracamy do losowania z całego banku
        let matching: Vec<&Question> = if filtered.is_empty() {
            info!("No questions match the requested filters, serving an unfiltered pick");
            self.questions.iter().collect()
        } else {
            filtered
        };

        // wykluczenie pytań zadanych ostatnio w tej sesji
        let mut asked_per_session = self.asked_per_session.lock().unwrap();
        let recent: Vec<i32> = filters
            .session_id
            .and_then(|session_id| asked_per_session.get(&session_id))
            .map(|asked| {
                asked
                    .iter()
                    .rev()
                    .take(RECENT_EXCLUSION_WINDOW)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        let available: Vec<&Question> = matching
            .iter()
            .filter(|q| !recent.contains(&q.question_id))
            .copied()
            .collect();

        // gdy wszystko z puli padło niedawno, wracamy do pełnej przefiltrowanej puli
        let pool = if available.is_empty() {
            info!("All matching questions were asked recently, falling back to the full pool");
            &matching
        } else {
            &available
        };

        let mut rng = self.rng.lock().unwrap();
        let mut question = (*pool.choose(&mut *rng).unwrap()).to_owned();
        drop(rng);

        if let Some(session_id) = filters.session_id {
            asked_per_session
                .entry(session_id)
                .or_insert_with(Vec::new)
                .push(question.question_id);
        }

        if question.time_limit == 0 {
            question.time_limit = DEFAULT_QUESTION_TIME_LIMIT_S;
        }

        Ok(question)
    }

    fn list_topics(&self) -> Result<Vec<String>> {
        let mut topics: Vec<String> = self.questions.iter().map(|q| q.topic.to_owned()).collect();
        topics.sort();
        topics.dedup();
        Ok(topics)
    }
}

/// Bank pytań za zdalnym API (ten sam kontrakt co LocalQuestionBank, ocena odpowiedzi
/// zostaje po stronie serwera).
pub struct HttpQuestionBank {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpQuestionBank {
    pub fn new(base_url: &str) -> HttpQuestionBank {
        HttpQuestionBank {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl QuestionBank for HttpQuestionBank {
    fn random_question(&self, filters: &QuestionFilters) -> Result<Question> {
        let url = format!("{}/questions/random", self.base_url);

        let mut query: Vec<(&str, String)> = vec![];
        if let Some(topic) = &filters.topic {
            query.push(("topic", topic.to_owned()));
        }
        if let Some(difficulty) = filters.difficulty {
            query.push(("difficulty", difficulty.to_string()));
        }
        if let Some(session_id) = filters.session_id {
            query.push(("sessionId", session_id.to_string()));
        }

        debug!(target: "question_bank", "GET {}", url);

        let body = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .context(format!("Failed to request a random question from {}!", url))?
            .error_for_status()
            .context("Random question endpoint returned an error!")?
            .text()
            .context("Failed to read the random question response!")?;

        serde_json::from_str(&body).context("Failed to parse the random question response!")
    }

    fn list_topics(&self) -> Result<Vec<String>> {
        let url = format!("{}/questions/topics", self.base_url);

        debug!(target: "question_bank", "GET {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .context(format!("Failed to request the topic list from {}!", url))?
            .error_for_status()
            .context("Topic list endpoint returned an error!")?
            .text()
            .context("Failed to read the topic list response!")?;

        serde_json::from_str(&body).context("Failed to parse the topic list response!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_questions(count: i32) -> Vec<Question> {
        (0..count)
            .map(|i| Question {
                question_id: i + 1,
                topic: if i % 2 == 0 { "JavaScript" } else { "React" }.to_owned(),
                difficulty: (i % 10 + 1) as u8,
                body_markup: format!("Question number {}?", i + 1),
                options: QuestionOptions {
                    a: "First".to_owned(),
                    b: "Second".to_owned(),
                    c: "Third".to_owned(),
                },
                correct_option: ["A", "B", "C"][(i % 3) as usize].to_owned(),
                time_limit: 0,
            })
            .collect()
    }

    #[test]
    fn filters_restrict_the_pool() {
        let bank = LocalQuestionBank::new(sample_questions(10), 1);

        for _ in 0..20 {
            let question = bank
                .random_question(&QuestionFilters {
                    topic: Some("react".to_owned()),
                    difficulty: None,
                    session_id: None,
                })
                .unwrap();
            assert_eq!(question.topic, "React");
        }

        let question = bank
            .random_question(&QuestionFilters {
                topic: Some("JavaScript".to_owned()),
                difficulty: Some(3),
                session_id: None,
            })
            .unwrap();
        assert_eq!(question.difficulty, 3);
    }

    #[test]
    fn recently_asked_questions_are_excluded_then_fall_back() {
        let questions = sample_questions(2);
        let bank = LocalQuestionBank::new(questions, 5);

        let filters = QuestionFilters {
            topic: None,
            difficulty: None,
            session_id: Some(77),
        };

        let first = bank.random_question(&filters).unwrap();
        let second = bank.random_question(&filters).unwrap();
        assert_ne!(first.question_id, second.question_id);

        // obie sztuki padły niedawno, więc trzecie losowanie wraca do pełnej puli
        assert!(bank.random_question(&filters).is_ok());
    }

    #[test]
    fn sessions_track_their_own_asked_lists() {
        let bank = LocalQuestionBank::new(sample_questions(2), 9);

        for session_id in [1, 2].iter() {
            bank.random_question(&QuestionFilters {
                topic: None,
                difficulty: None,
                session_id: Some(*session_id),
            })
            .unwrap();
        }

        let asked_per_session = bank.asked_per_session.lock().unwrap();
        assert_eq!(asked_per_session.get(&1).map(|asked| asked.len()), Some(1));
        assert_eq!(asked_per_session.get(&2).map(|asked| asked.len()), Some(1));
    }

    #[test]
    fn unmatched_filters_fall_back_to_an_unfiltered_pick() {
        let bank = LocalQuestionBank::new(sample_questions(4), 2);

        let question = bank
            .random_question(&QuestionFilters {
                topic: Some("Rust".to_owned()),
                difficulty: None,
                session_id: None,
            })
            .unwrap();

        assert!(["JavaScript", "React"].contains(&question.topic.as_str()));
    }

    #[test]
    fn an_empty_bank_is_an_error() {
        let bank = LocalQuestionBank::new(vec![], 2);

        let result = bank.random_question(&QuestionFilters::default());

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("empty"));
    }

    #[test]
    fn topics_are_distinct_and_sorted() {
        let bank = LocalQuestionBank::new(sample_questions(10), 3);

        assert_eq!(bank.list_topics().unwrap(), vec!["JavaScript", "React"]);
    }

    #[test]
    fn served_questions_get_a_time_limit() {
        let bank = LocalQuestionBank::new(sample_questions(1), 4);

        let question = bank.random_question(&QuestionFilters::default()).unwrap();
        assert_eq!(question.time_limit, DEFAULT_QUESTION_TIME_LIMIT_S);
    }
}
