use crate::services::question_bank::Question;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use helpers::general::{argsort, SortOrder};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

/// Maksymalna liczba wierszy zwracanych przez ranking.
const LEADERBOARD_LIMIT: usize = 50;

/// Nazwa wyświetlana dla sesji bez przypisanego użytkownika.
const GUEST_DISPLAY_NAME: &str = "Guest";

/// Pojedyncza oceniona odpowiedź zapisana w sesji.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub question_id: i32,
    pub user_answer: String,
    pub response_ms: u32,
    pub is_correct: bool,
    pub created_utc: DateTime<Utc>,
}

/// * `session_id` - identyfikator sesji wyścigu
/// * `user_id` - (opcjonalny) użytkownik, brak = gość
/// * `start_utc` / `end_utc` - znaczniki czasu rozpoczęcia i ukończenia
/// * `final_time_ms` - (ms) finalny czas wyścigu po ukończeniu
/// * `lives_used` - licznik błędnych odpowiedzi (rośnie bez górnego limitu)
/// * `is_completed` - true po przejechaniu mety
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RaceSession {
    pub session_id: i32,
    #[serde(default)]
    pub user_id: Option<String>,
    pub start_utc: DateTime<Utc>,
    #[serde(default)]
    pub end_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub final_time_ms: Option<u32>,
    #[serde(default)]
    pub lives_used: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub answer_events: Vec<AnswerEvent>,
}

/// Wynik oceny odpowiedzi. lives_used niesie stan konta żyć po ocenie.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub lives_used: u32,
}

/// Treść zgłoszenia odpowiedzi do oceny.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: i32,
    pub user_answer: String,
    pub response_ms: u32,
}

/// Wiersz rankingu: najlepszy czas i liczba ukończonych wyścigów użytkownika.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub user_id: Option<String>,
    pub display_name: String,
    pub best_time: u32,
    pub completed_races: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardPeriod {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardPeriod::Daily => "daily",
            LeaderboardPeriod::Weekly => "weekly",
            LeaderboardPeriod::Monthly => "monthly",
            LeaderboardPeriod::AllTime => "all-time",
        }
    }

    /// window_start zwraca początek okna czasowego okresu. Sesja liczy się do rankingu,
    /// gdy jej end_utc wypada w oknie. Tygodnie zaczynają się w niedzielę.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight =
            |date: NaiveDate| Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        let today = now.date_naive();

        match self {
            LeaderboardPeriod::Daily => midnight(today),
            LeaderboardPeriod::Weekly => midnight(
                today - Duration::days(i64::from(now.weekday().num_days_from_sunday())),
            ),
            LeaderboardPeriod::Monthly => midnight(today.with_day(1).unwrap()),
            LeaderboardPeriod::AllTime => DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl FromStr for LeaderboardPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<LeaderboardPeriod> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(LeaderboardPeriod::Daily),
            "weekly" => Ok(LeaderboardPeriod::Weekly),
            "monthly" => Ok(LeaderboardPeriod::Monthly),
            "all-time" => Ok(LeaderboardPeriod::AllTime),
            _ => bail!(
                "Invalid period '{}'. Valid values: daily, weekly, monthly, all-time",
                s
            ),
        }
    }
}

/// Rejestr sesji wyścigowych: start i ukończenie sesji, ocena odpowiedzi oraz ranking.
/// Implementacje muszą być bezpieczne dla wątków roboczych.
pub trait SessionLedger: Send + Sync {
    fn start_session(&self, user_id: Option<String>) -> Result<RaceSession>;

    fn get_session(&self, session_id: i32) -> Result<RaceSession>;

    /// Ocenia odpowiedź: porównanie z poprawną opcją bez rozróżniania wielkości liter,
    /// błędna odpowiedź zwiększa lives_used.
    fn submit_answer(&self, session_id: i32, request: &SubmitAnswerRequest)
        -> Result<AnswerOutcome>;

    fn complete_session(&self, session_id: i32, final_time_ms: u32) -> Result<()>;

    fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>>;
}

/// Rejestr sesji trzymany w pamięci. Do oceny odpowiedzi dostaje te same pytania,
/// którymi zasilony jest lokalny bank.
pub struct LocalSessionLedger {
    sessions: Mutex<HashMap<i32, RaceSession>>,
    next_session_id: AtomicI32,
    correct_options: HashMap<i32, String>,
}

impl LocalSessionLedger {
    pub fn new(questions: &[Question]) -> LocalSessionLedger {
        LocalSessionLedger {
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicI32::new(1),
            correct_options: questions
                .iter()
                .map(|q| (q.question_id, q.correct_option.to_owned()))
                .collect(),
        }
    }
}

impl SessionLedger for LocalSessionLedger {
    fn start_session(&self, user_id: Option<String>) -> Result<RaceSession> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);

        let session = RaceSession {
            session_id,
            user_id,
            start_utc: Utc::now(),
            end_utc: None,
            final_time_ms: None,
            lives_used: 0,
            is_completed: false,
            answer_events: vec![],
        };

        self.sessions
            .lock()
            .unwrap()
            .insert(session_id, session.to_owned());

        debug!("Started race session {}", session_id);
        Ok(session)
    }

    fn get_session(&self, session_id: i32) -> Result<RaceSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .context(format!("Session {} does not exist!", session_id))
    }

    fn submit_answer(
        &self,
        session_id: i32,
        request: &SubmitAnswerRequest,
    ) -> Result<AnswerOutcome> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .context(format!("Session {} does not exist!", session_id))?;

        let correct_option = self
            .correct_options
            .get(&request.question_id)
            .context(format!("Invalid question ID {}!", request.question_id))?;

        let is_correct = correct_option.eq_ignore_ascii_case(&request.user_answer);
        if !is_correct {
            session.lives_used += 1;
        }

        session.answer_events.push(AnswerEvent {
            question_id: request.question_id,
            user_answer: request.user_answer.to_owned(),
            response_ms: request.response_ms,
            is_correct,
            created_utc: Utc::now(),
        });

        Ok(AnswerOutcome {
            is_correct,
            lives_used: session.lives_used,
        })
    }

    fn complete_session(&self, session_id: i32, final_time_ms: u32) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .context(format!("Session {} does not exist!", session_id))?;

        session.end_utc = Some(Utc::now());
        session.final_time_ms = Some(final_time_ms);
        session.is_completed = true;

        debug!(
            "Completed race session {} with final time {} ms",
            session_id, final_time_ms
        );
        Ok(())
    }

    fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>> {
        let window_start = period.window_start(Utc::now());
        let sessions = self.sessions.lock().unwrap();

        // agregacja po użytkowniku (wszyscy goście trafiają do jednego wiersza)
        let mut stats: HashMap<Option<String>, (u32, u32)> = HashMap::new();

        for session in sessions.values() {
            if !session.is_completed {
                continue;
            }
            let final_time = match session.final_time_ms {
                Some(final_time) => final_time,
                None => continue,
            };
            let end_utc = match session.end_utc {
                Some(end_utc) => end_utc,
                None => continue,
            };
            if end_utc < window_start {
                continue;
            }

            let entry = stats
                .entry(session.user_id.to_owned())
                .or_insert((u32::MAX, 0));
            entry.0 = entry.0.min(final_time);
            entry.1 += 1;
        }

        let entries: Vec<LeaderboardEntry> = stats
            .into_iter()
            .map(|(user_id, (best_time, completed_races))| LeaderboardEntry {
                display_name: user_id
                    .to_owned()
                    .unwrap_or_else(|| GUEST_DISPLAY_NAME.to_owned()),
                user_id,
                best_time,
                completed_races,
            })
            .collect();

        // sortowanie po najlepszym czasie rosnąco, obcięcie do limitu
        let best_times: Vec<u32> = entries.iter().map(|entry| entry.best_time).collect();
        let mut sorted: Vec<LeaderboardEntry> = argsort(&best_times, SortOrder::Ascending)
            .into_iter()
            .map(|idx| entries[idx].to_owned())
            .collect();
        sorted.truncate(LEADERBOARD_LIMIT);

        Ok(sorted)
    }
}

/// Rejestr sesji za zdalnym API.
pub struct HttpSessionLedger {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSessionLedger {
    pub fn new(base_url: &str) -> HttpSessionLedger {
        HttpSessionLedger {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str, what: &str) -> Result<T> {
        serde_json::from_str(body).context(format!("Failed to parse the {} response!", what))
    }
}

impl SessionLedger for HttpSessionLedger {
    fn start_session(&self, user_id: Option<String>) -> Result<RaceSession> {
        let url = format!("{}/sessions", self.base_url);
        let payload = serde_json::json!({ "userId": user_id });

        debug!(target: "session_ledger", "POST {}", url);

        let body = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload.to_string())
            .send()
            .context(format!("Failed to start a session at {}!", url))?
            .error_for_status()
            .context("Session start endpoint returned an error!")?
            .text()
            .context("Failed to read the session start response!")?;

        Self::parse(&body, "session start")
    }

    fn get_session(&self, session_id: i32) -> Result<RaceSession> {
        let url = format!("{}/sessions/{}", self.base_url, session_id);

        debug!(target: "session_ledger", "GET {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .context(format!("Failed to fetch session {}!", session_id))?
            .error_for_status()
            .context("Session endpoint returned an error!")?
            .text()
            .context("Failed to read the session response!")?;

        Self::parse(&body, "session")
    }

    fn submit_answer(
        &self,
        session_id: i32,
        request: &SubmitAnswerRequest,
    ) -> Result<AnswerOutcome> {
        let url = format!("{}/sessions/{}/answer", self.base_url, session_id);

        debug!(target: "session_ledger", "PATCH {}", url);

        let body = self
            .client
            .patch(&url)
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(request).context("Failed to encode the answer request!")?)
            .send()
            .context(format!("Failed to submit an answer for session {}!", session_id))?
            .error_for_status()
            .context("Answer endpoint returned an error!")?
            .text()
            .context("Failed to read the answer response!")?;

        Self::parse(&body, "answer")
    }

    fn complete_session(&self, session_id: i32, final_time_ms: u32) -> Result<()> {
        let url = format!("{}/sessions/{}/complete", self.base_url, session_id);
        let payload = serde_json::json!({ "finalTimeMs": final_time_ms });

        debug!(target: "session_ledger", "PATCH {}", url);

        self.client
            .patch(&url)
            .header("Content-Type", "application/json")
            .body(payload.to_string())
            .send()
            .context(format!("Failed to complete session {}!", session_id))?
            .error_for_status()
            .context("Session completion endpoint returned an error!")?;

        Ok(())
    }

    fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>> {
        let url = format!("{}/leaderboard", self.base_url);

        debug!(target: "session_ledger", "GET {}?period={}", url, period.as_str());

        let body = self
            .client
            .get(&url)
            .query(&[("period", period.as_str())])
            .send()
            .context(format!("Failed to fetch the leaderboard from {}!", url))?
            .error_for_status()
            .context("Leaderboard endpoint returned an error!")?
            .text()
            .context("Failed to read the leaderboard response!")?;

        Self::parse(&body, "leaderboard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::question_bank::QuestionOptions;

    fn question(question_id: i32, correct_option: &str) -> Question {
        Question {
            question_id,
            topic: "TypeScript".to_owned(),
            difficulty: 4,
            body_markup: "Which keyword narrows a union type?".to_owned(),
            options: QuestionOptions {
                a: "typeof".to_owned(),
                b: "switch".to_owned(),
                c: "await".to_owned(),
            },
            correct_option: correct_option.to_owned(),
            time_limit: 10,
        }
    }

    fn ledger() -> LocalSessionLedger {
        LocalSessionLedger::new(&[question(1, "A"), question(2, "B")])
    }

    fn answer(question_id: i32, user_answer: &str) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            question_id,
            user_answer: user_answer.to_owned(),
            response_ms: 3200,
        }
    }

    #[test]
    fn grading_ignores_answer_case() {
        let ledger = ledger();
        let session = ledger.start_session(None).unwrap();

        let outcome = ledger.submit_answer(session.session_id, &answer(1, "a")).unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.lives_used, 0);

        let outcome = ledger.submit_answer(session.session_id, &answer(1, "A")).unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.lives_used, 0);
    }

    #[test]
    fn wrong_and_empty_answers_cost_lives_without_a_cap() {
        let ledger = ledger();
        let session = ledger.start_session(None).unwrap();

        for expected_lives in 1..=5 {
            let user_answer = if expected_lives % 2 == 0 { "" } else { "C" };
            let outcome = ledger
                .submit_answer(session.session_id, &answer(1, user_answer))
                .unwrap();
            assert!(!outcome.is_correct);
            assert_eq!(outcome.lives_used, expected_lives);
        }

        let stored = ledger.get_session(session.session_id).unwrap();
        assert_eq!(stored.lives_used, 5);
        assert_eq!(stored.answer_events.len(), 5);
    }

    #[test]
    fn unknown_question_or_session_is_an_error() {
        let ledger = ledger();
        let session = ledger.start_session(None).unwrap();

        assert!(ledger.submit_answer(session.session_id, &answer(99, "A")).is_err());
        assert!(ledger.submit_answer(4242, &answer(1, "A")).is_err());
    }

    #[test]
    fn completion_freezes_the_session_outcome() {
        let ledger = ledger();
        let session = ledger.start_session(Some("alice".to_owned())).unwrap();

        ledger.complete_session(session.session_id, 83_456).unwrap();

        let stored = ledger.get_session(session.session_id).unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.final_time_ms, Some(83_456));
        assert!(stored.end_utc.is_some());
    }

    #[test]
    fn leaderboard_groups_by_user_with_best_time() {
        let ledger = ledger();

        for final_time_ms in [60_000, 45_000].iter() {
            let session = ledger.start_session(Some("alice".to_owned())).unwrap();
            ledger.complete_session(session.session_id, *final_time_ms).unwrap();
        }

        let guest = ledger.start_session(None).unwrap();
        ledger.complete_session(guest.session_id, 52_000).unwrap();

        let unfinished = ledger.start_session(Some("bob".to_owned())).unwrap();
        assert!(ledger.get_session(unfinished.session_id).is_ok());

        let entries = ledger.leaderboard(LeaderboardPeriod::AllTime).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].display_name, "alice");
        assert_eq!(entries[0].best_time, 45_000);
        assert_eq!(entries[0].completed_races, 2);

        assert_eq!(entries[1].display_name, "Guest");
        assert_eq!(entries[1].user_id, None);
        assert_eq!(entries[1].best_time, 52_000);
    }

    #[test]
    fn leaderboard_window_drops_old_sessions() {
        let ledger = ledger();

        let recent = ledger.start_session(Some("recent".to_owned())).unwrap();
        ledger.complete_session(recent.session_id, 40_000).unwrap();

        let old = ledger.start_session(Some("old".to_owned())).unwrap();
        ledger.complete_session(old.session_id, 30_000).unwrap();

        // przesunięcie end_utc starej sesji o 10 dni wstecz
        {
            let mut sessions = ledger.sessions.lock().unwrap();
            let session = sessions.get_mut(&old.session_id).unwrap();
            session.end_utc = Some(Utc::now() - Duration::days(10));
        }

        let daily = ledger.leaderboard(LeaderboardPeriod::Daily).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].display_name, "recent");

        let all_time = ledger.leaderboard(LeaderboardPeriod::AllTime).unwrap();
        assert_eq!(all_time.len(), 2);
        assert_eq!(all_time[0].best_time, 30_000);
    }

    #[test]
    fn leaderboard_is_sorted_and_truncated() {
        let ledger = ledger();

        for i in 0..60u32 {
            let session = ledger
                .start_session(Some(format!("user{:02}", i)))
                .unwrap();
            ledger
                .complete_session(session.session_id, 100_000 - i * 500)
                .unwrap();
        }

        let entries = ledger.leaderboard(LeaderboardPeriod::Daily).unwrap();
        assert_eq!(entries.len(), 50);

        for pair in entries.windows(2) {
            assert!(pair[0].best_time <= pair[1].best_time);
        }
        assert_eq!(entries[0].best_time, 100_000 - 59 * 500);
    }

    #[test]
    fn period_strings_parse_and_roundtrip() {
        for period in [
            LeaderboardPeriod::Daily,
            LeaderboardPeriod::Weekly,
            LeaderboardPeriod::Monthly,
            LeaderboardPeriod::AllTime,
        ]
        .iter()
        {
            assert_eq!(
                LeaderboardPeriod::from_str(period.as_str()).unwrap(),
                *period
            );
        }

        assert!(LeaderboardPeriod::from_str("DAILY").is_ok());
        assert!(LeaderboardPeriod::from_str("yearly").is_err());
    }

    #[test]
    fn window_starts_match_the_calendar() {
        // piątek, 21 sierpnia 2026, 14:30 UTC
        let now = Utc.with_ymd_and_hms(2026, 8, 21, 14, 30, 0).unwrap();

        let daily = LeaderboardPeriod::Daily.window_start(now);
        assert_eq!(daily, Utc.with_ymd_and_hms(2026, 8, 21, 0, 0, 0).unwrap());

        // tydzień liczony od niedzieli
        let weekly = LeaderboardPeriod::Weekly.window_start(now);
        assert_eq!(weekly, Utc.with_ymd_and_hms(2026, 8, 16, 0, 0, 0).unwrap());

        let monthly = LeaderboardPeriod::Monthly.window_start(now);
        assert_eq!(monthly, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());

        let all_time = LeaderboardPeriod::AllTime.window_start(now);
        assert!(all_time < Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap());
    }
}
