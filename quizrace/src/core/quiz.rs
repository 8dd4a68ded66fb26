use crate::services::question_bank::Question;
use log::debug;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    QuestionLoading,
    QuestionActive,
    Resolved,
}

/// * `time_limit_ms` - (ms) limit czasu na odpowiedź, gdy pytanie nie niesie własnego limitu
/// * `resolved_display_ms` - (ms) czas wyświetlania wyniku po rozstrzygnięciu pytania
/// * `max_lives` - liczba żyć gracza na cały wyścig
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuizPars {
    pub time_limit_ms: f64,
    pub resolved_display_ms: f64,
    pub max_lives: u32,
}

impl Default for QuizPars {
    fn default() -> QuizPars {
        QuizPars {
            time_limit_ms: 10_000.0,
            resolved_display_ms: 1500.0,
            max_lives: 3,
        }
    }
}

/// Zgłoszenie odpowiedzi do oceny. Puste user_answer oznacza timeout.
#[derive(Debug, Clone)]
pub struct QuizSubmission {
    pub generation: u64,
    pub question_id: i32,
    pub user_answer: String,
    pub response_ms: u32,
}

/// Maszyna stanów quizu: Idle -> QuestionLoading -> QuestionActive -> Resolved -> Idle.
/// Licznik generation rośnie przy każdym otwarciu quizu i przy resecie, dzięki czemu
/// spóźnione wyniki serwisów dotyczące starych pytań są odrzucane. Odliczanie biegnie
/// na zegarze symulacji, więc pauza gry zatrzymuje też licznik pytania.
#[derive(Debug)]
pub struct QuizMachine {
    pars: QuizPars,
    phase: QuizPhase,
    generation: u64,
    question: Option<Question>,
    question_start_ms: f64,
    time_limit_ms: f64,
    resolved_at_ms: f64,
    answer_submitted: bool,
}

impl QuizMachine {
    pub fn new(pars: &QuizPars) -> QuizMachine {
        QuizMachine {
            pars: pars.to_owned(),
            phase: QuizPhase::Idle,
            generation: 0,
            question: None,
            question_start_ms: 0.0,
            time_limit_ms: pars.time_limit_ms,
            resolved_at_ms: 0.0,
            answer_submitted: false,
        }
    }

    /// trigger otwiera quiz po trafieniu checkpointu. Zwraca numer generation dla
    /// zlecanego pobrania pytania albo None, gdy quiz nie jest w stanie Idle.
    pub fn trigger(&mut self, _now_ms: f64) -> Option<u64> {
        if !matches!(self.phase, QuizPhase::Idle) {
            return None;
        }

        self.generation += 1;
        self.phase = QuizPhase::QuestionLoading;
        Some(self.generation)
    }

    /// question_loaded aktywuje pytanie, jeśli generation wciąż pasuje. Zwraca true,
    /// gdy pytanie zostało przyjęte.
    pub fn question_loaded(&mut self, generation: u64, question: Question, now_ms: f64) -> bool {
        if generation != self.generation || !matches!(self.phase, QuizPhase::QuestionLoading) {
            debug!(
                "Discarding stale question result (generation {}, current {})",
                generation, self.generation
            );
            return false;
        }

        // limit czasu: pytanie może nieść własny limit w sekundach
        self.time_limit_ms = if question.time_limit > 0 {
            f64::from(question.time_limit) * 1000.0
        } else {
            self.pars.time_limit_ms
        };

        self.question = Some(question);
        self.question_start_ms = now_ms;
        self.answer_submitted = false;
        self.phase = QuizPhase::QuestionActive;
        true
    }

    /// load_failed zamyka quiz po nieudanym pobraniu pytania (gra toczy się dalej).
    pub fn load_failed(&mut self, generation: u64) {
        if generation != self.generation || !matches!(self.phase, QuizPhase::QuestionLoading) {
            return;
        }

        self.close_to_idle();
    }

    /// remaining_ms zwraca pozostały czas na odpowiedź (0.0 poza stanem QuestionActive).
    pub fn remaining_ms(&self, now_ms: f64) -> f64 {
        if !matches!(self.phase, QuizPhase::QuestionActive) {
            return 0.0;
        }

        (self.time_limit_ms - (now_ms - self.question_start_ms)).max(0.0)
    }

    /// poll obsługuje odliczanie i zamykanie ekranu wyniku. Wywoływana raz na klatkę.
    /// Zwraca zgłoszenie pustej odpowiedzi dokładnie raz, gdy czas minął.
    pub fn poll(&mut self, now_ms: f64) -> Option<QuizSubmission> {
        match self.phase {
            QuizPhase::QuestionActive => {
                if !self.answer_submitted && self.remaining_ms(now_ms) <= 0.0 {
                    self.answer_submitted = true;
                    self.phase = QuizPhase::Resolved;
                    self.resolved_at_ms = now_ms;

                    return Some(QuizSubmission {
                        generation: self.generation,
                        question_id: self.question.as_ref().map_or(0, |q| q.question_id),
                        user_answer: String::new(),
                        response_ms: self.time_limit_ms.round() as u32,
                    });
                }
            }

            QuizPhase::Resolved => {
                if now_ms >= self.resolved_at_ms + self.pars.resolved_display_ms {
                    self.close_to_idle();
                }
            }

            _ => {}
        }

        None
    }

    /// submit_answer przyjmuje odpowiedź gracza. Zwraca None, gdy pytanie nie jest już
    /// aktywne (np. spóźniona odpowiedź po timeoucie).
    pub fn submit_answer(&mut self, user_answer: &str, now_ms: f64) -> Option<QuizSubmission> {
        if !matches!(self.phase, QuizPhase::QuestionActive) || self.answer_submitted {
            return None;
        }

        self.answer_submitted = true;
        self.phase = QuizPhase::Resolved;
        self.resolved_at_ms = now_ms;

        Some(QuizSubmission {
            generation: self.generation,
            question_id: self.question.as_ref().map_or(0, |q| q.question_id),
            user_answer: user_answer.to_owned(),
            response_ms: (now_ms - self.question_start_ms).round() as u32,
        })
    }

    /// dismiss zamyka quiz natychmiast, np. gdy ocena odpowiedzi nie powiodła się.
    pub fn dismiss(&mut self) {
        self.close_to_idle();
    }

    /// reset zamyka quiz i unieważnia wszystkie zlecenia w locie (koniec wyścigu).
    pub fn reset(&mut self) {
        self.close_to_idle();
        self.generation += 1;
    }

    // zamknięcie do Idle nie podbija generation, bo ocena odpowiedzi z bieżącego
    // pytania może jeszcze nadejść i musi zostać przyjęta
    fn close_to_idle(&mut self) {
        self.phase = QuizPhase::Idle;
        self.question = None;
        self.answer_submitted = false;
    }

    /// get_phase zwraca bieżący stan maszyny.
    pub fn get_phase(&self) -> QuizPhase {
        self.phase
    }

    /// is_idle sprawdza, czy quiz jest zamknięty (sterowanie gracza aktywne).
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, QuizPhase::Idle)
    }

    /// get_generation zwraca bieżący numer generation do filtrowania zdarzeń serwisów.
    pub fn get_generation(&self) -> u64 {
        self.generation
    }

    /// get_question zwraca aktywne pytanie, jeśli jakieś jest wyświetlane.
    pub fn get_question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// get_question_start_ms zwraca czas symulacji, w którym pytanie się pojawiło.
    pub fn get_question_start_ms(&self) -> f64 {
        self.question_start_ms
    }
}
