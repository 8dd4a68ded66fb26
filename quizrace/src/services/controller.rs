use crate::services::question_bank::{Question, QuestionBank, QuestionFilters};
use crate::services::session_ledger::{
    AnswerOutcome, LeaderboardEntry, LeaderboardPeriod, RaceSession, SessionLedger,
    SubmitAnswerRequest,
};
use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Zlecenia wysyłane przez rdzeń gry do serwisów. Pętla symulacji nigdy nie woła
/// serwisów wprost, tylko kolejkuje akcje i czyta wyniki między klatkami.
#[derive(Debug, Clone)]
pub enum GameAction {
    FetchQuestion {
        generation: u64,
        topic: Option<String>,
        difficulty: Option<u8>,
    },
    SubmitAnswer {
        generation: u64,
        question_id: i32,
        user_answer: String,
        response_ms: u32,
    },
    CompleteSession {
        final_time_ms: u32,
    },
}

/// Wyniki serwisów wracające do rdzenia gry. Błędy podróżują jako tekst, bo pętla
/// symulacji tylko je loguje i jedzie dalej.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    QuestionFetched {
        generation: u64,
        result: Result<Question, String>,
    },
    AnswerGraded {
        generation: u64,
        result: Result<AnswerOutcome, String>,
    },
    SessionCompleted {
        result: Result<(), String>,
    },
}

/// Pośrednik między pętlą symulacji a bankiem pytań i rejestrem sesji. Każda akcja
/// dostaje własny krótki wątek roboczy, wyniki wracają kanałem flume.
pub struct SessionController {
    question_bank: Arc<dyn QuestionBank>,
    session_ledger: Arc<dyn SessionLedger>,
    session_id: Option<i32>,
    pending: Cell<usize>,
    tx: Sender<ServiceEvent>,
    rx: Receiver<ServiceEvent>,
}

impl SessionController {
    pub fn new(
        question_bank: Arc<dyn QuestionBank>,
        session_ledger: Arc<dyn SessionLedger>,
    ) -> SessionController {
        let (tx, rx) = flume::unbounded();

        SessionController {
            question_bank,
            session_ledger,
            session_id: None,
            pending: Cell::new(0),
            tx,
            rx,
        }
    }

    /// Blokująco zakłada sesję wyścigu. Musi zostać wywołane przed pętlą symulacji.
    pub fn start_session(&mut self, user_id: Option<String>) -> Result<RaceSession> {
        let session = self
            .session_ledger
            .start_session(user_id)
            .context("Failed to start a race session!")?;
        self.session_id = Some(session.session_id);
        Ok(session)
    }

    /// get_session_id zwraca identyfikator rozpoczętej sesji.
    pub fn get_session_id(&self) -> Option<i32> {
        self.session_id
    }

    /// Zleca akcję wątkowi roboczemu. Wynik wróci później przez try_drain/drain_timeout.
    pub fn dispatch(&self, action: GameAction) {
        let session_id = match self.session_id {
            Some(session_id) => session_id,
            None => panic!("Tried to dispatch a service action without a started session!"),
        };

        self.pending.set(self.pending.get() + 1);
        let tx = self.tx.clone();

        match action {
            GameAction::FetchQuestion {
                generation,
                topic,
                difficulty,
            } => {
                let question_bank = Arc::clone(&self.question_bank);
                thread::spawn(move || {
                    let result = question_bank
                        .random_question(&QuestionFilters {
                            topic,
                            difficulty,
                            session_id: Some(session_id),
                        })
                        .map_err(|err| format!("{:#}", err));
                    let _ = tx.send(ServiceEvent::QuestionFetched { generation, result });
                });
            }

            GameAction::SubmitAnswer {
                generation,
                question_id,
                user_answer,
                response_ms,
            } => {
                let session_ledger = Arc::clone(&self.session_ledger);
                thread::spawn(move || {
                    let request = SubmitAnswerRequest {
                        question_id,
                        user_answer,
                        response_ms,
                    };
                    let result = session_ledger
                        .submit_answer(session_id, &request)
                        .map_err(|err| format!("{:#}", err));
                    let _ = tx.send(ServiceEvent::AnswerGraded { generation, result });
                });
            }

            GameAction::CompleteSession { final_time_ms } => {
                let session_ledger = Arc::clone(&self.session_ledger);
                thread::spawn(move || {
                    let result = session_ledger
                        .complete_session(session_id, final_time_ms)
                        .map_err(|err| format!("{:#}", err));
                    let _ = tx.send(ServiceEvent::SessionCompleted { result });
                });
            }
        }
    }

    /// Zbiera gotowe wyniki bez blokowania. Wywoływane raz między klatkami.
    pub fn try_drain(&self) -> Vec<ServiceEvent> {
        let events: Vec<ServiceEvent> = self.rx.try_iter().collect();
        self.pending
            .set(self.pending.get().saturating_sub(events.len()));
        events
    }

    /// Czeka krótko na zaległe wyniki (dogrywka po końcu wyścigu).
    pub fn drain_timeout(&self, timeout: Duration) -> Vec<ServiceEvent> {
        let mut events: Vec<ServiceEvent> = vec![];

        if let Ok(event) = self.rx.recv_timeout(timeout) {
            events.push(event);
        }
        events.extend(self.rx.try_iter());

        self.pending
            .set(self.pending.get().saturating_sub(events.len()));
        events
    }

    /// get_pending zwraca liczbę zleceń w locie.
    pub fn get_pending(&self) -> usize {
        self.pending.get()
    }

    /// Blokująco pobiera ranking. Tylko poza pętlą symulacji.
    pub fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>> {
        self.session_ledger.leaderboard(period)
    }

    /// Blokująco pobiera listę tematów banku pytań.
    pub fn list_topics(&self) -> Result<Vec<String>> {
        self.question_bank.list_topics()
    }

    /// Blokująco pobiera bieżący stan sesji.
    pub fn get_session(&self) -> Result<RaceSession> {
        let session_id = self.session_id.context("Session has not been started!")?;
        self.session_ledger.get_session(session_id)
    }
}
