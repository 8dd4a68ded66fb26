pub mod controller;
pub mod question_bank;
pub mod session_ledger;
