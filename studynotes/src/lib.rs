//! StudyNotes library
//!
//! Notes, drawings and reminders for students: the domain model, editing
//! state machines, persistence and reminder notification bookkeeping.

pub mod app;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod services;
pub mod storage;
