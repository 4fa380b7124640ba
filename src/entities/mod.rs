//! Application tables: one descriptor plus one typed row per table

pub mod encounter;
pub mod encounter_note;
pub mod user;

pub use encounter::{ENCOUNTER_TABLE, EncounterRow};
pub use encounter_note::{ENCOUNTER_NOTE_TABLE, EncounterNoteRow, EncounterNoteType};
pub use user::{USER_TABLE, UserRow};
