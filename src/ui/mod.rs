//! Terminal output: tones, icons, status lines and tables

pub mod icons;
pub mod output;
pub mod table;

pub use icons::Icons;
pub use output::{Tone, error, header, info, muted, paint, section, success, summary_row, warn};
pub use table::{encounter_table, migration_table, note_table, user_table};
