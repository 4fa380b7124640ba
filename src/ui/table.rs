use chrono::{DateTime, Utc};
use tabled::{Table, Tabled, settings::Style};

use crate::entities::{EncounterNoteRow, EncounterRow, UserRow};
use crate::migrations::MigrationStatus;
use crate::ui::Icons;

const MESSAGE_WIDTH: usize = 60;

#[derive(Tabled)]
struct MigrationLine {
    #[tabled(rename = "")]
    icon: &'static str,
    #[tabled(rename = "Script")]
    name: String,
    #[tabled(rename = "Applied")]
    applied: String,
    #[tabled(rename = "State")]
    state: &'static str,
}

#[derive(Tabled)]
struct UserLine {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Created")]
    created: String,
}

#[derive(Tabled)]
struct EncounterLine {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Advocate")]
    advocate: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Notes")]
    notes: i64,
    #[tabled(rename = "Id")]
    id: String,
}

#[derive(Tabled)]
struct NoteLine {
    #[tabled(rename = "Submitted")]
    submitted: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Personal")]
    personal: &'static str,
    #[tabled(rename = "Message")]
    message: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

fn when(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// First line of a message, cut to the column width
fn excerpt(message: &str) -> String {
    let first = message.lines().next().unwrap_or_default();
    let mut out: String = first.chars().take(MESSAGE_WIDTH).collect();
    if first.chars().count() > MESSAGE_WIDTH || message.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}

pub fn migration_table(status: &[MigrationStatus]) -> String {
    let rows: Vec<MigrationLine> = status
        .iter()
        .map(|s| {
            let (icon, state) = match (s.is_applied(), s.beyond_checkpoint) {
                (true, false) => (Icons::CHECK, "applied"),
                (false, false) => (Icons::PENDING, "pending"),
                (true, true) => (Icons::DOWN, "will roll back"),
                (false, true) => (Icons::STOP, "beyond checkpoint"),
            };
            MigrationLine {
                icon,
                name: s.name.clone(),
                applied: when(s.executed_at),
                state,
            }
        })
        .collect();
    render(&rows)
}

pub fn user_table(users: &[UserRow]) -> String {
    let rows: Vec<UserLine> = users
        .iter()
        .map(|u| UserLine {
            name: text(&u.name),
            id: text(&u.id),
            created: when(u.created_at),
        })
        .collect();
    render(&rows)
}

pub fn encounter_table(encounters: &[EncounterRow]) -> String {
    let rows: Vec<EncounterLine> = encounters
        .iter()
        .map(|e| EncounterLine {
            started: when(e.started_at),
            summary: text(&e.summary),
            advocate: text(&e.advocate_name),
            client: text(&e.client_name),
            notes: e.notes_count.unwrap_or(0),
            id: text(&e.id),
        })
        .collect();
    render(&rows)
}

pub fn note_table(notes: &[EncounterNoteRow]) -> String {
    let rows: Vec<NoteLine> = notes
        .iter()
        .map(|n| NoteLine {
            submitted: when(n.submitted_at),
            kind: n.note_type.map(|t| t.as_str()).unwrap_or("-"),
            personal: if n.personal.unwrap_or(false) { "yes" } else { "" },
            message: n.message.as_deref().map(excerpt).unwrap_or_default(),
        })
        .collect();
    render(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_lists_render_nothing() {
        assert!(user_table(&[]).is_empty());
        assert!(migration_table(&[]).is_empty());
    }

    #[test]
    fn test_migration_states() {
        let status = vec![
            MigrationStatus { name: "a".into(), executed_at: Some(Utc::now()), beyond_checkpoint: false },
            MigrationStatus { name: "b".into(), executed_at: None, beyond_checkpoint: true },
        ];
        let table = migration_table(&status);
        assert!(table.contains("applied"));
        assert!(table.contains("beyond checkpoint"));
    }

    #[test]
    fn test_excerpt_keeps_first_line() {
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt("Hey there.\n\nMore"), "Hey there.…");
        assert_eq!(excerpt(&"x".repeat(70)).chars().count(), MESSAGE_WIDTH + 1);
    }
}
