use std::path::Path;
use std::sync::Arc;

use casebook::config::{CasebookConfig, ensure_db_dir, write_config};
use casebook::migrations::{MigrationReport, MigrationRunner, MigrationTarget, default_registry};
use casebook::server::{AppState, start_server};
use casebook::services::{self, EncounterListParams, EncounterNoteListParams, UserListParams};
use casebook::storage::SqliteStore;
use casebook::ui::{self, Icons, Tone};

use crate::{OutputMode, emit_success};

fn open_store(config: &CasebookConfig) -> anyhow::Result<SqliteStore> {
    ensure_db_dir(&config.database)?;
    tracing::debug!(database = %config.database.display(), "opening store");
    Ok(SqliteStore::open(&config.database)?)
}

fn describe(target: &MigrationTarget) -> String {
    match target {
        MigrationTarget::Latest => "latest".to_string(),
        MigrationTarget::Through(name) => name.clone(),
        MigrationTarget::Nothing => "nothing (roll everything back)".to_string(),
    }
}

fn print_report(report: &MigrationReport) {
    for name in &report.rolled_back {
        println!("{} {}", Icons::DOWN, name);
    }
    for name in &report.applied {
        println!("{} {}", Icons::UP, name);
    }
    match &report.failure {
        Some(failure) => ui::error(&format!(
            "Script '{}' failed ({:?}): {}",
            failure.script, failure.direction, failure.message
        )),
        None if report.is_noop() => ui::success("Schema already at the checkpoint"),
        None => ui::success(&format!(
            "{} rolled back, {} applied",
            report.rolled_back.len(),
            report.applied.len()
        )),
    }
}

pub fn run_init(output: OutputMode, path: &Path, force: bool) -> anyhow::Result<()> {
    let config = CasebookConfig::default();
    write_config(path, &config, force)?;
    if output.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
        ui::summary_row("database", &config.database.display().to_string());
        ui::summary_row("port", &config.port.to_string());
    } else {
        emit_success("init", serde_json::json!({ "path": path, "config": config }))?;
    }
    Ok(())
}

pub fn run_migrate(output: OutputMode, config: &CasebookConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = default_registry()?;
    let target = config.target();

    if output.is_human() {
        ui::header("Running migrations");
        ui::info("Database", &config.database.display().to_string());
        ui::info("Checkpoint", &describe(&target));
        println!();
    }

    let report = MigrationRunner::new(&store, &registry).run(&target)?;

    if output.is_human() {
        print_report(&report);
    } else {
        emit_success("migrate", &report)?;
    }
    if let Some(failure) = &report.failure {
        anyhow::bail!("migration '{}' failed", failure.script);
    }
    Ok(())
}

pub fn run_status(output: OutputMode, config: &CasebookConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = default_registry()?;
    let target = config.target();
    let status = MigrationRunner::new(&store, &registry).status(&target)?;

    if output.is_human() {
        ui::section("Migrations");
        ui::info("Checkpoint", &describe(&target));
        println!("{}", ui::migration_table(&status));
    } else {
        emit_success("status", &status)?;
    }
    Ok(())
}

pub fn run_serve(config: &CasebookConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = default_registry()?;
    let target = config.target();

    if config.migrate_on_start {
        let report = MigrationRunner::new(&store, &registry).run(&target)?;
        if let Some(failure) = &report.failure {
            anyhow::bail!("migration '{}' failed: {}", failure.script, failure.message);
        }
        tracing::info!(
            applied = report.applied.len(),
            rolled_back = report.rolled_back.len(),
            "schema ready"
        );
    }

    let state = AppState {
        store: Arc::new(store),
        registry: Arc::new(registry),
        target,
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(start_server(config.port, state))
}

fn print_count(shown: usize, count: Option<u64>) {
    let total = count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string());
    println!("{}", ui::muted(&format!("{} of {} shown", shown, total)));
}

pub fn run_users(output: OutputMode, config: &CasebookConfig, params: &UserListParams) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let page = services::user_list(&store, params)?;

    if output.is_human() {
        ui::section(&format!("{} Users", Icons::PERSON));
        println!("{}", ui::user_table(&page.rows));
        print_count(page.rows.len(), page.count);
    } else {
        emit_success("users", &page)?;
    }
    Ok(())
}

pub fn run_encounters(
    output: OutputMode,
    config: &CasebookConfig,
    params: &EncounterListParams,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let page = services::encounter_list(&store, params)?;

    if output.is_human() {
        ui::section(&format!("{} Encounters", Icons::FOLDER));
        println!("{}", ui::encounter_table(&page.rows));
        print_count(page.rows.len(), page.count);
    } else {
        emit_success("encounters", &page)?;
    }
    Ok(())
}

pub fn run_notes(
    output: OutputMode,
    config: &CasebookConfig,
    params: &EncounterNoteListParams,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let page = services::encounter_note_list(&store, params)?;

    if output.is_human() {
        let encounter = params.encounter_id.as_deref().unwrap_or_default();
        ui::section(&format!("{} Notes of {}", Icons::NOTE, ui::paint(encounter, Tone::Label)));
        if page.rows.is_empty() {
            ui::warn("No notes");
        } else {
            println!("{}", ui::note_table(&page.rows));
        }
        print_count(page.rows.len(), page.count);
    } else {
        emit_success("notes", &page)?;
    }
    Ok(())
}
