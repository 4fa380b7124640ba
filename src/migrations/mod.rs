//! Linear schema migrations
//!
//! Scripts are registered in application order, each with an `up` and a
//! `down` SQL text. A run brings the database exactly to the target script:
//! 1. Roll backward: undo applied scripts newer than the target, newest first
//! 2. Roll forward: apply registered scripts up to and including the target
//!
//! The first registered script must create the `_migrations` bookkeeping
//! table. Failures are logged and end the run; the database stays wherever
//! the last successful script left it.

pub mod scripts;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{FetchRequest, Filter, Populate, QueryEngine, Row, SortOrder, TableDescriptor};
use crate::storage::Executor;
use crate::{Error, Result};

/// Bookkeeping table: one row per applied script
pub const MIGRATIONS_TABLE: TableDescriptor = TableDescriptor::new("_migrations")
    .pk_col("name")
    .populate_on_insert(&[("executed_at", Populate::Now)]);

/// One forward/backward pair of SQL texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub name: String,
    pub up: String,
    pub down: String,
}

impl MigrationScript {
    pub fn new(name: impl Into<String>, up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Ordered list of scripts with unique names
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    scripts: Vec<MigrationScript>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scripts(scripts: impl IntoIterator<Item = MigrationScript>) -> Result<Self> {
        let mut registry = Self::new();
        for script in scripts {
            registry.add(script)?;
        }
        Ok(registry)
    }

    /// Append a script; names must be unique
    pub fn add(&mut self, script: MigrationScript) -> Result<()> {
        if self.get(&script.name).is_some() {
            return Err(Error::InvalidRequest(format!(
                "Migration script '{}' is registered twice",
                script.name
            )));
        }
        self.scripts.push(script);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MigrationScript> {
        self.scripts.iter().find(|s| s.name == name)
    }

    pub fn scripts(&self) -> &[MigrationScript] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// The last script allowed to be current for a target
    ///
    /// `None` means nothing may be applied.
    pub fn last_script(&self, target: &MigrationTarget) -> Result<Option<&MigrationScript>> {
        match target {
            MigrationTarget::Latest => Ok(self.scripts.last()),
            MigrationTarget::Nothing => Ok(None),
            MigrationTarget::Through(name) => self.get(name).map(Some).ok_or_else(|| {
                Error::InvalidRequest(format!("Unknown migration checkpoint '{}'", name))
            }),
        }
    }
}

/// The application's scripts
pub fn default_registry() -> Result<MigrationRegistry> {
    MigrationRegistry::from_scripts(scripts::all())
}

/// How far a run should bring the database
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum MigrationTarget {
    /// Every registered script
    #[default]
    Latest,
    /// Scripts up to and including this one
    Through(String),
    /// Roll everything back and apply nothing
    Nothing,
}

impl MigrationTarget {
    /// Interpret a configured checkpoint: absent means latest, empty means nothing
    pub fn from_checkpoint(checkpoint: Option<&str>) -> Self {
        match checkpoint.map(str::trim) {
            None => MigrationTarget::Latest,
            Some("") => MigrationTarget::Nothing,
            Some(name) => MigrationTarget::Through(name.to_string()),
        }
    }
}

/// Which half of a script failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    pub script: String,
    pub direction: MigrationDirection,
    pub message: String,
}

/// What one run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Scripts rolled back, newest first
    pub rolled_back: Vec<String>,
    /// Scripts applied, in registry order
    pub applied: Vec<String>,
    pub failure: Option<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Nothing was rolled back or applied
    pub fn is_noop(&self) -> bool {
        self.rolled_back.is_empty() && self.applied.is_empty() && self.failure.is_none()
    }
}

/// Bookkeeping row of one applied script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedScript {
    pub name: String,
    #[serde(default, with = "crate::db::timestamp::option")]
    pub executed_at: Option<DateTime<Utc>>,
}

/// State of one registered script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub executed_at: Option<DateTime<Utc>>,
    /// Lies after the target; a run would leave it unapplied
    pub beyond_checkpoint: bool,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.executed_at.is_some()
    }
}

/// Runs a registry against a store
pub struct MigrationRunner<'a> {
    store: &'a dyn Executor,
    registry: &'a MigrationRegistry,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(store: &'a dyn Executor, registry: &'a MigrationRegistry) -> Self {
        Self { store, registry }
    }

    fn engine(&self) -> QueryEngine<'a> {
        QueryEngine::new(self.store)
    }

    fn bookkeeping_exists(&self) -> Result<bool> {
        self.store.table_exists(MIGRATIONS_TABLE.table)
    }

    /// Applied scripts in application order; empty before the first run
    pub fn applied(&self) -> Result<Vec<AppliedScript>> {
        if !self.bookkeeping_exists()? {
            return Ok(Vec::new());
        }
        let req = FetchRequest::new().order(SortOrder::Raw("t.executed_at, t.rowid".to_string()));
        Ok(self
            .engine()
            .fetch_page_as::<AppliedScript>(&MIGRATIONS_TABLE, &req)?
            .rows)
    }

    fn is_applied(&self, name: &str) -> Result<bool> {
        let req = FetchRequest::new().filter(Filter::by(MIGRATIONS_TABLE.pk_col, name));
        Ok(self.engine().fetch_one(&MIGRATIONS_TABLE, &req)?.is_some())
    }

    /// Bring the database exactly to the target
    ///
    /// Script failures end the run and are reported, not returned as errors.
    pub fn run(&self, target: &MigrationTarget) -> Result<MigrationReport> {
        let last = self.registry.last_script(target)?;
        let last_name = last.map(|s| s.name.as_str());
        let mut report = MigrationReport::default();

        tracing::info!(checkpoint = ?target, "Running migration scripts");

        if self.bookkeeping_exists()? {
            self.roll_backward(last_name, &mut report)?;
            if report.failure.is_some() {
                return Ok(report);
            }
        }

        if let Some(last_name) = last_name {
            self.roll_forward(last_name, &mut report)?;
        }

        Ok(report)
    }

    fn roll_backward(&self, last_name: Option<&str>, report: &mut MigrationReport) -> Result<()> {
        let applied = self.applied()?;

        // Not yet migrated as far as the target: nothing to undo
        if let Some(last_name) = last_name {
            if !applied.iter().any(|a| a.name == last_name) {
                return Ok(());
            }
        }

        for entry in applied.iter().rev() {
            if Some(entry.name.as_str()) == last_name {
                break;
            }
            let Some(script) = self.registry.get(&entry.name) else {
                tracing::warn!("Migration script not found to roll back: '{}'", entry.name);
                continue;
            };

            tracing::info!("Rolling back migration '{}'", script.name);
            if let Err(err) = self.unapply(script) {
                record_failure(report, script, MigrationDirection::Down, err);
                return Ok(());
            }
            report.rolled_back.push(script.name.clone());
        }
        Ok(())
    }

    fn unapply(&self, script: &MigrationScript) -> Result<()> {
        self.store.execute_batch(&script.down)?;
        // Undoing the first script drops the bookkeeping table itself
        if self.bookkeeping_exists()? {
            self.engine().delete(
                &MIGRATIONS_TABLE,
                &Filter::by(MIGRATIONS_TABLE.pk_col, script.name.as_str()),
                None,
                false,
            )?;
        }
        Ok(())
    }

    fn roll_forward(&self, last_name: &str, report: &mut MigrationReport) -> Result<()> {
        for (i, script) in self.registry.scripts().iter().enumerate() {
            let executed = if i == 0 {
                self.bookkeeping_exists()?
            } else {
                self.is_applied(&script.name)?
            };

            if !executed {
                tracing::info!("Rolling forward migration script '{}'", script.name);
                if let Err(err) = self.apply(script) {
                    record_failure(report, script, MigrationDirection::Up, err);
                    return Ok(());
                }
                report.applied.push(script.name.clone());
            }

            if script.name == last_name {
                break;
            }
        }
        Ok(())
    }

    fn apply(&self, script: &MigrationScript) -> Result<()> {
        self.store.execute_batch(&script.up)?;
        let mut row = Row::new();
        row.insert("name".to_string(), Value::String(script.name.clone()));
        self.engine().insert(&MIGRATIONS_TABLE, row)?;
        Ok(())
    }

    /// Every registered script with its applied time and checkpoint position
    pub fn status(&self, target: &MigrationTarget) -> Result<Vec<MigrationStatus>> {
        let last_name = self.registry.last_script(target)?.map(|s| s.name.clone());
        let applied = self.applied()?;

        let known: HashSet<&str> = self.registry.scripts().iter().map(|s| s.name.as_str()).collect();
        for orphan in applied.iter().filter(|a| !known.contains(a.name.as_str())) {
            tracing::warn!("Applied migration '{}' is not registered", orphan.name);
        }

        let mut beyond = last_name.is_none();
        Ok(self
            .registry
            .scripts()
            .iter()
            .map(|script| {
                let status = MigrationStatus {
                    name: script.name.clone(),
                    executed_at: applied
                        .iter()
                        .find(|a| a.name == script.name)
                        .and_then(|a| a.executed_at),
                    beyond_checkpoint: beyond,
                };
                if last_name.as_deref() == Some(script.name.as_str()) {
                    beyond = true;
                }
                status
            })
            .collect())
    }
}

fn record_failure(
    report: &mut MigrationReport,
    script: &MigrationScript,
    direction: MigrationDirection,
    err: Error,
) {
    tracing::error!("Error in DB script '{}': {}", script.name, err);
    report.failure = Some(MigrationFailure {
        script: script.name.clone(),
        direction,
        message: err.to_string(),
    });
}
