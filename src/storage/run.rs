//! Run storage: save, load, list, and resolve planning runs.

use std::{fs, io};

use jiff::Timestamp;
use jiff::civil::Date;
use rusqlite::{Connection, Transaction, params};
use uuid::Uuid;

use crate::model::{
    Allocation, EpicOutcome, EpicState, Priority, RunSettings, RunSummary, SavedRun,
    Underutilization, UnderutilizationReason,
};

use super::{Result, Storage, StorageError};

impl Storage {
    /// Saves a run into a new `SQLite` file.
    pub fn create_run(&self, run: &SavedRun) -> Result<()> {
        let mut conn = self.create_db(run.summary.id)?;
        let tx = conn.transaction()?;
        insert_summary(&tx, &run.summary)?;
        insert_allocations(&tx, &run.allocations)?;
        insert_outcomes(&tx, &run.outcomes)?;
        insert_underutilization(&tx, &run.underutilization)?;
        tx.commit()?;
        Ok(())
    }

    /// Loads a full run.
    pub fn load_run(&self, id: Uuid) -> Result<SavedRun> {
        let conn = self.open_db(id)?;
        Ok(SavedRun {
            summary: load_summary(&conn)?,
            allocations: load_allocations(&conn)?,
            outcomes: load_outcomes(&conn)?,
            underutilization: load_underutilization(&conn)?,
        })
    }

    /// Lists the summaries of every run, oldest first.
    ///
    /// Unreadable or malformed files are silently skipped.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut runs = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(runs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sqlite") {
                continue;
            }
            let Ok(conn) = Connection::open(&path) else {
                continue;
            };
            if let Ok(summary) = load_summary(&conn) {
                runs.push(summary);
            }
        }
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }

    /// Resolves a full UUID or an unambiguous prefix to a run id.
    pub fn resolve_run(&self, reference: &str) -> Result<Uuid> {
        if let Ok(id) = reference.parse::<Uuid>() {
            return if self.db_path(id).exists() {
                Ok(id)
            } else {
                Err(StorageError::RunNotFound(id))
            };
        }

        let matches: Vec<Uuid> = self
            .list_runs()?
            .into_iter()
            .map(|r| r.id)
            .filter(|id| id.to_string().starts_with(reference))
            .collect();

        match matches.as_slice() {
            [] => Err(StorageError::NoMatch(reference.to_string())),
            [id] => Ok(*id),
            _ => Err(StorageError::Ambiguous {
                reference: reference.to_string(),
                candidates: matches.iter().map(|id| id.to_string()[..8].to_string()).collect(),
            }),
        }
    }
}

fn to_sql_int(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|e| StorageError::Corrupt(format!("value out of range: {e}")))
}

fn from_sql_int<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value).map_err(|_| StorageError::Corrupt(format!("invalid {column}: {value}")))
}

fn parse_date(text: &str, column: &str) -> Result<Date> {
    text.parse::<Date>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

fn insert_summary(tx: &Transaction<'_>, summary: &RunSummary) -> Result<()> {
    let settings = &summary.settings;
    tx.execute(
        "INSERT INTO run (id, created_at, fingerprint, initial_sprint_start, sprint_days,
                          max_sprint_count, initial_sprint_number, only_development)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            summary.id.to_string(),
            summary.created_at.to_string(),
            &summary.fingerprint,
            settings.initial_sprint_start.to_string(),
            settings.sprint_days,
            to_sql_int(settings.max_sprint_count)?,
            to_sql_int(settings.initial_sprint_number)?,
            settings.only_development_epics,
        ],
    )?;
    Ok(())
}

fn insert_allocations(tx: &Transaction<'_>, allocations: &[Allocation]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO allocation (epic, sprint, resource, hours, sprint_start)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for a in allocations {
        stmt.execute(params![
            &a.epic,
            to_sql_int(a.sprint)?,
            &a.resource,
            a.hours,
            a.sprint_start.to_string(),
        ])?;
    }
    Ok(())
}

fn insert_outcomes(tx: &Transaction<'_>, outcomes: &[EpicOutcome]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO epic_outcome (epic, state, priority, charge, remaining, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for o in outcomes {
        stmt.execute(params![
            &o.epic,
            serialize_state(o.state),
            o.priority.label(),
            o.charge,
            o.remaining,
            o.start_date.map(|d| d.to_string()),
            o.end_date.map(|d| d.to_string()),
        ])?;
    }
    Ok(())
}

fn insert_underutilization(tx: &Transaction<'_>, entries: &[Underutilization]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO underutilization (sprint, resource, unused_hours, reason)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for u in entries {
        stmt.execute(params![
            to_sql_int(u.sprint)?,
            &u.resource,
            u.unused_hours,
            serialize_reason(u.reason),
        ])?;
    }
    Ok(())
}

/// Reads the single run row from an open connection.
fn load_summary(conn: &Connection) -> Result<RunSummary> {
    let (id, created_at, fingerprint, start, sprint_days, max_sprint_count, number, only_dev) = conn
        .query_row(
            "SELECT id, created_at, fingerprint, initial_sprint_start, sprint_days,
                    max_sprint_count, initial_sprint_number, only_development
             FROM run LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            },
        )?;

    let id = id
        .parse::<Uuid>()
        .map_err(|e| StorageError::Corrupt(format!("invalid run id: {e}")))?;
    let created_at = created_at
        .parse::<Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid created_at: {e}")))?;

    Ok(RunSummary {
        id,
        created_at,
        fingerprint,
        settings: RunSettings {
            initial_sprint_start: parse_date(&start, "initial_sprint_start")?,
            sprint_days: from_sql_int(sprint_days, "sprint_days")?,
            max_sprint_count: from_sql_int(max_sprint_count, "max_sprint_count")?,
            initial_sprint_number: from_sql_int(number, "initial_sprint_number")?,
            only_development_epics: only_dev,
        },
    })
}

fn load_allocations(conn: &Connection) -> Result<Vec<Allocation>> {
    let mut stmt = conn.prepare(
        "SELECT epic, sprint, resource, hours, sprint_start FROM allocation ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;
    rows.map(|row| -> Result<Allocation> {
        let (epic, sprint, resource, hours, sprint_start) = row?;
        Ok(Allocation {
            epic,
            sprint: from_sql_int(sprint, "sprint")?,
            resource,
            hours,
            sprint_start: parse_date(&sprint_start, "sprint_start")?,
        })
    })
    .collect()
}

fn load_outcomes(conn: &Connection) -> Result<Vec<EpicOutcome>> {
    let mut stmt = conn.prepare(
        "SELECT epic, state, priority, charge, remaining, start_date, end_date
         FROM epic_outcome ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;
    rows.map(|row| -> Result<EpicOutcome> {
        let (epic, state, priority, charge, remaining, start, end) = row?;
        Ok(EpicOutcome {
            epic,
            state: deserialize_state(&state)?,
            priority: Priority::parse(&priority),
            charge,
            remaining,
            start_date: start.map(|d| parse_date(&d, "start_date")).transpose()?,
            end_date: end.map(|d| parse_date(&d, "end_date")).transpose()?,
        })
    })
    .collect()
}

fn load_underutilization(conn: &Connection) -> Result<Vec<Underutilization>> {
    let mut stmt = conn.prepare(
        "SELECT sprint, resource, unused_hours, reason FROM underutilization ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    rows.map(|row| -> Result<Underutilization> {
        let (sprint, resource, unused_hours, reason) = row?;
        Ok(Underutilization {
            sprint: from_sql_int(sprint, "sprint")?,
            resource,
            unused_hours,
            reason: deserialize_reason(&reason)?,
        })
    })
    .collect()
}

fn serialize_state(state: EpicState) -> &'static str {
    match state {
        EpicState::InDevelopment => "in-development",
        EpicState::PendingDevelopment => "pending-development",
        EpicState::InAnalysis => "in-analysis",
        EpicState::PendingAnalysis => "pending-analysis",
        EpicState::Other => "other",
    }
}

fn deserialize_state(text: &str) -> Result<EpicState> {
    match text {
        "in-development" => Ok(EpicState::InDevelopment),
        "pending-development" => Ok(EpicState::PendingDevelopment),
        "in-analysis" => Ok(EpicState::InAnalysis),
        "pending-analysis" => Ok(EpicState::PendingAnalysis),
        "other" => Ok(EpicState::Other),
        other => Err(StorageError::Corrupt(format!("unknown epic state: {other}"))),
    }
}

fn serialize_reason(reason: UnderutilizationReason) -> &'static str {
    match reason {
        UnderutilizationReason::NoAssignedEpics => "no-assigned-epics",
        UnderutilizationReason::NoRemainingHoursOnAssignedEpics => "no-remaining-hours",
    }
}

fn deserialize_reason(text: &str) -> Result<UnderutilizationReason> {
    match text {
        "no-assigned-epics" => Ok(UnderutilizationReason::NoAssignedEpics),
        "no-remaining-hours" => Ok(UnderutilizationReason::NoRemainingHoursOnAssignedEpics),
        other => Err(StorageError::Corrupt(format!(
            "unknown underutilization reason: {other}"
        ))),
    }
}
