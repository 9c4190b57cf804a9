// Roster operations, one per menu action. Every mutating call loads the
// file, changes a private copy and writes it back; when anything fails
// before the write, the file and the session stay as they were.

use crate::config::ConfigStore;
use crate::error::{Result, RosterError};
use crate::model::{is_identity, Column, ColumnPosition, ColumnType, Record, RecordSet, Schema};
use crate::storage;
use crate::validation::{self, ValidationRules};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The roster file currently being worked on, plus what was last read
/// from or written to it.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    roster: RecordSet,
}

impl Session {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot from the last successful load or save.
    pub fn roster(&self) -> &RecordSet {
        &self.roster
    }
}

pub struct Manager {
    rules: ValidationRules,
    config: ConfigStore,
    config_error: Option<RosterError>,
}

impl Manager {
    pub fn new(config: ConfigStore) -> Self {
        Self {
            rules: config.config().rules.clone(),
            config,
            config_error: None,
        }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Failure from the last attempt to record `last_file_path`, if any.
    /// The switch itself went through; only the config file is stale.
    pub fn take_config_error(&mut self) -> Option<RosterError> {
        self.config_error.take()
    }

    fn remember(&mut self, path: &Path) {
        self.config_error = None;
        if let Err(e) = self.config.set_last_file_path(path) {
            warn!("could not record {} as last file: {}", path.display(), e);
            self.config_error = Some(e);
        }
    }

    /// Opens an existing roster and remembers it as the last used file.
    /// A config write failure does not undo the open; see `take_config_error`.
    pub fn open(&mut self, path: &Path) -> Result<Session> {
        let path = storage::normalize_path(path);
        let roster = storage::load(&path)?;
        self.remember(&path);
        info!("opened {} ({} students)", path.display(), roster.len());
        Ok(Session { path, roster })
    }

    /// Writes an empty roster with `schema` to `path`, replacing whatever
    /// was there, and remembers it as the last used file.
    pub fn create(&mut self, path: &Path, schema: Schema) -> Result<Session> {
        let path = storage::normalize_path(path);
        let roster = RecordSet::new(schema);
        storage::save(&path, &roster)?;
        self.remember(&path);
        info!("created {} with {} columns", path.display(), roster.schema().len());
        Ok(Session { path, roster })
    }

    /// Switches `session` to another file. A missing file is reported as
    /// `FileNotFound` so the caller can offer `create_file`; any other
    /// failure leaves the session on its current file.
    pub fn change_file_path(&mut self, session: &mut Session, path: &Path) -> Result<()> {
        *session = self.open(path)?;
        Ok(())
    }

    pub fn create_file(&mut self, session: &mut Session, path: &Path, schema: Schema) -> Result<()> {
        *session = self.create(path, schema)?;
        Ok(())
    }

    fn transact<T>(
        &self,
        session: &mut Session,
        op: &str,
        mutate: impl FnOnce(&mut RecordSet) -> Result<T>,
    ) -> Result<T> {
        let mut roster = storage::load(&session.path)?;
        let out = mutate(&mut roster).map_err(|e| {
            warn!("{} rejected: {}", op, e);
            e
        })?;
        storage::save(&session.path, &roster)?;
        session.roster = roster;
        Ok(out)
    }

    pub fn add_student(
        &self,
        session: &mut Session,
        roll_number: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Record> {
        self.transact(session, "add student", |roster| {
            let record = Record::create(roll_number, fields, &roster.schema, &roster.records, &self.rules)?;
            roster.records.push(record.clone());
            info!("added student {}", record.roll_number());
            Ok(record)
        })
    }

    /// Re-reads the file and returns its students in file order.
    pub fn view_students<'s>(&self, session: &'s mut Session) -> Result<&'s [Record]> {
        session.roster = storage::load(&session.path)?;
        Ok(session.roster.records())
    }

    pub fn update_student(
        &self,
        session: &mut Session,
        roll_number: &str,
        field: &str,
        new_value: &str,
    ) -> Result<Record> {
        self.transact(session, "update student", |roster| {
            let index = roster
                .position(roll_number)
                .ok_or_else(|| RosterError::student_not_found(roll_number))?;
            if !is_identity(field) && roster.schema.column(field).is_none() {
                return Err(RosterError::column_not_found(field));
            }
            let updated = roster.records[index].update(field, new_value, &roster.schema, &roster.records, &self.rules)?;
            roster.records[index] = updated.clone();
            info!("updated {} of student {}", field, roll_number);
            Ok(updated)
        })
    }

    pub fn delete_student(&self, session: &mut Session, roll_number: &str) -> Result<Record> {
        self.transact(session, "delete student", |roster| {
            let index = roster
                .position(roll_number)
                .ok_or_else(|| RosterError::student_not_found(roll_number))?;
            info!("deleted student {}", roll_number);
            Ok(roster.records.remove(index))
        })
    }

    /// Adds a column and backfills every student with `default`, which is
    /// validated as if typed into the new column.
    pub fn add_column(
        &self,
        session: &mut Session,
        name: &str,
        kind: ColumnType,
        default: &str,
        position: ColumnPosition,
    ) -> Result<()> {
        self.transact(session, "add column", |roster| {
            let name = validation::column_name(name)?;
            if roster.schema.contains(&name) {
                return Err(RosterError::DuplicateColumn(name));
            }
            let column = Column::new(name, kind);
            let value = validation::field(&column, default, &self.rules)?;
            for record in roster.records.iter_mut() {
                record.values_mut().insert(column.name.clone(), value.clone());
            }
            info!(
                "added column {}:{} with default {} to {} students",
                column.name,
                column.kind,
                value,
                roster.records.len()
            );
            roster.schema.insert(position, column);
            Ok(())
        })
    }

    pub fn delete_column(&self, session: &mut Session, name: &str) -> Result<Column> {
        self.transact(session, "delete column", |roster| {
            if is_identity(name) {
                return Err(RosterError::ProtectedColumn(name.to_string()));
            }
            let index = roster
                .schema
                .position(name)
                .ok_or_else(|| RosterError::column_not_found(name))?;
            for record in roster.records.iter_mut() {
                record.values_mut().remove(name);
            }
            info!("deleted column {}", name);
            Ok(roster.schema.remove(index))
        })
    }

    /// Renames and/or re-types a column in place. Every stored value must
    /// convert to `kind` (and pass the new name's rule) or nothing changes.
    pub fn replace_column(
        &self,
        session: &mut Session,
        old_name: &str,
        new_name: &str,
        kind: ColumnType,
    ) -> Result<()> {
        self.transact(session, "replace column", |roster| {
            if is_identity(old_name) {
                return Err(RosterError::ProtectedColumn(old_name.to_string()));
            }
            let index = roster
                .schema
                .position(old_name)
                .ok_or_else(|| RosterError::column_not_found(old_name))?;
            let new_name = validation::column_name(new_name)?;
            if new_name != old_name && roster.schema.contains(&new_name) {
                return Err(RosterError::DuplicateColumn(new_name));
            }
            let column = Column::new(new_name, kind);

            let mut converted = Vec::with_capacity(roster.records.len());
            for record in &roster.records {
                let value = record
                    .get(old_name)
                    .ok_or_else(|| RosterError::column_not_found(old_name))?;
                converted.push(validation::convert(&column, value, &self.rules)?);
            }

            for (record, value) in roster.records.iter_mut().zip(converted) {
                let values = record.values_mut();
                values.remove(old_name);
                values.insert(column.name.clone(), value);
            }
            info!("replaced column {} with {}:{}", old_name, column.name, column.kind);
            roster.schema.replace(index, column);
            Ok(())
        })
    }
}
