// UI layer: the numbered menu and the prompts behind each entry, built on
// `dialoguer`. Every prompt that takes a field value re-asks until the
// matching validator accepts it; the manager then validates again before
// anything is written, so a stale prompt can never corrupt the file.

use crate::error::RosterError;
use crate::manager::{Manager, Session};
use crate::model::{is_identity, Column, ColumnPosition, ColumnType, Record, RecordSet, Schema, ROLL_NUMBER};
use crate::storage;
use crate::validation::{self, ValidationRules};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const MENU: [&str; 9] = [
    "1. Add Student",
    "2. View Students",
    "3. Update Student",
    "4. Delete Student",
    "5. Add Column",
    "6. Delete Column",
    "7. Replace Column",
    "8. Change File Path",
    "9. Exit",
];

const COLUMN_TYPES: [ColumnType; 3] = [ColumnType::String, ColumnType::Integer, ColumnType::Float];

pub fn print_banner() {
    println!("{}", "=".repeat(50));
    println!("{}", "       STUDENT ROSTER".bold());
    println!("{}", "=".repeat(50));
}

/// Picks the roster to work on: the `--file` flag, then the last file
/// from the config, then whatever the user types. Returns `None` when the
/// user gives up. A config that cannot be written is reported but does
/// not stop the roster from opening.
pub fn startup(manager: &mut Manager, file: Option<PathBuf>) -> Result<Option<Session>> {
    let mut candidate = file.or_else(|| manager.config().config().last_file_path.clone());
    loop {
        let path = match candidate.take() {
            Some(path) => path,
            None => {
                let typed: String = Input::new()
                    .with_prompt("Roster file path")
                    .default("students.csv".to_string())
                    .interact_text()?;
                PathBuf::from(typed)
            }
        };

        let opened = match manager.open(&path) {
            Err(RosterError::FileNotFound(missing)) => {
                println!("File '{}' not found.", missing.display());
                if Confirm::new()
                    .with_prompt("Would you like to create a new file?")
                    .default(true)
                    .interact()?
                {
                    let schema = prompt_schema()?;
                    manager.create(&missing, schema)
                } else {
                    Err(RosterError::FileNotFound(missing))
                }
            }
            other => other,
        };

        match opened {
            Ok(session) => {
                println!("Using data file: {}", session.path().display());
                report_config_error(manager);
                return Ok(Some(session));
            }
            Err(RosterError::FileNotFound(_)) => {}
            Err(e) => print_err(&e),
        }

        if !Confirm::new()
            .with_prompt("Choose a different file?")
            .default(true)
            .interact()?
        {
            return Ok(None);
        }
    }
}

/// Main interactive menu. Runs until the user picks "Exit"; operation
/// failures are printed and the menu comes back.
pub fn main_menu(manager: &mut Manager, mut session: Session) -> Result<()> {
    loop {
        println!();
        let selection = Select::new()
            .with_prompt(format!("Roster: {}", session.path().display()))
            .items(&MENU)
            .default(0)
            .interact()?;
        match selection {
            0 => handle_add_student(manager, &mut session)?,
            1 => handle_view_students(manager, &mut session),
            2 => handle_update_student(manager, &mut session)?,
            3 => handle_delete_student(manager, &mut session)?,
            4 => handle_add_column(manager, &mut session)?,
            5 => handle_delete_column(manager, &mut session)?,
            6 => handle_replace_column(manager, &mut session)?,
            7 => handle_change_file_path(manager, &mut session)?,
            8 => {
                println!("Exiting program.");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

fn handle_add_student(manager: &Manager, session: &mut Session) -> Result<()> {
    let Some(roster) = refresh(manager, session) else {
        return Ok(());
    };
    let roll = prompt_roll_number(&roster, None)?;

    println!("\nEnter the student data:");
    let mut fields = BTreeMap::new();
    for column in roster.schema().columns() {
        fields.insert(column.name.clone(), prompt_field(column, manager.rules())?);
    }

    report(manager.add_student(session, &roll, &fields), |r| {
        format!("Student {} added successfully!", r.roll_number())
    });
    Ok(())
}

fn handle_view_students(manager: &Manager, session: &mut Session) {
    if let Err(e) = manager.view_students(session) {
        print_err(&e);
        return;
    }
    let roster = session.roster();
    if roster.is_empty() {
        println!("No student data found in file: {}", session.path().display());
        return;
    }
    println!("Student data from file: {}", session.path().display());
    println!("Total students: {}", roster.len());
    println!("{}", "-".repeat(40));
    for record in roster.records() {
        print_record(roster.schema(), record);
        println!("{}", "-".repeat(40));
    }
}

fn handle_update_student(manager: &Manager, session: &mut Session) -> Result<()> {
    let Some(roster) = refresh(manager, session) else {
        return Ok(());
    };
    let roll: String = Input::new()
        .with_prompt("Roll number of the student to update")
        .interact_text()?;
    let roll = roll.trim();
    let Some(record) = roster.find(roll) else {
        print_err(&RosterError::student_not_found(roll));
        return Ok(());
    };
    print_record(roster.schema(), record);

    let mut fields = vec![ROLL_NUMBER.to_string()];
    fields.extend(roster.schema().columns().iter().map(|c| c.name.clone()));
    let index = Select::new()
        .with_prompt("Field to update")
        .items(&fields)
        .default(0)
        .interact()?;
    let field = &fields[index];

    let new_value = match roster.schema().column(field) {
        Some(column) => prompt_field(column, manager.rules())?,
        None => prompt_roll_number(&roster, Some(roll))?,
    };
    report(manager.update_student(session, roll, field, &new_value), |_| {
        "Student information updated successfully!".to_string()
    });
    Ok(())
}

fn handle_delete_student(manager: &Manager, session: &mut Session) -> Result<()> {
    let roll: String = Input::new()
        .with_prompt("Roll number of the student to delete")
        .interact_text()?;
    let roll = roll.trim();
    if !confirm(&format!("Delete student {roll}?"))? {
        println!("Deletion cancelled.");
        return Ok(());
    }
    report(manager.delete_student(session, roll), |r| {
        format!("Student with roll number {} deleted.", r.roll_number())
    });
    Ok(())
}

fn handle_add_column(manager: &Manager, session: &mut Session) -> Result<()> {
    let Some(roster) = refresh(manager, session) else {
        return Ok(());
    };
    let name: String = Input::new()
        .with_prompt("New column name")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            validation::column_name(input).map_err(|e| e.to_string())?;
            if roster.schema().contains(input) {
                return Err(format!("column {input:?} already exists"));
            }
            Ok(())
        })
        .interact_text()?;

    let placement = Select::new()
        .with_prompt("Where should the new column go?")
        .items(&["At the beginning", "At the end", "At a specific position"])
        .default(1)
        .interact()?;
    let position = match placement {
        0 => ColumnPosition::Start,
        1 => ColumnPosition::End,
        _ => {
            for (i, column) in roster.schema().columns().iter().enumerate() {
                println!("{}. {}", i + 1, column.name);
            }
            let last = roster.schema().len() + 1;
            let at: usize = Input::new()
                .with_prompt(format!("Position (1-{last})"))
                .validate_with(|n: &usize| -> std::result::Result<(), String> {
                    if (1..=last).contains(n) {
                        Ok(())
                    } else {
                        Err(format!("enter a number between 1 and {last}"))
                    }
                })
                .interact_text()?;
            ColumnPosition::At(at)
        }
    };

    let kind = prompt_column_type(&format!("Type of {name}"), ColumnType::String)?;
    let probe = Column::new(name.clone(), kind);
    let default: String = Input::new()
        .with_prompt(format!("Value to fill in for the {} existing students", roster.len()))
        .validate_with(|input: &String| {
            validation::field(&probe, input, manager.rules()).map(|_| ())
        })
        .interact_text()?;

    let result = with_spinner("Adding column...", || {
        manager.add_column(session, &name, kind, &default, position)
    })?;
    report(result, |_| format!("Column '{name}' added successfully."));
    Ok(())
}

fn handle_delete_column(manager: &Manager, session: &mut Session) -> Result<()> {
    let Some(roster) = refresh(manager, session) else {
        return Ok(());
    };
    let Some(name) = pick_column(&roster, "Column to delete")? else {
        println!("Column deletion cancelled.");
        return Ok(());
    };
    if is_identity(&name) {
        print_err(&RosterError::ProtectedColumn(name));
        return Ok(());
    }
    if !confirm(&format!("Are you sure you want to delete the '{name}' column?"))? {
        println!("Column deletion cancelled.");
        return Ok(());
    }
    let result = with_spinner("Deleting column...", || manager.delete_column(session, &name))?;
    report(result, |c| format!("Column '{}' deleted successfully.", c.name));
    Ok(())
}

fn handle_replace_column(manager: &Manager, session: &mut Session) -> Result<()> {
    let Some(roster) = refresh(manager, session) else {
        return Ok(());
    };
    let Some(old_name) = pick_column(&roster, "Column to replace")? else {
        println!("Column replacement cancelled.");
        return Ok(());
    };
    let Some(current) = roster.schema().column(&old_name) else {
        print_err(&RosterError::ProtectedColumn(old_name));
        return Ok(());
    };

    let new_name: String = Input::new()
        .with_prompt(format!("New name for column '{old_name}'"))
        .default(old_name.clone())
        .validate_with(|input: &String| validation::column_name(input).map(|_| ()))
        .interact_text()?;
    let kind = prompt_column_type(
        &format!("Type of {new_name} (currently {})", current.kind),
        current.kind,
    )?;
    if !confirm(&format!(
        "Replace '{old_name}' ({}) with '{new_name}' ({kind})?",
        current.kind
    ))? {
        println!("Column replacement cancelled.");
        return Ok(());
    }

    let result = with_spinner("Converting values...", || {
        manager.replace_column(session, &old_name, &new_name, kind)
    })?;
    report(result, |_| {
        format!("Column '{old_name}' replaced with '{new_name}' successfully.")
    });
    Ok(())
}

fn handle_change_file_path(manager: &mut Manager, session: &mut Session) -> Result<()> {
    let choice = Select::new()
        .with_prompt("Change file path")
        .items(&[
            "Open a file by path",
            "Create a new file",
            "Browse CSV files in the current directory",
            "Cancel",
        ])
        .default(0)
        .interact()?;

    match choice {
        0 => {
            let path = prompt_path("File path")?;
            switch_to(manager, session, path)?;
        }
        1 => {
            let path = storage::normalize_path(&prompt_path("New file name")?);
            if path.exists() && !confirm(&format!("File '{}' already exists. Overwrite?", path.display()))? {
                println!("Operation canceled.");
                return Ok(());
            }
            create_and_switch(manager, session, path)?;
        }
        2 => {
            let files = csv_files_in_current_dir();
            if files.is_empty() {
                println!("No CSV files found in current directory.");
                return Ok(());
            }
            let mut items: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
            items.push("Cancel".into());
            let index = Select::new()
                .with_prompt("Select a file")
                .items(&items)
                .default(0)
                .interact()?;
            match files.get(index) {
                Some(path) => switch_to(manager, session, path.clone())?,
                None => println!("Operation canceled."),
            }
        }
        _ => println!("Operation canceled."),
    }
    Ok(())
}

fn switch_to(manager: &mut Manager, session: &mut Session, path: PathBuf) -> Result<()> {
    match manager.change_file_path(session, &path) {
        Ok(()) => {
            print_ok(&format!(
                "File path changed to: {} ({} students)",
                session.path().display(),
                session.roster().len()
            ));
            report_config_error(manager);
        }
        Err(RosterError::FileNotFound(missing)) => {
            println!("File '{}' does not exist.", missing.display());
            if confirm("Create it?")? {
                create_and_switch(manager, session, missing)?;
            } else {
                println!("Operation canceled.");
            }
        }
        Err(e) => print_err(&e),
    }
    Ok(())
}

fn create_and_switch(manager: &mut Manager, session: &mut Session, path: PathBuf) -> Result<()> {
    let schema = prompt_schema()?;
    let result = with_spinner("Creating file...", || manager.create_file(session, &path, schema))?;
    report(result, |_| format!("File path changed to: {}", session.path().display()));
    report_config_error(manager);
    Ok(())
}

/// The switch went through but the config still names the old file.
fn report_config_error(manager: &mut Manager) {
    if let Some(e) = manager.take_config_error() {
        println!(
            "{} {} (this file will not be reopened automatically)",
            "Warning:".yellow().bold(),
            e
        );
    }
}

/// Asks for the columns of a new roster: the defaults or a custom list.
/// `roll_number` is always present and never asked for.
fn prompt_schema() -> Result<Schema> {
    let choice = Select::new()
        .with_prompt("Choose column setup")
        .items(&[
            "Use default columns (Name, Age, Email, Phone, Address, Class, Grades)",
            "Define custom columns",
        ])
        .default(0)
        .interact()?;
    if choice == 0 {
        return Ok(Schema::default_roster());
    }

    println!("Note: '{ROLL_NUMBER}' is added automatically (required for student identification).");
    let mut columns: Vec<Column> = Vec::new();
    loop {
        let name: String = Input::new()
            .with_prompt("Column name (leave empty to finish)")
            .allow_empty(true)
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                if input.is_empty() {
                    return Ok(());
                }
                validation::column_name(input).map_err(|e| e.to_string())?;
                if is_identity(input) || columns.iter().any(|c| &c.name == input) {
                    return Err(format!("column {input:?} is already defined"));
                }
                Ok(())
            })
            .interact_text()?;
        if name.is_empty() {
            break;
        }
        let kind = prompt_column_type(&format!("Type of {name}"), ColumnType::String)?;
        columns.push(Column::new(name, kind));
    }

    if columns.is_empty() {
        println!("No columns defined. Using default columns.");
        return Ok(Schema::default_roster());
    }
    Ok(Schema::new(columns)?)
}

fn prompt_column_type(prompt: &str, current: ColumnType) -> Result<ColumnType> {
    let default = COLUMN_TYPES.iter().position(|t| *t == current).unwrap_or(0);
    let index = Select::new()
        .with_prompt(prompt)
        .items(&COLUMN_TYPES)
        .default(default)
        .interact()?;
    Ok(COLUMN_TYPES[index])
}

/// Re-asks until the roll number is well formed and unused. `keep` is the
/// roll number being edited, which may be kept as is.
fn prompt_roll_number(roster: &RecordSet, keep: Option<&str>) -> Result<String> {
    let taken: Vec<&str> = roster.roll_numbers().filter(|r| Some(*r) != keep).collect();
    let roll: String = Input::new()
        .with_prompt("Roll number")
        .validate_with(|input: &String| {
            validation::roll_number(input, taken.iter().copied()).map(|_| ())
        })
        .interact_text()?;
    Ok(roll.trim().to_string())
}

fn prompt_field(column: &Column, rules: &ValidationRules) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(format!("{} ({})", column.name, column.kind))
        .validate_with(|input: &String| validation::field(column, input, rules).map(|_| ()))
        .interact_text()?;
    Ok(value)
}

fn prompt_path(prompt: &str) -> Result<PathBuf> {
    let typed: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("path cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(PathBuf::from(typed.trim()))
}

/// Lists the columns plus `roll_number` and a cancel entry.
fn pick_column(roster: &RecordSet, prompt: &str) -> Result<Option<String>> {
    let mut items = vec![ROLL_NUMBER.to_string()];
    items.extend(roster.schema().columns().iter().map(|c| format!("{} ({})", c.name, c.kind)));
    items.push("Cancel".into());
    let index = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;
    Ok(match index {
        0 => Some(ROLL_NUMBER.to_string()),
        i => roster.schema().columns().get(i - 1).map(|c| c.name.clone()),
    })
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Reloads the session from disk, printing the error instead when the
/// file has gone missing or no longer parses.
fn refresh(manager: &Manager, session: &mut Session) -> Option<RecordSet> {
    if let Err(e) = manager.view_students(session) {
        print_err(&e);
        return None;
    }
    Some(session.roster().clone())
}

fn csv_files_in_current_dir() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(".")
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == storage::EXTENSION))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn print_record(schema: &Schema, record: &Record) {
    println!("{}: {}", ROLL_NUMBER, record.roll_number());
    for column in schema.columns() {
        if let Some(value) = record.get(&column.name) {
            println!("{}: {}", column.name, value);
        }
    }
}

/// Shows a spinner while `f` rewrites the roster file.
fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> Result<T> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    let out = f();
    spinner.finish_and_clear();
    Ok(out)
}

fn report<T>(result: crate::Result<T>, success: impl FnOnce(T) -> String) {
    match result {
        Ok(value) => print_ok(&success(value)),
        Err(e) => print_err(&e),
    }
}

fn print_ok(message: &str) {
    println!("{}", message.green());
}

fn print_err(error: &dyn Display) {
    println!("{} {}", "Error:".red().bold(), error);
}
