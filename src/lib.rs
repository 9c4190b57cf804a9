// Library root
// -----------
// This crate exposes the roster logic as a library; the binary
// (`main.rs`) wires it to an interactive terminal menu.
//
// Module responsibilities:
// - `validation`: pure field validators and type casts.
// - `model`: columns, typed values, records and the record set.
// - `storage`: the `name:type` header + `roll,{json}` row file format,
//   whole-file load and atomic save.
// - `manager`: one load-mutate-save operation per menu action, run
//   against an explicit `Session`.
// - `config`: the JSON config file (last roster path, validation knobs).
// - `ui`: prompts and the menu loop; the only module that talks to the
//   terminal.
// - `error`: the error taxonomy shared by all of the above.
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod storage;
pub mod ui;
pub mod validation;

pub use error::{Result, RosterError, ValidationError};
