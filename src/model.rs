// In-memory roster model: typed columns, typed values, records and the
// record set that one backing file holds.

use crate::error::{Result, RosterError, ValidationError};
use crate::validation::{self, field_key, ValidationRules};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the identity column. It is always the first header entry and
/// is the row key rather than part of a record's value mapping.
pub const ROLL_NUMBER: &str = "roll_number";

/// True for `roll_number` and its spelled-out variants like `Roll Number`.
pub fn is_identity(name: &str) -> bool {
    field_key(name) == ROLL_NUMBER
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = ValidationError;

    /// Accepts the header spellings plus the short `str`/`int` forms.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            _ => Err(ValidationError::UnknownType(s.to_string())),
        }
    }
}

/// A single cell, tagged with the column type it was cast to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            // Debug keeps the trailing `.0` on whole floats
            Value::Float(x) => write!(f, "{x:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Where `add_column` puts the new column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPosition {
    Start,
    End,
    /// 1-based; values past the end append.
    At(usize),
}

/// Ordered data columns of a roster. The identity column is implicit and
/// never stored here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut schema = Schema::default();
        for column in columns {
            validation::column_name(&column.name)?;
            if schema.contains(&column.name) {
                return Err(RosterError::DuplicateColumn(column.name));
            }
            schema.columns.push(column);
        }
        Ok(schema)
    }

    /// Columns a freshly created roster starts with.
    pub fn default_roster() -> Self {
        Schema {
            columns: vec![
                Column::new("Name", ColumnType::String),
                Column::new("Age", ColumnType::Integer),
                Column::new("Email", ColumnType::String),
                Column::new("Phone", ColumnType::String),
                Column::new("Address", ColumnType::String),
                Column::new("Class", ColumnType::String),
                Column::new("Grades", ColumnType::String),
            ],
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Whether `name` is taken, counting the identity column.
    pub fn contains(&self, name: &str) -> bool {
        is_identity(name) || self.column(name).is_some()
    }

    /// Checks that `keys` names every column exactly once and nothing else.
    pub fn check_keys<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> std::result::Result<(), ValidationError> {
        let mut seen = Vec::with_capacity(self.columns.len());
        for key in keys {
            if self.column(key).is_none() {
                return Err(ValidationError::UnknownField(key.to_string()));
            }
            seen.push(key);
        }
        match self.columns.iter().find(|c| !seen.contains(&c.name.as_str())) {
            Some(missing) => Err(ValidationError::MissingField(missing.name.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn insert(&mut self, position: ColumnPosition, column: Column) -> usize {
        let index = match position {
            ColumnPosition::Start => 0,
            ColumnPosition::End => self.columns.len(),
            ColumnPosition::At(n) => n.saturating_sub(1).min(self.columns.len()),
        };
        self.columns.insert(index, column);
        index
    }

    pub(crate) fn remove(&mut self, index: usize) -> Column {
        self.columns.remove(index)
    }

    pub(crate) fn replace(&mut self, index: usize, column: Column) {
        self.columns[index] = column;
    }
}

/// One student row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    roll_number: String,
    values: BTreeMap<String, Value>,
}

impl Record {
    pub(crate) fn from_parts(roll_number: String, values: BTreeMap<String, Value>) -> Self {
        Self {
            roll_number,
            values,
        }
    }

    /// Builds a record from raw input, validating the roll number against
    /// `existing` and every field against its column. Reports the first
    /// failure in schema order.
    pub fn create(
        roll_number: &str,
        fields: &BTreeMap<String, String>,
        schema: &Schema,
        existing: &[Record],
        rules: &ValidationRules,
    ) -> std::result::Result<Record, ValidationError> {
        let roll_number = validation::roll_number(roll_number, existing.iter().map(|r| r.roll_number()))?;
        if let Some(extra) = fields.keys().find(|k| schema.column(k).is_none()) {
            return Err(ValidationError::UnknownField(extra.clone()));
        }
        let mut values = BTreeMap::new();
        for column in schema.columns() {
            let raw = fields
                .get(&column.name)
                .ok_or_else(|| ValidationError::MissingField(column.name.clone()))?;
            values.insert(column.name.clone(), validation::field(column, raw, rules)?);
        }
        Ok(Record {
            roll_number,
            values,
        })
    }

    /// Returns a copy with one field replaced. Only that field is
    /// re-validated; changing the roll number also re-checks uniqueness
    /// against every other record.
    pub fn update(
        &self,
        field: &str,
        new_value: &str,
        schema: &Schema,
        existing: &[Record],
        rules: &ValidationRules,
    ) -> std::result::Result<Record, ValidationError> {
        let mut updated = self.clone();
        if is_identity(field) {
            let others = existing
                .iter()
                .map(|r| r.roll_number())
                .filter(|r| *r != self.roll_number);
            updated.roll_number = validation::roll_number(new_value, others)?;
        } else {
            let column = schema
                .column(field)
                .ok_or_else(|| ValidationError::UnknownField(field.to_string()))?;
            updated
                .values
                .insert(column.name.clone(), validation::field(column, new_value, rules)?);
        }
        Ok(updated)
    }

    pub fn roll_number(&self) -> &str {
        &self.roll_number
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.values
    }
}

/// Schema plus the rows of one backing file, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub(crate) schema: Schema,
    pub(crate) records: Vec<Record>,
}

impl RecordSet {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, roll_number: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.roll_number == roll_number)
    }

    pub fn position(&self, roll_number: &str) -> Option<usize> {
        self.records.iter().position(|r| r.roll_number == roll_number)
    }

    pub fn roll_numbers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.roll_number())
    }
}
