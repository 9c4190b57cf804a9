// Flat-file codec for a roster.
//
// Line 1 is the schema header: `roll_number:string` followed by one
// `name:type` pair per column. Every further line is a student:
// `rollNumber,{json object of column -> value}`. The roll number never
// contains a comma, so a row splits at its first comma.

use crate::error::{Result, RosterError, ValidationError};
use crate::model::{is_identity, Column, ColumnType, Record, RecordSet, Schema, Value, ROLL_NUMBER};
use crate::validation;
use log::{debug, info};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const EXTENSION: &str = "csv";

pub fn encode(set: &RecordSet) -> String {
    let mut out = format!("{}:{}", ROLL_NUMBER, ColumnType::String);
    for column in set.schema().columns() {
        out.push_str(&format!(",{}:{}", column.name, column.kind));
    }
    out.push('\n');
    for record in set.records() {
        let row: Map<String, Json> = record
            .values()
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect();
        out.push_str(record.roll_number());
        out.push(',');
        out.push_str(&Json::Object(row).to_string());
        out.push('\n');
    }
    out
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => Json::from(*f),
    }
}

fn from_json(column: &Column, json: &Json) -> std::result::Result<Value, String> {
    let value = match (column.kind, json) {
        (ColumnType::String, Json::String(s)) => Some(Value::String(s.clone())),
        (ColumnType::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
        (ColumnType::Float, Json::Number(n)) => n.as_f64().map(Value::Float),
        _ => None,
    };
    value.ok_or_else(|| format!("column {} expects {}, found {}", column.name, column.kind, json))
}

fn parse_header(line: &str) -> Result<Schema> {
    let schema_err = |reason: String| RosterError::SchemaParse { line: 1, reason };
    if line.trim().is_empty() {
        return Err(schema_err("header is empty".into()));
    }
    let mut pairs = line.split(',').map(|pair| {
        pair.split_once(':')
            .ok_or_else(|| schema_err(format!("{pair:?} is not a name:type pair")))
    });

    match pairs.next() {
        Some(Ok((name, kind))) if is_identity(name) && kind.trim() == "string" => {}
        Some(Err(e)) => return Err(e),
        _ => {
            return Err(schema_err(format!(
                "first column must be {}:string",
                ROLL_NUMBER
            )))
        }
    }

    let mut columns = Vec::new();
    for pair in pairs {
        let (name, kind) = pair?;
        validation::column_name(name).map_err(|e| schema_err(e.to_string()))?;
        let kind: ColumnType = kind
            .parse()
            .map_err(|e: ValidationError| schema_err(e.to_string()))?;
        columns.push(Column::new(name, kind));
    }
    Schema::new(columns).map_err(|e| schema_err(e.to_string()))
}

fn parse_row(line_no: usize, line: &str, set: &RecordSet) -> Result<Record> {
    let row_err = |roll_number: &str, reason: String| RosterError::RowParse {
        line: line_no,
        roll_number: roll_number.to_string(),
        reason,
    };
    let (roll, payload) = line
        .split_once(',')
        .ok_or_else(|| row_err("", "expected `roll_number,{json}`".into()))?;
    let roll_number = validation::roll_number(roll, set.roll_numbers())
        .map_err(|e| row_err(roll, e.to_string()))?;

    let json: Json = serde_json::from_str(payload)
        .map_err(|e| row_err(&roll_number, format!("malformed JSON: {e}")))?;
    let object = json
        .as_object()
        .ok_or_else(|| row_err(&roll_number, "row data is not a JSON object".into()))?;

    set.schema()
        .check_keys(object.keys().map(String::as_str))
        .map_err(|e| row_err(&roll_number, format!("does not match header: {e}")))?;

    let mut values = BTreeMap::new();
    for column in set.schema().columns() {
        let value = from_json(column, &object[&column.name]).map_err(|r| row_err(&roll_number, r))?;
        values.insert(column.name.clone(), value);
    }
    Ok(Record::from_parts(roll_number, values))
}

/// Parses a whole roster file. The first malformed line aborts the load;
/// nothing is skipped or repaired.
pub fn decode(text: &str) -> Result<RecordSet> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .enumerate()
        .map(|(i, l)| (i + 1, l));

    let header = match lines.next() {
        Some((_, line)) => line,
        None => {
            return Err(RosterError::SchemaParse {
                line: 1,
                reason: "file is empty".into(),
            })
        }
    };
    let mut set = RecordSet::new(parse_header(header)?);

    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_row(line_no, line, &set)?;
        set.records.push(record);
    }
    Ok(set)
}

/// Reads and decodes the roster at `path`. A missing file is reported as
/// `FileNotFound` so the caller can offer to create it.
pub fn load(path: &Path) -> Result<RecordSet> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RosterError::FileNotFound(path.to_path_buf()),
        _ => RosterError::io(path, e),
    })?;
    let set = decode(&text)?;
    debug!(
        "loaded {} students, {} columns from {}",
        set.len(),
        set.schema().len(),
        path.display()
    );
    Ok(set)
}

/// Writes the roster to a temp file next to `path`, then renames it into
/// place. A failure at any point leaves the old file as it was.
pub fn save(path: &Path, set: &RecordSet) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| RosterError::io(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| RosterError::io(&dir, e))?;
    tmp.write_all(encode(set).as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| RosterError::io(tmp.path(), e))?;
    // the temp file is private; an existing roster keeps its own mode
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| RosterError::io(tmp.path(), e))?;
    }
    tmp.persist(path).map_err(|e| RosterError::io(path, e.error))?;
    info!("saved {} students to {}", set.len(), path.display());
    Ok(())
}

/// Appends `.csv` unless the path already has that extension.
pub fn normalize_path(path: &Path) -> PathBuf {
    if path.extension().map_or(false, |e| e == EXTENSION) {
        return path.to_path_buf();
    }
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(EXTENSION);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationRules;

    const SAMPLE: &str = "roll_number:string,Name:string,Age:integer,gpa:float\n\
        R1,{\"Age\":20,\"Name\":\"Ada\",\"gpa\":3.5}\n\
        R2,{\"Age\":31,\"Name\":\"Bob Smith\",\"gpa\":0.0}\n";

    #[test]
    fn decode_sample() {
        let set = decode(SAMPLE).unwrap();
        let names: Vec<_> = set.schema().columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Name", "Age", "gpa"]);
        assert_eq!(set.len(), 2);
        let bob = set.find("R2").unwrap();
        assert_eq!(bob.get("Name"), Some(&Value::String("Bob Smith".into())));
        assert_eq!(bob.get("gpa"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let set = decode(SAMPLE).unwrap();
        assert_eq!(encode(&set), SAMPLE);
        assert_eq!(decode(&encode(&set)).unwrap(), set);
    }

    #[test]
    fn created_records_survive_a_round_trip() {
        let schema = decode(SAMPLE).unwrap().schema().clone();
        let mut set = RecordSet::new(schema);
        let fields = BTreeMap::from([
            ("Name".to_string(), "Grace Hopper".to_string()),
            ("Age".to_string(), "85".to_string()),
            ("gpa".to_string(), "3.9".to_string()),
        ]);
        let rules = ValidationRules::default();
        let record = Record::create("G1", &fields, set.schema(), set.records(), &rules).unwrap();
        set.records.push(record.clone());
        let back = decode(&encode(&set)).unwrap();
        assert_eq!(back.find("G1"), Some(&record));
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let text = SAMPLE.replace('\n', "\r\n") + "\r\n\r\n";
        assert_eq!(decode(&text).unwrap().len(), 2);
    }

    #[test]
    fn bad_headers() {
        for bad in [
            "",
            "Name:string",
            "roll_number:integer,Name:string",
            "roll_number:string,Name",
            "roll_number:string,Name:text",
            "roll_number:string,Name:string,Name:float",
        ] {
            assert!(
                matches!(decode(bad), Err(RosterError::SchemaParse { line: 1, .. })),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn row_keys_must_match_header() {
        let text = "roll_number:string,Name:string,Age:integer\n\
            R1,{\"Name\":\"Ada\",\"Age\":20}\n\
            R2,{\"Name\":\"Bob\"}\n";
        match decode(text) {
            Err(RosterError::RowParse {
                line, roll_number, ..
            }) => {
                assert_eq!(line, 3);
                assert_eq!(roll_number, "R2");
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn bad_rows() {
        let header = "roll_number:string,Age:integer\n";
        for row in [
            "R1 {\"Age\":1}",
            "R1,{\"Age\":1",
            "R1,[1]",
            "R1,{\"Age\":\"one\"}",
            "R1,{\"Age\":1.5}",
            "R-1,{\"Age\":1}",
            "R1,{\"Age\":1,\"extra\":2}",
        ] {
            let text = format!("{header}{row}\n");
            assert!(
                matches!(decode(&text), Err(RosterError::RowParse { line: 2, .. })),
                "{row:?} should fail"
            );
        }
    }

    #[test]
    fn duplicate_roll_numbers_are_rejected() {
        let text = "roll_number:string,Age:integer\nR1,{\"Age\":1}\nR1,{\"Age\":2}\n";
        assert!(matches!(
            decode(text),
            Err(RosterError::RowParse { line: 3, .. })
        ));
    }

    #[test]
    fn json_inside_row_may_contain_commas() {
        let text = "roll_number:string,Address:string\nR1,{\"Address\":\"12, Baker Street\"}\n";
        let set = decode(text).unwrap();
        assert_eq!(
            set.find("R1").unwrap().get("Address"),
            Some(&Value::String("12, Baker Street".into()))
        );
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(load(&path), Err(RosterError::FileNotFound(p)) if p == path));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("roster.csv");
        let set = decode(SAMPLE).unwrap();
        save(&path, &set).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
        assert_eq!(load(&path).unwrap(), set);
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        let set = decode(SAMPLE).unwrap();
        save(&path, &set).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save(&path, &set).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn normalize_adds_extension_once() {
        assert_eq!(normalize_path(Path::new("students")), PathBuf::from("students.csv"));
        assert_eq!(normalize_path(Path::new("a/b.csv")), PathBuf::from("a/b.csv"));
        assert_eq!(normalize_path(Path::new("b.txt")), PathBuf::from("b.txt.csv"));
    }
}
