//! SQL over a JSON response.
//!
//! The rows under the root selector are loaded into an in-memory SQLite
//! table named `input`, the query's SQL runs against it, and the result set
//! becomes the frame.

use super::select_path;
use super::table::{flatten_row, infer_type, rows_of, union_keys, unique_names};
use crate::error::{FrameError, Result};
use crate::frame::{Field, FieldType, Frame};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value};

/// Run `sql` over the JSON document in `body`.
///
/// # Examples
///
/// ```
/// use query_frames::decoder::sqlite;
///
/// let body = r#"[{"name": "ann", "age": 41}, {"name": "bob", "age": 7}]"#;
/// let frame = sqlite::decode(body, "SELECT name FROM input WHERE age > 10", "", "A").unwrap();
/// assert_eq!(frame.row_count(), 1);
/// ```
pub fn decode(body: &str, sql: &str, root_selector: &str, name: &str) -> Result<Frame> {
    let document: Value = serde_json::from_str(body)?;
    let root = select_path(&document, root_selector).ok_or_else(|| {
        FrameError::decode(
            "sqlite",
            format!("root selector '{}' matched nothing", root_selector),
        )
    })?;
    let rows: Vec<Map<String, Value>> = rows_of(root).iter().map(flatten_row).collect();
    let mut columns = union_keys(&rows);
    let empty_table = columns.is_empty();
    if empty_table {
        columns.push("value".to_string());
    }

    // SQLite identifiers ignore ASCII case, so `id` and `ID` need distinct names.
    let sql_names = unique_names(columns.iter().map(String::as_str), true);

    let mut conn = Connection::open_in_memory()?;
    create_input(&conn, &rows, &columns, &sql_names, empty_table)?;
    if !empty_table {
        insert_rows(&mut conn, &rows, &columns, &sql_names)?;
    }
    run(&conn, sql, name)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_input(
    conn: &Connection,
    rows: &[Map<String, Value>],
    columns: &[String],
    sql_names: &[String],
    empty_table: bool,
) -> Result<()> {
    let definitions: Vec<String> = columns
        .iter()
        .zip(sql_names)
        .map(|(column, sql_name)| {
            let affinity = if empty_table {
                "TEXT"
            } else {
                let values: Vec<Value> = rows
                    .iter()
                    .map(|r| r.get(column).cloned().unwrap_or(Value::Null))
                    .collect();
                affinity(&values)
            };
            format!("{} {}", quote_ident(sql_name), affinity)
        })
        .collect();
    conn.execute_batch(&format!("CREATE TABLE input ({});", definitions.join(", ")))?;
    Ok(())
}

fn affinity(values: &[Value]) -> &'static str {
    match infer_type(values) {
        FieldType::Boolean => "INTEGER",
        FieldType::Number if values.iter().all(|v| v.is_null() || v.is_i64() || v.is_u64()) => {
            "INTEGER"
        }
        FieldType::Number => "REAL",
        _ => "TEXT",
    }
}

fn insert_rows(
    conn: &mut Connection,
    rows: &[Map<String, Value>],
    columns: &[String],
    sql_names: &[String],
) -> Result<()> {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let names: Vec<String> = sql_names.iter().map(|c| quote_ident(c)).collect();
    let sql = format!(
        "INSERT INTO input ({}) VALUES ({})",
        names.join(", "),
        placeholders
    );

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for row in rows {
            let params = columns.iter().map(|c| to_sql(row.get(c)));
            stmt.execute(params_from_iter(params))?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn run(conn: &Connection, sql: &str, name: &str) -> Result<Frame> {
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(FrameError::decode(
            "sqlite",
            "only read-only statements can run against the response",
        ));
    }
    let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); column_names.len()];

    let mut result = stmt.query([])?;
    while let Some(row) = result.next()? {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(from_sql(row.get_ref(i)?));
        }
    }

    let mut frame = Frame::new(name);
    for (column_name, values) in column_names.into_iter().zip(columns) {
        let field_type = infer_type(&values);
        frame.fields.push(Field::new(column_name, field_type).with_values(values));
    }
    Ok(frame)
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
