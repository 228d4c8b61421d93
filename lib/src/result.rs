use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;

/// One row of the manager's final result list: a DAG that reached terminal
/// state, its type tag, and its terminal response time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub dag_id: i32,
    pub dag_type: String,
    pub resp_time: i64,
}

/// Writes `out.csv` with header `DAG ID,DAG Type,Response Time`, one row
/// per terminally retired DAG, sorted by `DAG ID` ascending.
/// A fatal load error never reaches this function; a DAG simply omitted
/// from `rows` (because it never retired) is the only way it can be
/// missing from the output.
pub fn write_out_csv(path: &Path, mut rows: Vec<ResultRow>) -> Result<(), SimError> {
    rows.sort_by_key(|r| r.dag_id);

    let mut file =
        File::create(path).map_err(|e| SimError::Config(format!("cannot create {}: {e}", path.display())))?;
    writeln!(file, "DAG ID,DAG Type,Response Time")
        .map_err(|e| SimError::Config(format!("cannot write {}: {e}", path.display())))?;
    for row in rows {
        writeln!(file, "{},{},{}", row.dag_id, row.dag_type, row.resp_time)
            .map_err(|e| SimError::Config(format!("cannot write {}: {e}", path.display())))?;
    }
    Ok(())
}
