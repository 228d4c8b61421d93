use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::SimError;

/// Per-run trace files: one global trace plus one lazily-opened file per
/// distinct `dag_type` encountered, each opened with a timestamp header
/// line and a `Time\tResponse time (avg)` column header.
pub struct TraceSink {
    output_dir: PathBuf,
    basename: String,
    global_file: File,
    per_type_files: HashMap<String, File>,
}

impl TraceSink {
    pub fn new(output_dir: &Path, basename: &str, now: DateTime<Utc>) -> Result<Self, SimError> {
        let global_path = output_dir.join(format!("{basename}.global.trace"));
        let mut global_file = File::create(&global_path)
            .map_err(|e| SimError::Config(format!("cannot create {}: {e}", global_path.display())))?;
        write_header(&mut global_file, now)?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            basename: basename.to_string(),
            global_file,
            per_type_files: HashMap::new(),
        })
    }

    fn file_for_type(&mut self, dag_type: &str, now: DateTime<Utc>) -> Result<&mut File, SimError> {
        if !self.per_type_files.contains_key(dag_type) {
            let path = self.output_dir.join(format!("{}.{}.trace", self.basename, dag_type));
            let mut file = File::create(&path)
                .map_err(|e| SimError::Config(format!("cannot create {}: {e}", path.display())))?;
            write_header(&mut file, now)?;
            self.per_type_files.insert(dag_type.to_string(), file);
        }
        Ok(self.per_type_files.get_mut(dag_type).unwrap())
    }

    /// Writes one `sim_time\trunning_avg` line to both the global trace
    /// and the per-`dag_type` trace, opening the latter lazily on first use.
    pub fn record(
        &mut self,
        sim_time: i64,
        dag_type: &str,
        global_avg: f64,
        per_type_avg: f64,
        now: DateTime<Utc>,
    ) -> Result<(), SimError> {
        writeln!(self.global_file, "{sim_time}\t{global_avg:.1}")
            .map_err(|e| SimError::Config(format!("trace write failed: {e}")))?;

        let file = self.file_for_type(dag_type, now)?;
        writeln!(file, "{sim_time}\t{per_type_avg:.1}")
            .map_err(|e| SimError::Config(format!("trace write failed: {e}")))?;
        Ok(())
    }
}

fn write_header(file: &mut File, now: DateTime<Utc>) -> Result<(), SimError> {
    writeln!(file, "{}\n", now.format("%Y-%m-%d %H:%M:%S"))
        .and_then(|_| writeln!(file, "Time\tResponse time (avg)"))
        .map_err(|e| SimError::Config(format!("trace header write failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn record_opens_per_type_file_lazily_and_writes_lines() {
        let dir = std::env::temp_dir().join(format!("trace_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let now: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();

        let mut sink = TraceSink::new(&dir, "run", now).unwrap();
        sink.record(10, "A", 10.0, 10.0, now).unwrap();
        sink.record(20, "A", 15.0, 15.0, now).unwrap();

        let global = fs::read_to_string(dir.join("run.global.trace")).unwrap();
        assert!(global.contains("10\t10.0"));
        assert!(global.contains("20\t15.0"));

        let per_type = fs::read_to_string(dir.join("run.A.trace")).unwrap();
        assert!(per_type.contains("Time\tResponse time (avg)"));
        assert!(per_type.contains("20\t15.0"));

        fs::remove_dir_all(&dir).ok();
    }
}
