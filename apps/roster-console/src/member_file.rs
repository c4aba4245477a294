//! Member rows read from a JSON file standing in for the engine database.

use std::{fs, path::PathBuf};

use roster_core::{MemberRow, MemberSource, RosterError, RosterErrorCategory};

/// Reads the whole roster file on every load; the group ID is not used.
#[derive(Debug, Clone)]
pub struct FileMemberSource {
    path: PathBuf,
}

impl FileMemberSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemberSource for FileMemberSource {
    fn load_members(&self, group_id: &str) -> Result<Vec<MemberRow>, RosterError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            RosterError::source_unavailable(
                group_id,
                format!("failed reading {}: {err}", self.path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            RosterError::new(
                RosterErrorCategory::Serialization,
                "member_rows_invalid",
                format!("failed parsing {}: {err}", self.path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    fn unique_temp_path(label: &str) -> PathBuf {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        env::temp_dir().join(format!("roster-console-{label}-{now_nanos}.json"))
    }

    #[test]
    fn loads_rows_from_json() {
        let path = unique_temp_path("rows");
        fs::write(
            &path,
            r#"[
                {"identity": "01", "details": {"first_name": "Alice", "last_name": "Dupont"}},
                {"identity": "02", "pending": true, "admin": true}
            ]"#,
        )
        .expect("write roster");

        let rows = FileMemberSource::new(&path)
            .load_members("g1")
            .expect("rows should load");
        assert_eq!(rows.len(), 2);
        assert!(rows[1].pending && rows[1].admin);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_a_storage_error() {
        let err = FileMemberSource::new(unique_temp_path("missing"))
            .load_members("g1")
            .expect_err("missing file should fail");
        assert_eq!(err.category, RosterErrorCategory::Storage);
    }

    #[test]
    fn malformed_file_is_a_serialization_error() {
        let path = unique_temp_path("malformed");
        fs::write(&path, "[{\"identity\": 12}]").expect("write roster");
        let err = FileMemberSource::new(&path)
            .load_members("g1")
            .expect_err("bad rows should fail");
        assert_eq!(err.code, "member_rows_invalid");
        let _ = fs::remove_file(path);
    }
}
