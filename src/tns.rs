//! TNS alias table.
//!
//! Parses a `tnsnames.ora`-style file into an in-memory list of aliases and
//! resolves alias names to EZConnect-style connect strings. The table is
//! built once and handed to a batch run as a read-only snapshot; reloading
//! replaces it wholesale between runs.

use crate::error::{OrawatchError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One parsed alias entry from the TNS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TnsEntry {
    /// Alias name as written in the file.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub protocol: String,
}

impl TnsEntry {
    /// Returns the EZConnect form of this entry's network address.
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }
}

/// In-memory table of parsed TNS aliases.
#[derive(Debug, Clone, Default)]
pub struct TnsTable {
    entries: Vec<TnsEntry>,
    source_path: PathBuf,
}

impl TnsTable {
    /// Creates an empty table with no backing file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads and parses the TNS file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrawatchError::config(format!(
                "Failed to read TNS file {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self::parse(&content, path.to_path_buf()))
    }

    /// Parses TNS file content. Malformed entries are skipped with a
    /// warning; they never fail the whole file.
    pub fn parse(content: &str, source_path: PathBuf) -> Self {
        // `#` starts a comment anywhere on a line.
        let stripped: String = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");

        let host_re = Regex::new(r"(?i)HOST\s*=\s*([^)\s]+)").expect("static regex");
        let port_re = Regex::new(r"(?i)PORT\s*=\s*(\d+)").expect("static regex");
        let service_re = Regex::new(r"(?i)SERVICE_NAME\s*=\s*([^)\s]+)").expect("static regex");
        let sid_re = Regex::new(r"(?i)\(\s*SID\s*=\s*([^)\s]+)").expect("static regex");
        let protocol_re = Regex::new(r"(?i)PROTOCOL\s*=\s*([^)\s]+)").expect("static regex");

        let mut entries = Vec::new();

        for (names, body) in split_entries(&stripped) {
            let host = host_re.captures(&body).map(|c| c[1].to_string());
            let service = service_re
                .captures(&body)
                .or_else(|| sid_re.captures(&body))
                .map(|c| c[1].to_string());
            let port = port_re
                .captures(&body)
                .and_then(|c| c[1].parse::<u16>().ok())
                .unwrap_or(1521);
            let protocol = protocol_re
                .captures(&body)
                .map(|c| c[1].to_uppercase())
                .unwrap_or_else(|| "TCP".to_string());

            let (Some(host), Some(service_name)) = (host, service) else {
                warn!(
                    "Skipping TNS entry '{}': missing HOST or SERVICE_NAME",
                    names.join(", ")
                );
                continue;
            };

            for name in names {
                entries.push(TnsEntry {
                    name,
                    host: host.clone(),
                    port,
                    service_name: service_name.clone(),
                    protocol: protocol.clone(),
                });
            }
        }

        Self {
            entries,
            source_path,
        }
    }

    /// Resolves an alias by case-insensitive exact name match.
    pub fn resolve(&self, alias: &str) -> Option<&TnsEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(alias))
    }

    /// Returns all known alias names, in file order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Path of the file this table was parsed from. Empty for
    /// [`TnsTable::empty`].
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn entries(&self) -> &[TnsEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits the file into `(alias names, entry body)` pairs.
///
/// An entry is `NAME[, NAME...] = ( balanced parens )`. The scan is
/// paren-depth based so nested DESCRIPTION/ADDRESS blocks stay inside one
/// body.
fn split_entries(content: &str) -> Vec<(Vec<String>, String)> {
    let mut out = Vec::new();
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let mut i = 0usize;

    while i < len {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Accumulate the name part up to '='.
        let name_start = i;
        while i < len && chars[i] != '=' && chars[i] != '(' && chars[i] != ')' {
            i += 1;
        }
        if i >= len || chars[i] != '=' {
            // Stray parenthesis or truncated tail; skip one char and rescan.
            i += 1;
            continue;
        }
        let name_part: String = chars[name_start..i].iter().collect();
        i += 1; // consume '='

        while i < len && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= len || chars[i] != '(' {
            continue;
        }

        let body_start = i;
        let mut depth = 0usize;
        while i < len {
            match chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        let names: Vec<String> = name_part
            .split(',')
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            continue;
        }
        let body: String = chars[body_start..i].iter().collect();
        out.push((names, body));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Production instances
PRODDB =
  (DESCRIPTION =
    (ADDRESS = (PROTOCOL = TCP)(HOST = prod-db.factory.local)(PORT = 1521))
    (CONNECT_DATA =
      (SERVER = DEDICATED)
      (SERVICE_NAME = PROD)
    )
  )

testdb, TESTDB2 =
  (DESCRIPTION =
    (ADDRESS = (PROTOCOL = TCP)(HOST = 10.0.0.5)(PORT = 1522))
    (CONNECT_DATA = (SERVICE_NAME = TEST))
  )

LEGACY =
  (DESCRIPTION =
    (ADDRESS = (PROTOCOL = TCP)(HOST = legacy01))
    (CONNECT_DATA = (SID = ORCL))
  )
"#;

    #[test]
    fn test_parse_basic_entry() {
        let table = TnsTable::parse(SAMPLE, PathBuf::from("tnsnames.ora"));
        let entry = table.resolve("PRODDB").unwrap();
        assert_eq!(entry.host, "prod-db.factory.local");
        assert_eq!(entry.port, 1521);
        assert_eq!(entry.service_name, "PROD");
        assert_eq!(entry.protocol, "TCP");
        assert_eq!(entry.connect_string(), "//prod-db.factory.local:1521/PROD");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let table = TnsTable::parse(SAMPLE, PathBuf::from("tnsnames.ora"));
        assert!(table.resolve("proddb").is_some());
        assert!(table.resolve("ProdDb").is_some());
        assert!(table.resolve("NOSUCH").is_none());
    }

    #[test]
    fn test_alias_list_shares_one_body() {
        let table = TnsTable::parse(SAMPLE, PathBuf::from("tnsnames.ora"));
        let a = table.resolve("testdb").unwrap();
        let b = table.resolve("TESTDB2").unwrap();
        assert_eq!(a.host, "10.0.0.5");
        assert_eq!(a.port, 1522);
        assert_eq!(a.connect_string(), b.connect_string());
    }

    #[test]
    fn test_sid_fallback_and_default_port() {
        let table = TnsTable::parse(SAMPLE, PathBuf::from("tnsnames.ora"));
        let entry = table.resolve("LEGACY").unwrap();
        assert_eq!(entry.service_name, "ORCL");
        assert_eq!(entry.port, 1521);
    }

    #[test]
    fn test_names_in_file_order() {
        let table = TnsTable::parse(SAMPLE, PathBuf::from("tnsnames.ora"));
        assert_eq!(table.names(), vec!["PRODDB", "testdb", "TESTDB2", "LEGACY"]);
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let content = "BROKEN = (DESCRIPTION = (ADDRESS = (PROTOCOL = TCP)))\nOK = (DESCRIPTION = (ADDRESS = (HOST = h)(PORT = 1521)) (CONNECT_DATA = (SERVICE_NAME = S)))";
        let table = TnsTable::parse(content, PathBuf::from("t.ora"));
        assert_eq!(table.len(), 1);
        assert!(table.resolve("OK").is_some());
        assert!(table.resolve("BROKEN").is_none());
    }

    #[test]
    fn test_comments_are_ignored() {
        let content = "# ALIAS = (nothing)\nREAL = (DESCRIPTION = (ADDRESS = (HOST = h)(PORT = 1)) (CONNECT_DATA = (SERVICE_NAME = S))) # trailing";
        let table = TnsTable::parse(content, PathBuf::from("t.ora"));
        assert_eq!(table.names(), vec!["REAL"]);
    }

    #[test]
    fn test_empty_table() {
        let table = TnsTable::empty();
        assert!(table.is_empty());
        assert!(table.resolve("X").is_none());
    }
}
