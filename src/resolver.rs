//! Connection resolution.
//!
//! Turns a query definition's stored connection reference into a concrete
//! connect string + credentials. The three reference forms are modeled as a
//! tagged union and resolved with a single match; priority between them
//! (saved ref, then inline endpoint, then TNS alias) is decided once when
//! the union is derived from the definition.
//!
//! The resolver works over read-only snapshots taken at batch start: the
//! saved-connection list (passwords already loaded) and the parsed TNS
//! table. It never touches the store mid-batch.

use crate::error::{OrawatchError, Result};
use crate::persistence::{QueryDefinition, SavedConnection};
use crate::tns::TnsTable;

/// Which of the three sources supplied a resolved connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    SavedConnection,
    Inline,
    TnsAlias,
}

/// A query definition's connection reference, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    /// Foreign key into the saved-connections store.
    SavedRef(i64),
    /// Endpoint spelled out on the definition itself.
    Inline {
        host: String,
        port: u16,
        service: String,
    },
    /// Named alias to look up in the TNS table.
    TnsAlias(String),
}

impl ConnectionSource {
    /// Derives the source from a definition. First match wins: saved id,
    /// then a complete inline triple, then an alias.
    pub fn from_definition(def: &QueryDefinition) -> Result<Self> {
        if let Some(id) = def.saved_connection_id {
            return Ok(Self::SavedRef(id));
        }

        if let (Some(host), Some(port), Some(service)) =
            (def.host.as_deref(), def.port, def.service.as_deref())
        {
            return Ok(Self::Inline {
                host: host.to_string(),
                port,
                service: service.to_string(),
            });
        }

        if let Some(alias) = def.tns_alias.as_deref() {
            if !alias.trim().is_empty() {
                return Ok(Self::TnsAlias(alias.trim().to_string()));
            }
        }

        Err(OrawatchError::incomplete(format!(
            "Query '{}' has no connection reference (saved id, host/port/service, or TNS alias)",
            def.name
        )))
    }
}

/// Resolved connection: everything the executor needs to open a session.
///
/// Created once per query per run, never persisted.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub connect_string: String,
    pub username: String,
    pub password: String,
    pub provenance: Provenance,
    /// Human-readable origin, used in batch log lines.
    pub label: String,
}

impl ConnectionDescriptor {
    /// Returns a display-safe string (no password).
    pub fn display_string(&self) -> String {
        format!("{}@{} [{}]", self.username, self.connect_string, self.label)
    }
}

/// Resolves query definitions against per-batch snapshots.
pub struct Resolver<'a> {
    connections: &'a [SavedConnection],
    tns: &'a TnsTable,
}

impl<'a> Resolver<'a> {
    pub fn new(connections: &'a [SavedConnection], tns: &'a TnsTable) -> Self {
        Self { connections, tns }
    }

    /// Resolves one definition to a connection descriptor, or fails with a
    /// descriptive error. Failures abort only the calling query's
    /// execution; the caller decides whether to continue.
    pub fn resolve(&self, def: &QueryDefinition) -> Result<ConnectionDescriptor> {
        let descriptor = match ConnectionSource::from_definition(def)? {
            ConnectionSource::SavedRef(id) => self.resolve_saved(def, id)?,
            ConnectionSource::Inline {
                host,
                port,
                service,
            } => ConnectionDescriptor {
                connect_string: format!("//{}:{}/{}", host, port, service),
                username: def.username.clone().unwrap_or_default(),
                password: def.password.clone().unwrap_or_default(),
                provenance: Provenance::Inline,
                label: "inline endpoint".to_string(),
            },
            ConnectionSource::TnsAlias(alias) => {
                let entry = self.lookup_alias(&alias)?;
                ConnectionDescriptor {
                    connect_string: entry.connect_string(),
                    username: def.username.clone().unwrap_or_default(),
                    password: def.password.clone().unwrap_or_default(),
                    provenance: Provenance::TnsAlias,
                    label: format!("TNS alias '{}'", entry.name),
                }
            }
        };

        self.validate_credentials(def, descriptor)
    }

    fn resolve_saved(&self, def: &QueryDefinition, id: i64) -> Result<ConnectionDescriptor> {
        let conn = self
            .connections
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| {
                OrawatchError::not_found(format!(
                    "Query '{}' references saved connection id {}, which no longer exists",
                    def.name, id
                ))
            })?;

        let connect_string = if let Some(alias) = conn.tns_alias.as_deref() {
            self.lookup_alias(alias)?.connect_string()
        } else if let (Some(host), Some(port), Some(service)) =
            (conn.host.as_deref(), conn.port, conn.service.as_deref())
        {
            format!("//{}:{}/{}", host, port, service)
        } else {
            return Err(OrawatchError::incomplete(format!(
                "Saved connection '{}' has neither a TNS alias nor a host/port/service endpoint",
                conn.name
            )));
        };

        Ok(ConnectionDescriptor {
            connect_string,
            username: conn.username.clone(),
            password: conn.password.clone().unwrap_or_default(),
            provenance: Provenance::SavedConnection,
            label: format!("saved connection '{}'", conn.name),
        })
    }

    fn lookup_alias(&self, alias: &str) -> Result<&crate::tns::TnsEntry> {
        self.tns.resolve(alias).ok_or_else(|| {
            let known = if self.tns.is_empty() {
                "none loaded".to_string()
            } else {
                self.tns.names().join(", ")
            };
            OrawatchError::not_found(format!(
                "TNS alias '{}' not found. Known aliases: {} (alias file: {})",
                alias,
                known,
                self.tns.source_path().display()
            ))
        })
    }

    fn validate_credentials(
        &self,
        def: &QueryDefinition,
        descriptor: ConnectionDescriptor,
    ) -> Result<ConnectionDescriptor> {
        if descriptor.username.trim().is_empty() {
            return Err(OrawatchError::incomplete(format!(
                "Query '{}': user id is empty",
                def.name
            )));
        }
        if descriptor.password.is_empty() {
            return Err(OrawatchError::incomplete(format!(
                "Query '{}': password is empty",
                def.name
            )));
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tns::TnsTable;
    use std::path::PathBuf;

    fn tns_table() -> TnsTable {
        TnsTable::parse(
            "PRODDB = (DESCRIPTION = (ADDRESS = (PROTOCOL = TCP)(HOST = prod01)(PORT = 1521)) \
             (CONNECT_DATA = (SERVICE_NAME = PROD)))",
            PathBuf::from("/etc/oracle/tnsnames.ora"),
        )
    }

    fn saved_inline(id: i64) -> SavedConnection {
        let mut conn = SavedConnection::new("mes", "app_user");
        conn.id = id;
        conn.password = Some("pw".to_string());
        conn.host = Some("db01".to_string());
        conn.port = Some(1522);
        conn.service = Some("MES".to_string());
        conn
    }

    fn def_with_alias(alias: &str) -> QueryDefinition {
        let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
        def.tns_alias = Some(alias.to_string());
        def.username = Some("scott".to_string());
        def.password = Some("tiger".to_string());
        def
    }

    #[test]
    fn test_saved_ref_wins_over_inline_and_alias() {
        let connections = vec![saved_inline(3)];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = def_with_alias("PRODDB");
        def.saved_connection_id = Some(3);
        def.host = Some("ignored".to_string());
        def.port = Some(1);
        def.service = Some("IGNORED".to_string());

        let descriptor = resolver.resolve(&def).unwrap();
        assert_eq!(descriptor.provenance, Provenance::SavedConnection);
        assert_eq!(descriptor.connect_string, "//db01:1522/MES");
        assert_eq!(descriptor.username, "app_user");
        assert_eq!(descriptor.password, "pw");
    }

    #[test]
    fn test_stale_saved_ref_fails_not_found() {
        let connections = vec![saved_inline(3)];
        let tns = TnsTable::empty();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = QueryDefinition::new("stale", "SELECT 1 FROM dual");
        def.saved_connection_id = Some(99);

        let err = resolver.resolve(&def).unwrap_err();
        assert_eq!(err.category(), "Connection Not Found");
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_saved_ref_with_tns_alias_resolves_through_table() {
        let mut conn = SavedConnection::new("prod", "app_user");
        conn.id = 1;
        conn.password = Some("pw".to_string());
        conn.tns_alias = Some("proddb".to_string());
        let connections = vec![conn];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
        def.saved_connection_id = Some(1);

        let descriptor = resolver.resolve(&def).unwrap();
        assert_eq!(descriptor.connect_string, "//prod01:1521/PROD");
        assert_eq!(descriptor.provenance, Provenance::SavedConnection);
    }

    #[test]
    fn test_inline_endpoint() {
        let connections = vec![];
        let tns = TnsTable::empty();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
        def.host = Some("eq-pc-07".to_string());
        def.port = Some(1521);
        def.service = Some("XE".to_string());
        def.username = Some("scott".to_string());
        def.password = Some("tiger".to_string());

        let descriptor = resolver.resolve(&def).unwrap();
        assert_eq!(descriptor.provenance, Provenance::Inline);
        assert_eq!(descriptor.connect_string, "//eq-pc-07:1521/XE");
        assert_eq!(descriptor.display_string(), "scott@//eq-pc-07:1521/XE [inline endpoint]");
    }

    #[test]
    fn test_partial_inline_falls_back_to_alias() {
        let connections = vec![];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        // Host present but no service: not a complete inline triple.
        let mut def = def_with_alias("PRODDB");
        def.host = Some("orphan".to_string());

        let descriptor = resolver.resolve(&def).unwrap();
        assert_eq!(descriptor.provenance, Provenance::TnsAlias);
        assert_eq!(descriptor.connect_string, "//prod01:1521/PROD");
    }

    #[test]
    fn test_alias_match_is_case_insensitive() {
        let connections = vec![];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        let descriptor = resolver.resolve(&def_with_alias("proddb")).unwrap();
        assert_eq!(descriptor.connect_string, "//prod01:1521/PROD");
    }

    #[test]
    fn test_unknown_alias_lists_known_names_and_file() {
        let connections = vec![];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        let err = resolver.resolve(&def_with_alias("NOPE")).unwrap_err();
        let msg = err.to_string();
        assert_eq!(err.category(), "Connection Not Found");
        assert!(msg.contains("PRODDB"));
        assert!(msg.contains("/etc/oracle/tnsnames.ora"));
    }

    #[test]
    fn test_empty_credentials_fail_incomplete() {
        let connections = vec![];
        let tns = tns_table();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = def_with_alias("PRODDB");
        def.password = None;
        let err = resolver.resolve(&def).unwrap_err();
        assert_eq!(err.category(), "Connection Incomplete");

        let mut def = def_with_alias("PRODDB");
        def.username = Some("   ".to_string());
        let err = resolver.resolve(&def).unwrap_err();
        assert_eq!(err.category(), "Connection Incomplete");
    }

    #[test]
    fn test_no_reference_at_all_fails() {
        let def = QueryDefinition::new("empty", "SELECT 1 FROM dual");
        let err = ConnectionSource::from_definition(&def).unwrap_err();
        assert_eq!(err.category(), "Connection Incomplete");
    }

    #[test]
    fn test_saved_connection_without_endpoint_fails() {
        let mut conn = SavedConnection::new("broken", "u");
        conn.id = 5;
        conn.password = Some("pw".to_string());
        let connections = vec![conn];
        let tns = TnsTable::empty();
        let resolver = Resolver::new(&connections, &tns);

        let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
        def.saved_connection_id = Some(5);

        let err = resolver.resolve(&def).unwrap_err();
        assert_eq!(err.category(), "Connection Incomplete");
    }
}
