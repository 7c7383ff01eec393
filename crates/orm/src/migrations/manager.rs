//! Migration Manager - Loading change files from disk
//!
//! Reads a migrations or seeders directory into [`MigrationFile`]s. YAML
//! files carry portable operations; `.sql` files carry native statements in
//! `-- Up migration` / `-- Down migration` sections.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use super::definitions::{ChangeSet, MigrationFile, MigrationKind};
use super::operations::Operation;
use crate::backends::{AdapterFamily, AdapterSelector};
use crate::error::{MigrationError, OrmError, OrmResult};

/// File stems must open with a date: `2024_01_15`, `2024-01-15` or `20240115`
const DATE_PREFIX: &str = r"^\d{4}[_-]?\d{2}[_-]?\d{2}";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeFile {
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    adapter: Option<AdapterSelector>,
    #[serde(default)]
    up: Vec<Operation>,
    #[serde(default)]
    down: Vec<Operation>,
}

/// Loads the change files of one directory
#[derive(Debug, Clone)]
pub struct MigrationManager {
    directory: PathBuf,
    kind: MigrationKind,
}

impl MigrationManager {
    pub fn new(directory: impl Into<PathBuf>, kind: MigrationKind) -> Self {
        Self {
            directory: directory.into(),
            kind,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn kind(&self) -> MigrationKind {
        self.kind
    }

    /// Every change file in the directory, in ascending name order
    pub fn load(&self) -> OrmResult<Vec<MigrationFile>> {
        if !self.directory.is_dir() {
            return Err(
                MigrationError::DirectoryNotFound(self.directory.display().to_string()).into(),
            );
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let extension = path.extension().and_then(|ext| ext.to_str());
            match extension {
                Some("yaml") | Some("yml") | Some("sql") => files.push(self.parse_file(&path)?),
                _ => debug!(path = %path.display(), "ignoring non-migration file"),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut seen = HashSet::new();
        for file in &files {
            if !seen.insert(file.name.as_str()) {
                return Err(invalid(&file.name, "more than one file shares this name"));
            }
        }

        Ok(files)
    }

    /// Parse a single change file
    pub fn parse_file(&self, path: &Path) -> OrmResult<MigrationFile> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| invalid(&path.display().to_string(), "file name is not valid UTF-8"))?
            .to_string();

        let date_prefix = Regex::new(DATE_PREFIX).map_err(|e| {
            OrmError::configuration(format!("Failed to compile date prefix regex: {}", e))
        })?;
        if !date_prefix.is_match(&name) {
            return Err(invalid(
                &name,
                "file names must start with a date prefix such as 2024_01_15",
            ));
        }

        let bytes = fs::read(path)?;
        let checksum = checksum(&bytes);
        let content = String::from_utf8(bytes)
            .map_err(|_| invalid(&name, "file is not valid UTF-8"))?;

        let is_sql = path.extension().and_then(|ext| ext.to_str()) == Some("sql");
        let (group, adapter, up, down) = if is_sql {
            parse_sql_file(&name, &content)?
        } else {
            parse_yaml_file(&name, &content)?
        };

        if up.is_empty() {
            return Err(invalid(&name, "no up statements"));
        }

        Ok(MigrationFile {
            name,
            path: path.to_path_buf(),
            kind: self.kind,
            group,
            adapter,
            checksum,
            up,
            down,
        })
    }
}

type ParsedFile = (Option<String>, Option<AdapterSelector>, ChangeSet, ChangeSet);

fn parse_yaml_file(name: &str, content: &str) -> OrmResult<ParsedFile> {
    let file: ChangeFile =
        serde_yaml::from_str(content).map_err(|e| invalid(name, &e.to_string()))?;
    Ok((
        file.group,
        file.adapter,
        ChangeSet::Operations(file.up),
        ChangeSet::Operations(file.down),
    ))
}

fn parse_sql_file(name: &str, content: &str) -> OrmResult<ParsedFile> {
    let mut group = None;
    let mut adapter = None;
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = "";

    for line in content.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        if lowered.starts_with("-- up") || lowered.contains("up migration") {
            section = "up";
            continue;
        } else if lowered.starts_with("-- down") || lowered.contains("down migration") {
            section = "down";
            continue;
        }

        if let Some(header) = trimmed.strip_prefix("--") {
            if let Some((key, value)) = header.split_once(':') {
                match key.trim().to_lowercase().as_str() {
                    "group" => group = Some(value.trim().to_string()),
                    "adapter" => {
                        let selector: AdapterSelector = value
                            .trim()
                            .parse()
                            .map_err(|e: OrmError| invalid(name, &e.to_string()))?;
                        adapter = Some(selector);
                    }
                    _ => {}
                }
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            "up" => up_sql.push(line),
            "down" => down_sql.push(line),
            _ => {}
        }
    }

    let adapter = adapter.unwrap_or(AdapterSelector::Family(AdapterFamily::Relational));
    let relational = match adapter {
        AdapterSelector::Family(family) => family == AdapterFamily::Relational,
        AdapterSelector::Kind(kind) => kind.is_relational(),
    };
    if !relational {
        return Err(invalid(name, ".sql files can only target relational adapters"));
    }

    Ok((
        group,
        Some(adapter),
        ChangeSet::Sql(split_sql_statements(&up_sql.join("\n"))),
        ChangeSet::Sql(split_sql_statements(&down_sql.join("\n"))),
    ))
}

/// Split SQL statements for execution using proper SQL parsing
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| stmt.to_string()).collect(),
        Err(e) => {
            warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

/// SHA-256 of a file's bytes, hex encoded
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn invalid(file: &str, reason: &str) -> OrmError {
    MigrationError::InvalidFile {
        file: file.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
