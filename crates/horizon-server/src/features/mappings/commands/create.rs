//! Create mapping command
//!
//! The handler is a standalone async function with the SQL inline. A new
//! mapping takes effect for the next message of its source type; when several
//! enabled mappings share a source type the oldest one wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::models::LogMapping;

const MAX_NAME_LENGTH: usize = 256;

fn default_enabled() -> bool {
    true
}

/// Command to create a new log mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMappingCommand {
    pub name: String,

    /// Source type the mapping applies to, matched exactly
    pub source_type: String,

    /// Object whose `field_mappings` member holds `target -> source.path` pairs
    pub mapping_config: Value,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Errors that can occur when creating a mapping
#[derive(Debug, thiserror::Error)]
pub enum CreateMappingError {
    #[error("Name is required")]
    NameRequired,

    #[error("Name must be at most 256 characters")]
    NameLength,

    #[error("Source type is required")]
    SourceTypeRequired,

    #[error("mapping_config must be a JSON object")]
    ConfigNotObject,

    #[error("Mapping '{name}' already exists for source type '{source_type}'")]
    Duplicate { name: String, source_type: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CreateMappingCommand {
    /// Validates the command parameters
    pub fn validate(&self) -> Result<(), CreateMappingError> {
        if self.name.trim().is_empty() {
            return Err(CreateMappingError::NameRequired);
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(CreateMappingError::NameLength);
        }
        if self.source_type.trim().is_empty() {
            return Err(CreateMappingError::SourceTypeRequired);
        }
        if !self.mapping_config.is_object() {
            return Err(CreateMappingError::ConfigNotObject);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(pool, command),
    fields(name = %command.name, source_type = %command.source_type, enabled = command.enabled)
)]
pub async fn handle(
    pool: PgPool,
    command: CreateMappingCommand,
) -> Result<LogMapping, CreateMappingError> {
    command.validate()?;

    let mapping = sqlx::query_as::<_, LogMapping>(
        r#"
        INSERT INTO log_mappings (name, source_type, mapping_config, enabled)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, source_type, mapping_config, enabled, created_at, updated_at
        "#,
    )
    .bind(&command.name)
    .bind(&command.source_type)
    .bind(&command.mapping_config)
    .bind(command.enabled)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return CreateMappingError::Duplicate {
                    name: command.name.clone(),
                    source_type: command.source_type.clone(),
                };
            }
        }
        CreateMappingError::Database(e)
    })?;

    tracing::info!(mapping_id = %mapping.id, "Mapping created");

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(name: &str, source_type: &str, config: Value) -> CreateMappingCommand {
        CreateMappingCommand {
            name: name.to_string(),
            source_type: source_type.to_string(),
            mapping_config: config,
            enabled: true,
        }
    }

    #[test]
    fn test_validation_success() {
        let config = json!({"field_mappings": {"severity": "level"}});
        let cmd = command("fw-default", "firewall", config);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_validation_blank_fields() {
        let cmd = command("  ", "firewall", json!({}));
        assert!(matches!(cmd.validate(), Err(CreateMappingError::NameRequired)));

        let cmd = command("fw", "", json!({}));
        assert!(matches!(
            cmd.validate(),
            Err(CreateMappingError::SourceTypeRequired)
        ));

        let cmd = command(&"n".repeat(MAX_NAME_LENGTH + 1), "firewall", json!({}));
        assert!(matches!(cmd.validate(), Err(CreateMappingError::NameLength)));
    }

    #[test]
    fn test_validation_config_must_be_object() {
        for config in [json!([]), json!("severity"), json!(null), json!(3)] {
            let cmd = command("fw", "firewall", config);
            assert!(matches!(
                cmd.validate(),
                Err(CreateMappingError::ConfigNotObject)
            ));
        }
    }

    #[test]
    fn test_enabled_defaults_to_true() {
        let cmd: CreateMappingCommand = serde_json::from_value(json!({
            "name": "fw",
            "source_type": "firewall",
            "mapping_config": {}
        }))
        .unwrap();
        assert!(cmd.enabled);
    }
}
