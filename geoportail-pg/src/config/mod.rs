//! Configuration du service de requêtes

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration principale
///
/// Le schéma et les noms de tables sont configurables: le même binaire
/// sert des bases municipales provisionnées différemment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Schéma PostgreSQL hébergeant les couches
    pub schema: String,

    /// Noms des tables par couche
    pub tables: TableNames,

    /// statement_timeout appliqué à chaque transaction de lecture (ms)
    pub statement_timeout_ms: u64,

    /// Plafond de features par réponse d'emprise (parcelles, adresses)
    pub max_features: i64,

    /// Plafond du flux multi-catégories `/nearby`
    pub nearby_limit: i64,

    /// Plafond par catégorie du croisement par rayon
    pub radius_limit: i64,

    /// Limite par défaut de la recherche d'adresses
    pub default_search_limit: i64,
}

/// Tables par couche
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TableNames {
    pub parcels: String,
    pub addresses: String,
    /// Table d'attributs enrichis des parcelles (optionnelle en base)
    pub parcel_attributes: String,
    /// Table de rattachement adresse → parcelle précalculée (optionnelle)
    pub address_parcel_link: String,
    pub schools: String,
    pub libraries: String,
    pub poi: String,
    pub roads: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            parcels: "parcelles".into(),
            addresses: "adresses".into(),
            parcel_attributes: "parcelles_attributs".into(),
            address_parcel_link: "adresse_parcelle".into(),
            schools: "ecoles".into(),
            libraries: "bibliotheques".into(),
            poi: "poi".into(),
            roads: "voies".into(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            schema: "geoportail".into(),
            tables: TableNames::default(),
            statement_timeout_ms: 2500,
            max_features: 2000,
            nearby_limit: 10,
            radius_limit: 100,
            default_search_limit: 10,
        }
    }
}

impl ServiceConfig {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie que les identifiants SQL configurés sont sains
    ///
    /// Schéma et tables sont interpolés dans les requêtes (pas de
    /// placeholder possible pour un identifiant): seul un identifiant
    /// simple est accepté.
    pub fn validate(&self) -> Result<()> {
        let t = &self.tables;
        for name in [
            self.schema.as_str(),
            t.parcels.as_str(),
            t.addresses.as_str(),
            t.parcel_attributes.as_str(),
            t.address_parcel_link.as_str(),
            t.schools.as_str(),
            t.libraries.as_str(),
            t.poi.as_str(),
            t.roads.as_str(),
        ] {
            if !is_safe_identifier(name) {
                anyhow::bail!("Invalid SQL identifier in config: '{}'", name);
            }
        }
        if self.statement_timeout_ms == 0 {
            anyhow::bail!("statement_timeout_ms must be > 0");
        }
        Ok(())
    }

    /// Nom qualifié `schema.table`
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }
}

fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schema, "geoportail");
        assert_eq!(config.statement_timeout_ms, 2500);
        assert_eq!(config.max_features, 2000);
    }

    #[test]
    fn test_qualified_table_name() {
        let config = ServiceConfig::default();
        assert_eq!(config.qualified("parcelles"), "geoportail.parcelles");
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let mut config = ServiceConfig::default();
        config.tables.parcels = "parcelles; DROP TABLE".into();
        assert!(config.validate().is_err());

        config.tables.parcels = "1parcelles".into();
        assert!(config.validate().is_err());

        config.tables.parcels = String::new();
        assert!(config.validate().is_err());
    }
}
