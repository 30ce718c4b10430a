//! Recherche d'adresses par libellé

use serde::Serialize;

use carto::QueryError;

use crate::db::transaction::query_bounded;

use super::SpatialQueryService;

/// Résultat de recherche: libellé + coordonnée de centrage
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub label: String,
    pub lon: f64,
    pub lat: f64,
}

impl SpatialQueryService {
    /// Recherche insensible à la casse sur le libellé complet d'adresse
    pub async fn query_search(&self, q: &str, limit: i64) -> Result<Vec<SearchHit>, QueryError> {
        let trimmed = q.trim();
        if trimmed.is_empty() {
            return Err(QueryError::invalid_input("q (query) parameter is required"));
        }

        let addresses = self.config().qualified(&self.config().tables.addresses);
        let sql = format!(
            "SELECT a.adresse_id, a.adresse_complete, \
             ST_X(a.geometry) AS lon, ST_Y(a.geometry) AS lat \
             FROM {addresses} a \
             WHERE a.adresse_complete ILIKE $1 \
             ORDER BY a.adresse_complete \
             LIMIT $2"
        );

        let pattern = format!("%{}%", escape_like(trimmed));

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&pattern, &limit],
        )
        .await
        .map_err(QueryError::from)?;

        Ok(rows
            .iter()
            .map(|row| SearchHit {
                id: row.get("adresse_id"),
                label: row.get("adresse_complete"),
                lon: row.get("lon"),
                lat: row.get("lat"),
            })
            .collect())
    }
}

/// Échappe les métacaractères LIKE du terme utilisateur
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("rue des lilas"), "rue des lilas");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
