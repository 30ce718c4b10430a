//! Accès PostgreSQL/PostGIS: pool, transactions bornées, capacités

pub mod capabilities;
pub mod pool;
pub mod transaction;

use carto::QueryError;
use tokio_postgres::error::SqlState;

/// Traduit une erreur tokio-postgres vers la taxonomie partagée
///
/// `57014` (query_canceled) correspond au dépassement du
/// `statement_timeout` posé sur la transaction.
pub fn map_pg_error(err: &tokio_postgres::Error) -> QueryError {
    if let Some(code) = err.code() {
        if *code == SqlState::QUERY_CANCELED {
            return QueryError::Timeout;
        }
    }
    QueryError::backend(err.to_string())
}

/// Vrai si l'erreur désigne une table ou colonne absente
///
/// Sert à la négociation de capacités: une relation optionnelle manquante
/// dégrade la requête enrichie, elle ne la condamne pas.
pub fn is_missing_relation(err: &tokio_postgres::Error) -> bool {
    matches!(
        err.code(),
        Some(code) if *code == SqlState::UNDEFINED_TABLE || *code == SqlState::UNDEFINED_COLUMN
    )
}

/// Traduit une erreur d'acquisition de connexion
pub fn map_pool_error(err: &deadpool_postgres::PoolError) -> QueryError {
    QueryError::backend(format!("connection pool: {err}"))
}
