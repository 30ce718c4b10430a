//! Transaction de lecture bornée par `statement_timeout`
//!
//! Chaque requête API s'exécute dans sa propre transaction: le timeout est
//! posé en `SET LOCAL` (il meurt avec la transaction), le rollback est
//! explicite en cas d'échec, et la connexion retourne au pool
//! inconditionnellement quand le client est relâché — succès ou non.

use deadpool_postgres::{Object, Pool, Transaction};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::error;

use carto::QueryError;

use super::{is_missing_relation, map_pg_error, map_pool_error};

/// Échec d'une requête bornée
///
/// `missing_relation` permet à la négociation de capacités de distinguer
/// une table/colonne optionnelle absente d'un vrai échec.
#[derive(Debug)]
pub struct BoundedQueryError {
    pub error: QueryError,
    pub missing_relation: bool,
}

impl BoundedQueryError {
    fn plain(error: QueryError) -> Self {
        Self {
            error,
            missing_relation: false,
        }
    }
}

impl From<BoundedQueryError> for QueryError {
    fn from(err: BoundedQueryError) -> Self {
        err.error
    }
}

/// Transaction de lecture avec timeout de statement
pub struct QueryTransaction<'a> {
    tx: Transaction<'a>,
}

impl<'a> QueryTransaction<'a> {
    /// Démarre la transaction et pose le timeout
    ///
    /// `SET LOCAL` n'accepte pas de paramètre lié: la valeur vient de la
    /// configuration validée, jamais d'une entrée utilisateur.
    pub async fn begin(client: &'a mut Object, timeout_ms: u64) -> Result<Self, QueryError> {
        let tx = client.transaction().await.map_err(|e| map_pg_error(&e))?;

        tx.batch_execute(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .await
            .map_err(|e| map_pg_error(&e))?;

        Ok(Self { tx })
    }

    /// Accès à la transaction sous-jacente
    pub fn inner(&self) -> &Transaction<'a> {
        &self.tx
    }

    /// Valide la transaction
    pub async fn commit(self) -> Result<(), QueryError> {
        self.tx.commit().await.map_err(|e| map_pg_error(&e))
    }

    /// Rollback explicite avant de rendre la connexion
    pub async fn rollback(self, cause: &QueryError) {
        if let Err(e) = self.tx.rollback().await {
            error!(error = %e, cause = %cause, "Explicit rollback failed (connection returns to pool anyway)");
        }
    }
}

/// Exécute une requête unique dans une transaction bornée
///
/// Le motif couvre toutes les lectures de l'API: une requête par
/// transaction, commit sur succès, rollback + erreur mappée sinon.
pub async fn query_bounded(
    pool: &Pool,
    timeout_ms: u64,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Row>, BoundedQueryError> {
    let mut client = pool
        .get()
        .await
        .map_err(|e| BoundedQueryError::plain(map_pool_error(&e)))?;

    let bounded = QueryTransaction::begin(&mut client, timeout_ms)
        .await
        .map_err(BoundedQueryError::plain)?;

    match bounded.inner().query(sql, params).await {
        Ok(rows) => {
            bounded.commit().await.map_err(BoundedQueryError::plain)?;
            Ok(rows)
        }
        Err(e) => {
            let missing_relation = is_missing_relation(&e);
            let mapped = map_pg_error(&e);
            bounded.rollback(&mapped).await;
            Err(BoundedQueryError {
                error: mapped,
                missing_relation,
            })
        }
    }
}
