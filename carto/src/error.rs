//! Types d'erreurs pour le crate carto

use thiserror::Error;

/// Erreurs pouvant survenir lors d'une requête spatiale
///
/// La taxonomie est partagée entre le coeur client et le backend de
/// requêtes: le serveur HTTP la traduit en codes de statut, le client
/// en messages de panneau.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Paramètres manquants ou mal formés: aucune requête n'est émise
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout de requête (statement_timeout dépassé côté base)
    #[error("Query timed out")]
    Timeout,

    /// Requête bien formée mais aucune ligne correspondante
    #[error("Not found")]
    NotFound,

    /// Toute autre erreur base de données ou réseau
    #[error("Backend failure: {0}")]
    Backend(String),

    /// Requête supplantée côté client: résultat écarté silencieusement
    #[error("Request cancelled")]
    Cancelled,
}

impl QueryError {
    /// Crée une erreur de paramètre invalide
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Crée une erreur backend générique
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Vrai si l'utilisateur peut retenter avec une requête plus précise
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Vrai si l'erreur ne doit jamais être montrée à l'utilisateur
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(QueryError::Timeout.is_retryable());
        assert!(!QueryError::NotFound.is_retryable());
        assert!(!QueryError::backend("boom").is_retryable());
    }

    #[test]
    fn test_silent() {
        assert!(QueryError::Cancelled.is_silent());
        assert!(!QueryError::Timeout.is_silent());
    }
}
