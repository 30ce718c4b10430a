//! Croisement d'une adresse sélectionnée avec les équipements de proximité
//!
//! Les deux requêtes (écoles, bibliothèques) ne dépendent que de la
//! coordonnée de l'adresse, jamais l'une de l'autre: elles partent en
//! parallèle et échouent indépendamment. Un résultat partiel est un état
//! terminal acceptable, rapporté branche par branche.

use std::sync::Arc;

use tracing::warn;

use crate::error::QueryError;
use crate::sources::ProximitySource;
use crate::types::{AddressFeature, ProximityKind, ProximityResult};

/// Rayon (mètres) du croisement combiné écoles + bibliothèques
pub const CROSS_REFERENCE_RADIUS_M: f64 = 2000.0;

/// Taille du flux autonome "écoles les plus proches"
pub const NEAREST_SCHOOLS_COUNT: usize = 5;

/// Résultat du croisement: chaque branche porte son propre statut
#[derive(Debug)]
pub struct CrossReference {
    pub schools: Result<Vec<ProximityResult>, QueryError>,
    pub libraries: Result<Vec<ProximityResult>, QueryError>,
}

impl CrossReference {
    /// Vrai si au moins une branche a produit des résultats
    pub fn has_any(&self) -> bool {
        self.schools.as_ref().map(|s| !s.is_empty()).unwrap_or(false)
            || self
                .libraries
                .as_ref()
                .map(|l| !l.is_empty())
                .unwrap_or(false)
    }
}

pub struct CrossReferenceAggregator<S> {
    source: Arc<S>,
    radius_m: f64,
}

impl<S: ProximitySource> CrossReferenceAggregator<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_radius(source, CROSS_REFERENCE_RADIUS_M)
    }

    pub fn with_radius(source: Arc<S>, radius_m: f64) -> Self {
        Self { source, radius_m }
    }

    /// Croisement combiné: écoles et bibliothèques dans le rayon
    ///
    /// L'échec d'une branche (timeout, erreur de requête) ne bloque ni ne
    /// vide l'autre; seul le panneau de la catégorie en échec affiche un
    /// message.
    pub async fn on_address_selected(
        &self,
        address: &AddressFeature,
    ) -> Result<CrossReference, QueryError> {
        let origin = address.point()?;
        Ok(self.cross_reference_at(origin).await)
    }

    /// Croisement combiné à partir d'une coordonnée brute
    pub async fn cross_reference_at(&self, origin: geo::Point<f64>) -> CrossReference {
        let (schools, libraries) = tokio::join!(
            self.source
                .within_radius(origin, self.radius_m, &[ProximityKind::School]),
            self.source
                .within_radius(origin, self.radius_m, &[ProximityKind::Library]),
        );

        if let Err(e) = &schools {
            warn!(error = %e, "Schools branch failed");
        }
        if let Err(e) = &libraries {
            warn!(error = %e, "Libraries branch failed");
        }

        CrossReference { schools, libraries }
    }

    /// Flux autonome "N écoles les plus proches"
    ///
    /// Forme de requête différente du croisement combiné: ordre par
    /// distance et compte fixe, sans filtre de rayon.
    pub async fn nearest_schools(
        &self,
        address: &AddressFeature,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        let origin = address.point()?;
        self.source
            .nearest(origin, ProximityKind::School, NEAREST_SCHOOLS_COUNT)
            .await
    }
}
