//! Machine à états de sélection: survol, parcelle, adresse
//!
//! L'état est possédé par l'instance (jamais de globals): une carte, une
//! machine. Une seule sélection à la fois; sélectionner une nouvelle
//! parcelle invalide en cascade tout ce qui dépendait de l'ancienne
//! (adresses chargées, panneaux écoles/bibliothèques, surcouches).

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::QueryError;
use crate::events::{EventBus, MapEvent};
use crate::sources::AddressSource;
use crate::types::AddressFeature;

/// Résultat d'un clic ou d'un signal de fermeture
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    /// Nouvelle parcelle sélectionnée, adresses rechargées
    Selected {
        parcel_id: i64,
        address_count: usize,
    },
    /// Sélection levée (toggle ou fermeture), panneaux vidés
    Cleared,
    /// Parcelle sélectionnée mais chargement d'adresses en échec:
    /// le panneau affiche le message, la sélection reste valide
    SelectedWithoutAddresses {
        parcel_id: i64,
        error: QueryError,
    },
}

pub struct SelectionStateMachine<S> {
    source: Arc<S>,
    bus: EventBus,
    hovered: Option<i64>,
    selected: Option<i64>,
    selected_address: Option<AddressFeature>,
    addresses: Vec<AddressFeature>,
    cross_ref_open: bool,
}

impl<S: AddressSource> SelectionStateMachine<S> {
    pub fn new(source: Arc<S>, bus: EventBus) -> Self {
        Self {
            source,
            bus,
            hovered: None,
            selected: None,
            selected_address: None,
            addresses: Vec::new(),
            cross_ref_open: false,
        }
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn hovered(&self) -> Option<i64> {
        self.hovered
    }

    pub fn selected_address(&self) -> Option<&AddressFeature> {
        self.selected_address.as_ref()
    }

    /// Adresses actuellement chargées pour la parcelle sélectionnée
    pub fn addresses(&self) -> &[AddressFeature] {
        &self.addresses
    }

    /// Clic sur une parcelle: sélection, toggle ou remplacement
    pub async fn click_parcel(&mut self, parcel_id: i64) -> SelectionChange {
        if self.selected == Some(parcel_id) {
            // Recliquer la parcelle sélectionnée lève la sélection entière
            self.clear_all();
            return SelectionChange::Cleared;
        }

        // Sélection ou remplacement: les panneaux croisés portaient sur
        // l'ancienne adresse et sont invalides tant qu'une nouvelle adresse
        // n'est pas choisie
        self.selected = Some(parcel_id);
        self.selected_address = None;
        self.addresses.clear();
        self.close_dependent_panels();
        self.bus.publish(MapEvent::SelectParcel { parcel_id });

        match self.source.addresses_for_parcel(parcel_id).await {
            Ok(addresses) => {
                let address_count = addresses.len();
                debug!(parcel_id, address_count, "Addresses loaded for selection");
                self.addresses = addresses;
                SelectionChange::Selected {
                    parcel_id,
                    address_count,
                }
            }
            Err(error) => {
                warn!(parcel_id, error = %error, "Address load failed for selected parcel");
                SelectionChange::SelectedWithoutAddresses { parcel_id, error }
            }
        }
    }

    /// Choix d'une adresse dans la parcelle sélectionnée
    ///
    /// Retourne `false` (sans effet) hors de l'état `ParcelSelected`.
    pub fn select_address(&mut self, address: AddressFeature) -> bool {
        if self.selected.is_none() {
            return false;
        }
        self.bus.publish(MapEvent::SelectAddress(address.clone()));
        self.selected_address = Some(address);
        self.cross_ref_open = true;
        true
    }

    /// Signal externe de fermeture: retour à `Unselected`, tout est vidé
    pub fn close(&mut self) {
        self.clear_all();
    }

    /// Survol d'une parcelle: exclusif, indépendant de la sélection
    pub fn hover(&mut self, parcel_id: i64) {
        self.hovered = Some(parcel_id);
    }

    pub fn clear_hover(&mut self) {
        self.hovered = None;
    }

    /// Réconciliation après rechargement de la géométrie
    ///
    /// Réapplique le filtre de surbrillance sur la sélection courante.
    /// Une sélection absente des nouvelles données n'est PAS une erreur:
    /// la surbrillance reste armée et redeviendra visible quand la
    /// parcelle repassera dans la vue. Le survol ne survit jamais.
    ///
    /// Retourne `true` si la surbrillance s'applique aux données chargées.
    pub fn reconcile_after_reload(&mut self, loaded_ids: &HashSet<i64>) -> bool {
        self.hovered = None;
        match self.selected {
            Some(id) if loaded_ids.contains(&id) => true,
            Some(id) => {
                warn!(parcel_id = id, "Selected parcel absent from reloaded viewport");
                false
            }
            None => false,
        }
    }

    fn clear_all(&mut self) {
        self.selected = None;
        self.selected_address = None;
        self.hovered = None;
        self.addresses.clear();
        self.close_dependent_panels();
        self.bus.publish(MapEvent::CloseTable);
    }

    fn close_dependent_panels(&mut self) {
        if self.cross_ref_open {
            self.bus.publish(MapEvent::CloseSchools);
            self.cross_ref_open = false;
        }
    }
}
