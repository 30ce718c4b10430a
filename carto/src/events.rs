//! Bus d'événements entre le coeur carto et les collaborateurs UI
//!
//! Le vocabulaire est fixe et fait contrat: `focus-address`, `close-table`,
//! `select-parcel`, `select-address`, `close-schools`. Les collaborateurs
//! (tableau d'adresses, panneaux écoles/bibliothèques, recherche) ne
//! connaissent que ces événements, jamais l'état interne du coeur.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::types::AddressFeature;

/// Capacité par défaut du bus (les abonnés lents perdent les plus anciens)
const DEFAULT_CAPACITY: usize = 64;

/// Événements échangés entre la carte, la recherche et les panneaux
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum MapEvent {
    /// Centrer la carte sur une adresse (depuis la recherche ou le tableau)
    FocusAddress(AddressFeature),
    /// Fermer le tableau des adresses
    CloseTable,
    /// Une parcelle vient d'être sélectionnée
    SelectParcel { parcel_id: i64 },
    /// Une adresse vient d'être choisie dans la parcelle courante
    SelectAddress(AddressFeature),
    /// Fermer les panneaux écoles/bibliothèques et les surcouches associées
    CloseSchools,
}

/// Bus in-process multi-abonnés
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MapEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Nouvel abonnement; ne reçoit que les événements publiés ensuite
    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.tx.subscribe()
    }

    /// Publie un événement; un bus sans abonné est silencieux, pas une erreur
    pub fn publish(&self, event: MapEvent) {
        trace!(?event, "Publishing map event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_vocabulary_on_the_wire() {
        let event = MapEvent::SelectParcel { parcel_id: 42 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "select-parcel");
        assert_eq!(json["payload"]["parcel_id"], 42);

        assert_eq!(
            serde_json::to_value(MapEvent::CloseTable).unwrap()["event"],
            "close-table"
        );
        assert_eq!(
            serde_json::to_value(MapEvent::CloseSchools).unwrap()["event"],
            "close-schools"
        );

        let address = AddressFeature {
            address_point_id: 1,
            civic_number: None,
            street_name: None,
            full_address: None,
            geometry: geojson::Geometry::new(geojson::Value::Point(vec![-79.38, 43.65])),
        };
        assert_eq!(
            serde_json::to_value(MapEvent::FocusAddress(address.clone())).unwrap()["event"],
            "focus-address"
        );
        assert_eq!(
            serde_json::to_value(MapEvent::SelectAddress(address)).unwrap()["event"],
            "select-address"
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(MapEvent::CloseTable);

        assert_eq!(a.recv().await.unwrap(), MapEvent::CloseTable);
        assert_eq!(b.recv().await.unwrap(), MapEvent::CloseTable);
    }

    #[test]
    fn test_publish_without_subscriber_is_silent() {
        let bus = EventBus::default();
        bus.publish(MapEvent::CloseSchools);
    }
}
