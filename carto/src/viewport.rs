//! Suivi de l'emprise carte: debounce, annulation coopérative, garde de zoom
//!
//! La couche parcellaire ne doit refléter que la requête la plus récente
//! non annulée. L'annulation est consultative au niveau réseau (la tâche
//! en vol est interrompue) et autoritaire au niveau applicatif (un résultat
//! d'une génération supplantée est écarté même s'il arrive quand même).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::sources::ParcelSource;
use crate::types::{ParcelFeature, Viewport, MIN_ZOOM};

/// Fenêtre de debounce entre une rafale de mouvements et la requête
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Mise à jour de la couche parcellaire, envoyée à l'UI
#[derive(Debug, Clone, PartialEq)]
pub enum ParcelLayerUpdate {
    /// Une requête vient de partir: indicateur de chargement scoped couche
    Loading,
    /// Résultat de la requête la plus récente non annulée; remplace tout
    Loaded(Vec<ParcelFeature>),
    /// Couche vidée; `zoom_notice` demande l'invite persistante "zoomez"
    Cleared { zoom_notice: bool },
    /// Échec (timeout ou backend): couche vidée + message inline
    Failed(QueryError),
}

/// Phase observable du contrôleur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    Querying,
}

/// Contrôleur d'emprise
///
/// `on_viewport_change` est invoqué à chaque fin de déplacement/zoom.
/// Toute nouvelle vue supplante la précédente, y compris pendant la
/// fenêtre de debounce ou pendant la requête en vol.
pub struct ViewportController<S> {
    source: Arc<S>,
    updates: mpsc::Sender<ParcelLayerUpdate>,
    debounce: Duration,
    min_zoom: f64,
    generation: Arc<AtomicU64>,
    phase: Arc<Mutex<Phase>>,
    in_flight: Option<JoinHandle<()>>,
}

impl<S: ParcelSource + 'static> ViewportController<S> {
    pub fn new(source: Arc<S>, updates: mpsc::Sender<ParcelLayerUpdate>) -> Self {
        Self::with_debounce(source, updates, DEBOUNCE_WINDOW)
    }

    pub fn with_debounce(
        source: Arc<S>,
        updates: mpsc::Sender<ParcelLayerUpdate>,
        debounce: Duration,
    ) -> Self {
        Self {
            source,
            updates,
            debounce,
            min_zoom: MIN_ZOOM,
            generation: Arc::new(AtomicU64::new(0)),
            phase: Arc::new(Mutex::new(Phase::Idle)),
            in_flight: None,
        }
    }

    /// Phase courante
    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    /// Nouvelle vue de carte
    pub fn on_viewport_change(&mut self, viewport: Viewport) {
        // Toute vue plus récente supplante la précédente
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }

        if viewport.zoom < self.min_zoom {
            // Un zoom-out sous le seuil en plein vol annule aussi la requête
            // sortante: un résultat haute-résolution périmé n'a pas le droit
            // d'écraser la couche vidée
            *self.phase.lock().unwrap() = Phase::Idle;
            debug!(zoom = viewport.zoom, "Zoom below threshold, clearing parcel layer");
            let _ = self
                .updates
                .try_send(ParcelLayerUpdate::Cleared { zoom_notice: true });
            return;
        }

        *self.phase.lock().unwrap() = Phase::Debouncing;

        let source = Arc::clone(&self.source);
        let updates = self.updates.clone();
        let latest = Arc::clone(&self.generation);
        let phase = Arc::clone(&self.phase);
        let debounce = self.debounce;

        self.in_flight = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            *phase.lock().unwrap() = Phase::Querying;
            let _ = updates.send(ParcelLayerUpdate::Loading).await;

            let result = source.parcels_in_bbox(viewport.bbox, viewport.zoom).await;

            // Annulation autoritaire: la génération a-t-elle bougé pendant
            // l'attente réseau?
            if latest.load(Ordering::SeqCst) != generation {
                debug!(generation, "Discarding superseded parcel query result");
                return;
            }

            *phase.lock().unwrap() = Phase::Idle;
            match result {
                Ok(features) => {
                    debug!(count = features.len(), zoom = viewport.zoom, "Parcel layer updated");
                    let _ = updates.send(ParcelLayerUpdate::Loaded(features)).await;
                }
                Err(QueryError::Cancelled) => {}
                Err(e) => {
                    warn!(error = %e, "Parcel query failed");
                    let _ = updates.send(ParcelLayerUpdate::Failed(e)).await;
                }
            }
        }));
    }
}

impl<S> Drop for ViewportController<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
