//! # carto
//!
//! Coeur du protocole de visualisation cartographique municipale:
//! synchronisation emprise/requêtes, état de sélection, croisements de
//! proximité.
//!
//! ## Features
//!
//! - Contrôleur d'emprise avec debounce et annulation coopérative
//! - Machine à états de sélection (survol, parcelle, adresse) sans globals
//! - Croisement écoles/bibliothèques en parallèle, échecs indépendants
//! - Bus d'événements au vocabulaire fixe vers les collaborateurs UI
//! - Types `geo`/`geojson` pour l'interopérabilité avec l'écosystème
//!   géospatial Rust
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use carto::viewport::ViewportController;
//! use carto::{Bbox, Viewport};
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! let mut controller = ViewportController::new(Arc::new(source), tx);
//!
//! let bbox = Bbox::new(-79.4, 43.6, -79.3, 43.7)?;
//! controller.on_viewport_change(Viewport::new(bbox, 15.0));
//! // ... 500 ms plus tard, rx reçoit la couche parcellaire
//! ```
//!
//! Le rendu carte, le transport HTTP et la base de données restent des
//! collaborateurs externes, atteints via les traits de [`sources`].

pub mod aggregator;
pub mod error;
pub mod events;
pub mod selection;
pub mod sources;
pub mod types;
pub mod viewport;

pub use error::QueryError;
pub use events::{EventBus, MapEvent};
pub use types::{
    simplification_tolerance, AddressFeature, Bbox, ParcelFeature, ProximityKind,
    ProximityResult, Viewport, MAX_ZOOM, MIN_ZOOM,
};
