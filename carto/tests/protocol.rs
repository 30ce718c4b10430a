//! Tests du protocole client: debounce, annulation, sélection, croisements
//!
//! Le temps est virtualisé (`start_paused`): les fenêtres de debounce et
//! les latences réseau simulées s'écoulent de manière déterministe.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geo::Point;
use geojson::Geometry;
use tokio::sync::mpsc;

use carto::aggregator::{CrossReferenceAggregator, NEAREST_SCHOOLS_COUNT};
use carto::error::QueryError;
use carto::events::{EventBus, MapEvent};
use carto::selection::{SelectionChange, SelectionStateMachine};
use carto::sources::{AddressSource, ParcelSource, ProximitySource};
use carto::types::{
    AddressFeature, Bbox, ParcelFeature, ProximityKind, ProximityResult, Viewport,
};
use carto::viewport::{ParcelLayerUpdate, Phase, ViewportController};

/// Source parcellaire de test: latence simulée, identifiant dérivé de
/// l'emprise pour distinguer les réponses
struct CountingParcelSource {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingParcelSource {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParcelSource for CountingParcelSource {
    async fn parcels_in_bbox(
        &self,
        bbox: Bbox,
        _zoom: f64,
    ) -> Result<Vec<ParcelFeature>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![ParcelFeature {
            parcel_id: parcel_id_for(bbox),
            kind: None,
            geometry: Geometry::new(geojson::Value::Polygon(vec![vec![
                vec![bbox.min_x, bbox.min_y],
                vec![bbox.max_x, bbox.min_y],
                vec![bbox.max_x, bbox.max_y],
                vec![bbox.min_x, bbox.min_y],
            ]])),
        }])
    }
}

fn parcel_id_for(bbox: Bbox) -> i64 {
    (bbox.min_x * 10.0).round() as i64
}

fn viewport(min_x: f64, zoom: f64) -> Viewport {
    Viewport::new(Bbox::new(min_x, 43.6, min_x + 0.1, 43.7).unwrap(), zoom)
}

fn drain(rx: &mut mpsc::Receiver<ParcelLayerUpdate>) -> Vec<ParcelLayerUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

fn loaded_ids(updates: &[ParcelLayerUpdate]) -> Vec<i64> {
    updates
        .iter()
        .filter_map(|u| match u {
            ParcelLayerUpdate::Loaded(features) => {
                Some(features.iter().map(|f| f.parcel_id).collect::<Vec<_>>())
            }
            _ => None,
        })
        .flatten()
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_debounce_collapses_bursts_into_one_query() {
    let source = Arc::new(CountingParcelSource::new(Duration::from_millis(50)));
    let (tx, mut rx) = mpsc::channel(16);
    let mut controller = ViewportController::new(Arc::clone(&source), tx);

    controller.on_viewport_change(viewport(-79.4, 15.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.on_viewport_change(viewport(-79.39, 15.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.on_viewport_change(viewport(-79.3, 15.0));

    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(source.calls(), 1, "burst must collapse into one query");
    let updates = drain(&mut rx);
    assert_eq!(loaded_ids(&updates), vec![parcel_id_for(viewport(-79.3, 15.0).bbox)]);
    assert_eq!(controller.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_low_zoom_clears_layer_without_querying() {
    let source = Arc::new(CountingParcelSource::new(Duration::from_millis(50)));
    let (tx, mut rx) = mpsc::channel(16);
    let mut controller = ViewportController::new(Arc::clone(&source), tx);

    controller.on_viewport_change(viewport(-79.4, 8.0));
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(source.calls(), 0);
    assert_eq!(
        drain(&mut rx),
        vec![ParcelLayerUpdate::Cleared { zoom_notice: true }]
    );
    assert_eq!(controller.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_request_never_overwrites_newer_state() {
    let source = Arc::new(CountingParcelSource::new(Duration::from_millis(200)));
    let (tx, mut rx) = mpsc::channel(16);
    let mut controller = ViewportController::new(Arc::clone(&source), tx);

    // A part, son debounce expire, sa requête est en vol
    controller.on_viewport_change(viewport(-79.4, 15.0));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(controller.phase(), Phase::Querying);

    // B supplante A avant la réponse de A
    controller.on_viewport_change(viewport(-78.4, 15.0));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let updates = drain(&mut rx);
    let ids = loaded_ids(&updates);
    assert_eq!(
        ids,
        vec![parcel_id_for(viewport(-78.4, 15.0).bbox)],
        "only B's data may reach the layer"
    );
}

#[tokio::test(start_paused = true)]
async fn test_zoom_out_below_threshold_cancels_in_flight_request() {
    let source = Arc::new(CountingParcelSource::new(Duration::from_millis(200)));
    let (tx, mut rx) = mpsc::channel(16);
    let mut controller = ViewportController::new(Arc::clone(&source), tx);

    controller.on_viewport_change(viewport(-79.4, 15.0));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(controller.phase(), Phase::Querying);

    // Zoom-out brutal sous le seuil: la couche est vidée et le résultat
    // haute-résolution en vol ne doit jamais l'écraser
    controller.on_viewport_change(viewport(-79.4, 8.0));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let updates = drain(&mut rx);
    assert!(loaded_ids(&updates).is_empty(), "stale result must be discarded");
    assert_eq!(
        updates.last(),
        Some(&ParcelLayerUpdate::Cleared { zoom_notice: true })
    );
    assert_eq!(source.calls(), 1);
}

/// Source d'adresses de test: une adresse par parcelle, identifiable
struct PerParcelAddressSource {
    fail: bool,
}

#[async_trait]
impl AddressSource for PerParcelAddressSource {
    async fn addresses_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Vec<AddressFeature>, QueryError> {
        if self.fail {
            return Err(QueryError::Timeout);
        }
        Ok(vec![address(parcel_id * 10)])
    }
}

fn address(id: i64) -> AddressFeature {
    AddressFeature {
        address_point_id: id,
        civic_number: Some("12".into()),
        street_name: Some("Rue des Lilas".into()),
        full_address: Some(format!("12 Rue des Lilas ({id})")),
        geometry: Geometry::new(geojson::Value::Point(vec![-79.38, 43.65])),
    }
}

#[tokio::test]
async fn test_selection_toggle_returns_to_unselected() {
    let source = Arc::new(PerParcelAddressSource { fail: false });
    let mut machine = SelectionStateMachine::new(source, EventBus::default());

    let change = machine.click_parcel(7).await;
    assert_eq!(
        change,
        SelectionChange::Selected {
            parcel_id: 7,
            address_count: 1
        }
    );
    assert_eq!(machine.selected(), Some(7));

    let change = machine.click_parcel(7).await;
    assert_eq!(change, SelectionChange::Cleared);
    assert_eq!(machine.selected(), None);
    assert!(machine.addresses().is_empty());
}

#[tokio::test]
async fn test_selecting_another_parcel_reloads_addresses() {
    let source = Arc::new(PerParcelAddressSource { fail: false });
    let mut machine = SelectionStateMachine::new(source, EventBus::default());

    machine.click_parcel(7).await;
    machine.click_parcel(9).await;

    assert_eq!(machine.selected(), Some(9));
    let ids: Vec<i64> = machine.addresses().iter().map(|a| a.address_point_id).collect();
    assert_eq!(ids, vec![90], "addresses must belong to the new parcel only");
}

#[tokio::test]
async fn test_selection_cascade_publishes_close_events() {
    let source = Arc::new(PerParcelAddressSource { fail: false });
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let mut machine = SelectionStateMachine::new(source, bus);

    machine.click_parcel(7).await;
    assert_eq!(
        events.recv().await.unwrap(),
        MapEvent::SelectParcel { parcel_id: 7 }
    );

    assert!(machine.select_address(address(70)));
    assert_eq!(events.recv().await.unwrap(), MapEvent::SelectAddress(address(70)));

    // Remplacement: les panneaux croisés de l'ancienne adresse se ferment
    machine.click_parcel(9).await;
    assert_eq!(events.recv().await.unwrap(), MapEvent::CloseSchools);
    assert_eq!(
        events.recv().await.unwrap(),
        MapEvent::SelectParcel { parcel_id: 9 }
    );
    assert_eq!(machine.selected_address(), None);

    // Fermeture externe: tout se vide
    machine.close();
    assert_eq!(events.recv().await.unwrap(), MapEvent::CloseTable);
    assert_eq!(machine.selected(), None);
}

#[tokio::test]
async fn test_select_address_requires_selected_parcel() {
    let source = Arc::new(PerParcelAddressSource { fail: false });
    let mut machine = SelectionStateMachine::new(source, EventBus::default());

    assert!(!machine.select_address(address(1)));
    assert_eq!(machine.selected_address(), None);
}

#[tokio::test]
async fn test_address_load_failure_keeps_selection() {
    let source = Arc::new(PerParcelAddressSource { fail: true });
    let mut machine = SelectionStateMachine::new(source, EventBus::default());

    let change = machine.click_parcel(7).await;
    assert_eq!(
        change,
        SelectionChange::SelectedWithoutAddresses {
            parcel_id: 7,
            error: QueryError::Timeout
        }
    );
    assert_eq!(machine.selected(), Some(7));
    assert!(machine.addresses().is_empty());
}

#[tokio::test]
async fn test_reconcile_after_reload_is_a_soft_failure() {
    let source = Arc::new(PerParcelAddressSource { fail: false });
    let mut machine = SelectionStateMachine::new(source, EventBus::default());

    machine.click_parcel(7).await;
    machine.hover(3);

    let present: HashSet<i64> = [7, 8].into_iter().collect();
    assert!(machine.reconcile_after_reload(&present));

    // La parcelle a défilé hors vue: surbrillance sans effet, sélection intacte
    let absent: HashSet<i64> = [1, 2].into_iter().collect();
    assert!(!machine.reconcile_after_reload(&absent));
    assert_eq!(machine.selected(), Some(7));
    assert_eq!(machine.hovered(), None, "hover never survives a reload");
}

/// Source de proximité de test: la branche écoles peut échouer seule
struct SplitProximitySource {
    fail_schools: bool,
}

#[async_trait]
impl ProximitySource for SplitProximitySource {
    async fn within_radius(
        &self,
        _origin: Point<f64>,
        _radius_m: f64,
        kinds: &[ProximityKind],
    ) -> Result<Vec<ProximityResult>, QueryError> {
        let kind = kinds[0];
        if kind == ProximityKind::School && self.fail_schools {
            return Err(QueryError::Timeout);
        }
        Ok(vec![
            proximity(kind, "Alpha", 120.0),
            proximity(kind, "Beta", 450.0),
        ])
    }

    async fn nearest(
        &self,
        _origin: Point<f64>,
        kind: ProximityKind,
        count: usize,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        Ok((0..count)
            .map(|i| proximity(kind, &format!("School {i}"), 100.0 * (i + 1) as f64))
            .collect())
    }
}

fn proximity(kind: ProximityKind, name: &str, distance_m: f64) -> ProximityResult {
    ProximityResult {
        kind,
        name: name.to_string(),
        distance_m,
        geometry: Geometry::new(geojson::Value::Point(vec![-79.39, 43.66])),
    }
}

#[tokio::test]
async fn test_cross_reference_partial_failure_is_scoped() {
    let aggregator =
        CrossReferenceAggregator::new(Arc::new(SplitProximitySource { fail_schools: true }));

    let result = aggregator.on_address_selected(&address(1)).await.unwrap();

    assert_eq!(result.schools, Err(QueryError::Timeout));
    let libraries = result.libraries.as_ref().unwrap();
    assert_eq!(libraries.len(), 2);
    assert!(result.has_any(), "libraries panel must still show data");
}

#[tokio::test]
async fn test_cross_reference_both_branches_succeed() {
    let aggregator =
        CrossReferenceAggregator::new(Arc::new(SplitProximitySource { fail_schools: false }));

    let result = aggregator.on_address_selected(&address(1)).await.unwrap();

    let schools = result.schools.unwrap();
    let libraries = result.libraries.unwrap();
    assert_eq!(schools[0].kind, ProximityKind::School);
    assert_eq!(libraries[0].kind, ProximityKind::Library);
    assert!(schools.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
}

#[tokio::test]
async fn test_nearest_schools_is_count_capped_and_ordered() {
    let aggregator =
        CrossReferenceAggregator::new(Arc::new(SplitProximitySource { fail_schools: false }));

    let schools = aggregator.nearest_schools(&address(1)).await.unwrap();

    assert_eq!(schools.len(), NEAREST_SCHOOLS_COUNT);
    assert!(schools.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
}

#[tokio::test]
async fn test_cross_reference_rejects_invalid_address_geometry() {
    let aggregator =
        CrossReferenceAggregator::new(Arc::new(SplitProximitySource { fail_schools: false }));

    let mut bad = address(1);
    bad.geometry = Geometry::new(geojson::Value::Point(vec![f64::NAN, 43.65]));

    assert!(matches!(
        aggregator.on_address_selected(&bad).await,
        Err(QueryError::InvalidInput(_))
    ));
}
