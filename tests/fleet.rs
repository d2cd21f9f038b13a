//! Vehicle fleet and control session tests

mod common;

use signal_router::control::{ControlSession, Router, RouterMode, RoutingConfig, SimulationEngine, VehicleFleet};

use common::{diamond_network, ScriptedEngine, StepEvents};

fn seeded_config() -> RoutingConfig {
    RoutingConfig {
        seed: Some(3),
        ..RoutingConfig::default()
    }
}

fn departures(vehicles: &[&str]) -> StepEvents {
    StepEvents {
        departed: vehicles.iter().map(|v| v.to_string()).collect(),
        ..StepEvents::default()
    }
}

fn approaching(edge: &str, vehicles: &[&str]) -> StepEvents {
    StepEvents {
        approaching: vec![(edge.to_string(), vehicles.iter().map(|v| v.to_string()).collect())],
        ..StepEvents::default()
    }
}

#[test]
fn test_sync_registers_and_removes_vehicles() {
    let network = diamond_network();
    let mut fleet = VehicleFleet::new(&seeded_config());
    let mut engine = ScriptedEngine::new(0.1);
    engine.add_vehicle("routed", "HumanCoverageRouted", &["ab", "bc", "cd", "de"]);
    engine.add_vehicle("plain", "HumanStandard", &["ab", "bf", "fd"]);
    engine.at_step(1, departures(&["routed", "plain"]));
    engine.at_step(
        2,
        StepEvents {
            arrived: vec!["plain".to_string()],
            ..StepEvents::default()
        },
    );

    engine.simulation_step().unwrap();
    fleet.sync(&network, &engine).unwrap();
    assert_eq!(fleet.len(), 2);

    let routed = fleet.get("routed").unwrap();
    assert_eq!(routed.mode, Some(RouterMode::CoverageBased));
    assert_eq!(routed.alpha, Some(0.5));
    assert_eq!(routed.destination, network.edge_id("de").unwrap());

    let plain = fleet.get("plain").unwrap();
    assert_eq!(plain.mode, None, "Standard vehicles are left to the engine");
    assert_eq!(plain.alpha, None);

    engine.simulation_step().unwrap();
    fleet.sync(&network, &engine).unwrap();
    assert_eq!(fleet.len(), 1);
    assert!(fleet.get("plain").is_none());
}

#[test]
fn test_unknown_vehicle_type_is_unmanaged() {
    let network = diamond_network();
    let mut fleet = VehicleFleet::new(&seeded_config());
    fleet
        .add_vehicle(&network, "bus", "Bus", vec!["ab".to_string(), "bc".to_string()])
        .unwrap();
    assert_eq!(fleet.get("bus").unwrap().mode, None);
}

#[test]
fn test_departure_with_unknown_destination_fails() {
    let network = diamond_network();
    let mut fleet = VehicleFleet::new(&seeded_config());
    assert!(fleet
        .add_vehicle(&network, "lost", "HumanStandard", vec!["ab".to_string(), "zz".to_string()])
        .is_err());
    assert!(fleet
        .add_vehicle(&network, "empty", "HumanStandard", Vec::new())
        .is_err());
}

#[test]
fn test_reroute_writes_routes_for_managed_vehicles_only() {
    let network = diamond_network();
    let config = seeded_config();
    let mut router = Router::new(&network, &config);
    let mut fleet = VehicleFleet::new(&config);
    let mut engine = ScriptedEngine::new(0.1);

    engine.add_vehicle("routed", "DriverlessCoverageRouted", &["ab", "bc", "cd", "de"]);
    engine.add_vehicle("plain", "DriverlessStandard", &["ab", "bc", "cd", "de"]);
    engine.at_step(1, departures(&["routed", "plain"]));
    engine.at_step(2, approaching("ab", &["routed", "plain", "stranger"]));
    engine.set_occupancy("bc_0", 0.95);

    engine.simulation_step().unwrap();
    fleet.sync(&network, &engine).unwrap();
    engine.simulation_step().unwrap();
    router.refresh_occupancy(&network, &engine).unwrap();
    let written = fleet.reroute(&network, &mut router, &mut engine).unwrap();

    assert_eq!(written, 1);
    assert_eq!(fleet.reroutes, 1);
    assert_eq!(engine.route_writes.len(), 1);
    let (vehicle, route) = &engine.route_writes[0];
    assert_eq!(vehicle, "routed");
    assert_eq!(route, &["ab", "bf", "fd", "de"]);
    assert_eq!(fleet.get("routed").unwrap().route, *route);
}

#[test]
fn test_no_reroute_on_destination_edge() {
    let network = diamond_network();
    let config = seeded_config();
    let mut router = Router::new(&network, &config);
    let mut fleet = VehicleFleet::new(&config);
    let mut engine = ScriptedEngine::new(0.1);

    engine.add_vehicle("routed", "HumanCoverageRouted", &["de"]);
    engine.at_step(1, departures(&["routed"]));
    engine.at_step(2, approaching("de", &["routed"]));

    engine.simulation_step().unwrap();
    fleet.sync(&network, &engine).unwrap();
    engine.simulation_step().unwrap();
    let written = fleet.reroute(&network, &mut router, &mut engine).unwrap();

    assert_eq!(written, 0);
    assert!(engine.route_writes.is_empty());
}

#[test]
fn test_session_runs_until_no_vehicles_pending() {
    let network = diamond_network();
    let mut session = ControlSession::new(network).with_routing(&seeded_config());
    let mut engine = ScriptedEngine::new(1.0);
    engine.pending_until_step = 5;
    engine.add_vehicle("routed", "HumanCoverageRouted", &["ab", "bc", "cd", "de"]);
    engine.at_step(1, departures(&["routed"]));
    engine.at_step(3, approaching("ab", &["routed"]));
    engine.at_step(
        5,
        StepEvents {
            arrived: vec!["routed".to_string()],
            ..StepEvents::default()
        },
    );

    let summary = session.run(&mut engine, 100.0).unwrap();

    assert_eq!(summary.steps, 5);
    assert_eq!(summary.end_time, 5.0);
    assert_eq!(summary.reroutes, 1);
    assert!(session.fleet().unwrap().is_empty(), "The vehicle arrived on the last step");
    assert!(session.router().unwrap().occupancy().is_refreshed());
}

#[test]
fn test_session_stops_at_end_time() {
    let network = diamond_network();
    let mut session = ControlSession::new(network).with_routing(&seeded_config());
    let mut engine = ScriptedEngine::new(0.5);
    engine.pending_until_step = 1_000;

    let summary = session.run(&mut engine, 10.0).unwrap();

    assert_eq!(summary.steps, 20);
    assert_eq!(session.steps(), 20);
}

#[test]
fn test_session_propagates_engine_errors() {
    let network = diamond_network();
    let mut session = ControlSession::new(network).with_routing(&seeded_config());
    let mut engine = ScriptedEngine::new(1.0);
    // Departure of a vehicle the engine knows nothing about
    engine.at_step(1, departures(&["ghost"]));

    assert!(session.tick(&mut engine).is_err());
}
