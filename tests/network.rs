//! Network description loading and validation tests

mod common;

use signal_router::control::{Metric, Network, NetworkDescription, TurnDirection};

use common::{diamond_network, four_way_network};

fn parse(json: &str) -> anyhow::Result<Network> {
    Network::from_description(&NetworkDescription::from_json(json)?)
}

#[test]
fn test_lanes_follow_engine_naming() {
    let network = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 50, "y": 0}],
            "edge_types": [{"id": "arterial", "num_lanes": 3, "speed": 20}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "type": "arterial", "length": 200}]
        }"#,
    )
    .unwrap();

    let edge = network.edge(network.edge_id("ab").unwrap());
    assert_eq!(edge.lanes.len(), 3);
    assert_eq!(edge.speed, 20.0);
    assert_eq!(edge.edge_type, "arterial");
    assert_eq!(network.lane(edge.lanes[2]).name, "ab_2");
    assert_eq!(edge.weight(Metric::TravelTime), 10.0);
    assert_eq!(edge.weight(Metric::Distance), 200.0);
}

#[test]
fn test_default_edge_type() {
    let network = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 50, "y": 0}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "length": 139}]
        }"#,
    )
    .unwrap();

    let edge = network.edge(network.edge_id("ab").unwrap());
    assert_eq!(edge.lanes.len(), 1);
    assert!((edge.min_travel_time - 10.0).abs() < 1e-9);
    assert_eq!(edge.critical_occupancy, 0.2);
}

#[test]
fn test_children_and_degree() {
    let network = diamond_network();
    let b = network.junction(network.junction_id("B").unwrap());

    assert_eq!(b.children.len(), 3, "B leads to A, C and F");
    assert_eq!(b.degree(), 3);
    assert_eq!(network.out_edges(b.id).count(), 3);

    let ab = network.edge_id("ab").unwrap();
    assert_eq!(network.successors(ab).count(), 3);
    assert_eq!(network.max_edge_weight(Metric::Distance), 150.0);
}

#[test]
fn test_parallel_edges_keep_faster_child() {
    let network = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 100, "y": 0}],
            "edges": [
                {"id": "slow", "from": "A", "to": "B", "length": 100, "speed": 5},
                {"id": "fast", "from": "A", "to": "B", "length": 100, "speed": 25}
            ]
        }"#,
    )
    .unwrap();

    let a = network.junction_id("A").unwrap();
    let b = network.junction_id("B").unwrap();
    assert_eq!(network.junction(a).children[&b], network.edge_id("fast").unwrap());
}

#[test]
fn test_signal_links() {
    let network = four_way_network();
    let c = network.junction_id("C").unwrap();

    assert!(network.is_signalized(c));
    assert!(!network.is_signalized(network.junction_id("N").unwrap()));

    let signal = &network.signals()[0];
    assert_eq!(signal.links.len(), 4);
    assert_eq!(signal.phases.len(), 4);
    assert_eq!(network.lane(signal.links[2].in_lane).name, "e_in_0");
    assert_eq!(network.lane(signal.links[2].out_lane).name, "c_w_0");
    assert_eq!(signal.links[0].direction, TurnDirection::Straight);
    assert_eq!(network.junction(c).incoming_lanes.len(), 4);
}

#[test]
fn test_rejects_unknown_junction() {
    let result = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "length": 10}]
        }"#,
    );
    assert!(result.is_err(), "Edge to a missing junction must be rejected");
}

#[test]
fn test_rejects_bad_edges() {
    let zero_lanes = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 1, "y": 0}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "length": 10, "num_lanes": 0}]
        }"#,
    );
    assert!(zero_lanes.is_err());

    let still = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 1, "y": 0}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "length": 10, "speed": 0}]
        }"#,
    );
    assert!(still.is_err());

    let unknown_type = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 1, "y": 0}],
            "edges": [{"id": "ab", "from": "A", "to": "B", "type": "motorway", "length": 10}]
        }"#,
    );
    assert!(unknown_type.is_err());

    let duplicate = parse(
        r#"{
            "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 1, "y": 0}],
            "edges": [
                {"id": "ab", "from": "A", "to": "B", "length": 10},
                {"id": "ab", "from": "B", "to": "A", "length": 10}
            ]
        }"#,
    );
    assert!(duplicate.is_err());
}

const SIGNAL_BASE: &str = r#"
    "junctions": [{"id": "A", "x": 0, "y": 0}, {"id": "B", "x": 1, "y": 0}, {"id": "C", "x": 2, "y": 0}],
    "edges": [
        {"id": "ab", "from": "A", "to": "B", "length": 10},
        {"id": "bc", "from": "B", "to": "C", "length": 10}
    ],
"#;

#[test]
fn test_rejects_inconsistent_signal_programs() {
    let short_phase = parse(&format!(
        r#"{{ {}
            "signals": [{{"junction": "B", "phases": ["GG"]}}],
            "connections": [{{"junction": "B", "in_lane": "ab_0", "out_lane": "bc_0", "link_index": 0, "direction": "s"}}]
        }}"#,
        SIGNAL_BASE
    ));
    assert!(short_phase.is_err(), "Phase strings must cover every link");

    let gap = parse(&format!(
        r#"{{ {}
            "signals": [{{"junction": "B", "phases": ["G"]}}],
            "connections": [{{"junction": "B", "in_lane": "ab_0", "out_lane": "bc_0", "link_index": 1, "direction": "s"}}]
        }}"#,
        SIGNAL_BASE
    ));
    assert!(gap.is_err(), "Link indices must start at 0 without gaps");

    let bad_direction = parse(&format!(
        r#"{{ {}
            "signals": [{{"junction": "B", "phases": ["G"]}}],
            "connections": [{{"junction": "B", "in_lane": "ab_0", "out_lane": "bc_0", "link_index": 0, "direction": "x"}}]
        }}"#,
        SIGNAL_BASE
    ));
    assert!(bad_direction.is_err());

    let valid = parse(&format!(
        r#"{{ {}
            "signals": [{{"junction": "B", "phases": ["G", "r"]}}],
            "connections": [{{"junction": "B", "in_lane": "ab_0", "out_lane": "bc_0", "link_index": 0, "direction": "t"}}]
        }}"#,
        SIGNAL_BASE
    ))
    .unwrap();
    assert_eq!(valid.signals()[0].links[0].direction, TurnDirection::Turnaround);
}

#[test]
fn test_unknown_lookups_fail() {
    let network = diamond_network();
    assert!(network.junction_id("Z").is_err());
    assert!(network.edge_id("zz").is_err());
    assert!(network.lane_id("ab_1").is_err());
    assert!(network.lane_id("ab_0").is_ok());
}
