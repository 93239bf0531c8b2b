use assert_approx_eq::assert_approx_eq;
use rust_t_net::traffic::events::EventType;
use rust_t_net::traffic::system::TrafficSystem;
use rust_t_net::traffic::TrafficError;

/// The six-intersection network used throughout these scenarios:
/// A-B=5, A-C=4, A-D=10, C-E=3, E-F=6, D-F=5.
fn build_city() -> TrafficSystem {
    let mut system = TrafficSystem::new();
    for v in ["A", "B", "C", "D", "E", "F"] {
        system.add_vertex(v).unwrap();
    }
    for (u, v, w) in [
        ("A", "B", 5.0),
        ("A", "C", 4.0),
        ("A", "D", 10.0),
        ("C", "E", 3.0),
        ("E", "F", 6.0),
        ("D", "F", 5.0),
    ] {
        system.add_edge(u, v, w).unwrap();
    }
    system
}

#[test]
fn baseline_route_without_events() {
    let system = build_city();
    let route = system.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "C", "E", "F"]);
    assert_approx_eq!(route.total, 13.0);
}

#[test]
fn event_off_the_route_changes_nothing() {
    let mut system = build_city();
    system
        .register_event(EventType::Accident, "A", "B", 5.0, 100)
        .unwrap();

    let route = system.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "C", "E", "F"]);
    assert_approx_eq!(route.total, 13.0);
}

#[test]
fn event_on_the_critical_edge_forces_a_reroute() {
    let mut system = build_city();
    system
        .register_event(EventType::Accident, "A", "B", 5.0, 100)
        .unwrap();
    let congestion = system
        .register_event(EventType::Congestion, "A", "C", 5.0, 101)
        .unwrap();

    // A-C-E-F now costs 18, A-D-F costs 15.
    let route = system.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "D", "F"]);
    assert_approx_eq!(route.total, 15.0);

    // Removing the congestion restores the original route and cost exactly.
    system.remove_event(congestion).unwrap();
    let route = system.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "C", "E", "F"]);
    assert_eq!(route.total, 13.0);
}

#[test]
fn compare_routes_reports_the_event_delay() {
    let mut system = build_city();
    system
        .register_event(EventType::Roadwork, "A", "C", 5.0, 100)
        .unwrap();

    let comparison = system.compare_routes("A", "F").unwrap();
    assert_eq!(comparison.ideal.path, vec!["A", "C", "E", "F"]);
    assert_approx_eq!(comparison.ideal.total, 13.0);
    assert_eq!(comparison.actual.path, vec!["A", "D", "F"]);
    assert_approx_eq!(comparison.actual.total, 15.0);
    assert_approx_eq!(comparison.delay, 2.0);
}

#[test]
fn repeated_queries_are_deterministic() {
    let mut system = build_city();
    system
        .register_event(EventType::Congestion, "E", "F", 1.0, 100)
        .unwrap();

    let first = system.shortest_path("B", "F").unwrap();
    for _ in 0..10 {
        let next = system.shortest_path("B", "F").unwrap();
        assert_eq!(next, first);
    }
}

#[test]
fn failed_registration_leaves_the_system_untouched() {
    let mut system = build_city();
    system
        .register_event(EventType::Accident, "C", "E", 2.0, 100)
        .unwrap();
    let before_route = system.shortest_path("A", "F").unwrap();

    let result = system.register_event(EventType::Congestion, "C", "E", -10.0, 101);
    assert!(matches!(result, Err(TrafficError::InvalidImpact { .. })));

    assert_eq!(system.active_event_count(), 1);
    assert_approx_eq!(system.network().current_weight("C", "E").unwrap(), 5.0);
    assert_eq!(system.shortest_path("A", "F").unwrap(), before_route);
}

#[test]
fn cascading_edge_removal_reroutes_traffic() {
    let mut system = build_city();
    system
        .register_event(EventType::Roadwork, "C", "E", 1.0, 100)
        .unwrap();

    let removed = system.remove_edge("C", "E").unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(system.active_event_count(), 0);

    // Without C-E the only way to F is over D.
    let route = system.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "D", "F"]);
    assert_approx_eq!(route.total, 15.0);
}

#[test]
fn events_on_the_active_route_are_reported() {
    let mut system = build_city();
    system
        .register_event(EventType::Congestion, "C", "E", 0.5, 200)
        .unwrap();
    system
        .register_event(EventType::Accident, "A", "B", 3.0, 100)
        .unwrap();

    let route = system.shortest_path("A", "F").unwrap();
    let events = system.events_on_route(&route.path);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].edge.to_string(), "C-E");
}

#[test]
fn full_state_survives_a_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let network_path = dir.path().join("network.txt");
    let events_path = dir.path().join("events.txt");

    let mut system = build_city();
    system
        .register_event(EventType::Accident, "A", "B", 5.0, 100)
        .unwrap();
    system
        .register_event(EventType::Congestion, "A", "C", 5.0, 101)
        .unwrap();
    system.save(&network_path, &events_path).unwrap();

    let loaded = TrafficSystem::load(&network_path, &events_path).unwrap();
    assert_eq!(loaded.active_events(), system.active_events());
    let route = loaded.shortest_path("A", "F").unwrap();
    assert_eq!(route.path, vec!["A", "D", "F"]);
    assert_approx_eq!(route.total, 15.0);

    let stats = loaded.statistics();
    assert_eq!(stats.vertices, 6);
    assert_eq!(stats.edges, 6);
    assert_eq!(stats.active_events, 2);
    assert_eq!(stats.events_by_type[&EventType::Accident], 1);
    assert_eq!(stats.events_by_type[&EventType::Congestion], 1);
}
