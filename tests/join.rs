use num_bigint::BigInt;
use test_log::test;

use smg_rs::edge::{HasValueEdge, HasValueFilter, PointsToEdge, TargetSpecifier};
use smg_rs::error::SmgError;
use smg_rs::join::fields::join_fields;
use smg_rs::join::{JoinStatus, LevelMapping, SmgJoin};
use smg_rs::object::{Object, ObjectKind};
use smg_rs::options::SmgOptions;
use smg_rs::smg::Smg;
use smg_rs::types::{Level, ObjectId, ValueId};

fn options() -> SmgOptions {
    SmgOptions::default().with_perform_checks(true)
}

/// A graph with one global region `x` holding the given fields.
fn global_region(size: u64, fields: &[(u64, u64, ValueId)]) -> (Smg, ObjectId) {
    let mut smg = Smg::default();
    let x = Object::region(size, "x");
    let id = x.id;
    smg.add_global_object("x", x);
    for &(offset, field_size, value) in fields {
        smg.add_has_value_edge(HasValueEdge::new(id, offset, field_size, value)).unwrap();
    }
    (smg, id)
}

fn explicit(smg: &mut Smg, number: i64) -> ValueId {
    let value = smg.new_value();
    smg.set_explicit(value, number);
    value
}

/// Adds a heap node of `size` bits and a pointer to it.
fn heap_target(smg: &mut Smg, object: Object) -> (ObjectId, ValueId) {
    let id = object.id;
    smg.add_heap_object(object);
    let p = smg.new_value();
    let specifier = match smg.object(id).map(|o| o.is_list_segment()) {
        Some(true) => TargetSpecifier::First,
        _ => TargetSpecifier::Region,
    };
    smg.add_points_to_edge(PointsToEdge::new(p, id, 0, specifier)).unwrap();
    (id, p)
}

/// A graph whose global `x` points to `object`, all fields of which are zero.
fn pointing_to(object: Object) -> Smg {
    let mut smg = Smg::default();
    let (node, p) = heap_target(&mut smg, object);
    let size = smg.object(node).map_or(0, |o| o.size);
    smg.add_has_value_edge(HasValueEdge::new(node, 0, size, ValueId::ZERO)).unwrap();
    let x = Object::region(64, "x");
    let id = x.id;
    smg.add_global_object("x", x);
    smg.add_has_value_edge(HasValueEdge::new(id, 0, 64, p)).unwrap();
    smg
}

/// `x -> node1 -> node2 -> NULL` with zero data fields.
fn two_node_list() -> Smg {
    let mut smg = Smg::default();
    let (n2, p2) = heap_target(&mut smg, Object::region(128, "node"));
    smg.add_has_value_edge(HasValueEdge::new(n2, 0, 64, ValueId::ZERO)).unwrap();
    smg.add_has_value_edge(HasValueEdge::new(n2, 64, 64, ValueId::ZERO)).unwrap();
    let (n1, p1) = heap_target(&mut smg, Object::region(128, "node"));
    smg.add_has_value_edge(HasValueEdge::new(n1, 0, 64, ValueId::ZERO)).unwrap();
    smg.add_has_value_edge(HasValueEdge::new(n1, 64, 64, p2)).unwrap();
    let x = Object::region(64, "x");
    let id = x.id;
    smg.add_global_object("x", x);
    smg.add_has_value_edge(HasValueEdge::new(id, 0, 64, p1)).unwrap();
    smg
}

fn join(smg1: &Smg, smg2: &Smg) -> (bool, JoinStatus) {
    let options = options();
    let result = SmgJoin::new(&options).run(smg1, smg2).unwrap();
    (result.is_defined(), result.status())
}

#[test]
fn test_reflexivity() {
    let graphs = {
        let mut graphs = vec![two_node_list()];
        let (mut smg, x) = global_region(96, &[]);
        let five = explicit(&mut smg, 5);
        let unknown = smg.new_value();
        smg.add_has_value_edge(HasValueEdge::new(x, 0, 32, five)).unwrap();
        smg.add_has_value_edge(HasValueEdge::new(x, 32, 32, unknown)).unwrap();
        smg.add_neq(five, unknown);
        graphs.push(smg);
        graphs
    };

    for smg in graphs {
        let options = options();
        let result = SmgJoin::new(&options).run(&smg, &smg.clone()).unwrap();
        assert_eq!(result.status(), JoinStatus::Equal);
        let dest = result.destination().unwrap();
        assert_eq!(dest.objects().count(), smg.objects().count());
        assert_eq!(
            dest.has_value_edges(&HasValueFilter::any()),
            smg.has_value_edges(&HasValueFilter::any())
        );
        assert_eq!(dest.neq_pairs(), smg.neq_pairs());
    }
}

#[test]
fn test_symmetry() {
    let mut pairs = Vec::new();

    // Explicit value against unknown.
    let (mut a, xa) = global_region(32, &[]);
    let one = explicit(&mut a, 1);
    a.add_has_value_edge(HasValueEdge::new(xa, 0, 32, one)).unwrap();
    let (mut b, xb) = global_region(32, &[]);
    let unknown = b.new_value();
    b.add_has_value_edge(HasValueEdge::new(xb, 0, 32, unknown)).unwrap();
    pairs.push((a, b));

    // Different explicit values.
    let (mut a, xa) = global_region(32, &[]);
    let one = explicit(&mut a, 1);
    a.add_has_value_edge(HasValueEdge::new(xa, 0, 32, one)).unwrap();
    let (mut b, xb) = global_region(32, &[]);
    let two = explicit(&mut b, 2);
    b.add_has_value_edge(HasValueEdge::new(xb, 0, 32, two)).unwrap();
    pairs.push((a, b));

    // Region against a list segment of length 1.
    pairs.push((
        pointing_to(Object::region(128, "node")),
        pointing_to(Object::sll(128, 0, 64, 1, "node")),
    ));

    let mut statuses = Vec::new();
    for (a, b) in &pairs {
        let (defined, status) = join(a, b);
        let (defined_mirrored, status_mirrored) = join(b, a);
        assert_eq!(defined, defined_mirrored);
        assert_eq!(status.mirrored(), status_mirrored);
        statuses.push(status);
    }
    assert_eq!(
        statuses,
        vec![JoinStatus::LeftEntail, JoinStatus::Incomparable, JoinStatus::LeftEntail]
    );
}

#[test]
fn test_field_join_leaves_disjoint_aligned_fields() {
    let mut smg1 = Smg::default();
    let mut smg2 = Smg::default();
    let o1 = Object::region(128, "a");
    let o2 = Object::region(128, "b");
    let (id1, id2) = (o1.id, o2.id);
    smg1.add_heap_object(o1);
    smg2.add_heap_object(o2);
    let values1 = [smg1.new_value(), smg1.new_value()];
    let values2 = [smg2.new_value(), smg2.new_value(), smg2.new_value()];
    smg1.add_has_value_edge(HasValueEdge::new(id1, 0, 48, values1[0])).unwrap();
    smg1.add_has_value_edge(HasValueEdge::new(id1, 64, 64, values1[1])).unwrap();
    smg2.add_has_value_edge(HasValueEdge::new(id2, 16, 16, values2[0])).unwrap();
    smg2.add_has_value_edge(HasValueEdge::new(id2, 32, 64, values2[1])).unwrap();
    smg2.add_has_value_edge(HasValueEdge::new(id2, 96, 32, values2[2])).unwrap();

    let status = join_fields(&mut smg1, &mut smg2, id1, id2).unwrap();
    assert_ne!(status, JoinStatus::Equal);

    let ranges = |smg: &Smg, object| {
        smg.has_value_edges(&HasValueFilter::object(object))
            .iter()
            .map(|edge| (edge.offset, edge.size))
            .collect::<Vec<_>>()
    };
    let ranges1 = ranges(&smg1, id1);
    assert_eq!(ranges1, ranges(&smg2, id2));
    for window in ranges1.windows(2) {
        assert!(window[0].0 + window[0].1 <= window[1].0);
    }
    smg1.check_consistency().unwrap();
    smg2.check_consistency().unwrap();
}

#[test]
fn test_level_map_determinism() {
    let mut levels = LevelMapping::new();
    let l0 = Level::ZERO;
    let l1 = Level::new(1);

    let first = levels.update((l1, l0), (l0, l0)).unwrap();
    assert_eq!(first, Some(l1));
    assert_eq!(levels.update((l1, l0), (l0, l0)).unwrap(), first);
    assert_eq!(levels.get(l1, l0), first);

    let err = levels.insert(l1, l0, Level::new(2)).unwrap_err();
    assert!(matches!(err, SmgError::LevelMappingContradiction { .. }));
    assert!(err.to_string().starts_with("assertion failed: level mapping contradiction"));
    assert_eq!(levels.get(l1, l0), Some(l1));

    // A jump of two levels has no rule.
    assert_eq!(levels.update((Level::new(2), l0), (l0, l0)).unwrap(), None);
}

#[test]
fn test_null_join() {
    let (smg1, _) = global_region(64, &[(0, 64, ValueId::ZERO)]);
    let (smg2, _) = global_region(64, &[(0, 64, ValueId::ZERO)]);
    let options = options();
    let result = SmgJoin::new(&options).run(&smg1, &smg2).unwrap();
    assert_eq!(result.status(), JoinStatus::Equal);
    let dest = result.destination().unwrap();
    assert!(dest.heap_objects().next().is_none());
    let x = dest.lookup_variable("x").unwrap();
    assert_eq!(dest.field_value(x, 0, 64), Some(ValueId::ZERO));
}

#[test]
fn test_monotonic_status() {
    let outcomes = [
        JoinStatus::Equal,
        JoinStatus::LeftEntail,
        JoinStatus::RightEntail,
        JoinStatus::Incomparable,
    ];
    for &a in &outcomes {
        for &b in &outcomes {
            for &c in &outcomes {
                let combined = JoinStatus::combine([a, b, c]);
                for worst in [a, b, c] {
                    assert!(combined.is_no_better_than(worst));
                }
            }
        }
    }

    // Two entailing fields in opposite directions make the whole join incomparable.
    let (mut smg1, x1) = global_region(64, &[]);
    let one = explicit(&mut smg1, 1);
    let u1 = smg1.new_value();
    smg1.add_has_value_edge(HasValueEdge::new(x1, 0, 32, one)).unwrap();
    smg1.add_has_value_edge(HasValueEdge::new(x1, 32, 32, u1)).unwrap();
    let (mut smg2, x2) = global_region(64, &[]);
    let u2 = smg2.new_value();
    let two = explicit(&mut smg2, 2);
    smg2.add_has_value_edge(HasValueEdge::new(x2, 0, 32, u2)).unwrap();
    smg2.add_has_value_edge(HasValueEdge::new(x2, 32, 32, two)).unwrap();
    assert_eq!(join(&smg1, &smg2), (true, JoinStatus::Incomparable));
}

#[test]
fn test_scenario_equal_explicit_values() {
    let (mut smg1, x1) = global_region(64, &[]);
    let five1 = explicit(&mut smg1, 5);
    smg1.add_has_value_edge(HasValueEdge::new(x1, 0, 64, five1)).unwrap();
    let (mut smg2, x2) = global_region(64, &[]);
    let five2 = explicit(&mut smg2, 5);
    smg2.add_has_value_edge(HasValueEdge::new(x2, 0, 64, five2)).unwrap();

    let options = options();
    let result = SmgJoin::new(&options).run(&smg1, &smg2).unwrap();
    assert_eq!(result.status(), JoinStatus::Equal);
    let dest = result.destination().unwrap();
    let regions: Vec<_> = dest.objects().filter(|o| !o.is_null()).collect();
    assert_eq!(regions.len(), 1);
    let fields = dest.has_value_edges(&HasValueFilter::object(regions[0].id));
    assert_eq!(fields.len(), 1);
    assert_eq!(dest.explicit(fields[0].value), Some(&BigInt::from(5)));
}

#[test]
fn test_scenario_pointer_targets_of_different_sizes() {
    let build = |target_size: u64| {
        let mut smg = Smg::default();
        let (_, p) = heap_target(&mut smg, Object::region(target_size, "t"));
        let a = Object::region(32, "a");
        let id = a.id;
        smg.add_global_object("a", a);
        smg.add_has_value_edge(HasValueEdge::new(id, 0, 32, p)).unwrap();
        smg
    };
    let options = options();
    let result = SmgJoin::new(&options).run(&build(64), &build(128)).unwrap();
    assert!(!result.is_defined());
    assert_eq!(result.status(), JoinStatus::Incomparable);
}

#[test]
fn test_scenario_split_field() {
    let (mut smg1, x1) = global_region(64, &[(0, 32, ValueId::ZERO)]);
    let unknown1 = smg1.new_value();
    smg1.add_has_value_edge(HasValueEdge::new(x1, 32, 32, unknown1)).unwrap();
    let (mut smg2, x2) = global_region(64, &[]);
    let unknown2 = smg2.new_value();
    smg2.add_has_value_edge(HasValueEdge::new(x2, 0, 64, unknown2)).unwrap();

    let options = options();
    let result = SmgJoin::new(&options).run(&smg1, &smg2).unwrap();
    assert!(result.is_defined());
    assert_eq!(result.status(), JoinStatus::LeftEntail);
    let dest = result.destination().unwrap();
    let x = dest.lookup_variable("x").unwrap();
    assert_eq!(dest.has_value_edges(&HasValueFilter::object(x)).len(), 2);

    // The inputs are left untouched.
    assert_eq!(smg2.has_value_edges(&HasValueFilter::object(x2)).len(), 1);
}

#[test]
fn test_list_nodes_folded() {
    let options = options();
    let result = SmgJoin::new(&options).run(&two_node_list(), &two_node_list()).unwrap();
    assert_eq!(result.status(), JoinStatus::Equal);
    let dest = result.destination().unwrap();
    let heap: Vec<_> = dest.heap_objects().collect();
    assert_eq!(heap.len(), 1);
    let segment = dest.object(heap[0]).unwrap();
    assert!(matches!(segment.kind, ObjectKind::ListSegment { next_offset: 64, .. }));
    assert_eq!(segment.min_length(), 2);

    let x = dest.lookup_variable("x").unwrap();
    let p = dest.field_value(x, 0, 64).unwrap();
    let pt = dest.pointer(p).unwrap();
    assert_eq!(pt.object, segment.id);
    assert_eq!(pt.specifier, TargetSpecifier::First);

    let concrete = options.clone().with_heap_abstraction(false);
    let result = SmgJoin::new(&concrete).run(&two_node_list(), &two_node_list()).unwrap();
    assert_eq!(result.destination().unwrap().heap_objects().count(), 2);
}

#[test]
fn test_region_joins_short_segment() {
    let options = options();
    let region = pointing_to(Object::region(128, "node"));
    let segment = pointing_to(Object::sll(128, 0, 64, 1, "node"));
    let result = SmgJoin::new(&options).run(&region, &segment).unwrap();
    assert_eq!(result.status(), JoinStatus::LeftEntail);
    let dest = result.destination().unwrap();
    let node = dest.heap_objects().next().unwrap();
    assert!(dest.object(node).unwrap().is_list_segment());

    // A longer segment does not cover a single region.
    let long = pointing_to(Object::sll(128, 0, 64, 2, "node"));
    assert!(!SmgJoin::new(&options).run(&region, &long).unwrap().is_defined());
}
