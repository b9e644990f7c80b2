use beatstage::data_structures::scene_graph::{SceneGraph, SceneGraphError};
use beatstage::data_structures::transform::Transform;
use cgmath::{Deg, Quaternion, Rotation3, Vector3};

fn translation(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_position(Vector3::new(x, y, z))
}

#[test]
fn world_composes_parent_and_local() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let child = graph.add_group(Some(root)).unwrap();
    let grandchild = graph.add_group(Some(child)).unwrap();

    let root_local = Transform {
        position: Vector3::new(10.0, 0.0, -4.0),
        rotation: Quaternion::from_angle_y(Deg(90.0)),
        scale: Vector3::new(2.0, 2.0, 2.0),
    };
    let child_local = translation(1.0, 2.0, 3.0);
    let grandchild_local = translation(0.0, -1.0, 0.0);
    graph.set_local_transform(root, root_local.clone()).unwrap();
    graph.set_local_transform(child, child_local.clone()).unwrap();
    graph
        .set_local_transform(grandchild, grandchild_local.clone())
        .unwrap();

    graph.update_world_transforms();

    let child_world = graph.get(child).unwrap().world_transform().clone();
    assert_eq!(child_world, &root_local * &child_local);
    assert_eq!(
        graph.get(grandchild).unwrap().world_transform(),
        &(&child_world * &grandchild_local)
    );
}

#[test]
fn root_world_equals_local() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let local = Transform {
        position: Vector3::new(-3.0, 1.2, 12.5),
        rotation: Quaternion::from_angle_x(Deg(-28.9)),
        scale: Vector3::new(1.0, 1.0, 1.0),
    };
    graph.set_local_transform(root, local.clone()).unwrap();

    graph.update_world_transforms();

    assert_eq!(graph.get(root).unwrap().world_transform(), &local);
}

#[test]
fn translation_round_trips_through_identity() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let child = graph.add_group(Some(root)).unwrap();
    graph
        .set_local_transform(root, translation(10.0, 0.0, 0.0))
        .unwrap();
    graph
        .set_local_transform(child, translation(1.0, 2.0, 3.0))
        .unwrap();
    graph.update_world_transforms();
    let before = graph.get(child).unwrap().world_transform().clone();
    assert_eq!(before.position, Vector3::new(11.0, 2.0, 3.0));

    graph.set_local_transform(child, Transform::new()).unwrap();
    graph.update_world_transforms();
    assert_eq!(
        graph.get(child).unwrap().world_transform().position,
        Vector3::new(10.0, 0.0, 0.0)
    );

    graph
        .set_local_transform(child, translation(1.0, 2.0, 3.0))
        .unwrap();
    graph.update_world_transforms();
    assert_eq!(graph.get(child).unwrap().world_transform(), &before);
}

#[test]
fn reparent_under_descendant_fails_and_leaves_graph_unchanged() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let a = graph.add_group(Some(root)).unwrap();
    let b = graph.add_group(Some(a)).unwrap();
    graph.set_local_transform(a, translation(1.0, 0.0, 0.0)).unwrap();
    graph.update_world_transforms();
    let world_before = graph.get(b).unwrap().world_transform().clone();

    assert_eq!(
        graph.reparent(a, Some(b)),
        Err(SceneGraphError::InvalidHierarchy)
    );
    assert_eq!(graph.reparent(a, Some(a)), Err(SceneGraphError::InvalidHierarchy));

    // Nothing moved.
    assert_eq!(graph.get(a).unwrap().parent(), Some(root));
    assert_eq!(graph.get(b).unwrap().parent(), Some(a));
    assert_eq!(graph.get(root).unwrap().children(), &[a]);
    assert_eq!(graph.get(a).unwrap().children(), &[b]);
    assert_eq!(graph.roots(), &[root]);
    graph.update_world_transforms();
    assert_eq!(graph.get(b).unwrap().world_transform(), &world_before);
}

#[test]
fn reparent_detaches_from_previous_parent() {
    let mut graph = SceneGraph::new();
    let r1 = graph.add_group(None).unwrap();
    let r2 = graph.add_group(None).unwrap();
    let a = graph.add_group(Some(r1)).unwrap();
    graph.set_local_transform(r2, translation(5.0, 0.0, 0.0)).unwrap();
    graph.set_local_transform(a, translation(1.0, 0.0, 0.0)).unwrap();

    graph.reparent(a, Some(r2)).unwrap();

    assert!(graph.get(r1).unwrap().children().is_empty());
    assert_eq!(graph.get(r2).unwrap().children(), &[a]);
    assert_eq!(graph.get(a).unwrap().parent(), Some(r2));

    graph.update_world_transforms();
    assert_eq!(
        graph.get(a).unwrap().world_transform().position,
        Vector3::new(6.0, 0.0, 0.0)
    );
}

#[test]
fn remove_drops_the_whole_subtree() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let a = graph.add_group(Some(root)).unwrap();
    let b = graph.add_group(Some(a)).unwrap();
    assert_eq!(graph.node_count(), 3);

    graph.remove(a).unwrap();

    assert_eq!(graph.node_count(), 1);
    assert!(graph.get(a).is_none());
    assert!(graph.get(b).is_none());
    assert!(graph.get(root).unwrap().children().is_empty());
    assert_eq!(
        graph.set_local_transform(a, Transform::new()),
        Err(SceneGraphError::UnknownNode)
    );
}

#[test]
fn traversal_is_preorder_and_prunes_invisible_subtrees() {
    let mut graph = SceneGraph::new();
    let root = graph.add_group(None).unwrap();
    let a = graph.add_group(Some(root)).unwrap();
    let c = graph.add_group(Some(a)).unwrap();
    let b = graph.add_group(Some(root)).unwrap();

    let order: Vec<_> = graph.visible_nodes().collect();
    assert_eq!(order, vec![root, a, c, b]);

    graph.set_visible(a, false).unwrap();
    let order: Vec<_> = graph.visible_nodes().collect();
    assert_eq!(order, vec![root, b]);

    // The iterator is restartable: a second walk sees the same sequence.
    let again: Vec<_> = graph.visible_nodes().collect();
    assert_eq!(order, again);
}
