use celltrack::{
    Experiment, Position, TimePoint, TrackerError,
    io::{
        export_positions_to_csv, load_data_file, load_linking_result, load_links_from_json,
        save_data_to_json, save_links_and_scores_to_json, save_links_to_json,
        save_positions_and_shapes_to_json, save_table_to_csv,
    },
    links::{EndMarker, LinkType},
    path::Path as CurvePath,
    position_collection::PositionShape,
    resolution::ImageResolution,
    score::{Family, Score},
};
use serde_json::json;
use std::fs;

fn p(x: f64, y: f64, tp: i32) -> Position {
    Position::new(x, y, 0.0, tp)
}

fn sample_experiment() -> Experiment {
    let mut experiment = Experiment::new();
    experiment.name = Some("organoid 1".to_string());
    experiment
        .positions
        .add_with_shape(p(0.0, 0.0, 1), PositionShape(vec![json!("ellipse"), json!(3.5)]))
        .unwrap();

    let mother = p(0.0, 0.0, 1);
    let daughters = [p(-2.0, 0.0, 2), p(2.0, 0.0, 2)];
    for daughter in daughters {
        experiment.add_position(daughter).unwrap();
        experiment.baseline_links.add_link(mother, daughter).unwrap();
    }
    experiment
        .baseline_links
        .set_link_data(&mother, &daughters[0], "scores", Some(json!({"distance": 2.0})))
        .unwrap();
    experiment.scratch_links.add_link(mother, daughters[1]).unwrap();
    experiment
        .baseline_links
        .set_end_marker(&daughters[0], Some(EndMarker::Dead))
        .unwrap();

    let mut score = Score::new();
    score.set("distance", 1.5);
    score.set("volume", -0.5);
    experiment
        .scores
        .set_family_score(Family::new(mother, daughters[0], daughters[1]).unwrap(), score)
        .unwrap();
    experiment
        .connections
        .add_connection(daughters[0], daughters[1])
        .unwrap();

    let mut path = CurvePath::new();
    path.add_point(0.0, 0.0, 0.0);
    path.add_point(10.0, 0.0, 0.0);
    path.set_offset(1.0);
    experiment.paths.add_path(TimePoint::new(1), path);

    experiment.image_resolution = Some(ImageResolution::new(0.32, 0.32, 2.0, 12.0).unwrap());
    experiment.image_offsets.update_offset(5.0, 6.0, 0.0, 1, 2);
    experiment
}

#[test]
fn test_data_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("dir").join("experiment.aut");
    let original = sample_experiment();
    save_data_to_json(&original, &path).unwrap();

    let loaded = load_data_file(&path, 0, 100).unwrap();
    assert_eq!(loaded.summarize(), original.summarize());
    assert_eq!(loaded.name.as_deref(), Some("organoid 1"));
    assert_eq!(
        loaded.positions.shape_of(&p(0.0, 0.0, 1)).unwrap().fields(),
        &[json!("ellipse"), json!(3.5)]
    );
    assert!(loaded.baseline_links.contains_link(&p(0.0, 0.0, 1), &p(2.0, 0.0, 2)));
    assert!(loaded.scratch_links.contains_link(&p(0.0, 0.0, 1), &p(2.0, 0.0, 2)));
    assert_eq!(
        loaded.baseline_links.get_end_marker(&p(-2.0, 0.0, 2)),
        Some(EndMarker::Dead)
    );
    assert_eq!(
        loaded
            .baseline_links
            .get_link_data(&p(0.0, 0.0, 1), &p(-2.0, 0.0, 2), "scores"),
        Some(&json!({"distance": 2.0}))
    );

    let family = Family::new(p(0.0, 0.0, 1), p(2.0, 0.0, 2), p(-2.0, 0.0, 2)).unwrap();
    let score = loaded.scores.family_score(&family).unwrap();
    assert!((score.total() - 1.0).abs() < 1e-12);
    assert!(loaded.connections.contains_connection(&p(2.0, 0.0, 2), &p(-2.0, 0.0, 2)));

    let paths = loaded.paths.own_paths(TimePoint::new(1));
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].offset(), 1.0);
    assert_eq!(loaded.image_resolution, original.image_resolution);
    assert_eq!(loaded.image_offsets, original.image_offsets);
}

#[test]
fn test_metadata_of_unlinked_positions_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.aut");
    let mut experiment = Experiment::new();
    let lonely = p(4.0, 4.0, 3);
    experiment.add_position(lonely).unwrap();
    experiment.baseline_links.add_position(lonely).unwrap();
    experiment
        .baseline_links
        .set_end_marker(&lonely, Some(EndMarker::Dead))
        .unwrap();
    experiment
        .baseline_links
        .set_position_data(&lonely, "suppressed_error", Some(json!(1)))
        .unwrap();
    save_data_to_json(&experiment, &path).unwrap();

    let loaded = load_data_file(&path, 0, 100).unwrap();
    assert!(loaded.baseline_links.contains_position(&lonely));
    assert!(!loaded.baseline_links.has_links());
    assert_eq!(loaded.baseline_links.get_end_marker(&lonely), Some(EndMarker::Dead));
    assert_eq!(
        loaded.baseline_links.get_position_data(&lonely, "suppressed_error"),
        Some(&json!(1))
    );
    assert!(loaded.scratch_links.is_empty());
}

#[test]
fn test_time_point_range_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.json");
    save_data_to_json(&sample_experiment(), &path).unwrap();

    let loaded = load_data_file(&path, 2, 2).unwrap();
    assert_eq!(loaded.positions.len(), 2);
    assert!(!loaded.baseline_links.has_links());
    assert!(loaded.scores.is_empty());
    assert!(loaded.connections.contains_connection(&p(2.0, 0.0, 2), &p(-2.0, 0.0, 2)));
    assert!(loaded.paths.is_empty());
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.xml");
    fs::write(&path, "{}").unwrap();
    assert!(matches!(
        load_data_file(&path, 0, 10),
        Err(TrackerError::UnsupportedFile(_))
    ));

    let upper = dir.path().join("EXPERIMENT.AUT");
    fs::write(&upper, r#"{"version": "v1"}"#).unwrap();
    assert!(load_data_file(&upper, 0, 10).unwrap().positions.is_empty());
}

#[test]
fn test_unknown_version_and_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("newer.aut");
    fs::write(&path, r#"{"version": "v7", "shapes": {}}"#).unwrap();
    assert!(matches!(
        load_data_file(&path, 0, 10),
        Err(TrackerError::UnknownVersion(_))
    ));

    fs::write(&path, r#"{"version": "v1", "shapes": "#).unwrap();
    assert!(matches!(
        load_data_file(&path, 0, 10),
        Err(TrackerError::Serde(_))
    ));
}

#[test]
fn test_legacy_bare_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("links.json");
    let graph = json!({
        "directed": false,
        "multigraph": false,
        "graph": {},
        "nodes": [
            {"id": {"x": 1.0, "y": 2.0, "z": 3.0, "_time_point_number": 4}},
            {"id": {"x": 1.0, "y": 2.0, "z": 3.0, "_time_point_number": 5}, "ending": "out_of_view"}
        ],
        "edges": [
            {"source": {"x": 1.0, "y": 2.0, "z": 3.0, "_time_point_number": 4},
             "target": {"x": 1.0, "y": 2.0, "z": 3.0, "_time_point_number": 5}}
        ]
    });
    fs::write(&path, graph.to_string()).unwrap();

    let experiment = load_data_file(&path, 0, 10).unwrap();
    let a = Position::new(1.0, 2.0, 3.0, 4);
    let b = Position::new(1.0, 2.0, 3.0, 5);
    assert!(experiment.baseline_links.contains_link(&a, &b));
    assert!(!experiment.scratch_links.has_links());
    assert_eq!(experiment.positions.len(), 2);
    assert_eq!(
        experiment.baseline_links.get_end_marker(&b),
        Some(EndMarker::OutOfView)
    );
}

#[test]
fn test_legacy_linking_result_with_scores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.json");
    let experiment = sample_experiment();
    save_links_and_scores_to_json(&experiment.baseline_links, &experiment.scores, &path).unwrap();

    let loaded = load_data_file(&path, 0, 10).unwrap();
    assert_eq!(loaded.baseline_links.len(), 2);
    assert_eq!(loaded.scores.all_scored_families().len(), 1);

    let mut target = Experiment::new();
    load_linking_result(&mut target, &path, LinkType::Scratch).unwrap();
    assert_eq!(target.scratch_links.len(), 2);
    assert!(!target.baseline_links.has_links());
    assert_eq!(target.positions.len(), 3);
}

#[test]
fn test_links_only_files() {
    let dir = tempfile::tempdir().unwrap();
    let experiment = sample_experiment();

    let graph_path = dir.path().join("graph.json");
    save_links_to_json(&experiment.baseline_links, &graph_path).unwrap();
    let links = load_links_from_json(&graph_path, 0, 10).unwrap();
    assert_eq!(links.len(), 2);

    let data_path = dir.path().join("data.aut");
    save_data_to_json(&experiment, &data_path).unwrap();
    let links = load_links_from_json(&data_path, 0, 1).unwrap();
    assert!(!links.has_links());

    let positions_path = dir.path().join("positions.json");
    save_positions_and_shapes_to_json(&experiment, &positions_path).unwrap();
    assert!(load_links_from_json(&positions_path, 0, 10).is_err());
}

#[test]
fn test_legacy_positions_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("positions.json");
    let experiment = sample_experiment();
    save_positions_and_shapes_to_json(&experiment, &path).unwrap();

    let loaded = load_data_file(&path, 0, 10).unwrap();
    assert_eq!(loaded.positions.len(), 3);
    assert!(!loaded.baseline_links.has_links());
    assert_eq!(
        loaded.positions.shape_of(&p(0.0, 0.0, 1)).unwrap().fields(),
        &[json!("ellipse"), json!(3.5)]
    );
}

#[test]
fn test_csv_error_without_permission_denial_has_no_alternative_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.csv");
    // A directory in the way fails the write for another reason than permissions
    fs::create_dir(&path).unwrap();

    let rows = vec![vec!["1".to_string(), "2".to_string()]];
    assert!(save_table_to_csv(&path, &["a", "b"], &rows).is_err());
    assert!(!dir.path().join("table.csv.ALT").exists());
}

#[test]
fn test_export_positions_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("positions.csv");
    export_positions_to_csv(&sample_experiment(), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("x,y,z,time_point,track_id,path_position")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 3);
    // Mother at time point 1 lies on the path, one pixel past the offset
    assert!(rows.contains(&"0,0,0,1,0,-1"));
}
