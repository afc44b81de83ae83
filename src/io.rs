//! Reading and writing experiments.
//!
//! Data files are JSON, with either the `.json` or the `.aut` extension. Besides the
//! current `v1` layout, two older layouts are still read: linking results (a bare
//! node-link graph, or one wrapped together with family scores) and positions-only
//! files (a mapping of time points to particle rows).

use crate::{
    error::{Result, TrackerError},
    experiment::Experiment,
    image_offsets::ImageOffsets,
    links::{LinkType, Links},
    path::Path as CurvePath,
    position::{Position, TimePoint},
    position_collection::{PositionCollection, PositionShape},
    resolution::ImageResolution,
    score::{Family, Score, ScoreCollection},
};
use celltrack_protocol::{
    DATA_FILE_VERSION, DataFileV1, DocumentKind, FILE_EXTENSION, KEY_VERSION, LinkingResultFile,
    NodeLinkGraph, SavedFamilyScore, SavedLink, SavedNode, SavedPath, SavedPosition,
    SavedShapes, parse_time_point_key, time_point_key,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    fs::File,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Inclusive range of time point numbers to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TimePointRange {
    min: i32,
    max: i32,
}

impl TimePointRange {
    const ALL: TimePointRange = TimePointRange {
        min: i32::MIN,
        max: i32::MAX,
    };

    fn contains_number(&self, time_point_number: i32) -> bool {
        self.min <= time_point_number && time_point_number <= self.max
    }

    fn contains(&self, position: &Position) -> bool {
        position
            .time_point_number()
            .is_some_and(|tp| self.contains_number(tp))
    }
}

fn is_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .is_some_and(|extension| extension == FILE_EXTENSION || extension == "json")
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn create_parent_directories(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    create_parent_directories(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Loads an experiment, keeping only data from `min_time_point` up to and including
/// `max_time_point`.
pub fn load_data_file(path: &Path, min_time_point: i32, max_time_point: i32) -> Result<Experiment> {
    if !is_data_file(path) {
        return Err(TrackerError::UnsupportedFile(path.display().to_string()));
    }
    let value = read_json(path)?;
    let range = TimePointRange {
        min: min_time_point,
        max: max_time_point,
    };
    let kind = DocumentKind::detect(&value);
    let experiment = parse_document(value, kind, range)?;
    tracing::debug!(
        path = %path.display(),
        ?kind,
        positions = experiment.positions.len(),
        scratch_links = experiment.scratch_links.len(),
        baseline_links = experiment.baseline_links.len(),
        "Loaded data file"
    );
    Ok(experiment)
}

fn parse_document(value: Value, kind: DocumentKind, range: TimePointRange) -> Result<Experiment> {
    let mut experiment = Experiment::new();
    match kind {
        DocumentKind::DataFile => {
            let version = value
                .get(KEY_VERSION)
                .and_then(|version| version.as_str())
                .unwrap_or_default()
                .to_string();
            if version != DATA_FILE_VERSION {
                return Err(TrackerError::UnknownVersion(version));
            }
            let data: DataFileV1 = serde_json::from_value(value)?;
            parse_data_file_v1(&mut experiment, data, range)?;
        }
        DocumentKind::BareGraph => {
            let graph: NodeLinkGraph = serde_json::from_value(value)?;
            let links = graph_to_links(&graph, range)?;
            experiment.merge_links(LinkType::Baseline, &links)?;
        }
        DocumentKind::LinkingResult => {
            let result: LinkingResultFile = serde_json::from_value(value)?;
            let links = graph_to_links(&result.links, range)?;
            experiment.merge_links(LinkType::Baseline, &links)?;
            parse_family_scores(&mut experiment.scores, &result.family_scores, range)?;
        }
        DocumentKind::PositionsOnly => {
            if !value.is_object() {
                return Err(TrackerError::MalformedData(
                    "expected an object of time points".to_string(),
                ));
            }
            let shapes: SavedShapes = serde_json::from_value(value)?;
            parse_shapes(&mut experiment.positions, &shapes, range)?;
        }
    }
    Ok(experiment)
}

fn parse_data_file_v1(experiment: &mut Experiment, data: DataFileV1, range: TimePointRange) -> Result<()> {
    experiment.name = data.name;
    parse_shapes(&mut experiment.positions, &data.shapes, range)?;
    if let Some(graph) = &data.links_scratch {
        let links = graph_to_links(graph, range)?;
        experiment.merge_links(LinkType::Scratch, &links)?;
    }
    if let Some(graph) = &data.links_baseline {
        let links = graph_to_links(graph, range)?;
        experiment.merge_links(LinkType::Baseline, &links)?;
    }
    parse_family_scores(&mut experiment.scores, &data.family_scores, range)?;

    for (a, b) in &data.connections {
        let (a, b) = (Position::from_saved(a), Position::from_saved(b));
        if range.contains(&a) && range.contains(&b) {
            experiment
                .connections
                .add_connection(a, b)
                .map_err(|e| TrackerError::MalformedData(e.to_string()))?;
        }
    }

    for (key, saved_paths) in &data.paths {
        let time_point_number = parse_key(key)?;
        if !range.contains_number(time_point_number) {
            continue;
        }
        for saved in saved_paths {
            experiment
                .paths
                .add_path(TimePoint::new(time_point_number), path_from_saved(saved));
        }
    }

    if let Some(resolution) = &data.image_resolution {
        experiment.image_resolution = Some(ImageResolution::from_saved(resolution)?);
    }
    experiment.image_offsets =
        ImageOffsets::from_list(data.image_offsets.iter().map(Position::from_saved))?;
    Ok(())
}

fn parse_key(key: &str) -> Result<i32> {
    parse_time_point_key(key)
        .ok_or_else(|| TrackerError::MalformedData(format!("'{key}' is not a time point number")))
}

fn parse_shapes(
    positions: &mut PositionCollection,
    shapes: &SavedShapes,
    range: TimePointRange,
) -> Result<()> {
    for (key, rows) in shapes {
        let time_point_number = parse_key(key)?;
        if !range.contains_number(time_point_number) {
            continue;
        }
        for row in rows {
            let coordinates: Option<Vec<f64>> = row.iter().take(3).map(|v| v.as_f64()).collect();
            let Some([x, y, z]) = coordinates.and_then(|c| <[f64; 3]>::try_from(c).ok()) else {
                return Err(TrackerError::MalformedData(format!(
                    "particle row {row:?} of time point {time_point_number} does not start with x, y and z"
                )));
            };
            let shape = PositionShape(row.iter().skip(3).cloned().collect());
            positions.add_with_shape(Position::new(x, y, z, time_point_number), shape)?;
        }
    }
    Ok(())
}

fn parse_family_scores(
    scores: &mut ScoreCollection,
    saved_scores: &[SavedFamilyScore],
    range: TimePointRange,
) -> Result<()> {
    for saved in saved_scores {
        let mother = Position::from_saved(&saved.mother);
        let daughter1 = Position::from_saved(&saved.daughter1);
        let daughter2 = Position::from_saved(&saved.daughter2);
        if ![mother, daughter1, daughter2]
            .iter()
            .all(|position| range.contains(position))
        {
            continue;
        }
        let family = Family::new(mother, daughter1, daughter2)?;
        scores.set_family_score(family, Score::from_map(saved.scores.clone()))?;
    }
    Ok(())
}

fn node_position(saved: &SavedPosition) -> Result<Position> {
    let position = Position::from_saved(saved);
    if position.time_point().is_none() {
        return Err(TrackerError::MalformedData(format!(
            "graph node {position} has no time point"
        )));
    }
    Ok(position)
}

/// Converts a node-link graph into links, dropping everything outside the range.
fn graph_to_links(graph: &NodeLinkGraph, range: TimePointRange) -> Result<Links> {
    let mut links = Links::new();
    for node in &graph.nodes {
        let position = node_position(&node.id)?;
        if !range.contains(&position) {
            continue;
        }
        links.add_position(position)?;
        for (key, value) in &node.attributes {
            links.set_position_data(&position, key, Some(value.clone()))?;
        }
    }
    for link in &graph.links {
        let source = node_position(&link.source)?;
        let target = node_position(&link.target)?;
        if !range.contains(&source) || !range.contains(&target) {
            continue;
        }
        links
            .add_link(source, target)
            .map_err(|e| TrackerError::MalformedData(e.to_string()))?;
        for (key, value) in &link.attributes {
            links.set_link_data(&source, &target, key, Some(value.clone()))?;
        }
    }
    Ok(links)
}

fn links_to_graph(links: &Links) -> NodeLinkGraph {
    let nodes = links
        .find_all_positions()
        .into_iter()
        .map(|position| SavedNode {
            id: position.to_saved(),
            attributes: links.position_data(&position).cloned().unwrap_or_default(),
        })
        .collect();
    let saved_links = links
        .iter_links()
        .into_iter()
        .map(|(source, target)| SavedLink {
            source: source.to_saved(),
            target: target.to_saved(),
            attributes: links.link_data(&source, &target).cloned().unwrap_or_default(),
        })
        .collect();
    NodeLinkGraph {
        directed: false,
        multigraph: false,
        graph: Default::default(),
        nodes,
        links: saved_links,
    }
}

fn path_from_saved(saved: &SavedPath) -> CurvePath {
    let mut path = CurvePath::new();
    for [x, y, z] in &saved.points {
        path.add_point(*x, *y, *z);
    }
    path.set_offset(saved.offset);
    path
}

fn path_to_saved(path: &CurvePath) -> SavedPath {
    let z = path.z().unwrap_or_default() as f64;
    let (xs, ys) = path.points_2d();
    SavedPath {
        points: xs.iter().zip(ys).map(|(x, y)| [*x, *y, z]).collect(),
        offset: path.offset(),
    }
}

fn shapes_to_saved(positions: &PositionCollection) -> SavedShapes {
    positions
        .time_points()
        .into_iter()
        .map(|time_point| {
            let rows: Vec<Vec<Value>> = positions
                .of_time_point_with_shapes(time_point)
                .into_iter()
                .map(|(position, shape)| {
                    [position.x, position.y, position.z]
                        .into_iter()
                        .map(Value::from)
                        .chain(shape.fields().iter().cloned())
                        .collect()
                })
                .collect();
            (time_point_key(time_point.time_point_number()), rows)
        })
        .collect()
}

fn family_scores_to_saved(scores: &ScoreCollection) -> Vec<SavedFamilyScore> {
    scores
        .all_scored_families()
        .into_iter()
        .map(|scored| {
            let [daughter1, daughter2] = scored.family.daughters();
            SavedFamilyScore {
                scores: scored.score.as_map().clone(),
                mother: scored.family.mother.to_saved(),
                daughter1: daughter1.to_saved(),
                daughter2: daughter2.to_saved(),
            }
        })
        .collect()
}

/// Writes the whole experiment in the current (`v1`) layout.
pub fn save_data_to_json(experiment: &Experiment, path: &Path) -> Result<()> {
    let mut data = DataFileV1::new();
    data.name = experiment.name.clone();
    data.shapes = shapes_to_saved(&experiment.positions);
    if !experiment.scratch_links.is_empty() {
        data.links_scratch = Some(links_to_graph(&experiment.scratch_links));
    }
    if !experiment.baseline_links.is_empty() {
        data.links_baseline = Some(links_to_graph(&experiment.baseline_links));
    }
    data.family_scores = family_scores_to_saved(&experiment.scores);
    data.connections = experiment
        .connections
        .iter_all()
        .into_iter()
        .map(|(a, b)| (a.to_saved(), b.to_saved()))
        .collect();
    data.paths = experiment
        .paths
        .iter()
        .map(|(time_point, paths)| {
            (
                time_point_key(time_point.time_point_number()),
                paths.iter().map(path_to_saved).collect(),
            )
        })
        .collect();
    data.image_resolution = experiment.image_resolution.map(|r| r.to_saved());
    data.image_offsets = experiment
        .image_offsets
        .to_list()
        .iter()
        .map(Position::to_saved)
        .collect();

    write_json(&data, path)?;
    tracing::debug!(path = %path.display(), "Saved data file");
    Ok(())
}

/// Adds the links (and family scores, if any) of a linking result file to the links
/// of the given type.
pub fn load_linking_result(experiment: &mut Experiment, path: &Path, link_type: LinkType) -> Result<()> {
    let value = read_json(path)?;
    let (graph, family_scores) = match DocumentKind::detect(&value) {
        DocumentKind::BareGraph => (serde_json::from_value::<NodeLinkGraph>(value)?, vec![]),
        DocumentKind::LinkingResult => {
            let result: LinkingResultFile = serde_json::from_value(value)?;
            (result.links, result.family_scores)
        }
        other => {
            return Err(TrackerError::MalformedData(format!(
                "expected a linking result, found {other:?}"
            )));
        }
    };
    let links = graph_to_links(&graph, TimePointRange::ALL)?;
    experiment.merge_links(link_type, &links)?;
    parse_family_scores(&mut experiment.scores, &family_scores, TimePointRange::ALL)?;
    tracing::debug!(path = %path.display(), links = links.len(), ?link_type, "Loaded linking result");
    Ok(())
}

/// Reads only the links of a file: the graph of a linking result, or the baseline
/// (else scratch) links of a data file.
pub fn load_links_from_json(path: &Path, min_time_point: i32, max_time_point: i32) -> Result<Links> {
    let value = read_json(path)?;
    let range = TimePointRange {
        min: min_time_point,
        max: max_time_point,
    };
    match DocumentKind::detect(&value) {
        DocumentKind::PositionsOnly => Err(TrackerError::MalformedData(format!(
            "{} contains no links",
            path.display()
        ))),
        kind => {
            let experiment = parse_document(value, kind, range)?;
            Ok(experiment.links_baseline_else_scratch().clone())
        }
    }
}

/// Writes the links as a bare node-link graph.
pub fn save_links_to_json(links: &Links, path: &Path) -> Result<()> {
    write_json(&links_to_graph(links), path)
}

pub fn save_links_and_scores_to_json(links: &Links, scores: &ScoreCollection, path: &Path) -> Result<()> {
    let result = LinkingResultFile {
        links: links_to_graph(links),
        family_scores: family_scores_to_saved(scores),
    };
    write_json(&result, path)
}

/// Writes the positions and their shapes in the positions-only layout.
pub fn save_positions_and_shapes_to_json(experiment: &Experiment, path: &Path) -> Result<()> {
    write_json(&shapes_to_saved(&experiment.positions), path)
}

fn alternative_path(path: &Path) -> PathBuf {
    let mut alternative = path.as_os_str().to_owned();
    alternative.push(".ALT");
    PathBuf::from(alternative)
}

fn write_csv(file: File, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the table next to `path`, with `.ALT` appended to the name. Failures here
/// are only logged, as the caller reports the error of the primary file.
fn write_alternative_table(
    path: &Path,
    error: &std::io::Error,
    headers: &[&str],
    rows: &[Vec<String>],
) {
    let alternative = alternative_path(path);
    tracing::warn!(
        path = %path.display(),
        alternative = %alternative.display(),
        %error,
        "Could not write table, writing to alternative file"
    );
    let written = File::create(&alternative)
        .map_err(TrackerError::from)
        .and_then(|file| write_csv(file, headers, rows));
    if let Err(alternative_error) = written {
        tracing::warn!(
            alternative = %alternative.display(),
            error = %alternative_error,
            "Could not write alternative file either"
        );
    }
}

/// Writes a table. If permission to open the file is denied (for example because it
/// is open in a spreadsheet program), the table is written next to it with `.ALT`
/// appended to the name, and the original error is still returned.
pub fn save_table_to_csv(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    create_parent_directories(path)?;
    match File::create(path) {
        Ok(file) => write_csv(file, headers, rows),
        Err(error) => {
            if error.kind() == ErrorKind::PermissionDenied {
                write_alternative_table(path, &error, headers, rows);
            }
            Err(error.into())
        }
    }
}

/// One row per position: coordinates, time point, track and position along the
/// nearest path. Track and path columns are empty when unknown.
pub fn export_positions_to_csv(experiment: &Experiment, path: &Path) -> Result<()> {
    let tracks = experiment.links_baseline_else_scratch().tracks();
    let rows: Vec<Vec<String>> = experiment
        .positions
        .iter()
        .map(|position| {
            vec![
                position.x.to_string(),
                position.y.to_string(),
                position.z.to_string(),
                position
                    .time_point_number()
                    .map(|tp| tp.to_string())
                    .unwrap_or_default(),
                tracks
                    .get_track(&position)
                    .map(|track| track.id().index().to_string())
                    .unwrap_or_default(),
                experiment
                    .paths
                    .get_path_position(&position)
                    .map(|path_position| path_position.pos.to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    save_table_to_csv(
        path,
        &["x", "y", "z", "time_point", "track_id", "path_position"],
        &rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            load_data_file(&path, 0, 10),
            Err(TrackerError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_alternative_table_after_permission_denial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let error = std::io::Error::from(ErrorKind::PermissionDenied);
        let rows = vec![vec!["1".to_string(), "2".to_string()]];
        write_alternative_table(&path, &error, &["a", "b"], &rows);
        let written = std::fs::read_to_string(dir.path().join("table.csv.ALT")).unwrap();
        assert_eq!(written, "a,b\n1,2\n");
    }

    #[test]
    fn test_failing_alternative_table_is_only_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("table.csv");
        let error = std::io::Error::from(ErrorKind::PermissionDenied);
        write_alternative_table(&path, &error, &["a"], &[]);
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert!(is_data_file(Path::new("a/b.AUT")));
        assert!(is_data_file(Path::new("b.Json")));
        assert!(!is_data_file(Path::new("b")));
    }

    #[test]
    fn test_unknown_version() {
        let value = json!({"version": "v2", "shapes": {}});
        assert!(matches!(
            parse_document(value, DocumentKind::DataFile, TimePointRange::ALL),
            Err(TrackerError::UnknownVersion(version)) if version == "v2"
        ));
    }

    #[test]
    fn test_malformed_rows_fail_the_load() {
        let value = json!({"3": [[1.0, 2.0]]});
        assert!(matches!(
            parse_document(value, DocumentKind::PositionsOnly, TimePointRange::ALL),
            Err(TrackerError::MalformedData(_))
        ));
        let value = json!({"three": [[1.0, 2.0, 3.0]]});
        assert!(parse_document(value, DocumentKind::PositionsOnly, TimePointRange::ALL).is_err());
    }

    #[test]
    fn test_positions_only_keeps_shapes() {
        let value = json!({"3": [[1.0, 2.0, 3.0, "ellipse", 4.5]], "8": [[0.0, 0.0, 0.0]]});
        let range = TimePointRange { min: 0, max: 5 };
        let experiment = parse_document(value, DocumentKind::PositionsOnly, range).unwrap();
        assert_eq!(experiment.positions.len(), 1);
        let position = Position::new(1.0, 2.0, 3.0, 3);
        assert_eq!(
            experiment.positions.shape_of(&position).unwrap().fields(),
            &[json!("ellipse"), json!(4.5)]
        );
    }

    #[test]
    fn test_graph_round_trip_keeps_metadata() {
        let mut links = Links::new();
        let a = Position::new(0.0, 0.0, 0.0, 1);
        let b = Position::new(1.0, 0.0, 0.0, 2);
        links.add_link(a, b).unwrap();
        links.set_position_data(&b, "ending", Some(json!("dead"))).unwrap();
        links
            .set_link_data(&a, &b, "scores", Some(json!({"distance": 1.0})))
            .unwrap();
        let graph = links_to_graph(&links);
        let back = graph_to_links(&graph, TimePointRange::ALL).unwrap();
        assert!(back.contains_link(&a, &b));
        assert_eq!(back.get_position_data(&b, "ending"), Some(&json!("dead")));
        assert_eq!(
            back.get_link_data(&a, &b, "scores"),
            Some(&json!({"distance": 1.0}))
        );
    }

    #[test]
    fn test_graph_range_filter() {
        let mut links = Links::new();
        links
            .add_link(Position::new(0.0, 0.0, 0.0, 1), Position::new(0.0, 0.0, 0.0, 2))
            .unwrap();
        links
            .add_link(Position::new(0.0, 0.0, 0.0, 2), Position::new(0.0, 0.0, 0.0, 3))
            .unwrap();
        let graph = links_to_graph(&links);
        let filtered = graph_to_links(&graph, TimePointRange { min: 2, max: 3 }).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.first_time_point_number(), Some(2));
    }

    #[test]
    fn test_node_without_time_point_is_malformed() {
        let graph: NodeLinkGraph = serde_json::from_value(json!({
            "nodes": [{"id": {"x": 1.0, "y": 1.0, "z": 1.0}}],
            "links": []
        }))
        .unwrap();
        assert!(matches!(
            graph_to_links(&graph, TimePointRange::ALL),
            Err(TrackerError::MalformedData(_))
        ));
    }

    #[test]
    fn test_alternative_path() {
        assert_eq!(
            alternative_path(Path::new("out/table.csv")),
            PathBuf::from("out/table.csv.ALT")
        );
    }
}
