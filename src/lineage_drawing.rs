use crate::tracks::{LinkingTrack, TrackId, TrackSet};
use std::collections::HashMap;
use svg::Document;
use svg::node::element::{Circle, Line, Text};

const MARGIN: f32 = 40.0;
const COLUMN_WIDTH: f32 = 16.0;
const TIME_POINT_HEIGHT: f32 = 4.0;

/// Horizontal placement of lineage trees: every track without next tracks gets a
/// column of its own, and a dividing track sits midway between its first and last
/// next track. Trees follow the order of [`TrackSet::starting_tracks`], so sort the
/// tracks first to control the layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineageLayout {
    columns: HashMap<TrackId, f32>,
    width: usize,
}

impl LineageLayout {
    pub fn compute(tracks: &TrackSet) -> Self {
        let mut ret = Self::default();
        for root in tracks.starting_tracks() {
            ret.place(tracks, root);
        }
        ret
    }

    fn place(&mut self, tracks: &TrackSet, track: &LinkingTrack) -> f32 {
        // Tracks after a merge are reached twice; the first placement wins
        if let Some(column) = self.columns.get(&track.id()) {
            return *column;
        }
        let children: Vec<f32> = track
            .next_tracks()
            .iter()
            .filter_map(|id| tracks.get(*id))
            .map(|next| self.place(tracks, next))
            .collect();
        let column = match (children.first(), children.last()) {
            (Some(first), Some(last)) => (first + last) / 2.0,
            _ => {
                self.width += 1;
                (self.width - 1) as f32
            }
        };
        self.columns.insert(track.id(), column);
        column
    }

    pub fn column_of(&self, id: TrackId) -> Option<f32> {
        self.columns.get(&id).copied()
    }

    /// Number of columns, which is the number of tracks that end without dividing.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Draws all lineage trees, with time running downwards. The colour of each track
/// comes from `color`, as any SVG colour string. Returns the document and the
/// layout width in columns.
pub fn export_lineage_svg<F>(tracks: &TrackSet, color: F) -> (String, usize)
where
    F: Fn(&LinkingTrack) -> String,
{
    let layout = LineageLayout::compute(tracks);
    let first_time_point = tracks
        .iter()
        .map(|track| track.min_time_point_number())
        .min()
        .unwrap_or(0);
    let last_time_point = tracks
        .iter()
        .map(|track| track.max_time_point_number())
        .max()
        .unwrap_or(0);

    let x_of = |column: f32| MARGIN + column * COLUMN_WIDTH;
    let y_of = |time_point_number: i32| {
        MARGIN + (time_point_number - first_time_point) as f32 * TIME_POINT_HEIGHT
    };
    let width = 2.0 * MARGIN + layout.width() as f32 * COLUMN_WIDTH;
    let height = 2.0 * MARGIN + (last_time_point - first_time_point) as f32 * TIME_POINT_HEIGHT;

    let mut doc = Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .set("style", "background:#ffffff");

    doc = doc.add(
        Text::new(format!("Lineage trees ({} tracks)", tracks.len()))
            .set("x", MARGIN)
            .set("y", MARGIN / 2.0)
            .set("font-family", "Helvetica, Arial, sans-serif")
            .set("font-size", 14)
            .set("fill", "#202020"),
    );

    for track in tracks.iter() {
        let Some(column) = layout.column_of(track.id()) else {
            continue;
        };
        let x = x_of(column);
        let stroke = color(track);
        // Start at the end of the previous track, so that the tree stays connected
        let start = track
            .previous_tracks()
            .first()
            .and_then(|id| tracks.get(*id))
            .map(|previous| previous.max_time_point_number())
            .unwrap_or(track.min_time_point_number());
        let end_y = y_of(track.max_time_point_number());
        doc = doc.add(
            Line::new()
                .set("x1", x)
                .set("y1", y_of(start))
                .set("x2", x)
                .set("y2", end_y)
                .set("stroke", stroke.clone())
                .set("stroke-width", 1.5),
        );

        let next_columns: Vec<f32> = track
            .next_tracks()
            .iter()
            .filter_map(|id| layout.column_of(*id))
            .collect();
        if let (Some(left), Some(right)) = (
            next_columns.iter().copied().reduce(f32::min),
            next_columns.iter().copied().reduce(f32::max),
        ) {
            doc = doc
                .add(
                    Line::new()
                        .set("x1", x_of(left))
                        .set("y1", end_y)
                        .set("x2", x_of(right))
                        .set("y2", end_y)
                        .set("stroke", stroke)
                        .set("stroke-width", 1.5),
                )
                .add(
                    Circle::new()
                        .set("cx", x)
                        .set("cy", end_y)
                        .set("r", 2)
                        .set("fill", "#202020"),
                );
        }
    }

    (doc.to_string(), layout.width())
}
