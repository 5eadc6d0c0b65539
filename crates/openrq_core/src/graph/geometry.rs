//! Link and drop geometry in scene units.
//!
//! Nothing here is stored; values are recomputed from cached item positions
//! whenever the presentation layer asks.

use crate::model::item::{Item, Point};
use crate::model::link::Link;
use serde::Serialize;

/// Side length of the direction arrow drawn on each link.
pub const ARROW_SIZE: f64 = 16.0;

/// Scene point with fractional coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenePoint {
    pub x: f64,
    pub y: f64,
}

impl From<Point> for ScenePoint {
    fn from(value: Point) -> Self {
        Self {
            x: value.x as f64,
            y: value.y as f64,
        }
    }
}

/// Computed line of one link, from parent centre to child centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkGeometry {
    pub link: Link,
    pub start: ScenePoint,
    pub end: ScenePoint,
    pub midpoint: ScenePoint,
    /// Line direction, counter-clockwise from the positive x axis with y
    /// pointing up, in `[0, 360)`.
    pub angle_degrees: f64,
}

impl LinkGeometry {
    /// Geometry between the centres of `parent` and `child`.
    pub fn between(link: Link, parent: &Item, child: &Item) -> Self {
        let start = ScenePoint::from(parent.center());
        let end = ScenePoint::from(child.center());
        let midpoint = ScenePoint {
            x: (start.x + end.x) / 2.0,
            y: (start.y + end.y) / 2.0,
        };
        let angle = (start.y - end.y).atan2(end.x - start.x).to_degrees();
        Self {
            link,
            start,
            end,
            midpoint,
            angle_degrees: angle.rem_euclid(360.0),
        }
    }

    /// Rotation applied to the downward-pointing arrow so it follows the line.
    pub fn arrow_rotation(&self) -> f64 {
        -self.angle_degrees - 90.0
    }

    /// Top-left corner of the arrow, centred on the midpoint.
    pub fn arrow_position(&self) -> ScenePoint {
        ScenePoint {
            x: self.midpoint.x - ARROW_SIZE / 2.0,
            y: self.midpoint.y - ARROW_SIZE / 2.0,
        }
    }
}

/// Snaps a drop position to the grid of `1 << shift` units, then moves it by
/// `-offset` so the item is centred on the cursor.
///
/// Returns `None` when the result does not fit in scene coordinates.
pub fn snap_to_grid(point: Point, shift: u32, offset: Point) -> Option<Point> {
    let x = (point.x >> shift << shift).checked_sub(offset.x)?;
    let y = (point.y >> shift << shift).checked_sub(offset.y)?;
    Some(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::{snap_to_grid, LinkGeometry};
    use crate::model::identity::Identity;
    use crate::model::item::{Item, ItemAttributes, Point, Size};
    use crate::model::link::Link;

    fn item_at(id: Identity, x: i64, y: i64) -> Item {
        let mut item = Item::empty(id);
        item.attributes = ItemAttributes {
            position: Point::new(x, y),
            size: Size::new(128, 64),
            ..ItemAttributes::default()
        };
        item
    }

    #[test]
    fn line_runs_between_centres() {
        let parent = item_at(Identity::requirement(1), 0, 0);
        let child = item_at(Identity::requirement(2), 0, 200);
        let link = Link::new(parent.identity(), child.identity());

        let geometry = LinkGeometry::between(link, &parent, &child);
        assert_eq!((geometry.start.x, geometry.start.y), (64.0, 32.0));
        assert_eq!((geometry.end.x, geometry.end.y), (64.0, 232.0));
        assert_eq!((geometry.midpoint.x, geometry.midpoint.y), (64.0, 132.0));
        // Straight down.
        assert!((geometry.angle_degrees - 270.0).abs() < 1e-9);
        assert!((geometry.arrow_rotation() + 360.0).abs() < 1e-9);
        assert_eq!(geometry.arrow_position().y, 124.0);
    }

    #[test]
    fn rightward_line_has_zero_angle() {
        let parent = item_at(Identity::solution(1), 0, 0);
        let child = item_at(Identity::solution(2), 300, 0);
        let geometry =
            LinkGeometry::between(Link::new(parent.identity(), child.identity()), &parent, &child);
        assert!(geometry.angle_degrees.abs() < 1e-9);
    }

    #[test]
    fn snaps_down_to_grid_and_centres() {
        let snapped = snap_to_grid(Point::new(100, 70), 5, Point::new(64, 32));
        assert_eq!(snapped, Some(Point::new(96 - 64, 64 - 32)));

        let negative = snap_to_grid(Point::new(-1, -33), 5, Point::new(0, 0));
        assert_eq!(negative, Some(Point::new(-32, -64)));
    }

    #[test]
    fn snap_outside_scene_range_is_none() {
        let offset = Point::new(64, 32);
        assert_eq!(snap_to_grid(Point::new(i64::MIN, 0), 5, offset), None);
        assert_eq!(snap_to_grid(Point::new(0, i64::MIN), 5, offset), None);
        assert_eq!(
            snap_to_grid(Point::new(i64::MAX, 0), 5, Point::new(-64, 0)),
            None
        );
    }

    #[test]
    fn link_between_extreme_items_has_finite_geometry() {
        let parent = item_at(Identity::requirement(1), i64::MAX, i64::MAX);
        let child = item_at(Identity::requirement(2), i64::MIN, 0);
        let geometry =
            LinkGeometry::between(Link::new(parent.identity(), child.identity()), &parent, &child);
        assert!(geometry.midpoint.x.is_finite());
        assert!(geometry.angle_degrees.is_finite());
    }
}
