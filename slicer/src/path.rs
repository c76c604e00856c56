//! Extrusion and travel paths. Every kind of path shares one
//! representation; the [`PathKind`] tag picks its feed and flow rates.

use common::config::PrintConfig;
use tracing::warn;

use crate::{kernel::polygon::polyline_length, transform::Placement, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// The outermost bead of a ring, following its boundary.
    Perimeter,
    /// Extra shells inside the perimeter.
    Loop,
    Infill,
    Support,
    Travel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub kind: PathKind,
    /// Every point the nozzle visits, the first one being where the path
    /// starts.
    pub points: Vec<Point>,
}

/// Feed rates in mm/min and flow multipliers, looked up by path kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Rates {
    pub extrusion_feed: f64,
    pub perimeter_feed: f64,
    pub bridge_feed: f64,
    pub support_feed: f64,
    pub travel_feed: f64,
    pub flow: f64,
    pub perimeter_flow: f64,
    pub bridge_flow: f64,
    pub minimum_layer_feed: f64,
}

impl Path {
    /// A path through the points. Paths need at least two points, anything
    /// shorter is dropped with a warning.
    pub fn new(kind: PathKind, points: Vec<Point>) -> Option<Self> {
        if points.len() < 2 {
            warn!("Dropping {kind:?} path with {} point(s)", points.len());
            return None;
        }

        Some(Self { kind, points })
    }

    /// A path around a closed outline, ending back at its first point.
    pub fn closed(kind: PathKind, outline: &[Point]) -> Option<Self> {
        let mut points = outline.to_vec();
        if let Some(first) = outline.first() {
            points.push(*first);
        }
        Self::new(kind, points)
    }

    pub fn start(&self) -> Point {
        self.points[0]
    }

    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// Total length and the time in seconds it takes at this path's feed
    /// rate.
    pub fn distance_and_duration(&self, rates: &Rates, bridge: bool) -> (f64, f64) {
        let distance = self.length();
        let feed = rates.feed_rate_minute(self.kind, bridge);
        (distance, distance / feed * 60.0)
    }

    pub fn offset(&mut self, delta: &Point) {
        self.points.iter_mut().for_each(|x| *x += delta);
    }

    /// Applies a planar placement. Errors if the placement is not planar or
    /// moves along Z.
    pub fn placed(&self, placement: &Placement) -> anyhow::Result<Path> {
        let points = self
            .points
            .iter()
            .map(|x| placement.apply_point(x))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Path {
            kind: self.kind,
            points,
        })
    }
}

impl Rates {
    pub fn from_config(config: &PrintConfig) -> Self {
        let speed = &config.speed;
        Self {
            extrusion_feed: speed.feed_rate * 60.0,
            perimeter_feed: speed.perimeter_feed_rate * 60.0,
            bridge_feed: speed.bridge_feed_rate * 60.0,
            support_feed: speed.support_feed_rate * 60.0,
            travel_feed: speed.travel_feed_rate * 60.0,
            flow: speed.flow_rate,
            perimeter_flow: speed.perimeter_flow_rate,
            bridge_flow: speed.bridge_flow_rate,
            minimum_layer_feed: speed.minimum_layer_feed_rate * 60.0,
        }
    }

    pub fn feed_rate_minute(&self, kind: PathKind, bridge: bool) -> f64 {
        match kind {
            PathKind::Travel => self.travel_feed,
            PathKind::Support => self.support_feed,
            _ if bridge => self.bridge_feed,
            PathKind::Perimeter => self.perimeter_feed,
            PathKind::Loop | PathKind::Infill => self.extrusion_feed,
        }
    }

    pub fn flow_rate(&self, kind: PathKind, bridge: bool) -> f64 {
        match kind {
            PathKind::Travel => 0.0,
            PathKind::Support => self.flow,
            _ if bridge => self.bridge_flow,
            PathKind::Perimeter => self.perimeter_flow,
            PathKind::Loop | PathKind::Infill => self.flow,
        }
    }

    /// Applies a layer feed multiplier, raising the result to the minimum
    /// layer feed rate.
    pub fn scaled_feed_rate(&self, feed: f64, multiplier: f64) -> f64 {
        (feed * multiplier).max(self.minimum_layer_feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transform::Quaternion, Pos};

    #[test]
    fn short_paths_are_rejected() {
        assert!(Path::new(PathKind::Infill, vec![Point::zeros()]).is_none());
        let triangle = [Point::zeros(), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        let closed = Path::closed(PathKind::Perimeter, &triangle).unwrap();
        assert_eq!(closed.points.len(), 4);
        assert_eq!(closed.start(), closed.end());
        assert!((closed.length() - (2.0 + 2_f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn rates_by_kind() {
        let rates = Rates::from_config(&PrintConfig::default());
        assert_eq!(rates.feed_rate_minute(PathKind::Perimeter, false), 1800.0);
        assert_eq!(rates.feed_rate_minute(PathKind::Infill, false), 3000.0);
        assert_eq!(rates.feed_rate_minute(PathKind::Infill, true), 1500.0);
        assert_eq!(rates.feed_rate_minute(PathKind::Support, true), 2400.0);
        assert_eq!(rates.feed_rate_minute(PathKind::Travel, false), 7800.0);

        let path = Path::new(PathKind::Infill, vec![Point::zeros(), Point::new(50.0, 0.0)]).unwrap();
        let (distance, duration) = path.distance_and_duration(&rates, false);
        assert_eq!(distance, 50.0);
        assert!((duration - 1.0).abs() < 1e-12);
    }

    #[test]
    fn minimum_feed_rate_clamps() {
        let rates = Rates::from_config(&PrintConfig::default());
        assert_eq!(rates.scaled_feed_rate(3000.0, 0.5), 1500.0);
        assert_eq!(rates.scaled_feed_rate(600.0, 0.1), 300.0);
        assert_eq!(rates.scaled_feed_rate(300.0, 1.0), 300.0);
    }

    #[test]
    fn placement_of_paths() {
        let points = vec![Point::new(1.0, 0.0), Point::new(2.0, 0.0)];
        let path = Path::new(PathKind::Loop, points).unwrap();
        let turn = Placement::new(Pos::new(0.0, 1.0, 0.0), Quaternion::from_z_degrees(90.0));
        let placed = path.placed(&turn).unwrap();
        assert!((placed.start() - Point::new(0.0, 2.0)).norm() < 1e-12);

        let tilt = Placement::from_euler_degrees(Pos::zeros(), &Pos::new(45.0, 0.0, 0.0));
        assert!(path.placed(&tilt).is_err());
    }
}
