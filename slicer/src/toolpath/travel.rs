use crate::{
    path::{Path, PathKind},
    toolpath::CombRouter,
    Point, Pos,
};

/// Vertical travel counts this many times its length when estimating how
/// long a move leaves the nozzle idle.
const Z_DISTANCE_RATIO: f64 = 5.0;

/// A non extruding move between the end of one path and the start of the
/// next. `from` is unset for the first path of a layer group.
#[derive(Clone, Debug, PartialEq)]
pub struct TravelPath {
    pub from: Option<Pos>,
    pub to: Pos,
}

impl TravelPath {
    pub fn new(from: Option<Pos>, to: Pos) -> Self {
        Self { from, to }
    }

    /// Seconds the nozzle spends idle on this travel, estimated at the
    /// extrusion feed rate. Zero without a starting point.
    pub fn transit_time(&self, extrusion_feed: f64) -> f64 {
        let Some(from) = self.from else {
            return 0.0;
        };

        let delta = self.to - from;
        let xy = delta.xy().norm();
        let z = delta.z * Z_DISTANCE_RATIO;
        (xy * xy + z * z).sqrt() / extrusion_feed * 60.0
    }

    /// Every point the nozzle moves to, ending at `to`. Travels are only
    /// combed when they have a starting point.
    pub fn waypoints(&self, router: Option<&dyn CombRouter>) -> Vec<Point> {
        match (self.from, router) {
            (Some(from), Some(router)) => {
                let mut route = router.route_between(self.to.z, &from.xy(), &self.to.xy());
                if route.last() != Some(&self.to.xy()) {
                    route.push(self.to.xy());
                }
                route
            }
            _ => vec![self.to.xy()],
        }
    }

    /// The travel as a path, for distance and duration estimates.
    pub fn to_path(&self, router: Option<&dyn CombRouter>) -> Option<Path> {
        let from = self.from?;
        let mut points = vec![from.xy()];
        points.extend(self.waypoints(router));
        Path::new(PathKind::Travel, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel::polygon::tests::square, toolpath::BoundaryComb};

    #[test]
    fn transit_time_weights_z() {
        let flat = TravelPath::new(Some(Pos::new(0.0, 0.0, 0.2)), Pos::new(30.0, 40.0, 0.2));
        assert!((flat.transit_time(3000.0) - 1.0).abs() < 1e-12);

        let up = TravelPath::new(Some(Pos::new(0.0, 0.0, 0.2)), Pos::new(0.0, 0.0, 1.2));
        assert!((up.transit_time(300.0) - 1.0).abs() < 1e-12);

        let first = TravelPath::new(None, Pos::new(30.0, 40.0, 0.2));
        assert_eq!(first.transit_time(3000.0), 0.0);
        assert!(first.to_path(None).is_none());
    }

    #[test]
    fn combing_needs_a_start() {
        let mut hole = square(4.0, 6.0);
        hole.reverse();
        let comb = BoundaryComb::new(0.2, vec![hole]);
        let router: &dyn CombRouter = &comb;

        let to = Pos::new(8.0, 5.0, 0.2);
        let travel = TravelPath::new(Some(Pos::new(2.0, 5.0, 0.2)), to);
        let combed = travel.waypoints(Some(router));
        assert!(combed.len() > 1);
        assert_eq!(combed.last(), Some(&to.xy()));
        assert_eq!(travel.waypoints(None), vec![to.xy()]);

        let first = TravelPath::new(None, to);
        assert_eq!(first.waypoints(Some(router)), vec![to.xy()]);

        let path = travel.to_path(Some(router)).unwrap();
        assert_eq!(path.kind, PathKind::Travel);
        assert!(path.length() > 6.0);
    }
}
