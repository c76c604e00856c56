use anyhow::Result;

use crate::{
    kernel::polygon::signed_area,
    path::{Path, PathKind, Rates},
    transform::Placement,
    Outline, Point,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winding {
    /// Counter clockwise, around solid material.
    Outer,
    /// Clockwise, around a hole.
    Inner,
}

/// The outermost bead of a ring. Usually one closed path; when it had to be
/// split around overlaps it is several open paths.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryPerimeter {
    pub boundary: Outline,
    pub winding: Winding,
    pub paths: Vec<Path>,
}

/// One closed region of a layer with everything printed inside it. Rings
/// inside holes and holes inside rings are nested in `inner_rings`.
#[derive(Clone, Debug, PartialEq)]
pub struct NestedRing {
    pub perimeter: BoundaryPerimeter,
    pub loops: Vec<Path>,
    pub infill_paths: Vec<Path>,
    pub inner_rings: Vec<NestedRing>,
}

impl BoundaryPerimeter {
    pub fn new(boundary: Outline, paths: Vec<Path>) -> Self {
        let winding = if signed_area(&boundary) > 0.0 {
            Winding::Outer
        } else {
            Winding::Inner
        };

        Self {
            boundary,
            winding,
            paths,
        }
    }
}

impl NestedRing {
    pub fn new(perimeter: BoundaryPerimeter) -> Self {
        Self {
            perimeter,
            loops: Vec::new(),
            infill_paths: Vec::new(),
            inner_rings: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &Outline {
        &self.perimeter.boundary
    }

    pub fn winding(&self) -> Winding {
        self.perimeter.winding
    }

    /// Perimeter paths of this ring and then every inner ring, depth first.
    pub fn perimeter_paths<'a>(&'a self, out: &mut Vec<&'a Path>) {
        out.extend(&self.perimeter.paths);
        for ring in &self.inner_rings {
            ring.perimeter_paths(out);
        }
    }

    pub fn loop_paths<'a>(&'a self, out: &mut Vec<&'a Path>) {
        out.extend(&self.loops);
        for ring in &self.inner_rings {
            ring.loop_paths(out);
        }
    }

    pub fn infill_paths<'a>(&'a self, out: &mut Vec<&'a Path>) {
        out.extend(&self.infill_paths);
        for ring in &self.inner_rings {
            ring.infill_paths(out);
        }
    }

    pub fn add_infill(&mut self, points: Vec<Point>) {
        if let Some(path) = Path::new(PathKind::Infill, points) {
            self.infill_paths.push(path);
        }
    }

    /// The boundary of this ring and the boundaries of its direct children,
    /// which together outline the material this ring surrounds.
    pub fn region(&self) -> Vec<Outline> {
        let mut out = vec![self.boundary().clone()];
        out.extend(self.inner_rings.iter().map(|x| x.boundary().clone()));
        out
    }

    /// Every ring in this subtree, depth first.
    pub fn rings(&self) -> Vec<&NestedRing> {
        let mut out = vec![self];
        for ring in &self.inner_rings {
            out.extend(ring.rings());
        }
        out
    }

    /// Calls `f` on this ring and then every ring inside it, depth first.
    pub fn for_each_ring_mut(&mut self, f: &mut impl FnMut(&mut NestedRing)) {
        f(self);
        for ring in &mut self.inner_rings {
            ring.for_each_ring_mut(f);
        }
    }

    pub fn start_point(&self) -> Option<Point> {
        let mut paths = Vec::new();
        self.perimeter_paths(&mut paths);
        paths.first().map(|x| x.start())
    }

    pub fn distance_and_duration(&self, rates: &Rates, bridge: bool) -> (f64, f64) {
        let mut paths = Vec::new();
        self.perimeter_paths(&mut paths);
        self.loop_paths(&mut paths);
        self.infill_paths(&mut paths);

        paths
            .iter()
            .map(|x| x.distance_and_duration(rates, bridge))
            .fold((0.0, 0.0), |(d, t), (dx, tx)| (d + dx, t + tx))
    }

    pub fn offset(&mut self, delta: &Point) {
        self.perimeter.boundary.iter_mut().for_each(|x| *x += delta);
        self.perimeter.paths.iter_mut().for_each(|x| x.offset(delta));
        self.loops.iter_mut().for_each(|x| x.offset(delta));
        self.infill_paths.iter_mut().for_each(|x| x.offset(delta));
        self.inner_rings.iter_mut().for_each(|x| x.offset(delta));
    }

    /// Applies a planar placement to everything in the ring.
    pub fn placed(&self, placement: &Placement) -> Result<NestedRing> {
        let place_paths = |paths: &[Path]| -> Result<Vec<Path>> {
            paths.iter().map(|x| x.placed(placement)).collect()
        };

        let boundary = self
            .perimeter
            .boundary
            .iter()
            .map(|x| placement.apply_point(x))
            .collect::<Result<Vec<_>>>()?;

        Ok(NestedRing {
            perimeter: BoundaryPerimeter {
                boundary,
                winding: self.perimeter.winding,
                paths: place_paths(&self.perimeter.paths)?,
            },
            loops: place_paths(&self.loops)?,
            infill_paths: place_paths(&self.infill_paths)?,
            inner_rings: self
                .inner_rings
                .iter()
                .map(|x| x.placed(placement))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}
