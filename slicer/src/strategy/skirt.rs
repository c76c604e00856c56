use common::config::PrintConfig;
use geo::MultiPolygon;
use tracing::{debug, warn};

use crate::{
    kernel::polygon::{
        convex_hull, dedup_outline, offset_region, outer_outlines, start_at_lower_left,
        to_polygon, union_regions,
    },
    path::{Path, PathKind},
    scene::File,
    schedule::LayerGroup,
    strategy::SupportStrategy,
    Outline,
};

/// Closed loops around everything printed on the first layers of the bed,
/// clear of it by a configurable gap. Primes the nozzle before the models
/// start.
pub struct Skirt;

impl SupportStrategy for Skirt {
    fn name(&self) -> &'static str {
        "skirt"
    }

    fn support(&self, file: &mut File, groups: &[LayerGroup], config: &PrintConfig) {
        let count = config.support.skirt_layers.min(groups.len());
        let groups = &groups[..count];

        let outlines = groups
            .iter()
            .flat_map(|group| group.layers(file))
            .flat_map(|layer| {
                let rings = layer.nested_rings.iter().map(|x| x.boundary().clone());
                let support = layer.support_paths.iter().map(|x| dedup_outline(&x.points));
                rings.chain(support).collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let loops = skirt_loops(&outlines, config);
        if loops.is_empty() {
            if !outlines.is_empty() {
                warn!("Not enough material for a skirt around {count} layer(s)");
            }
            return;
        }
        debug!("Adding {} skirt loop(s) to {count} layer(s)", loops.len());

        for group in groups {
            let Some(layer) = group.members.first().and_then(|x| x.get_mut(file)) else {
                continue;
            };
            layer
                .support_paths
                .extend(loops.iter().filter_map(|x| Path::closed(PathKind::Support, x)));
        }
    }
}

/// The skirt outlines around the union of some outlines: the union grown
/// by the skirt gap, or the convex hull of that when the skirt is convex.
pub fn skirt_loops(outlines: &[Outline], config: &PrintConfig) -> Vec<Outline> {
    let union = union_regions(
        outlines
            .iter()
            .filter(|x| x.len() >= 3)
            .map(|x| MultiPolygon::new(vec![to_polygon(x)])),
    );

    let outset = (config.support.skirt_gap_over_width + 0.5) * config.carve.extrusion_width;
    let loops = outer_outlines(&offset_region(&union, outset));
    if !config.support.skirt_convex || loops.is_empty() {
        return loops;
    }

    let mut hull = convex_hull(&loops.concat());
    if hull.len() < 3 {
        return Vec::new();
    }
    start_at_lower_left(&mut hull);
    vec![hull]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kernel::polygon::{contains_point, signed_area, tests::square},
        layer::{BoundaryPerimeter, Layer, NestedRing},
        mesh::tests::cuboid,
        scene::Object,
        schedule::layer_groups,
        transform::Placement,
        Point, Pos,
    };

    fn layer(index: usize, min: f64, max: f64) -> Layer {
        let mut layer = Layer::new(0.2 * (index + 1) as f64, index);
        let ring = NestedRing::new(BoundaryPerimeter::new(square(min, max), Vec::new()));
        layer.nested_rings.push(ring);
        layer
    }

    /// One object per list of layers, each placed once.
    fn file(objects: Vec<Vec<Layer>>) -> File {
        let mut file = File::new("skirt");
        for (id, layers) in objects.into_iter().enumerate() {
            let id = id as i64;
            let mut object = Object::new(id, cuboid(Pos::zeros(), Pos::new(1.0, 1.0, 1.0)));
            object.set_layers(vec![layers]);
            file.add_object(object);
            file.print_bed_mut().add_instance(id, Placement::identity());
        }
        file
    }

    fn skirts(file: &File, groups: &[LayerGroup]) -> Vec<Vec<Path>> {
        groups
            .iter()
            .map(|x| x.layers(file).flat_map(|x| x.support_paths.clone()).collect())
            .collect()
    }

    #[test]
    fn skirt_surrounds_first_layers() {
        let mut config = PrintConfig::default();
        config.support.skirt_layers = 2;
        config.support.skirt_gap_over_width = 2.0;

        let mut file = file(vec![vec![layer(0, 0.0, 10.0), layer(1, 2.0, 12.0), layer(2, 0.0, 30.0)]]);
        let groups = layer_groups(&file);
        Skirt.support(&mut file, &groups, &config);

        let skirts = skirts(&file, &groups);
        assert!(skirts[2].is_empty());
        let skirt = &skirts[0][0];
        assert_eq!(skirt, &skirts[1][0]);
        assert_eq!(skirt.kind, PathKind::Support);
        assert_eq!(skirt.start(), skirt.end());

        // Hull of both squares grown by 2.5 widths.
        let outline = &skirt.points[..skirt.points.len() - 1];
        assert!(signed_area(outline) > 144.0);
        let min_x = outline.iter().map(|p| p.x).fold(f64::MAX, f64::min);
        assert!((min_x + 1.0).abs() < 1e-9);
        let corner = Point::new(13.0, 13.0);
        assert!(outline.iter().any(|p| (p - corner).norm() < 1e-9));
    }

    #[test]
    fn one_skirt_around_every_instance() {
        let config = PrintConfig::default();
        let mut file = file(vec![vec![layer(0, 0.0, 10.0)], vec![layer(0, 20.0, 30.0)]]);
        let groups = layer_groups(&file);
        assert_eq!(groups.len(), 1);
        Skirt.support(&mut file, &groups, &config);

        let skirts = skirts(&file, &groups);
        assert_eq!(skirts[0].len(), 1);
        let outline = &skirts[0][0].points;
        for inside in [Point::new(5.0, 5.0), Point::new(25.0, 25.0), Point::new(15.0, 15.0)] {
            assert!(contains_point(outline, &inside), "{inside:?}");
        }
    }

    #[test]
    fn concave_skirt_follows_the_union() {
        let mut config = PrintConfig::default();
        config.support.skirt_convex = false;

        let apart = skirt_loops(&[square(0.0, 10.0), square(20.0, 30.0)], &config);
        assert_eq!(apart.len(), 2);
        assert!(!contains_point(&apart[0], &Point::new(15.0, 15.0)));
        assert!(!contains_point(&apart[1], &Point::new(15.0, 15.0)));

        // An L shape keeps its notch instead of being hulled over.
        let top_left = square(0.0, 10.0)
            .iter()
            .map(|p| p + Point::new(0.0, 10.0))
            .collect();
        let l = [square(0.0, 10.0), square(10.0, 20.0), top_left];
        let skirt = skirt_loops(&l, &config);
        assert_eq!(skirt.len(), 1);
        assert!(!contains_point(&skirt[0], &Point::new(16.0, 4.0)));
        assert!((signed_area(&skirt[0]) - (22.8 * 22.8 - 10.0 * 10.0)).abs() < 1e-6);

        config.support.skirt_convex = true;
        let hull = skirt_loops(&l, &config);
        assert_eq!(hull.len(), 1);
        assert!(contains_point(&hull[0], &Point::new(16.0, 4.0)));
    }

    #[test]
    fn empty_layers_get_no_skirt() {
        let mut file = file(vec![vec![Layer::new(0.2, 0)]]);
        let groups = layer_groups(&file);
        Skirt.support(&mut file, &groups, &PrintConfig::default());
        assert!(skirts(&file, &groups)[0].is_empty());

        Skirt.support(&mut File::new("empty"), &[], &PrintConfig::default());
    }
}
