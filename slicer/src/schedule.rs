//! Merges the independently sliced layers of every object on the print bed
//! into one bottom to top schedule.

use ordered_float::OrderedFloat;

use crate::{
    layer::Layer,
    scene::{File, ObjectId},
};

/// Points at one layer of one volume of an object on the print bed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerRef {
    /// Index of the instance on the print bed.
    pub instance: usize,
    pub object: ObjectId,
    pub volume: usize,
    pub layer: usize,
}

/// Every layer printed at one height.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerGroup {
    pub z: f64,
    pub members: Vec<LayerRef>,
}

impl LayerRef {
    pub fn get<'a>(&self, file: &'a File) -> Option<&'a Layer> {
        file.object(self.object)?
            .volumes
            .get(self.volume)?
            .layers
            .get(self.layer)
    }

    pub fn get_mut<'a>(&self, file: &'a mut File) -> Option<&'a mut Layer> {
        file.object_mut(self.object)?
            .volumes
            .get_mut(self.volume)?
            .layers
            .get_mut(self.layer)
    }
}

impl LayerGroup {
    pub fn layers<'a>(&'a self, file: &'a File) -> impl Iterator<Item = &'a Layer> + 'a {
        self.members.iter().filter_map(|x| x.get(file))
    }
}

/// Merges Z sorted sequences. Every step takes the lowest pending height
/// and pulls everything at exactly that height off every sequence, so the
/// output heights strictly increase and every item lands in one group.
pub fn merge_by_z<T>(sequences: Vec<Vec<(f64, T)>>) -> Vec<(f64, Vec<T>)> {
    let mut cursors = sequences
        .into_iter()
        .map(|x| x.into_iter().peekable())
        .collect::<Vec<_>>();
    let mut groups = Vec::new();

    loop {
        cursors.retain_mut(|x| x.peek().is_some());
        let Some(z) = cursors
            .iter_mut()
            .filter_map(|x| x.peek().map(|(z, _)| OrderedFloat(*z)))
            .min()
        else {
            break;
        };

        let mut members = Vec::new();
        for cursor in cursors.iter_mut() {
            while let Some((_, item)) = cursor.next_if(|(next, _)| *next == z.0) {
                members.push(item);
            }
        }
        groups.push((z.0, members));
    }

    groups
}

/// Groups the layers of every instance on the print bed by height. Expects
/// a finalized bed, where every instance is an unplaced object.
pub fn layer_groups(file: &File) -> Vec<LayerGroup> {
    let mut sequences = Vec::new();
    for (instance, placed) in file.print_bed().instances.iter().enumerate() {
        let Some(object) = file.object(placed.target) else {
            continue;
        };

        for (volume, contents) in object.volumes.iter().enumerate() {
            let sequence = contents
                .layers
                .iter()
                .enumerate()
                .map(|(layer, x)| {
                    let member = LayerRef {
                        instance,
                        object: object.id,
                        volume,
                        layer,
                    };
                    (x.z, member)
                })
                .collect();
            sequences.push(sequence);
        }
    }

    merge_by_z(sequences)
        .into_iter()
        .map(|(z, members)| LayerGroup { z, members })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::{mesh::tests::cuboid, scene::Object, transform::Placement, Pos};

    #[test]
    fn interleaved_heights() {
        let a = vec![(0.2, 'a'), (0.4, 'b'), (0.6, 'c')];
        let b = vec![(0.3, 'x'), (0.4, 'y')];
        let c = vec![];

        let groups = merge_by_z(vec![a, b, c]);
        assert_eq!(
            groups,
            vec![
                (0.2, vec!['a']),
                (0.3, vec!['x']),
                (0.4, vec!['b', 'y']),
                (0.6, vec!['c']),
            ]
        );
        assert!(merge_by_z::<()>(vec![]).is_empty());
    }

    #[test]
    fn groups_from_bed() {
        let mut file = File::new("groups");
        let mesh = cuboid(Pos::zeros(), Pos::new(1.0, 1.0, 1.0));
        let mut tall = Object::new(1, mesh.clone());
        tall.set_layers(vec![vec![Layer::new(0.2, 0), Layer::new(0.4, 1)]]);
        let mut short = Object::new(2, mesh);
        short.set_layers(vec![vec![Layer::new(0.2, 0)]]);
        file.add_object(tall);
        file.add_object(short);
        let bed = file.print_bed_mut();
        bed.add_instance(1, Placement::identity());
        bed.add_instance(2, Placement::identity());

        let groups = layer_groups(&file);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].members[0].object, 1);
        assert_eq!(groups[1].members[0].layer, 1);
        assert_eq!(groups[0].layers(&file).count(), 2);

        let top = groups[1].members[0];
        top.get_mut(&mut file).unwrap().feed_and_flow_multiplier = (0.5, 1.0);
        assert_eq!(top.get(&file).unwrap().feed_and_flow_multiplier.0, 0.5);
    }

    proptest! {
        #[test]
        fn heights_strictly_increase(
            sequences in prop::collection::vec(prop::collection::btree_set(1_u32..60, 0..20), 0..6)
        ) {
            let sequences = sequences
                .iter()
                .enumerate()
                .map(|(i, heights)| {
                    heights.iter().map(|h| (*h as f64 * 0.1, (i, *h))).collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            let total = sequences.iter().map(Vec::len).sum::<usize>();

            let groups = merge_by_z(sequences);
            prop_assert!(groups.windows(2).all(|x| x[0].0 < x[1].0));

            let mut seen = BTreeSet::new();
            for (z, members) in &groups {
                for (i, h) in members {
                    prop_assert_eq!(*h as f64 * 0.1, *z);
                    prop_assert!(seen.insert((*i, *h)));
                }
            }
            prop_assert_eq!(seen.len(), total);
        }
    }
}
