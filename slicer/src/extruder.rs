use std::f64::consts::PI;

use common::{
    config::{ExtruderConfig, PrintConfig},
    gcode::{Code, Instruction},
    misc::round_to,
};

/// Turns nozzle travel into filament motion and tracks how far the
/// filament axis has moved.
#[derive(Clone, Debug)]
pub struct Extruder {
    pub name: String,
    pub axis_code: char,
    relative: bool,
    decimal_places: u32,
    dimension_decimal_places: u32,
    /// Filament length in mm per mm of travel at unit flow and a feed rate
    /// of one mm/min, times sixty.
    flow_scale: f64,
    ooze_rate: f64,
    /// Retraction feed rate in mm/min.
    retraction_feed: f64,
    maximum_retraction: f64,

    axis_position: f64,
    last_retract: f64,
    filament_extruded: f64,
}

impl Extruder {
    pub fn new(extruder: &ExtruderConfig, config: &PrintConfig) -> Self {
        let radius = extruder.filament_diameter / 2.0;
        let filament_area = PI * radius * radius * extruder.packing_density;
        let dimension_decimal_places = config.general.dimension_decimal_places;

        Self {
            name: extruder.name.clone(),
            axis_code: extruder.axis_code,
            relative: config.dimension.relative_extrusion,
            decimal_places: config.general.decimal_places,
            dimension_decimal_places,
            flow_scale: 60.0 * config.bead_area() / filament_area,
            ooze_rate: extruder.ooze_rate,
            retraction_feed: round_to(
                extruder.retraction_speed * 60.0,
                config.general.decimal_places,
            ),
            maximum_retraction: extruder.maximum_retraction,

            axis_position: 0.0,
            last_retract: 0.0,
            filament_extruded: 0.0,
        }
    }

    /// One extruder per configured table, in config order.
    pub fn from_config(config: &PrintConfig) -> Vec<Self> {
        config
            .extruders
            .iter()
            .map(|x| Self::new(x, config))
            .collect()
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Total filament pushed through the nozzle in mm, before rounding.
    pub fn filament_extruded(&self) -> f64 {
        self.filament_extruded
    }

    pub fn last_retract(&self) -> f64 {
        self.last_retract
    }

    /// The extrusion axis value for a move of `distance` mm. Relative
    /// extruders return the increment, absolute ones the new axis
    /// position. Both are rounded to the dimension decimal places.
    pub fn extrusion_distance(&mut self, distance: f64, flow_rate: f64, feed_rate_minute: f64) -> f64 {
        let increment = flow_rate * self.flow_scale / feed_rate_minute * distance;
        self.filament_extruded += increment;

        if self.relative {
            round_to(increment, self.dimension_decimal_places)
        } else {
            self.axis_position += increment;
            round_to(self.axis_position, self.dimension_decimal_places)
        }
    }

    /// Pulls filament back to stop oozing during `idle` seconds of travel,
    /// then restores `resume_feed`.
    pub fn retract(&mut self, idle: f64, resume_feed: f64) -> Vec<Instruction> {
        let distance = (idle * self.ooze_rate.abs() / 60.0).min(self.maximum_retraction);
        self.last_retract = distance;

        let axis = if self.relative {
            -distance
        } else {
            self.axis_position -= distance;
            self.axis_position
        };

        vec![
            self.feed(self.retraction_feed),
            self.axis_move(axis),
            self.feed(resume_feed),
        ]
    }

    /// Pushes back the filament taken by the last retraction. Absolute
    /// extruders also zero the axis afterwards.
    pub fn reverse_retract(&mut self, travel_feed: f64) -> Vec<Instruction> {
        let axis = if self.relative {
            self.last_retract
        } else {
            self.axis_position += self.last_retract;
            self.axis_position
        };

        let mut out = vec![
            self.feed(self.retraction_feed),
            self.axis_move(axis),
            self.feed(travel_feed),
        ];

        if !self.relative {
            out.push(self.reset());
        }
        out
    }

    /// `G92` zeroing the extrusion axis.
    pub fn reset(&mut self) -> Instruction {
        self.axis_position = 0.0;
        Instruction::new(Code::ResetExtruder).with(self.axis_code, 0.0, 0)
    }

    /// Forgets the axis position and the last retraction. The amount of
    /// filament used so far is kept.
    pub fn restart(&mut self) {
        self.axis_position = 0.0;
        self.last_retract = 0.0;
    }

    fn feed(&self, feed: f64) -> Instruction {
        Instruction::linear_move().with('F', feed, self.decimal_places)
    }

    fn axis_move(&self, value: f64) -> Instruction {
        Instruction::linear_move().with(self.axis_code, value, self.dimension_decimal_places)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn extruder(relative: bool) -> Extruder {
        let mut config = PrintConfig::default();
        config.dimension.relative_extrusion = relative;
        config.extruders[0].ooze_rate = 75.0;
        config.extruders[0].maximum_retraction = 1.0;
        Extruder::new(&config.extruders[0], &config)
    }

    fn axis(instructions: &[Instruction]) -> Vec<f64> {
        instructions.iter().filter_map(|x| x.arg('E')).collect()
    }

    #[test]
    fn flow_scale_from_bead_and_filament() {
        let config = PrintConfig::default();
        let mut extruder = extruder(true);
        let radius: f64 = 1.75 / 2.0;
        let expected = config.bead_area() / (PI * radius * radius) * 10.0;

        let e = extruder.extrusion_distance(10.0, 1.0, 60.0);
        assert!((e - round_to(expected, 4)).abs() < 1e-12);
        assert!((extruder.filament_extruded() - expected).abs() < 1e-12);
    }

    #[test]
    fn absolute_accumulates() {
        let mut extruder = extruder(false);
        let first = extruder.extrusion_distance(10.0, 1.0, 60.0);
        let second = extruder.extrusion_distance(10.0, 1.0, 60.0);
        assert!((second - 2.0 * first).abs() < 2e-4);
    }

    #[test]
    fn relative_retraction_cancels() {
        let mut extruder = extruder(true);
        extruder.extrusion_distance(10.0, 1.0, 1800.0);

        let retract = extruder.retract(0.4, 7800.0);
        assert_eq!(retract.len(), 3);
        assert_eq!(retract[0].arg('F'), Some(900.0));
        assert_eq!(axis(&retract), vec![-0.5]);
        assert_eq!(retract[2].arg('F'), Some(7800.0));

        let reverse = extruder.reverse_retract(7800.0);
        assert_eq!(reverse.len(), 3);
        let total = axis(&retract).iter().chain(axis(&reverse).iter()).sum::<f64>();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn absolute_retraction_restores_and_resets() {
        let mut extruder = extruder(false);
        let before = extruder.extrusion_distance(10.0, 1.0, 60.0);

        // Long idle times are capped at the maximum retraction.
        let retract = extruder.retract(100.0, 1800.0);
        assert_eq!(extruder.last_retract(), 1.0);
        assert!((axis(&retract)[0] - round_to(before - 1.0, 4)).abs() < 1e-9);

        let reverse = extruder.reverse_retract(7800.0);
        assert_eq!(reverse.len(), 4);
        assert!((axis(&reverse)[0] - before).abs() < 1e-9);
        assert!(reverse[3].is(Code::ResetExtruder));
        assert_eq!(reverse[3].arg('E'), Some(0.0));

        let next = extruder.extrusion_distance(10.0, 1.0, 60.0);
        assert!((next - before).abs() < 1e-9);
    }

    #[test]
    fn retraction_feed_keeps_feed_precision() {
        let mut config = PrintConfig::default();
        config.general.decimal_places = 4;
        config.general.dimension_decimal_places = 1;
        config.extruders[0].retraction_speed = 15.00123;
        let mut extruder = Extruder::new(&config.extruders[0], &config);

        let retract = extruder.retract(0.4, 7800.0);
        assert_eq!(retract[0].arg('F'), Some(900.0738));
        let reverse = extruder.reverse_retract(7800.0);
        assert_eq!(reverse[0].arg('F'), Some(900.0738));
    }

    #[test]
    fn zero_idle_retracts_nothing() {
        let mut extruder = extruder(true);
        let retract = extruder.retract(0.0, 1800.0);
        assert_eq!(axis(&retract), vec![0.0]);
    }

    proptest! {
        #[test]
        fn extrusion_is_linear(distance in 0.0_f64..100.0, flow in 0.1_f64..2.0, feed in 60.0_f64..6000.0) {
            let mut one = extruder(true);
            let mut two = extruder(true);
            one.extrusion_distance(2.0 * distance, flow, feed);
            two.extrusion_distance(distance, flow, feed);
            two.extrusion_distance(distance, flow, feed);

            let expected = one.filament_extruded();
            prop_assert!((two.filament_extruded() - expected).abs() <= 1e-9 * expected.max(1.0));
        }
    }
}
