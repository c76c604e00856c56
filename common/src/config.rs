use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Every parameter of a print run. Read once before slicing and never
/// mutated while a run is in progress.
///
/// The `carve` and `extruders` tables are required in a config file, every
/// other table falls back to its defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrintConfig {
    pub carve: CarveConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub inset: InsetConfig,
    #[serde(default)]
    pub speed: SpeedConfig,
    #[serde(default)]
    pub dimension: DimensionConfig,
    #[serde(default)]
    pub comb: CombConfig,
    #[serde(default)]
    pub fill: FillConfig,
    #[serde(default)]
    pub support: SupportConfig,
    #[serde(default)]
    pub bottom: BottomConfig,
    #[serde(default)]
    pub preface: PrefaceConfig,
    #[serde(default)]
    pub export: ExportConfig,
    pub extruders: Vec<ExtruderConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Decimal places kept for position axes and feed rates.
    pub decimal_places: u32,
    /// Decimal places kept for the extrusion axis.
    pub dimension_decimal_places: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarveConfig {
    /// Layer height in mm.
    pub layer_height: f64,
    /// Width of an extruded bead in mm.
    pub extrusion_width: f64,
    /// First layer index (inclusive) that is printed.
    #[serde(default)]
    pub layer_print_from: usize,
    /// Last layer index (exclusive) that is printed, every layer if unset.
    #[serde(default)]
    pub layer_print_to: Option<usize>,
    /// How far a z shift may be from a whole number of layers and still let
    /// two placements share their slices.
    #[serde(default = "default_layer_height_tolerance")]
    pub layer_height_tolerance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsetConfig {
    /// Overlap removal width as a fraction of the extrusion width. Values
    /// under 0.1 disable overlap removal.
    pub overlap_removal_scaler: f64,
    pub nozzle_diameter: f64,
    pub bridge_width_multiplier: f64,
    /// Inset smaller loops first.
    pub loop_order_ascending_area: bool,
}

/// Feed rates are in mm/s, flow rates are unitless multipliers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Emit feed rate words on moves.
    pub active: bool,
    pub feed_rate: f64,
    pub perimeter_feed_rate: f64,
    pub bridge_feed_rate: f64,
    pub support_feed_rate: f64,
    pub travel_feed_rate: f64,
    pub flow_rate: f64,
    pub perimeter_flow_rate: f64,
    pub bridge_flow_rate: f64,
    pub minimum_layer_feed_rate: f64,
    pub first_layer_feed_rate_ratio: f64,
    pub first_layer_flow_rate_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionConfig {
    /// Emit extrusion axis words and retractions.
    pub active: bool,
    pub relative_extrusion: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombConfig {
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Name of a registered fill strategy.
    pub strategy: String,
    /// Infill density, from 0 to 1.
    pub density: f64,
    /// Closed loops printed inside each perimeter before the infill.
    pub shells: usize,
    pub print_order: Vec<PrintOrder>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintOrder {
    Perimeter,
    Loops,
    Infill,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Name of a registered support strategy.
    pub strategy: String,
    /// Gap between the model and its skirt in extrusion widths.
    pub skirt_gap_over_width: f64,
    pub skirt_layers: usize,
    /// Hull the skirt instead of following the outline of the models.
    pub skirt_convex: bool,
}

/// Where the lowest layer on the bed ends up. Everything on the bed moves
/// up or down together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottomConfig {
    pub active: bool,
    /// Height of the bed surface in mm.
    pub altitude: f64,
    /// Top of the first layer above the altitude, in layer heights.
    pub additional_height_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefaceConfig {
    pub absolute_positioning: bool,
    pub units_millimeters: bool,
    pub start_at_home: bool,
    pub reset_extruder: bool,
    /// Raw lines written verbatim before the generated start commands.
    pub start_lines: Vec<String>,
    /// Raw lines written verbatim after the last layer.
    pub end_lines: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Append a description comment to every command.
    pub verbose: bool,
    pub delete_comments: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtruderConfig {
    pub name: String,
    pub axis_code: char,
    /// Filament diameter in mm.
    pub filament_diameter: f64,
    pub packing_density: f64,
    /// Filament oozed while idle, in mm/min.
    pub ooze_rate: f64,
    /// Retraction speed in mm/s.
    pub retraction_speed: f64,
    /// Upper bound on a single retraction in mm.
    pub maximum_retraction: f64,
}

impl PrintConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let string = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config `{}`", path.display()))?;
        let config = Self::from_toml(&string)
            .with_context(|| format!("Failed to parse config `{}`", path.display()))?;
        info!("Loaded print config from `{}`", path.display());
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                warn!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml(string: &str) -> Result<Self> {
        let config: Self = toml::from_str(string)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value a run depends on. Strategy names are checked
    /// separately when the strategy registry resolves them.
    pub fn validate(&self) -> Result<()> {
        let carve = &self.carve;
        ensure!(carve.layer_height > 0.0, "carve.layer_height must be positive");
        ensure!(
            carve.extrusion_width > 0.0,
            "carve.extrusion_width must be positive"
        );
        ensure!(
            self.bead_area() > 0.0,
            "carve.extrusion_width is too small for the layer height"
        );
        ensure!(
            carve.layer_height_tolerance >= 0.0,
            "carve.layer_height_tolerance can not be negative"
        );
        if let Some(to) = carve.layer_print_to {
            ensure!(
                to > carve.layer_print_from,
                "carve.layer_print_to must be after carve.layer_print_from"
            );
        }

        let speed = &self.speed;
        for (name, value) in [
            ("feed_rate", speed.feed_rate),
            ("perimeter_feed_rate", speed.perimeter_feed_rate),
            ("bridge_feed_rate", speed.bridge_feed_rate),
            ("support_feed_rate", speed.support_feed_rate),
            ("travel_feed_rate", speed.travel_feed_rate),
            ("first_layer_feed_rate_ratio", speed.first_layer_feed_rate_ratio),
        ] {
            ensure!(value > 0.0, "speed.{name} must be positive");
        }
        ensure!(
            speed.minimum_layer_feed_rate >= 0.0,
            "speed.minimum_layer_feed_rate can not be negative"
        );

        ensure!(
            self.bottom.additional_height_ratio >= 0.0,
            "bottom.additional_height_ratio can not be negative"
        );

        ensure!(self.inset.nozzle_diameter > 0.0, "inset.nozzle_diameter must be positive");
        ensure!(self.fill.density > 0.0, "fill.density must be positive");
        ensure!(!self.fill.print_order.is_empty(), "fill.print_order is empty");
        if let Some(duplicate) = self.fill.print_order.iter().duplicates().next() {
            anyhow::bail!("fill.print_order lists {duplicate:?} more than once");
        }

        ensure!(
            !self.extruders.is_empty(),
            "at least one [[extruders]] table is required"
        );
        for extruder in &self.extruders {
            ensure!(
                extruder.filament_diameter > 0.0,
                "extruder `{}` needs a positive filament_diameter",
                extruder.name
            );
            ensure!(
                extruder.packing_density > 0.0,
                "extruder `{}` needs a positive packing_density",
                extruder.name
            );
            ensure!(
                extruder.retraction_speed > 0.0,
                "extruder `{}` needs a positive retraction_speed",
                extruder.name
            );
        }

        Ok(())
    }

    /// Cross section of an extruded bead: a rectangle with rounded ends.
    pub fn bead_area(&self) -> f64 {
        let (h, w) = (self.carve.layer_height, self.carve.extrusion_width);
        std::f64::consts::PI * h * h / 4.0 + h * (w - h)
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            carve: CarveConfig::default(),
            general: GeneralConfig::default(),
            inset: InsetConfig::default(),
            speed: SpeedConfig::default(),
            dimension: DimensionConfig::default(),
            comb: CombConfig::default(),
            fill: FillConfig::default(),
            support: SupportConfig::default(),
            bottom: BottomConfig::default(),
            preface: PrefaceConfig::default(),
            export: ExportConfig::default(),
            extruders: vec![ExtruderConfig::default()],
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            decimal_places: 3,
            dimension_decimal_places: 4,
        }
    }
}

fn default_layer_height_tolerance() -> f64 {
    1e-6
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            extrusion_width: 0.4,
            layer_print_from: 0,
            layer_print_to: None,
            layer_height_tolerance: default_layer_height_tolerance(),
        }
    }
}

impl Default for InsetConfig {
    fn default() -> Self {
        Self {
            overlap_removal_scaler: 0.6,
            nozzle_diameter: 0.4,
            bridge_width_multiplier: 1.0,
            loop_order_ascending_area: false,
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            active: true,
            feed_rate: 50.0,
            perimeter_feed_rate: 30.0,
            bridge_feed_rate: 25.0,
            support_feed_rate: 40.0,
            travel_feed_rate: 130.0,
            flow_rate: 1.0,
            perimeter_flow_rate: 1.0,
            bridge_flow_rate: 1.0,
            minimum_layer_feed_rate: 5.0,
            first_layer_feed_rate_ratio: 0.5,
            first_layer_flow_rate_ratio: 1.0,
        }
    }
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            active: true,
            relative_extrusion: true,
        }
    }
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            strategy: "lines".into(),
            density: 0.2,
            shells: 1,
            print_order: vec![PrintOrder::Perimeter, PrintOrder::Loops, PrintOrder::Infill],
        }
    }
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            strategy: "none".into(),
            skirt_gap_over_width: 3.0,
            skirt_layers: 1,
            skirt_convex: true,
        }
    }
}

impl Default for BottomConfig {
    fn default() -> Self {
        Self {
            active: true,
            altitude: 0.0,
            additional_height_ratio: 1.0,
        }
    }
}

impl Default for PrefaceConfig {
    fn default() -> Self {
        Self {
            absolute_positioning: true,
            units_millimeters: true,
            start_at_home: false,
            reset_extruder: true,
            start_lines: Vec::new(),
            end_lines: Vec::new(),
        }
    }
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self {
            name: "Extruder 1".into(),
            axis_code: 'E',
            filament_diameter: 1.75,
            packing_density: 1.0,
            ooze_rate: 75.0,
            retraction_speed: 15.0,
            maximum_retraction: 1.0,
        }
    }
}
