use anyhow::{Context, Result};
use common::config::PrintConfig;

use crate::{extruder::Extruder, Pos};

/// State carried from one emitted path to the next during an export.
pub struct ExtrusionContext {
    extruders: Vec<Extruder>,
    active: usize,
    previous: Option<Pos>,
}

impl ExtrusionContext {
    pub fn new(extruders: Vec<Extruder>) -> Result<Self> {
        extruders.first().context("An export needs at least one extruder")?;
        Ok(Self {
            extruders,
            active: 0,
            previous: None,
        })
    }

    pub fn from_config(config: &PrintConfig) -> Result<Self> {
        Self::new(Extruder::from_config(config))
    }

    pub fn extruder(&self) -> &Extruder {
        &self.extruders[self.active]
    }

    pub fn extruder_mut(&mut self) -> &mut Extruder {
        &mut self.extruders[self.active]
    }

    pub fn extruders(&self) -> &[Extruder] {
        &self.extruders
    }

    /// Where the nozzle was left by the last emitted move, unset at the
    /// start of a layer group.
    pub fn previous(&self) -> Option<Pos> {
        self.previous
    }

    pub fn move_to(&mut self, pos: Pos) {
        self.previous = Some(pos);
    }

    /// Called before each layer group. The first travel of a group has no
    /// starting point.
    pub fn start_group(&mut self) {
        self.previous = None;
    }

    /// Called before an export. Extruder positions are zeroed, the
    /// filament total keeps counting.
    pub fn restart(&mut self) {
        self.previous = None;
        self.extruders.iter_mut().for_each(Extruder::restart);
    }

    /// Filament used by every extruder so far in mm.
    pub fn filament_extruded(&self) -> f64 {
        self.extruders.iter().map(Extruder::filament_extruded).sum()
    }
}
