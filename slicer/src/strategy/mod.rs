//! Named fill and support strategies. The registry is consulted once when a
//! run starts, an unknown name stops the run before anything is planned.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{bail, Result};
use common::config::PrintConfig;
use itertools::Itertools;

use crate::{layer::Layer, scene::File, schedule::LayerGroup};

mod fill;
mod skirt;
pub use fill::{scanline_fill, LineFill};
pub use skirt::{skirt_loops, Skirt};

/// Adds loops and infill to the rings of one layer.
pub trait FillStrategy {
    fn name(&self) -> &'static str;
    fn fill(&self, layer: &mut Layer, config: &PrintConfig);
}

/// Adds support paths to the layers of the whole print bed once every
/// object on it is sliced and the layers are grouped by height.
pub trait SupportStrategy {
    fn name(&self) -> &'static str;
    fn support(&self, file: &mut File, groups: &[LayerGroup], config: &PrintConfig);
}

pub struct NoFill;

pub struct NoSupport;

impl FillStrategy for NoFill {
    fn name(&self) -> &'static str {
        "none"
    }

    fn fill(&self, _layer: &mut Layer, _config: &PrintConfig) {}
}

impl SupportStrategy for NoSupport {
    fn name(&self) -> &'static str {
        "none"
    }

    fn support(&self, _file: &mut File, _groups: &[LayerGroup], _config: &PrintConfig) {}
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    fills: BTreeMap<&'static str, Arc<dyn FillStrategy>>,
    supports: BTreeMap<&'static str, Arc<dyn SupportStrategy>>,
}

impl StrategyRegistry {
    /// A registry with every strategy that ships with the planner.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register_fill(Arc::new(NoFill));
        registry.register_fill(Arc::new(LineFill));
        registry.register_support(Arc::new(NoSupport));
        registry.register_support(Arc::new(Skirt));
        registry
    }

    pub fn register_fill(&mut self, strategy: Arc<dyn FillStrategy>) {
        self.fills.insert(strategy.name(), strategy);
    }

    pub fn register_support(&mut self, strategy: Arc<dyn SupportStrategy>) {
        self.supports.insert(strategy.name(), strategy);
    }

    pub fn fill(&self, name: &str) -> Result<Arc<dyn FillStrategy>> {
        match self.fills.get(name) {
            Some(strategy) => Ok(strategy.clone()),
            None => bail!(
                "Unknown fill strategy `{name}`, expected one of: {}",
                self.fills.keys().join(", ")
            ),
        }
    }

    pub fn support(&self, name: &str) -> Result<Arc<dyn SupportStrategy>> {
        match self.supports.get(name) {
            Some(strategy) => Ok(strategy.clone()),
            None => bail!(
                "Unknown support strategy `{name}`, expected one of: {}",
                self.supports.keys().join(", ")
            ),
        }
    }
}
