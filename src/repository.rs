//! Data access for plot metadata and stage dimensions.
//!
//! The export pipeline never reaches a database directly; it is handed a
//! [`PlotRepository`] at construction.

use crate::error::Result;
use crate::model::{Plot, StageDimensions, StageRef};
use std::collections::HashMap;

/// Read access to the records the export pipeline needs.
#[cfg_attr(test, mockall::automock)]
pub trait PlotRepository {
    /// Fetches plot metadata, or `None` if no such plot exists.
    fn get_plot(&self, plot_id: i64) -> Result<Option<Plot>>;

    /// Fetches the stage size of a venue or user-defined venue.
    fn get_stage_dimensions(&self, stage: StageRef) -> Result<Option<StageDimensions>>;
}

impl<R: PlotRepository + ?Sized> PlotRepository for &R {
    fn get_plot(&self, plot_id: i64) -> Result<Option<Plot>> {
        (**self).get_plot(plot_id)
    }

    fn get_stage_dimensions(&self, stage: StageRef) -> Result<Option<StageDimensions>> {
        (**self).get_stage_dimensions(stage)
    }
}

/// A repository backed by in-process maps.
///
/// Used by the command-line tool, which receives its records as JSON.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    plots: HashMap<i64, Plot>,
    stages: HashMap<StageRef, StageDimensions>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plot(&mut self, plot: Plot) {
        self.plots.insert(plot.id, plot);
    }

    pub fn insert_stage(&mut self, stage: StageRef, dimensions: StageDimensions) {
        self.stages.insert(stage, dimensions);
    }

    /// Records a freshly generated snapshot name against a plot.
    ///
    /// Returns `false` if the plot is unknown.
    pub fn set_snapshot_filename(&mut self, plot_id: i64, filename: &str) -> bool {
        match self.plots.get_mut(&plot_id) {
            Some(plot) => {
                plot.snapshot_filename = Some(filename.to_string());
                true
            }
            None => false,
        }
    }
}

impl PlotRepository for InMemoryRepository {
    fn get_plot(&self, plot_id: i64) -> Result<Option<Plot>> {
        Ok(self.plots.get(&plot_id).cloned())
    }

    fn get_stage_dimensions(&self, stage: StageRef) -> Result<Option<StageDimensions>> {
        Ok(self.stages.get(&stage).copied())
    }
}
