//! One frame's worth of binned objects

use super::CullBinManager;
use crate::context::RenderContext;
use crate::foundation::profiling::PhaseCollector;
use crate::pgraph::{CullHandler, GraphicsStateGuardian, ObjectChain};

/// Totals for one draw pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawSummary {
    /// Chains drawn across all active bins
    pub chains_drawn: usize,
    /// Bins that were drawn
    pub bins_drawn: usize,
    /// Chains that were binned but skipped because their bin is inactive
    pub chains_skipped: usize,
    /// Canonical states and transforms released after the frame
    pub states_freed: usize,
}

/// Cull handler that sorts objects into bins and draws them
///
/// Borrowed for one frame: record during traversal, then call
/// [`CullResult::draw`]. Starting a frame discards anything an earlier,
/// undrawn frame left in the bins; drawing empties the bins and releases
/// states nothing refers to any more.
pub struct CullResult<'a> {
    bins: &'a mut CullBinManager,
    gsg: &'a mut dyn GraphicsStateGuardian,
    ctx: &'a RenderContext,
    bin_collectors: Vec<PhaseCollector>,
    recorded: usize,
    unrouted: usize,
}

impl<'a> CullResult<'a> {
    /// Start a frame
    pub fn new(
        bins: &'a mut CullBinManager,
        gsg: &'a mut dyn GraphicsStateGuardian,
        ctx: &'a RenderContext,
    ) -> Self {
        let stale = bins.num_objects();
        if stale > 0 {
            log::debug!("Discarding {} chains left over from an undrawn frame", stale);
            bins.clear_all();
        }
        let profiler = ctx.profiler();
        let bin_collectors = (0..bins.len())
            .filter_map(|index| bins.bin(index))
            .map(|bin| profiler.collector(&format!("Cull:Bins:{}", bin.name())))
            .collect();
        Self {
            bins,
            gsg,
            ctx,
            bin_collectors,
            recorded: 0,
            unrouted: 0,
        }
    }

    /// Chains received so far
    pub const fn num_recorded(&self) -> usize {
        self.recorded
    }

    /// Chains that found no bin (the table is empty)
    pub const fn num_unrouted(&self) -> usize {
        self.unrouted
    }

    /// Bin table this frame writes into
    pub fn bins(&self) -> &CullBinManager {
        self.bins
    }

    /// Sort every bin, draw the active ones in priority order, then clear all
    pub fn draw(self) -> DrawSummary {
        let profiler = self.ctx.profiler();
        {
            let sort = profiler.collector("Cull:Sort");
            let _timer = sort.start();
            self.bins.finish_cull();
        }

        let mut summary = DrawSummary::default();
        for &index in self.bins.bins_in_sort_order() {
            let Some(bin) = self.bins.bin(index) else {
                continue;
            };
            if !self.bins.is_active(index) {
                summary.chains_skipped += bin.len();
                continue;
            }
            if bin.is_empty() {
                continue;
            }
            let collector = profiler.collector(&format!("Draw:{}", bin.name()));
            let _timer = collector.start();
            let drawn = bin.draw(&mut *self.gsg);
            collector.add_level(drawn as u64);
            summary.chains_drawn += drawn;
            summary.bins_drawn += 1;
        }

        self.bins.clear_all();
        summary.states_freed = self.ctx.states().collect_garbage();
        log::trace!(
            "Drew {} chains from {} bins ({} skipped)",
            summary.chains_drawn,
            summary.bins_drawn,
            summary.chains_skipped
        );
        summary
    }
}

impl CullHandler for CullResult<'_> {
    fn record_object(&mut self, chain: ObjectChain) {
        self.recorded += 1;
        let Some(index) = self.bins.bin_index_for(&chain.base.state) else {
            self.unrouted += 1;
            return;
        };
        if let Some(bin) = self.bins.bin_mut(index) {
            if let Some(collector) = self.bin_collectors.get(index) {
                collector.add_level(1);
            }
            bin.add_object(chain, &*self.gsg);
        }
    }
}
