//! Per-site binding caches. A site keeps its most recent binding; a call
//! whose arguments fail that binding's guard binds afresh and installs the
//! result with a compare-and-swap against the binding it observed. Binding
//! itself runs without any lock held.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use lb_core::{debug, trace, Context, Result, Value};

use crate::callsite::{Binding, CallBinder};
use crate::fields::{FieldBinder, FieldBinding, FieldOutput, FieldRequest, FieldShape};
use crate::shape::{CallArg, CallSiteShape};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    /// Successful binds, installed or not.
    pub binds: usize,
    /// Installation attempts that lost the race to another thread.
    pub lost_races: usize,
}

/// Holds one installed binding. Loads and installs are atomic and take no
/// lock.
pub struct BindingSlot<B> {
    current: ArcSwapOption<B>,
    binds: AtomicUsize,
    lost_races: AtomicUsize,
}

impl<B> Default for BindingSlot<B> {
    fn default() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            binds: AtomicUsize::new(0),
            lost_races: AtomicUsize::new(0),
        }
    }
}

impl<B> BindingSlot<B> {
    pub fn load(&self) -> Option<Arc<B>> {
        self.current.load_full()
    }

    /// Installs `fresh` if the slot still holds `expected`. On failure the
    /// binding another thread installed is returned.
    pub fn compare_and_swap(
        &self,
        expected: &Option<Arc<B>>,
        fresh: Arc<B>,
    ) -> std::result::Result<Arc<B>, Option<Arc<B>>> {
        let previous = self
            .current
            .compare_and_swap(expected, Some(Arc::clone(&fresh)));
        let previous: &Option<Arc<B>> = &previous;
        let unchanged = match (previous, expected) {
            (None, None) => true,
            (Some(previous), Some(expected)) => Arc::ptr_eq(previous, expected),
            _ => false,
        };
        if unchanged {
            Ok(fresh)
        } else {
            Err(previous.clone())
        }
    }

    /// Installs a binding made after `observed` failed its guard and returns
    /// the binding to run. A losing binding is discarded when the winner fits
    /// the call; otherwise it is installed over the winner.
    pub fn install(
        &self,
        mut observed: Option<Arc<B>>,
        fresh: Arc<B>,
        fits: impl Fn(&B) -> bool,
    ) -> Arc<B> {
        self.binds.fetch_add(1, Ordering::Relaxed);
        loop {
            match self.compare_and_swap(&observed, Arc::clone(&fresh)) {
                Ok(installed) => return installed,
                Err(winner) => {
                    self.lost_races.fetch_add(1, Ordering::Relaxed);
                    match winner {
                        Some(winner) if fits(&winner) => {
                            debug!("lost binding race, running the installed binding");
                            return winner;
                        }
                        other => observed = other,
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> SiteStats {
        SiteStats {
            binds: self.binds.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
        }
    }
}

/// A call site: its shape plus the cached binding.
pub struct CallSite {
    shape: CallSiteShape,
    slot: BindingSlot<Binding>,
}

impl CallSite {
    pub fn new(shape: CallSiteShape) -> Self {
        Self {
            shape,
            slot: BindingSlot::default(),
        }
    }

    pub fn shape(&self) -> &CallSiteShape {
        &self.shape
    }

    pub fn current(&self) -> Option<Arc<Binding>> {
        self.slot.load()
    }

    pub fn stats(&self) -> SiteStats {
        self.slot.stats()
    }

    pub fn invoke(&self, ctx: &Context, args: &[CallArg]) -> Result<Value> {
        let observed = self.slot.load();
        if let Some(binding) = &observed {
            if binding.applies(ctx, args) {
                return binding.invoke(ctx, args);
            }
        }

        let fresh = Arc::new(CallBinder::new(ctx, &self.shape, args).bind()?);
        let binding = self
            .slot
            .install(observed, fresh, |winner| winner.applies(ctx, args));
        trace!(site = %binding.summary().site, "running bound call site");
        binding.invoke(ctx, args)
    }
}

/// A member access site.
pub struct FieldSite {
    shape: FieldShape,
    slot: BindingSlot<FieldBinding>,
}

impl FieldSite {
    pub fn new(shape: FieldShape) -> Self {
        Self {
            shape,
            slot: BindingSlot::default(),
        }
    }

    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    pub fn stats(&self) -> SiteStats {
        self.slot.stats()
    }

    pub fn access(&self, ctx: &Context, request: FieldRequest<'_>) -> Result<FieldOutput> {
        let observed = self.slot.load();
        if let Some(binding) = &observed {
            if binding.applies(ctx, &request) {
                return binding.execute(ctx, request);
            }
        }
        let fresh = Arc::new(FieldBinder::new(ctx, &self.shape).bind(&request)?);
        let binding = self
            .slot
            .install(observed, fresh, |winner| winner.applies(ctx, &request));
        binding.execute(ctx, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loser_runs_a_fitting_winner() {
        let slot = BindingSlot::<i64>::default();
        let winner = Arc::new(1);
        slot.compare_and_swap(&None, Arc::clone(&winner)).unwrap();

        let ran = slot.install(None, Arc::new(2), |_| true);
        assert!(Arc::ptr_eq(&ran, &winner));
        assert_eq!(slot.stats(), SiteStats { binds: 1, lost_races: 1 });
    }

    #[test]
    fn loser_installs_over_a_winner_that_does_not_fit() {
        let slot = BindingSlot::<i64>::default();
        slot.compare_and_swap(&None, Arc::new(1)).unwrap();

        let ran = slot.install(None, Arc::new(2), |installed| *installed == 2);
        assert_eq!(*ran, 2);
        assert_eq!(slot.load().as_deref(), Some(&2));
        assert_eq!(slot.stats().lost_races, 1);
    }
}
