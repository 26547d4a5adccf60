//! Downstream reductions over a [`FilteredView`](crate::data::filter::FilteredView):
//! grouped aggregates and chart summaries in [`aggregate`], pairwise
//! statistics in [`correlation`].

pub mod aggregate;
pub mod correlation;
