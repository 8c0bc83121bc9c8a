//! Query building
//!
//! Translates host predicates and column requests into OData query options.
//!
//! # Overview
//!
//! - `build_filter` - `$filter` from column quals or a raw filter override
//! - `clamp_page_size` - `$top` bounded by the endpoint maximum
//! - `project` - `$select` / `$expand` from requested columns

mod filter;
mod projection;

pub use filter::{build_filter, clamp_page_size, FilterPlan, Operator, PredicateSet, Qual};
pub use projection::{project, Projection};
