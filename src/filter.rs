use std::collections::HashSet;

use tracing::debug;

use crate::criteria::{FilterCriteria, TargetCategory};
use crate::models::{ProductRecord, UsageMatch};

/// Why usages were left out, for the run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub not_organic: usize,
    pub other_crop: usize,
    pub other_target: usize,
    pub not_authorized: usize,
    pub duplicates: usize,
}

pub struct FilterResult<'a> {
    pub matches: Vec<UsageMatch<'a>>,
    pub stats: FilterStats,
}

/// Keep the usages of organic products that target one of the accepted vine
/// pests or diseases. Source order is preserved; when several usages of a
/// product land on the same target, the first one wins.
pub fn filter_products<'a>(
    products: &'a [ProductRecord],
    criteria: &FilterCriteria,
) -> FilterResult<'a> {
    let mut matches = Vec::new();
    let mut stats = FilterStats::default();
    let mut seen: HashSet<(&str, TargetCategory)> = HashSet::new();

    for product in products {
        if !criteria.is_organic(&product.mentions) {
            stats.not_organic += product.usages.len();
            continue;
        }
        for usage in &product.usages {
            if !criteria.matches_crop(&usage.crop) {
                stats.other_crop += 1;
                continue;
            }
            let Some(target) = criteria.target_category(&usage.target) else {
                stats.other_target += 1;
                continue;
            };
            if !criteria.is_authorized(&usage.status) {
                stats.not_authorized += 1;
                continue;
            }
            if !seen.insert((product.id.as_str(), target)) {
                debug!(product = %product.id, usage = %usage.usage_id, line = usage.line, %target, "duplicate usage ignored");
                stats.duplicates += 1;
                continue;
            }
            matches.push(UsageMatch {
                product,
                usage,
                target,
            });
        }
    }

    FilterResult { matches, stats }
}
