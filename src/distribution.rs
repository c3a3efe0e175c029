use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::models::{CodeCount, CodeStats, Cohort, CountShare, Distribution, Prong, Severity};

/// Percentage of `count` in `total`; zero when `total` is zero.
pub fn safe_ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

pub fn compute_distribution(cohort: &Cohort) -> Distribution {
    let total = cohort.members.len();
    let mut by_code: BTreeMap<String, CodeStats> = BTreeMap::new();
    let mut severity_counts: BTreeMap<Severity, usize> =
        Severity::ALL.into_iter().map(|severity| (severity, 0)).collect();
    let mut prong_counts: BTreeMap<Prong, usize> =
        Prong::ALL.into_iter().map(|prong| (prong, 0)).collect();

    for record in &cohort.members {
        let entry = by_code.entry(record.taxonomy_code.clone()).or_default();
        entry.count += 1;
        *entry.severity_breakdown.entry(record.severity).or_insert(0) += 1;
        *severity_counts.entry(record.severity).or_insert(0) += 1;

        if let Some(prong) = record.prong_affected {
            *entry.prong_breakdown.entry(prong).or_insert(0) += 1;
            *prong_counts.entry(prong).or_insert(0) += 1;
        }
    }

    for stats in by_code.values_mut() {
        stats.percentage = safe_ratio(stats.count, total);
    }

    Distribution {
        cohort_key: cohort.key.clone(),
        total,
        by_code,
        by_severity: shares(severity_counts, total),
        by_prong: shares(prong_counts, total),
    }
}

/// Distributions for every cohort, in the order given. Cohorts are independent,
/// so the counting fans out across the rayon pool.
pub fn compute_distributions<'a, I>(cohorts: I) -> Vec<Distribution>
where
    I: IntoIterator<Item = &'a Cohort>,
{
    let cohorts: Vec<&Cohort> = cohorts.into_iter().collect();
    cohorts
        .into_par_iter()
        .map(compute_distribution)
        .collect()
}

/// Most frequent codes, ties broken by code.
pub fn top_codes(distribution: &Distribution, limit: usize) -> Vec<CodeCount> {
    let mut codes: Vec<CodeCount> = distribution
        .by_code
        .iter()
        .map(|(code, stats)| CodeCount {
            code: code.clone(),
            count: stats.count,
        })
        .collect();
    codes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    codes.truncate(limit);
    codes
}

fn shares<K: Ord>(counts: BTreeMap<K, usize>, total: usize) -> BTreeMap<K, CountShare> {
    counts
        .into_iter()
        .map(|(key, count)| {
            (
                key,
                CountShare {
                    count,
                    percentage: safe_ratio(count, total),
                },
            )
        })
        .collect()
}
