//! Query batching under a URL byte budget
//!
//! An oversized [`ComposedQuery`] is cut into sub-queries that each pair a
//! contiguous run of device terms with a contiguous run of indicator terms.
//! Every term lands in exactly one batch, in its original order, and every
//! batch keeps the AND structure and the date filter of the source query.
//!
//! The two groups are walked side by side. Step `s` is complete once a group
//! of length `n` holds `ceil((s + 1) * n / steps)` terms, where `steps` is the
//! length of the longer group, so a shorter group is spread evenly over the
//! batches. Each group still short of its share offers its next term, and the
//! offers are judged independently against the running encoded length. A
//! term that does not fit is deferred, never dropped. A group that has met its
//! share waits for the other, so groups of equal length never drift more than
//! one term apart. When no offer fits the batch is closed and a new one started.

use std::ops::Range;

use tracing::{debug, info, warn};

use super::{ComposedQuery, quote};

/// Fixed per-term allowance for the encoded `" OR "` separator
pub const TERM_OVERHEAD: usize = 4;

const DEVICES: usize = 0;
const INDICATORS: usize = 1;

/// Estimated encoded length of one term in a batch
pub fn term_cost(term: &str) -> usize {
    urlencoding::encode(&quote(term)).len() + TERM_OVERHEAD
}

/// Splits composed queries into batches under a byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPartitioner {
    budget: usize,
    reserved: usize,
}

/// Half-open term ranges of one batch, indexed by group
type Span = [Range<usize>; 2];

struct Group<'a> {
    costs: &'a [usize],
    start: usize,
    cursor: usize,
}

impl Group<'_> {
    fn has_pending(&self) -> bool {
        self.cursor < self.costs.len()
    }

    fn taken(&self) -> usize {
        self.cursor - self.start
    }

    fn next_cost(&self) -> usize {
        self.costs[self.cursor]
    }

    /// Terms this group may hold after step `step` of `steps`
    fn target(&self, step: usize, steps: usize) -> usize {
        let len = self.costs.len();
        ((step + 1) * len).div_ceil(steps).min(len)
    }
}

impl BatchPartitioner {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            reserved: 0,
        }
    }

    /// Reserve bytes for a suffix every request carries (e.g. `&api_key=...`)
    pub fn with_reserved(mut self, reserved: usize) -> Self {
        self.reserved = reserved;
        self
    }

    /// Budget left for terms once the reserved suffix is taken off
    pub fn effective_budget(&self) -> usize {
        self.budget.saturating_sub(self.reserved)
    }

    /// Encoded-length estimate of a query's terms
    pub fn estimate(query: &ComposedQuery) -> usize {
        query
            .devices()
            .iter()
            .chain(query.indicators())
            .map(|term| term_cost(term))
            .sum()
    }

    /// Split `query` into batches that each carry both term groups
    ///
    /// Returns an empty list when either group is empty, since no batch could
    /// satisfy the AND.
    ///
    /// # Example
    ///
    /// ```
    /// use pmc_retrieval::query::{BatchPartitioner, ComposedQuery};
    ///
    /// let query = ComposedQuery::new(vec!["Hemoblast"; 20], vec!["prostatectomy"; 20]);
    /// let batches = BatchPartitioner::new(200).split(&query);
    ///
    /// assert!(batches.len() > 1);
    /// assert!(batches.iter().all(|b| !b.devices().is_empty() && !b.indicators().is_empty()));
    /// ```
    pub fn split(&self, query: &ComposedQuery) -> Vec<ComposedQuery> {
        if query.devices().is_empty() || query.indicators().is_empty() {
            warn!(
                devices = query.devices().len(),
                indicators = query.indicators().len(),
                "Cannot batch a query with an empty term group"
            );
            return Vec::new();
        }

        let device_costs: Vec<usize> = query.devices().iter().map(|t| term_cost(t)).collect();
        let indicator_costs: Vec<usize> = query.indicators().iter().map(|t| term_cost(t)).collect();

        let batches: Vec<ComposedQuery> = self
            .plan(&device_costs, &indicator_costs)
            .into_iter()
            .map(|[devices, indicators]| query.slice(devices, indicators))
            .collect();

        info!(
            batches = batches.len(),
            budget = self.effective_budget(),
            "Created query batches"
        );
        batches
    }

    fn plan(&self, device_costs: &[usize], indicator_costs: &[usize]) -> Vec<Span> {
        let budget = self.effective_budget();
        let steps = device_costs.len().max(indicator_costs.len());
        let mut groups = [
            Group {
                costs: device_costs,
                start: 0,
                cursor: 0,
            },
            Group {
                costs: indicator_costs,
                start: 0,
                cursor: 0,
            },
        ];
        let mut running = 0;
        let mut spans: Vec<Span> = Vec::new();
        let mut step = 0;

        while groups.iter().any(Group::has_pending) {
            let mut accepted = false;

            for group in groups.iter_mut() {
                if group.cursor >= group.target(step, steps) {
                    continue;
                }
                let cost = group.next_cost();
                // An empty batch takes any term, even one over budget on its own
                if running == 0 || running + cost < budget {
                    group.cursor += 1;
                    running += cost;
                    accepted = true;
                }
            }

            if groups.iter().all(|group| group.cursor >= group.target(step, steps)) {
                step += 1;
            } else if !accepted {
                // Close and finish the same step in a fresh batch
                Self::close(&mut groups, &mut running, &mut spans, budget);
            }
        }

        if running > 0 {
            Self::close(&mut groups, &mut running, &mut spans, budget);
        }

        spans
    }

    fn close(groups: &mut [Group<'_>; 2], running: &mut usize, spans: &mut Vec<Span>, budget: usize) {
        // Pair a one-sided batch with the next pending term of the empty group,
        // handing back terms of the full group until that term fits
        for empty in [DEVICES, INDICATORS] {
            let full = 1 - empty;
            if groups[empty].taken() > 0 || groups[full].taken() == 0 || !groups[empty].has_pending() {
                continue;
            }
            let cost = groups[empty].next_cost();
            while *running + cost >= budget && groups[full].taken() > 1 {
                groups[full].cursor -= 1;
                *running -= groups[full].next_cost();
            }
            groups[empty].cursor += 1;
            *running += cost;
        }

        let span: Span = [
            groups[DEVICES].start..groups[DEVICES].cursor,
            groups[INDICATORS].start..groups[INDICATORS].cursor,
        ];
        let costs = [groups[DEVICES].costs, groups[INDICATORS].costs];

        for group in groups.iter_mut() {
            group.start = group.cursor;
        }
        *running = 0;

        if span.iter().all(|range| !range.is_empty()) {
            debug!(devices = ?span[DEVICES], indicators = ?span[INDICATORS], "Closed batch");
            spans.push(span);
        } else if span.iter().any(|range| !range.is_empty()) {
            Self::attach_leftover(span, costs, spans, budget);
        }
    }

    /// Place terms left over after the opposite group ran out
    ///
    /// Borrows the last term of the exhausted group from the previous batch
    /// when that batch can spare one and the result fits; otherwise folds the
    /// leftovers into the previous batch, over budget.
    fn attach_leftover(mut span: Span, costs: [&[usize]; 2], spans: &mut Vec<Span>, budget: usize) {
        let missing = if span[DEVICES].is_empty() { DEVICES } else { INDICATORS };
        let present = 1 - missing;

        let Some(previous) = spans.last_mut() else {
            warn!(terms = span[present].len(), "Discarding batch with a single term group");
            return;
        };

        let span_cost: usize = costs[present][span[present].clone()].iter().sum();
        let borrow_at = previous[missing].end - 1;
        if previous[missing].len() > 1 && span_cost + costs[missing][borrow_at] < budget {
            previous[missing].end = borrow_at;
            span[missing] = borrow_at..borrow_at + 1;
            debug!(devices = ?span[DEVICES], indicators = ?span[INDICATORS], "Closed rebalanced batch");
            spans.push(span);
            return;
        }

        warn!(
            terms = span[present].len(),
            "Folding leftover terms into the final batch; it may exceed the budget"
        );
        previous[present].end = span[present].end;
    }
}

/// Split a rendered query string into batch query strings
///
/// A string that cannot be read back as two AND-joined groups is returned
/// unchanged as the only batch.
///
/// # Example
///
/// ```
/// use pmc_retrieval::query::split_query;
///
/// let query = r#"("Hemoblast" OR "Gelfoam")"#;
/// assert_eq!(split_query(query, 1000, 0), vec![query.to_string()]);
/// ```
pub fn split_query(query: &str, budget: usize, reserved: usize) -> Vec<String> {
    match ComposedQuery::parse(query) {
        Ok(parsed) => BatchPartitioner::new(budget)
            .with_reserved(reserved)
            .split(&parsed)
            .iter()
            .map(ComposedQuery::render)
            .collect(),
        Err(err) => {
            debug!(error = %err, "Query not splittable, keeping it whole");
            vec![query.to_string()]
        }
    }
}
