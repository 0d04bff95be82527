//! Shapes store rows into [`OrderView`]s.
//!
//! Three row sources need assembling:
//! - flat rows, one per line with the order's scalars repeated, are
//!   regrouped by a composite key of the order scalars
//! - entity-joined rows are collapsed by order identity, with the line id
//!   deciding whether a line was already seen
//! - one-row-per-order headers get children attached from a separate lookup
//!
//! All three run in one pass, keep orders in first-seen order and keep
//! items in arrival order.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::rows::{FlatOrderRow, OrderLineJoinRecord};
use crate::views::{OrderItemView, OrderSummaryView, OrderView};
use crate::ReadModelError;

/// Insertion-ordered grouping of values under keys
struct Grouping<K, V> {
    slots: HashMap<K, usize>,
    groups: Vec<(K, Vec<V>)>,
}

impl<K: Hash + Eq + Clone, V> Grouping<K, V> {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            groups: Vec::new(),
        }
    }

    /// Slot for `key`, registering it at the end on first sight
    fn slot(&mut self, key: K) -> usize {
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        let slot = self.groups.len();
        self.slots.insert(key.clone(), slot);
        self.groups.push((key, Vec::new()));
        slot
    }

    fn push(&mut self, slot: usize, value: V) {
        self.groups[slot].1.push(value);
    }

    fn into_groups(self) -> Vec<(K, Vec<V>)> {
        self.groups
    }
}

/// Regroup flat rows into nested views.
///
/// Rows are keyed by the full set of order scalars, so two rows only merge
/// when every root field agrees. Two distinct keys sharing an order id mean
/// the upstream join is corrupt and fail the whole assembly.
pub fn regroup_flat_rows<I>(rows: I) -> Result<Vec<OrderView>, ReadModelError>
where
    I: IntoIterator<Item = FlatOrderRow>,
{
    let mut grouping: Grouping<OrderSummaryView, OrderItemView> = Grouping::new();
    let mut slot_by_id: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let (summary, item) = row.into_parts()?;
        let order_id = summary.order_id();
        let slot = grouping.slot(summary);

        match slot_by_id.get(&order_id) {
            Some(&known) if known != slot => {
                let first = &grouping.groups[known].0;
                let other = &grouping.groups[slot].0;
                return Err(scalar_mismatch(first, other));
            }
            Some(_) => {}
            None => {
                slot_by_id.insert(order_id, slot);
            }
        }

        if let Some(item) = item {
            grouping.push(slot, item);
        }
    }

    Ok(grouping
        .into_groups()
        .into_iter()
        .map(|(summary, items)| OrderView::new(summary, items))
        .collect())
}

/// Collapse entity-joined rows to one view per order identity.
///
/// Repeated order columns must agree across rows; a line id seen twice is
/// the same line and is kept once.
pub fn collapse_joined_rows<I>(rows: I) -> Result<Vec<OrderView>, ReadModelError>
where
    I: IntoIterator<Item = OrderLineJoinRecord>,
{
    let mut grouping: Grouping<i64, OrderItemView> = Grouping::new();
    let mut summaries: Vec<OrderSummaryView> = Vec::new();
    let mut seen_lines: HashSet<i64> = HashSet::new();

    for row in rows {
        let slot = grouping.slot(row.order.order_id);
        let summary = row.order.summary();
        if slot == summaries.len() {
            summaries.push(summary);
        } else if summaries[slot] != summary {
            return Err(scalar_mismatch(&summaries[slot], &summary));
        }

        if let Some((line_id, item)) = row.line()? {
            if seen_lines.insert(line_id) {
                grouping.push(slot, item);
            }
        }
    }

    Ok(summaries
        .into_iter()
        .zip(grouping.into_groups())
        .map(|(summary, (_, items))| OrderView::new(summary, items))
        .collect())
}

/// Attach children looked up by order id to one-row-per-order summaries,
/// keeping the summaries' order. Summaries without children get no items.
pub fn attach_items<I>(summaries: Vec<OrderSummaryView>, children: I) -> Vec<OrderView>
where
    I: IntoIterator<Item = (i64, OrderItemView)>,
{
    let mut by_order: HashMap<i64, Vec<OrderItemView>> = HashMap::with_capacity(summaries.len());
    for (order_id, item) in children {
        by_order.entry(order_id).or_default().push(item);
    }

    summaries
        .into_iter()
        .map(|summary| {
            let items = by_order.remove(&summary.order_id()).unwrap_or_default();
            OrderView::new(summary, items)
        })
        .collect()
}

fn scalar_mismatch(first: &OrderSummaryView, other: &OrderSummaryView) -> ReadModelError {
    let field = first.differing_field(other).unwrap_or("unknown");
    ReadModelError::AssemblyInvariantViolation {
        order_id: first.order_id(),
        detail: format!("rows disagree on {}", field),
    }
}
