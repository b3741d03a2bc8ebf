use std::collections::BTreeMap;

/// Decides the order in which queues are polled.
///
/// With strict priority the order never changes: highest weight first, ties
/// broken by name. Otherwise the queue polled first is picked by smooth
/// weighted round-robin, so over one full cycle each queue leads in
/// proportion to its weight without long runs of the same leader. The
/// remaining queues follow by weight so no queue is starved while the leader
/// is empty.
#[derive(Debug, Clone)]
pub struct QueueSelector {
    by_weight: Vec<String>,
    weights: Vec<i64>,
    current: Vec<i64>,
    total: i64,
    strict: bool,
}

impl QueueSelector {
    /// Create a selector for `queues`, names mapped to weights
    pub fn new(queues: &BTreeMap<String, u32>, strict: bool) -> Self {
        let mut weighted: Vec<(&String, u32)> = queues
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .map(|(name, weight)| (name, *weight))
            .collect();
        weighted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let weights: Vec<i64> = weighted.iter().map(|(_, weight)| i64::from(*weight)).collect();
        Self {
            by_weight: weighted.into_iter().map(|(name, _)| name.clone()).collect(),
            current: vec![0; weights.len()],
            total: weights.iter().sum(),
            weights,
            strict,
        }
    }

    /// The queue order for the next poll
    pub fn next_order(&mut self) -> Vec<String> {
        if self.strict || self.by_weight.is_empty() {
            return self.by_weight.clone();
        }
        let mut lead = 0;
        for idx in 0..self.current.len() {
            self.current[idx] += self.weights[idx];
            if self.current[idx] > self.current[lead] {
                lead = idx;
            }
        }
        self.current[lead] -= self.total;

        let mut order = Vec::with_capacity(self.by_weight.len());
        order.push(self.by_weight[lead].clone());
        order.extend(
            self.by_weight
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != lead)
                .map(|(_, name)| name.clone()),
        );
        order
    }
}
