use std::collections::VecDeque;

use crate::error::StrategyError;
use crate::models::{Decision, Direction};
use crate::Result;

/// Sliding record of directional breakout events
///
/// Each entry pairs the bar index at which a breakout fired with its signed
/// signal. Entries are evicted from the oldest end once the span between the
/// newest and oldest index exceeds the retention limit; the running sum of the
/// retained signals gives the net directional bias.
#[derive(Debug, Clone, Default)]
pub struct SignalWindow {
    indices: VecDeque<u64>,
    signals: VecDeque<i64>,
    net: i64,
}

impl SignalWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a breakout event
    ///
    /// # Arguments
    /// * `bar_index` - Bar number of the event, strictly greater than the last one
    /// * `direction` - Long records +1, short records -1
    ///
    /// # Errors
    /// `NonMonotonicIndex` if `bar_index` does not advance; the window is left untouched.
    pub fn record(&mut self, bar_index: u64, direction: Direction) -> Result<()> {
        if let Some(&last) = self.indices.back() {
            if bar_index <= last {
                return Err(StrategyError::NonMonotonicIndex {
                    last,
                    index: bar_index,
                });
            }
        }

        let signal = direction.sign();
        self.indices.push_back(bar_index);
        self.signals.push_back(signal);
        self.net += signal;

        Ok(())
    }

    /// Drop the oldest entries while the span exceeds `count_limit`
    ///
    /// A span equal to the limit is kept. Returns the number of entries removed.
    pub fn evict_expired(&mut self, count_limit: u64) -> usize {
        let mut evicted = 0;

        while let (Some(&first), Some(&last)) = (self.indices.front(), self.indices.back()) {
            if last - first <= count_limit {
                break;
            }

            self.indices.pop_front();
            if let Some(signal) = self.signals.pop_front() {
                self.net -= signal;
            }
            evicted += 1;
        }

        evicted
    }

    /// Record an event and evict in one step
    pub fn record_and_evict(
        &mut self,
        bar_index: u64,
        direction: Direction,
        count_limit: u64,
    ) -> Result<usize> {
        self.record(bar_index, direction)?;
        Ok(self.evict_expired(count_limit))
    }

    /// Sum of retained signals (0 when empty)
    pub fn net_signal(&self) -> i64 {
        self.net
    }

    pub fn decide(&self, threshold: i64) -> Decision {
        let net = self.net_signal();
        if net > threshold {
            Decision::Long
        } else if net < -threshold {
            Decision::Short
        } else {
            Decision::Neutral
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Span between newest and oldest retained index
    pub fn span(&self) -> u64 {
        match (self.indices.front(), self.indices.back()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }

    pub fn indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.indices.iter().copied()
    }

    pub fn signals(&self) -> impl Iterator<Item = i64> + '_ {
        self.signals.iter().copied()
    }
}
