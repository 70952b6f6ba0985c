//! The adaptive decay formula.
//!
//! Exponential forgetting curve with three resistance factors: access
//! stability (log-scaled access count), relation resistance (graph
//! connections), and channel diversity. Old memories accessed recently get a
//! recency boost, and nothing ever decays below `min_retention` of its
//! original importance.

use crate::config::DecayConfig;

use super::MemoryType;

/// One memory's decay inputs.
#[derive(Debug, Clone)]
pub struct DecayInput {
    /// Original importance, conceptually in `[0, 1]`.
    pub importance: f64,
    /// Hours since creation. Negative means the timestamp was unparseable;
    /// the importance is then returned unchanged.
    pub hours_elapsed: f64,
    pub access_count: u64,
    /// Number of graph relations touching this memory's entity.
    pub connection_count: usize,
    /// Hours since last access, or `-1.0` when never accessed.
    pub last_access_hours: f64,
    pub memory_type: MemoryType,
    /// Distinct channels this memory was mentioned in.
    pub channel_mentions: u64,
}

impl Default for DecayInput {
    fn default() -> Self {
        Self {
            importance: 0.5,
            hours_elapsed: 0.0,
            access_count: 0,
            connection_count: 0,
            last_access_hours: -1.0,
            memory_type: MemoryType::Conversation,
            channel_mentions: 0,
        }
    }
}

/// Decay engine. Holds the (possibly dynamically tuned) parameters; the
/// per-memory state arrives in [`DecayInput`].
#[derive(Debug, Clone)]
pub struct DecayEngine {
    config: DecayConfig,
}

impl DecayEngine {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Override the tunable parameters (dynamic tuning path).
    pub fn set_rates(&mut self, base_decay_rate: f64, recency_boost: f64) {
        self.config.base_decay_rate = base_decay_rate;
        self.config.recency_boost = recency_boost;
    }

    /// Compute the decayed importance for one memory.
    ///
    /// `stability = 1 + k·ln(1 + access_count)`,
    /// `resistance = min(1, connections·k)`,
    /// `channel_boost = 1 / (1 + k·channels)`,
    /// `rate = base · type_mult · channel_boost / stability · (1 − resistance)`,
    /// `decayed = importance · e^(−rate·hours)`, boosted for old memories
    /// accessed recently, floored at `importance · min_retention`.
    pub fn calculate(&self, input: &DecayInput) -> f64 {
        if input.hours_elapsed < 0.0 {
            return input.importance;
        }

        let stability =
            1.0 + self.config.access_stability_k * (1.0 + input.access_count as f64).ln();
        let resistance =
            (input.connection_count as f64 * self.config.relation_resistance_k).min(1.0);
        let channel_boost =
            1.0 / (1.0 + self.config.channel_diversity_k * input.channel_mentions as f64);

        let effective_rate = self.config.base_decay_rate
            * input.memory_type.decay_multiplier()
            * channel_boost
            / stability
            * (1.0 - resistance);

        let mut decayed = input.importance * (-effective_rate * input.hours_elapsed).exp();

        // Recency paradox: an old memory touched within the last day is being
        // actively relied on and should resist the curve.
        if input.last_access_hours >= 0.0
            && input.hours_elapsed > self.config.recency_age_hours
            && input.last_access_hours < self.config.recency_access_hours
        {
            decayed *= self.config.recency_boost;
        }

        decayed.max(input.importance * self.config.min_retention)
    }

    /// Element-wise batch decay. Identical to calling [`calculate`] per item.
    ///
    /// [`calculate`]: DecayEngine::calculate
    pub fn calculate_batch(&self, inputs: &[DecayInput]) -> Vec<f64> {
        inputs.iter().map(|input| self.calculate(input)).collect()
    }
}

impl Default for DecayEngine {
    fn default() -> Self {
        Self::new(DecayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DecayEngine {
        DecayEngine::default()
    }

    fn input(importance: f64, hours: f64) -> DecayInput {
        DecayInput {
            importance,
            hours_elapsed: hours,
            ..DecayInput::default()
        }
    }

    #[test]
    fn fresh_memory_does_not_decay() {
        let d = engine().calculate(&input(0.8, 0.0));
        assert!((d - 0.8).abs() < 1e-12);
    }

    #[test]
    fn invalid_timestamp_returns_importance_unchanged() {
        let d = engine().calculate(&input(0.6, -5.0));
        assert!((d - 0.6).abs() < 1e-12);
    }

    #[test]
    fn importance_decreases_monotonically_with_age() {
        let e = engine();
        let day = e.calculate(&input(0.8, 24.0));
        let week = e.calculate(&input(0.8, 168.0));
        let month = e.calculate(&input(0.8, 720.0));
        assert!(day < 0.8);
        assert!(week < day);
        assert!(month < week);
    }

    #[test]
    fn access_count_slows_decay() {
        let e = engine();
        let untouched = e.calculate(&input(0.8, 500.0));
        let accessed = e.calculate(&DecayInput {
            access_count: 20,
            ..input(0.8, 500.0)
        });
        assert!(accessed > untouched);
    }

    #[test]
    fn connections_slow_decay() {
        let e = engine();
        let isolated = e.calculate(&input(0.8, 500.0));
        let connected = e.calculate(&DecayInput {
            connection_count: 5,
            ..input(0.8, 500.0)
        });
        assert!(connected > isolated);
    }

    #[test]
    fn ten_connections_saturate_resistance() {
        // resistance = min(1, 10·0.1) = 1 kills the decay rate entirely.
        let e = engine();
        let d = e.calculate(&DecayInput {
            connection_count: 10,
            ..input(0.8, 5000.0)
        });
        assert!((d - 0.8).abs() < 1e-12);
    }

    #[test]
    fn channel_diversity_slows_decay() {
        let e = engine();
        let single = e.calculate(&input(0.8, 500.0));
        let multi = e.calculate(&DecayInput {
            channel_mentions: 4,
            ..input(0.8, 500.0)
        });
        assert!(multi > single);
    }

    #[test]
    fn facts_outlast_conversations() {
        let e = engine();
        let conversation = e.calculate(&input(0.8, 800.0));
        let fact = e.calculate(&DecayInput {
            memory_type: MemoryType::Fact,
            ..input(0.8, 800.0)
        });
        let preference = e.calculate(&DecayInput {
            memory_type: MemoryType::Preference,
            ..input(0.8, 800.0)
        });
        assert!(fact > preference);
        assert!(preference > conversation);
    }

    #[test]
    fn recency_paradox_boosts_old_but_active_memory() {
        let e = engine();
        let stale = e.calculate(&DecayInput {
            last_access_hours: 100.0,
            ..input(0.8, 200.0)
        });
        let active = e.calculate(&DecayInput {
            last_access_hours: 2.0,
            ..input(0.8, 200.0)
        });
        assert!(active > stale);
        // A young memory gets no boost regardless of access recency.
        let young = e.calculate(&DecayInput {
            last_access_hours: 2.0,
            ..input(0.8, 100.0)
        });
        let young_stale = e.calculate(&DecayInput {
            last_access_hours: 50.0,
            ..input(0.8, 100.0)
        });
        assert!((young - young_stale).abs() < 1e-12);
    }

    #[test]
    fn never_accessed_gets_no_recency_boost() {
        let e = engine();
        let never = e.calculate(&input(0.8, 200.0));
        let boosted = e.calculate(&DecayInput {
            last_access_hours: 1.0,
            ..input(0.8, 200.0)
        });
        assert!(boosted > never);
    }

    #[test]
    fn retention_floor_holds_at_extreme_age() {
        let e = engine();
        let d = e.calculate(&input(0.8, 100_000.0));
        assert!((d - 0.8 * 0.3).abs() < 1e-9);
    }

    #[test]
    fn batch_matches_singles() {
        let e = engine();
        let inputs: Vec<DecayInput> = (0..8)
            .map(|i| DecayInput {
                access_count: i,
                connection_count: (i % 4) as usize,
                last_access_hours: if i % 2 == 0 { -1.0 } else { i as f64 },
                ..input(0.1 * (i + 1) as f64, 100.0 * i as f64)
            })
            .collect();
        let batch = e.calculate_batch(&inputs);
        for (single, batched) in inputs.iter().map(|x| e.calculate(x)).zip(&batch) {
            assert!((single - batched).abs() < 1e-12);
        }
        assert!(e.calculate_batch(&[]).is_empty());
    }
}
