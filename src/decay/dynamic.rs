//! Per-user dynamic decay tuning.
//!
//! Tracks user behavior (hourly activity, latency, tool usage, session
//! length), detects peak activity hours, scores engagement, and derives
//! clamped overrides for the decay base rate and recency boost. Feature-gated
//! through config; when disabled every function returns neutral defaults.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DynamicDecayConfig;

/// Safety bounds for the tuned parameters.
const BASE_RATE_MIN: f64 = 0.0005;
const BASE_RATE_MAX: f64 = 0.002;
const RECENCY_BOOST_MIN: f64 = 1.1;
const RECENCY_BOOST_MAX: f64 = 1.5;

/// Observed behavior for one user, maintained as EMAs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehaviorMetrics {
    /// Activity rate per hour of day, 24 buckets.
    pub hourly_activity_rate: Vec<f64>,
    pub avg_latency_ms: f64,
    pub tool_usage_frequency: f64,
    /// Seconds.
    pub session_duration_avg: f64,
    pub daily_active_hours: f64,
    pub peak_hours: Vec<usize>,
    pub engagement_score: f64,
}

impl Default for UserBehaviorMetrics {
    fn default() -> Self {
        Self {
            hourly_activity_rate: vec![0.0; 24],
            avg_latency_ms: 1000.0,
            tool_usage_frequency: 0.0,
            session_duration_avg: 600.0,
            daily_active_hours: 4.0,
            peak_hours: Vec::new(),
            engagement_score: 0.5,
        }
    }
}

/// Tuned decay parameters derived from behavior metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DynamicDecayParams {
    pub base_rate: f64,
    pub recency_boost: f64,
}

impl Default for DynamicDecayParams {
    fn default() -> Self {
        Self {
            base_rate: 0.001,
            recency_boost: 1.3,
        }
    }
}

/// Time-weighted exponential moving average. The weight of a new observation
/// grows with the hours elapsed since the previous update, with a 6-hour
/// characteristic window.
pub fn update_ema(current: f64, new_value: f64, alpha: f64, hours_elapsed: f64) -> f64 {
    let time_weight = 1.0 - (1.0 - alpha).powf(hours_elapsed / 6.0);
    current * (1.0 - time_weight) + new_value * time_weight
}

/// Hours whose activity rate is strictly above `mean + 0.5·stddev`.
///
/// Returns empty for a distribution that is not 24 buckets, has zero total
/// activity, or is perfectly uniform.
pub fn detect_peak_hours(hourly_rate: &[f64]) -> Vec<usize> {
    if hourly_rate.len() != 24 {
        return Vec::new();
    }
    let total: f64 = hourly_rate.iter().sum();
    if total == 0.0 {
        return Vec::new();
    }
    let mean = total / 24.0;
    let variance = hourly_rate.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 24.0;
    let threshold = mean + 0.5 * variance.sqrt();
    hourly_rate
        .iter()
        .enumerate()
        .filter(|(_, &rate)| rate > threshold)
        .map(|(h, _)| h)
        .collect()
}

/// Engagement in `[0, 1]` from session length, tool usage, and latency.
pub fn calculate_engagement(metrics: &UserBehaviorMetrics) -> f64 {
    let duration_score = (metrics.session_duration_avg / 1800.0).min(1.0);
    let tool_score = (metrics.tool_usage_frequency / 5.0).min(1.0);
    let latency_score = ((5000.0 - metrics.avg_latency_ms) / 4500.0).clamp(0.0, 1.0);
    (duration_score + tool_score + latency_score) / 3.0
}

/// Derive tuned decay parameters. More daily activity pushes the base rate
/// up (an active user generates more low-value memories); higher engagement
/// widens the recency boost. Both outputs are hard-clamped.
pub fn calculate_dynamic_params(
    metrics: &UserBehaviorMetrics,
    base_rate: f64,
) -> DynamicDecayParams {
    let activity_level = (metrics.daily_active_hours / 16.0).min(1.0);
    let rate_multiplier = 0.8 + activity_level * 0.4;
    DynamicDecayParams {
        base_rate: (base_rate * rate_multiplier).clamp(BASE_RATE_MIN, BASE_RATE_MAX),
        recency_boost: (1.1 + metrics.engagement_score * 0.4)
            .clamp(RECENCY_BOOST_MIN, RECENCY_BOOST_MAX),
    }
}

/// Memories last accessed during a peak hour count one extra access,
/// slowing their decay.
pub fn apply_circadian_stability(
    access_count: u64,
    last_accessed_hour: usize,
    peak_hours: &[usize],
) -> u64 {
    if peak_hours.contains(&last_accessed_hour) {
        access_count + 1
    } else {
        access_count
    }
}

/// Feature-gated tuner. When disabled, [`params`](DynamicDecayTuner::params)
/// returns the neutral defaults and metrics updates are no-ops.
pub struct DynamicDecayTuner {
    config: DynamicDecayConfig,
    metrics: UserBehaviorMetrics,
}

impl DynamicDecayTuner {
    pub fn new(config: DynamicDecayConfig) -> Self {
        Self {
            config,
            metrics: UserBehaviorMetrics::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn metrics(&self) -> &UserBehaviorMetrics {
        &self.metrics
    }

    /// Fold one observed interaction into the EMAs and refresh derived state.
    pub fn record_interaction(
        &mut self,
        latency_ms: f64,
        tools_used: f64,
        session_secs: f64,
        hour_of_day: usize,
        hours_since_last: f64,
    ) {
        if !self.config.enabled {
            return;
        }
        let alpha = self.config.ema_alpha;
        self.metrics.avg_latency_ms =
            update_ema(self.metrics.avg_latency_ms, latency_ms, alpha, hours_since_last);
        self.metrics.tool_usage_frequency = update_ema(
            self.metrics.tool_usage_frequency,
            tools_used,
            alpha,
            hours_since_last,
        );
        self.metrics.session_duration_avg = update_ema(
            self.metrics.session_duration_avg,
            session_secs,
            alpha,
            hours_since_last,
        );
        if hour_of_day < 24 {
            self.metrics.hourly_activity_rate[hour_of_day] += 1.0;
        }
        self.metrics.peak_hours = detect_peak_hours(&self.metrics.hourly_activity_rate);
        self.metrics.engagement_score = calculate_engagement(&self.metrics);
        debug!(
            engagement = self.metrics.engagement_score,
            peak_hours = self.metrics.peak_hours.len(),
            "behavior metrics updated"
        );
    }

    /// Current tuned parameters, or neutral defaults when disabled.
    pub fn params(&self, base_rate: f64) -> DynamicDecayParams {
        if !self.config.enabled {
            return DynamicDecayParams::default();
        }
        calculate_dynamic_params(&self.metrics, base_rate)
    }

    /// Effective access count after circadian adjustment. Pass-through when
    /// disabled or when no peak hours are known yet.
    pub fn effective_access_count(&self, access_count: u64, last_accessed_hour: usize) -> u64 {
        if !self.config.enabled {
            return access_count;
        }
        apply_circadian_stability(access_count, last_accessed_hour, &self.metrics.peak_hours)
    }
}
