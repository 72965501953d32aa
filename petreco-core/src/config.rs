//! Pipeline configuration.
//!
//! One struct per stage, each with defaults, fluent setters and a
//! `validate()` that fails fast. [`PipelineConfig::from_params`] reads the
//! flat key/value form used by analysis option files.
#![allow(clippy::doc_markdown, clippy::missing_errors_doc)]

use crate::error::ConfigError;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn check_non_negative(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { key });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative { key, value });
    }
    Ok(())
}

fn check_range(key: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(ConfigError::NonFinite { key });
    }
    if min > max {
        return Err(ConfigError::InvalidRange { key, min, max });
    }
    Ok(())
}

/// Signal assembly limits and the time-window bounds edges must fall in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SignalConfig {
    /// Largest leading-to-trailing distance on one threshold (ps).
    pub max_edge_separation_ps: i64,
    /// Largest leading-to-trailing distance when borrowing the trailing
    /// edge of the next threshold up (ps).
    pub max_lead_trail_separation_ps: i64,
    /// Width of a DAQ time window (ps).
    pub window_width_ps: i64,
    /// Timestamp at which a time window ends (ps).
    pub window_end_ps: i64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            max_edge_separation_ps: 20_000,
            max_lead_trail_separation_ps: 300_000,
            window_width_ps: 1_000_000,
            window_end_ps: 0,
        }
    }
}

impl SignalConfig {
    /// Sets the same-threshold separation limit.
    #[must_use]
    pub fn with_max_edge_separation(mut self, ps: i64) -> Self {
        self.max_edge_separation_ps = ps;
        self
    }

    /// Sets the cross-threshold separation limit.
    #[must_use]
    pub fn with_max_lead_trail_separation(mut self, ps: i64) -> Self {
        self.max_lead_trail_separation_ps = ps;
        self
    }

    /// Sets the window bounds to `[end - width, end]`.
    #[must_use]
    pub fn with_window(mut self, width_ps: i64, end_ps: i64) -> Self {
        self.window_width_ps = width_ps;
        self.window_end_ps = end_ps;
        self
    }

    /// First timestamp accepted in a window.
    #[must_use]
    pub fn window_start_ps(&self) -> i64 {
        self.window_end_ps - self.window_width_ps
    }

    /// Returns true if a timestamp lies within `[start, end]`.
    #[must_use]
    pub fn contains(&self, time_ps: i64) -> bool {
        (self.window_start_ps()..=self.window_end_ps).contains(&time_ps)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("max_edge_separation_ps", self.max_edge_separation_ps),
            (
                "max_lead_trail_separation_ps",
                self.max_lead_trail_separation_ps,
            ),
            ("window_width_ps", self.window_width_ps),
        ] {
            if value < 0 {
                return Err(ConfigError::Negative {
                    key,
                    value: value as f64,
                });
            }
        }
        Ok(())
    }
}

/// How side-A and side-B signals of one strip are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MatchPolicy {
    /// Every A/B combination inside the window becomes a hit; a signal can
    /// take part in several hits.
    #[default]
    AllPairs,
    /// Each signal is used at most once; closest pairs are taken first.
    NearestExclusive,
}

impl FromStr for MatchPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_pairs" => Ok(Self::AllPairs),
            "nearest_exclusive" => Ok(Self::NearestExclusive),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Hit building parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct HitConfig {
    /// A/B coincidence window (ps). Required to be non-negative.
    pub coincidence_window_ps: f64,
    /// Effective light propagation velocity in the strip (cm/ns).
    pub effective_velocity_cm_per_ns: f64,
    /// Pairing policy for ambiguous matches.
    pub match_policy: MatchPolicy,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            coincidence_window_ps: 5_000.0,
            effective_velocity_cm_per_ns: 12.6,
            match_policy: MatchPolicy::AllPairs,
        }
    }
}

impl HitConfig {
    /// Sets the coincidence window.
    #[must_use]
    pub fn with_coincidence_window(mut self, ps: f64) -> Self {
        self.coincidence_window_ps = ps;
        self
    }

    /// Sets the effective velocity.
    #[must_use]
    pub fn with_effective_velocity(mut self, cm_per_ns: f64) -> Self {
        self.effective_velocity_cm_per_ns = cm_per_ns;
        self
    }

    /// Sets the match policy.
    #[must_use]
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Effective velocity in cm/ps.
    #[must_use]
    pub fn velocity_cm_per_ps(&self) -> f64 {
        self.effective_velocity_cm_per_ns / 1_000.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("coincidence_window_ps", self.coincidence_window_ps)?;
        check_non_negative(
            "effective_velocity_cm_per_ns",
            self.effective_velocity_cm_per_ns,
        )
    }
}

/// Event building parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EventConfig {
    /// Largest distance from the seed hit of an event (ps).
    pub event_time_window_ps: f64,
    /// Fewest hits an emitted event may have.
    pub min_multiplicity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_time_window_ps: 5_000.0,
            min_multiplicity: 1,
        }
    }
}

impl EventConfig {
    /// Sets the event time window.
    #[must_use]
    pub fn with_time_window(mut self, ps: f64) -> Self {
        self.event_time_window_ps = ps;
        self
    }

    /// Sets the minimum multiplicity.
    #[must_use]
    pub fn with_min_multiplicity(mut self, hits: usize) -> Self {
        self.min_multiplicity = hits;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("event_time_window_ps", self.event_time_window_ps)
    }
}

const DEFAULT_SCATTER_TIME_DIFF_PS: f64 = 300.0;
const DEFAULT_SCATTER_TIME_RANGE_PS: (f64, f64) = (-3_000.0, 3_000.0);
const DEFAULT_SCATTER_ANGLE_RANGE_DEG: (f64, f64) = (0.0, 180.0);

/// Scatter test strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "policy", rename_all = "snake_case")
)]
pub enum ScatterPolicy {
    /// Scattered if `|dt - d/c|` exceeds `time_diff_ps`.
    Simple {
        /// Residual threshold (ps).
        time_diff_ps: f64,
    },
    /// Scattered unless both the time residual and the scattering angle
    /// fall inside their windows (bounds inclusive).
    MinMax {
        /// Lower residual bound (ps).
        time_min_ps: f64,
        /// Upper residual bound (ps).
        time_max_ps: f64,
        /// Lower scattering-angle bound (degrees).
        angle_min_deg: f64,
        /// Upper scattering-angle bound (degrees).
        angle_max_deg: f64,
    },
}

impl ScatterPolicy {
    /// Simple policy with the default residual threshold.
    pub const DEFAULT_SIMPLE: ScatterPolicy = ScatterPolicy::Simple {
        time_diff_ps: DEFAULT_SCATTER_TIME_DIFF_PS,
    };

    /// Min-max policy with the default windows.
    pub const DEFAULT_MIN_MAX: ScatterPolicy = ScatterPolicy::MinMax {
        time_min_ps: DEFAULT_SCATTER_TIME_RANGE_PS.0,
        time_max_ps: DEFAULT_SCATTER_TIME_RANGE_PS.1,
        angle_min_deg: DEFAULT_SCATTER_ANGLE_RANGE_DEG.0,
        angle_max_deg: DEFAULT_SCATTER_ANGLE_RANGE_DEG.1,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ScatterPolicy::Simple { time_diff_ps } => {
                check_non_negative("scatter_time_diff_ps", time_diff_ps)
            }
            ScatterPolicy::MinMax {
                time_min_ps,
                time_max_ps,
                angle_min_deg,
                angle_max_deg,
            } => {
                check_range("scatter_time", time_min_ps, time_max_ps)?;
                check_range("scatter_angle", angle_min_deg, angle_max_deg)
            }
        }
    }
}

impl Default for ScatterPolicy {
    fn default() -> Self {
        Self::DEFAULT_MIN_MAX
    }
}

/// Settings of the optional kinematic refinement of three-hit vertices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RefineConfig {
    /// Run the refinement after the closed-form solver.
    pub enabled: bool,
    /// Per-hit position uncertainty (cm).
    pub position_sigma_cm: f64,
    /// Per-hit time uncertainty (ps).
    pub time_sigma_ps: f64,
    /// Width of the soft chamber-radius constraint (cm).
    pub radius_sigma_cm: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Convergence threshold on the relative change of chi-square.
    pub tolerance: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            position_sigma_cm: 1.0,
            time_sigma_ps: 100.0,
            radius_sigma_cm: 0.5,
            max_iterations: 50,
            tolerance: 1e-9,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("refine_position_sigma_cm", self.position_sigma_cm)?;
        check_non_negative("refine_time_sigma_ps", self.time_sigma_ps)?;
        check_non_negative("refine_radius_sigma_cm", self.radius_sigma_cm)?;
        check_non_negative("refine_tolerance", self.tolerance)
    }
}

/// Event classification and vertex reconstruction parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ReconstructionConfig {
    /// Assumed source position used as the vertex for angles (cm).
    pub source_position: Vector3<f64>,
    /// Lower ToT cut for annihilation photons (ps).
    pub tot_min_ps: f64,
    /// Upper ToT cut for annihilation photons (ps).
    pub tot_max_ps: f64,
    /// Largest hit time difference of a back-to-back pair (ps).
    pub max_time_diff_ps: f64,
    /// Largest deviation from 180 degrees of a back-to-back pair.
    pub max_theta_diff_deg: f64,
    /// Smallest sum of the two smallest angles of a three-photon candidate.
    pub min_three_gamma_angle_sum_deg: f64,
    /// Lower ToT cut for de-excitation photons (ps).
    pub deex_tot_min_ps: f64,
    /// Upper ToT cut for de-excitation photons (ps).
    pub deex_tot_max_ps: f64,
    /// ToT above which a hit counts towards the cosmic tag (ps).
    pub cosmic_tot_min_ps: f64,
    /// High-ToT hits needed for the cosmic tag.
    pub cosmic_min_hits: usize,
    /// Scatter test strategy.
    pub scatter: ScatterPolicy,
    /// Radius of the annihilation chamber (cm).
    pub chamber_radius_cm: f64,
    /// Scintillator length; decay points beyond half of it are rejected (cm).
    pub scintillator_length_cm: f64,
    /// Largest time between decay and first detection (ps).
    pub max_decay_lead_ps: f64,
    /// Optional vertex refinement.
    pub refine: RefineConfig,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            source_position: Vector3::zeros(),
            tot_min_ps: 0.0,
            tot_max_ps: 200_000.0,
            max_time_diff_ps: 3_000.0,
            max_theta_diff_deg: 3.0,
            min_three_gamma_angle_sum_deg: 185.0,
            deex_tot_min_ps: 30_000.0,
            deex_tot_max_ps: 50_000.0,
            cosmic_tot_min_ps: 100_000.0,
            cosmic_min_hits: 3,
            scatter: ScatterPolicy::default(),
            chamber_radius_cm: 10.0,
            scintillator_length_cm: 50.0,
            max_decay_lead_ps: 1_000_000.0,
            refine: RefineConfig::default(),
        }
    }
}

impl ReconstructionConfig {
    /// Sets the source position.
    #[must_use]
    pub fn with_source(mut self, position: Vector3<f64>) -> Self {
        self.source_position = position;
        self
    }

    /// Sets the annihilation-photon ToT window.
    #[must_use]
    pub fn with_tot_range(mut self, min_ps: f64, max_ps: f64) -> Self {
        self.tot_min_ps = min_ps;
        self.tot_max_ps = max_ps;
        self
    }

    /// Sets the back-to-back time and angle cuts.
    #[must_use]
    pub fn with_back_to_back(mut self, max_time_diff_ps: f64, max_theta_diff_deg: f64) -> Self {
        self.max_time_diff_ps = max_time_diff_ps;
        self.max_theta_diff_deg = max_theta_diff_deg;
        self
    }

    /// Sets the scatter policy.
    #[must_use]
    pub fn with_scatter(mut self, policy: ScatterPolicy) -> Self {
        self.scatter = policy;
        self
    }

    /// Sets the de-excitation ToT window.
    #[must_use]
    pub fn with_deex_tot_range(mut self, min_ps: f64, max_ps: f64) -> Self {
        self.deex_tot_min_ps = min_ps;
        self.deex_tot_max_ps = max_ps;
        self
    }

    /// Sets the chamber radius and scintillator length.
    #[must_use]
    pub fn with_chamber(mut self, radius_cm: f64, scintillator_length_cm: f64) -> Self {
        self.chamber_radius_cm = radius_cm;
        self.scintillator_length_cm = scintillator_length_cm;
        self
    }

    /// Enables or disables the vertex refinement.
    #[must_use]
    pub fn with_refine(mut self, enabled: bool) -> Self {
        self.refine.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source_position.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFinite {
                key: "source_position",
            });
        }
        check_range("tot", self.tot_min_ps, self.tot_max_ps)?;
        check_range("deex_tot", self.deex_tot_min_ps, self.deex_tot_max_ps)?;
        check_non_negative("max_time_diff_ps", self.max_time_diff_ps)?;
        check_non_negative("max_theta_diff_deg", self.max_theta_diff_deg)?;
        check_non_negative(
            "min_three_gamma_angle_sum_deg",
            self.min_three_gamma_angle_sum_deg,
        )?;
        check_non_negative("chamber_radius_cm", self.chamber_radius_cm)?;
        check_non_negative("scintillator_length_cm", self.scintillator_length_cm)?;
        check_non_negative("max_decay_lead_ps", self.max_decay_lead_ps)?;
        self.scatter.validate()?;
        self.refine.validate()
    }
}

/// Configuration of the whole reconstruction chain.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PipelineConfig {
    /// Signal assembly.
    pub signal: SignalConfig,
    /// Hit building.
    pub hit: HitConfig,
    /// Event building.
    pub event: EventConfig,
    /// Classification and vertex reconstruction.
    pub reconstruction: ReconstructionConfig,
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signal.validate()?;
        self.hit.validate()?;
        self.event.validate()?;
        self.reconstruction.validate()
    }

    /// Builds a configuration from flat `key -> value` parameters on top of
    /// the defaults. Unknown keys are ignored. The result is validated.
    #[allow(clippy::too_many_lines)]
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let reco = &mut config.reconstruction;

        let mut scatter_time_diff = DEFAULT_SCATTER_TIME_DIFF_PS;
        let (mut scatter_min, mut scatter_max) = DEFAULT_SCATTER_TIME_RANGE_PS;
        let (mut angle_min, mut angle_max) = DEFAULT_SCATTER_ANGLE_RANGE_DEG;
        let mut scatter_kind = "min_max".to_string();

        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for key in keys {
            let value = params[key].as_str();
            match key.as_str() {
                "max_edge_separation_ps" => {
                    config.signal.max_edge_separation_ps = parse(key, value)?;
                }
                "max_lead_trail_separation_ps" => {
                    config.signal.max_lead_trail_separation_ps = parse(key, value)?;
                }
                "window_width_ps" => config.signal.window_width_ps = parse(key, value)?,
                "window_end_ps" => config.signal.window_end_ps = parse(key, value)?,
                "coincidence_window_ps" => {
                    config.hit.coincidence_window_ps = parse(key, value)?;
                }
                "effective_velocity_cm_per_ns" => {
                    config.hit.effective_velocity_cm_per_ns = parse(key, value)?;
                }
                "match_policy" => config.hit.match_policy = value.trim().parse()?,
                "event_time_window_ps" => {
                    config.event.event_time_window_ps = parse(key, value)?;
                }
                "min_multiplicity" => config.event.min_multiplicity = parse(key, value)?,
                "source_x_cm" => reco.source_position.x = parse(key, value)?,
                "source_y_cm" => reco.source_position.y = parse(key, value)?,
                "source_z_cm" => reco.source_position.z = parse(key, value)?,
                "tot_min_ps" => reco.tot_min_ps = parse(key, value)?,
                "tot_max_ps" => reco.tot_max_ps = parse(key, value)?,
                "max_time_diff_ps" => reco.max_time_diff_ps = parse(key, value)?,
                "max_theta_diff_deg" => reco.max_theta_diff_deg = parse(key, value)?,
                "min_three_gamma_angle_sum_deg" => {
                    reco.min_three_gamma_angle_sum_deg = parse(key, value)?;
                }
                "deex_tot_min_ps" => reco.deex_tot_min_ps = parse(key, value)?,
                "deex_tot_max_ps" => reco.deex_tot_max_ps = parse(key, value)?,
                "cosmic_tot_min_ps" => reco.cosmic_tot_min_ps = parse(key, value)?,
                "cosmic_min_hits" => reco.cosmic_min_hits = parse(key, value)?,
                "scatter_policy" => scatter_kind = value.trim().to_string(),
                "scatter_time_diff_ps" => scatter_time_diff = parse(key, value)?,
                "scatter_time_min_ps" => scatter_min = parse(key, value)?,
                "scatter_time_max_ps" => scatter_max = parse(key, value)?,
                "scatter_angle_min_deg" => angle_min = parse(key, value)?,
                "scatter_angle_max_deg" => angle_max = parse(key, value)?,
                "chamber_radius_cm" => reco.chamber_radius_cm = parse(key, value)?,
                "scintillator_length_cm" => reco.scintillator_length_cm = parse(key, value)?,
                "max_decay_lead_ps" => reco.max_decay_lead_ps = parse(key, value)?,
                "refine" => reco.refine.enabled = parse(key, value)?,
                "refine_position_sigma_cm" => {
                    reco.refine.position_sigma_cm = parse(key, value)?;
                }
                "refine_time_sigma_ps" => reco.refine.time_sigma_ps = parse(key, value)?,
                "refine_radius_sigma_cm" => reco.refine.radius_sigma_cm = parse(key, value)?,
                "refine_tolerance" => reco.refine.tolerance = parse(key, value)?,
                "refine_max_iterations" => reco.refine.max_iterations = parse(key, value)?,
                other => log::debug!("ignoring unknown parameter {other}"),
            }
        }

        reco.scatter = match scatter_kind.as_str() {
            "simple" => ScatterPolicy::Simple {
                time_diff_ps: scatter_time_diff,
            },
            "min_max" => ScatterPolicy::MinMax {
                time_min_ps: scatter_min,
                time_max_ps: scatter_max,
                angle_min_deg: angle_min,
                angle_max_deg: angle_max,
            },
            other => return Err(ConfigError::UnknownPolicy(other.to_string())),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signal.window_start_ps(), -1_000_000);
        assert!(config.signal.contains(0));
        assert!(config.signal.contains(-1_000_000));
        assert!(!config.signal.contains(1));
    }

    #[test]
    fn test_negative_coincidence_window_is_fatal() {
        let config = HitConfig::default().with_coincidence_window(-1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Negative {
                key: "coincidence_window_ps",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let config = ReconstructionConfig::default().with_tot_range(10.0, 5.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { key: "tot", .. })
        ));

        let policy = ScatterPolicy::MinMax {
            time_min_ps: 0.0,
            time_max_ps: 100.0,
            angle_min_deg: 90.0,
            angle_max_deg: 10.0,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_from_params() {
        let config = PipelineConfig::from_params(&params(&[
            ("coincidence_window_ps", "2500"),
            ("event_time_window_ps", "4000.5"),
            ("min_multiplicity", "2"),
            ("match_policy", "nearest_exclusive"),
            ("scatter_policy", "min_max"),
            ("scatter_time_min_ps", "-100"),
            ("scatter_time_max_ps", "200"),
            ("source_y_cm", "1.5"),
            ("refine", "true"),
            ("some_other_task_option", "whatever"),
        ]))
        .unwrap();

        assert_eq!(config.hit.coincidence_window_ps, 2_500.0);
        assert_eq!(config.hit.match_policy, MatchPolicy::NearestExclusive);
        assert_eq!(config.event.event_time_window_ps, 4_000.5);
        assert_eq!(config.event.min_multiplicity, 2);
        assert_eq!(config.reconstruction.source_position.y, 1.5);
        assert!(config.reconstruction.refine.enabled);
        assert_eq!(
            config.reconstruction.scatter,
            ScatterPolicy::MinMax {
                time_min_ps: -100.0,
                time_max_ps: 200.0,
                angle_min_deg: 0.0,
                angle_max_deg: 180.0,
            }
        );
    }

    #[test]
    fn test_scatter_policy_selection() {
        assert_eq!(ScatterPolicy::default(), ScatterPolicy::DEFAULT_MIN_MAX);
        let config = PipelineConfig::from_params(&params(&[])).unwrap();
        assert_eq!(config.reconstruction.scatter, ScatterPolicy::DEFAULT_MIN_MAX);

        let config = PipelineConfig::from_params(&params(&[
            ("scatter_policy", "simple"),
            ("scatter_time_diff_ps", "10"),
        ]))
        .unwrap();
        assert_eq!(
            config.reconstruction.scatter,
            ScatterPolicy::Simple { time_diff_ps: 10.0 }
        );
    }

    #[test]
    fn test_from_params_refine_settings() {
        let config = PipelineConfig::from_params(&params(&[
            ("refine", "true"),
            ("refine_tolerance", "1e-6"),
            ("refine_max_iterations", "25"),
            ("refine_radius_sigma_cm", "0.5"),
        ]))
        .unwrap();
        let refine = &config.reconstruction.refine;
        assert!(refine.enabled);
        assert_eq!(refine.tolerance, 1e-6);
        assert_eq!(refine.max_iterations, 25);
        assert_eq!(refine.radius_sigma_cm, 0.5);

        let err = PipelineConfig::from_params(&params(&[("refine_tolerance", "-1")]));
        assert!(matches!(err, Err(ConfigError::Negative { .. })));
    }

    #[test]
    fn test_from_params_errors() {
        let err = PipelineConfig::from_params(&params(&[("min_multiplicity", "two")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));

        let err = PipelineConfig::from_params(&params(&[("scatter_policy", "fancy")]));
        assert_eq!(err, Err(ConfigError::UnknownPolicy("fancy".to_string())));

        let err = PipelineConfig::from_params(&params(&[("coincidence_window_ps", "-5")]));
        assert!(matches!(err, Err(ConfigError::Negative { .. })));
    }
}
