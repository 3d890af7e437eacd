//! Run configuration: derived memory cap and round count, sampling bounds

use tandem_common::{Error, Result};

/// Scale applied to n^α before the floor; keeps S in a useful range for
/// graphs small enough to test on one machine.
pub const S_SCALE: f64 = 1000.0;

/// Default engineering floor on S, overridable from the command line.
pub const DEFAULT_S_FLOOR: usize = 2000;

/// Upper bound on the number of sparsification phases.
pub const MAX_PHASES: usize = 30;

/// Finish gathers to rank 0 only while the residue is at most
/// `S * SMALL_THRESHOLD_FACTOR` edges.
pub const SMALL_THRESHOLD_FACTOR: u64 = 100_000;

/// Rounds of the distributed finishing fallback.
pub const FINISH_FALLBACK_ROUNDS: usize = 5;

/// Sampling probability bounds for the adaptive policy.
pub const P_MAX: f64 = 0.5;
pub const P_MIN: f64 = 1e-4;

/// Raw knobs as they arrive from the command line.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub alpha: f64,
    pub n_global: u64,
    pub m_global: u64,
    pub mem_per_rank_gb: f64,
    pub safety_factor: f64,
    pub s_edges: Option<usize>,
    pub r_rounds: Option<usize>,
    pub s_floor: usize,
    pub seed: u64,
    pub strict: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            n_global: 0,
            m_global: 0,
            mem_per_rank_gb: 1.0,
            safety_factor: 1.0,
            s_edges: None,
            r_rounds: None,
            s_floor: DEFAULT_S_FLOOR,
            seed: 42,
            strict: false,
        }
    }
}

/// Immutable configuration of one run, set once at startup and read
/// everywhere. The only process-wide state in the system.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub alpha: f64,
    pub n_global: u64,
    pub m_global: u64,
    /// Per-rank edge budget S.
    pub s_edges: usize,
    /// Exponentiation radius R.
    pub r_rounds: usize,
    /// Advisory; not enforced by the engine.
    pub mem_per_rank_gb: f64,
    pub safety_factor: f64,
    pub small_threshold_factor: u64,
    pub max_phases: usize,
    pub seed: u64,
    pub strict: bool,
}

impl RunConfig {
    /// Validate the raw knobs and derive S and R where not pinned.
    ///
    /// S = max(⌈n^α · S_SCALE⌉, s_floor), R = max(2, ⌊√ln max(n, 10)⌋).
    pub fn derive(params: &RunParams) -> Result<Self> {
        if !(params.alpha > 0.0 && params.alpha < 1.0) {
            return Err(Error::Config(format!(
                "alpha must lie in (0, 1), got {}",
                params.alpha
            )));
        }
        if !(params.safety_factor > 0.0 && params.safety_factor <= 1.0) {
            return Err(Error::Config(format!(
                "safety factor must lie in (0, 1], got {}",
                params.safety_factor
            )));
        }
        if params.n_global == 0 {
            return Err(Error::Config("vertex count must be positive".into()));
        }
        if let Some(s) = params.s_edges {
            if s < 2 {
                return Err(Error::Config(format!("S override must be at least 2, got {s}")));
            }
        }

        let s_edges = params.s_edges.unwrap_or_else(|| {
            let derived = (params.n_global as f64).powf(params.alpha) * S_SCALE;
            (derived.ceil() as usize).max(params.s_floor)
        });
        let r_rounds = params.r_rounds.unwrap_or_else(|| {
            let ln_n = (params.n_global.max(10) as f64).ln();
            (ln_n.sqrt().floor() as usize).max(2)
        });

        Ok(Self {
            alpha: params.alpha,
            n_global: params.n_global,
            m_global: params.m_global,
            s_edges,
            r_rounds,
            mem_per_rank_gb: params.mem_per_rank_gb,
            safety_factor: params.safety_factor,
            small_threshold_factor: SMALL_THRESHOLD_FACTOR,
            max_phases: MAX_PHASES,
            seed: params.seed,
            strict: params.strict,
        })
    }

    /// Line-graph degree threshold T = ⌈S^(1/R)⌉, floored at 2. Edges above
    /// T are deferred for the phase so that R rounds of ball doubling stay
    /// within T^R ≤ S.
    pub fn stall_threshold(&self) -> u32 {
        if self.r_rounds == 0 {
            return self.s_edges.min(u32::MAX as usize) as u32;
        }
        let threshold = (self.s_edges as f64).powf(1.0 / self.r_rounds as f64).ceil();
        (threshold as u32).max(2)
    }

    /// Residue size under which Finish gathers everything to rank 0.
    pub fn finish_gather_threshold(&self) -> u64 {
        self.s_edges as u64 * self.small_threshold_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n: u64) -> RunParams {
        RunParams {
            n_global: n,
            m_global: n,
            ..RunParams::default()
        }
    }

    #[test]
    fn derives_floored_s_for_small_graphs() {
        let config = RunConfig::derive(&params(100)).unwrap();
        // 100^0.2 * 1000 ≈ 2512 beats the floor of 2000.
        assert_eq!(config.s_edges, 2512);
        assert_eq!(config.r_rounds, 2);
    }

    #[test]
    fn floor_applies_to_tiny_graphs() {
        let config = RunConfig::derive(&params(2)).unwrap();
        assert_eq!(config.s_edges, 2000);
    }

    #[test]
    fn overrides_pin_s_and_r() {
        let config = RunConfig::derive(&RunParams {
            s_edges: Some(64),
            r_rounds: Some(3),
            ..params(1000)
        })
        .unwrap();
        assert_eq!(config.s_edges, 64);
        assert_eq!(config.r_rounds, 3);
        assert_eq!(config.stall_threshold(), 4);
    }

    #[test]
    fn stall_threshold_never_below_two() {
        let config = RunConfig::derive(&RunParams {
            s_edges: Some(2),
            r_rounds: Some(8),
            ..params(10)
        })
        .unwrap();
        assert_eq!(config.stall_threshold(), 2);
    }

    #[test]
    fn rejects_alpha_outside_unit_interval() {
        for alpha in [0.0, 1.0, -0.5, 2.0] {
            let bad = RunParams { alpha, ..params(100) };
            assert!(matches!(RunConfig::derive(&bad), Err(Error::Config(_))));
        }
    }

    #[test]
    fn rejects_bad_safety_factor() {
        let bad = RunParams {
            safety_factor: 0.0,
            ..params(100)
        };
        assert!(matches!(RunConfig::derive(&bad), Err(Error::Config(_))));
    }
}
