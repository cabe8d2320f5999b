// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-cycle injection decision processes driving the `Random` generator.

use config::ConfigError;
use rand::Rng;

/// Decides, once per cycle, whether a source has a message ready to send.
pub trait InjectionProcess {
    fn test(&mut self, src: u32, rng: &mut dyn rand::RngCore) -> bool;

    /// Restore per-node state to its configured initial condition.
    fn reset(&mut self, src: u32);
}

impl std::fmt::Debug for dyn InjectionProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn InjectionProcess>")
    }
}

/// Fires with probability `rate[source]` every cycle, independent draws.
pub struct BernoulliInjectionProcess {
    rate: Vec<f64>,
}

impl BernoulliInjectionProcess {
    #[must_use]
    pub fn new(rate: Vec<f64>) -> Self {
        Self { rate }
    }

    fn rate_for(&self, src: u32) -> f64 {
        let idx = src as usize % self.rate.len().max(1);
        self.rate.get(idx).copied().unwrap_or(0.0)
    }
}

impl InjectionProcess for BernoulliInjectionProcess {
    fn test(&mut self, src: u32, rng: &mut dyn rand::RngCore) -> bool {
        rng.random::<f64>() < self.rate_for(src)
    }

    fn reset(&mut self, _src: u32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnOffState {
    On,
    Off,
}

/// Two-state on/off Markov chain per node: fires with probability `r1[src]`
/// while on, transitions on->off with probability `alpha[src]`, off->on with
/// `beta[src]`. `alpha`/`beta`/`r1`/`initial` are per-node, the same way
/// `BernoulliInjectionProcess::rate` is, modulo-indexed so a single-element
/// vector broadcasts uniformly to every node.
pub struct OnOffInjectionProcess {
    alpha: Vec<f64>,
    beta: Vec<f64>,
    r1: Vec<f64>,
    initial: Vec<OnOffState>,
    state: Vec<OnOffState>,
}

impl OnOffInjectionProcess {
    #[must_use]
    pub fn new(alpha: Vec<f64>, beta: Vec<f64>, r1: Vec<f64>, initial: Vec<bool>, num_nodes: usize) -> Self {
        let initial: Vec<OnOffState> = initial
            .into_iter()
            .map(|on| if on { OnOffState::On } else { OnOffState::Off })
            .collect();
        let initial = if initial.is_empty() { vec![OnOffState::Off] } else { initial };
        let state = (0..num_nodes.max(1)).map(|n| initial[n % initial.len()]).collect();
        Self { alpha, beta, r1, initial, state }
    }

    fn at(values: &[f64], src: u32) -> f64 {
        let idx = src as usize % values.len().max(1);
        values.get(idx).copied().unwrap_or(0.0)
    }

    fn state_for(&mut self, src: u32) -> &mut OnOffState {
        let idx = src as usize % self.state.len();
        &mut self.state[idx]
    }
}

impl InjectionProcess for OnOffInjectionProcess {
    fn test(&mut self, src: u32, rng: &mut dyn rand::RngCore) -> bool {
        let alpha = Self::at(&self.alpha, src);
        let beta = Self::at(&self.beta, src);
        let r1 = Self::at(&self.r1, src);
        let state = self.state_for(src);
        let fired = match *state {
            OnOffState::On => rng.random::<f64>() < r1,
            OnOffState::Off => false,
        };
        *state = match *state {
            OnOffState::On if rng.random::<f64>() < alpha => OnOffState::Off,
            OnOffState::Off if rng.random::<f64>() < beta => OnOffState::On,
            other => other,
        };
        fired
    }

    fn reset(&mut self, src: u32) {
        let idx = src as usize % self.initial.len();
        *self.state_for(src) = self.initial[idx];
    }
}

/// Parse an injection-process name and its parameter tuple.
///
/// `"bernoulli"` takes no parameters beyond the per-node rate, supplied
/// separately by the caller. `"on_off"` takes `alpha,beta,r1,initial` as its
/// options, with `initial` `0` or `1`.
pub fn build_injection_process(
    name: &str,
    options: &[String],
    rate: &[f64],
    num_nodes: usize,
) -> Result<Box<dyn InjectionProcess>, ConfigError> {
    match name {
        "bernoulli" => Ok(Box::new(BernoulliInjectionProcess::new(rate.to_vec()))),
        "on_off" => {
            if options.len() != 4 {
                return Err(ConfigError::WrongOptionCount {
                    name: name.into(),
                    expected: 4,
                    got: options.len(),
                });
            }
            let parse = |s: &str| s.parse::<f64>().map_err(|_| ConfigError::MalformedSpecifier { spec: s.into() });
            let alpha = parse(&options[0])?;
            let beta = parse(&options[1])?;
            let r1 = parse(&options[2])?;
            let initial = parse(&options[3])? != 0.0;
            Ok(Box::new(OnOffInjectionProcess::new(vec![alpha], vec![beta], vec![r1], vec![initial], num_nodes)))
        }
        other => Err(ConfigError::UnknownInjectionProcess { name: other.into() }),
    }
}
