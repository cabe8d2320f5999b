// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Destination-selection patterns consulted by the `Random` generator.

use rand::Rng;

/// Maps a source to a destination, possibly randomly.
pub trait TrafficPattern {
    fn dest(&self, src: u32, num_nodes: u32, rng: &mut dyn rand::RngCore) -> u32;
}

/// Picks a uniformly random destination other than `src` (falls back to
/// `src` itself when `num_nodes == 1`).
pub struct Uniform;

impl TrafficPattern for Uniform {
    fn dest(&self, src: u32, num_nodes: u32, rng: &mut dyn rand::RngCore) -> u32 {
        if num_nodes <= 1 {
            return src;
        }
        loop {
            let candidate = rng.random_range(0..num_nodes);
            if candidate != src {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn uniform_never_picks_self() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_ne!(Uniform.dest(3, 8, &mut rng), 3);
        }
    }

    #[test]
    fn uniform_single_node_returns_self() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Uniform.dest(0, 1, &mut rng), 0);
    }
}
