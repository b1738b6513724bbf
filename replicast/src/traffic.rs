// Replicast: Simulating Service-Anycast Routing
// Copyright (C) 2022  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Traffic generators
//!
//! Poisson sources which inject client requests, and background-load sources
//! which feed load events into servers. Every source owns a seeded RNG so
//! runs are reproducible.

use crate::types::{NetworkError, NodeId, ServiceId, SimTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

/// The request size distribution of a request source.
#[derive(Debug, Clone, Copy)]
pub enum SizeDistribution {
    /// All requests have the same size.
    Fixed(u64),
    /// Sizes are drawn from an exponential distribution with the given rate,
    /// scaled and rounded up; the result is at least 1.
    Exponential {
        /// Rate parameter of the distribution
        lambda: f64,
        /// Scale factor applied to the drawn value
        scale: f64,
    },
}

#[derive(Debug, Clone, Copy)]
enum SizeGen {
    Fixed(u64),
    Exponential { dist: Exp<f64>, scale: f64 },
}

/// A Poisson source of client requests: interarrival times are exponential
/// with the configured rate.
#[derive(Debug, Clone)]
pub struct RequestSource {
    pub(crate) client: NodeId,
    pub(crate) service: ServiceId,
    arrival: Exp<f64>,
    size: SizeGen,
    rng: StdRng,
}

impl RequestSource {
    /// Create a new source for the given client and service.
    pub fn new(
        client: NodeId,
        service: ServiceId,
        arrival_lambda: f64,
        size: SizeDistribution,
        seed: u64,
    ) -> Result<Self, NetworkError> {
        let arrival =
            Exp::new(arrival_lambda).map_err(|_| NetworkError::InvalidRate(arrival_lambda))?;
        let size = match size {
            SizeDistribution::Fixed(s) => SizeGen::Fixed(s),
            SizeDistribution::Exponential { lambda, scale } => SizeGen::Exponential {
                dist: Exp::new(lambda).map_err(|_| NetworkError::InvalidRate(lambda))?,
                scale,
            },
        };
        Ok(Self { client, service, arrival, size, rng: StdRng::seed_from_u64(seed) })
    }

    /// Time until the next request.
    pub(crate) fn next_arrival(&mut self) -> SimTime {
        self.arrival.sample(&mut self.rng)
    }

    /// Size of the next request.
    pub(crate) fn next_size(&mut self) -> u64 {
        match self.size {
            SizeGen::Fixed(s) => s,
            SizeGen::Exponential { dist, scale } => {
                let drawn = dist.sample(&mut self.rng) * scale;
                (drawn.ceil() as u64).max(1)
            }
        }
    }
}

/// A source of background load events for a server. At every tick the load
/// and flow count are drawn uniformly from the configured ranges.
#[derive(Debug, Clone)]
pub struct LoadSource {
    pub(crate) server: NodeId,
    pub(crate) service: ServiceId,
    arrival: Exp<f64>,
    load_range: (u32, u32),
    flows_range: (u32, u32),
    rng: StdRng,
}

impl LoadSource {
    /// Create a new background load source. The ranges are inclusive on
    /// both ends.
    pub fn new(
        server: NodeId,
        service: ServiceId,
        arrival_lambda: f64,
        load_range: (u32, u32),
        flows_range: (u32, u32),
        seed: u64,
    ) -> Result<Self, NetworkError> {
        let arrival =
            Exp::new(arrival_lambda).map_err(|_| NetworkError::InvalidRate(arrival_lambda))?;
        Ok(Self {
            server,
            service,
            arrival,
            load_range,
            flows_range,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Time until the next load event.
    pub(crate) fn next_arrival(&mut self) -> SimTime {
        self.arrival.sample(&mut self.rng)
    }

    /// The next background values: `(load, no_of_flows)`.
    pub(crate) fn next_values(&mut self) -> (u32, u32) {
        let load = self.rng.gen_range(self.load_range.0, self.load_range.1 + 1);
        let flows = self.rng.gen_range(self.flows_range.0, self.flows_range.1 + 1);
        (load, flows)
    }
}

/// A registered traffic source.
#[derive(Debug, Clone)]
pub(crate) enum TrafficSource {
    Request(RequestSource),
    Load(LoadSource),
}
