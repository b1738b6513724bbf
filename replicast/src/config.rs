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

//! # Run Configuration
//!
//! All tunable behavior of a simulation run is collected in a single
//! [`Config`] record, created once at startup and handed to the
//! [`Network`](crate::network::Network) by construction. Components never
//! consult global state.

use crate::types::SimTime;
use std::fmt;

/// Delta policy applied to a server's load or flow counter on admission and
/// release of a request.
pub type LoadFn = fn(u32) -> u32;

/// Conversion from a request size to the simulated service time.
pub type SizeToTimeFn = fn(u64) -> SimTime;

/// The utility function `U(alpha, load, delay)`. Lower is better.
pub type UtilityFn = fn(f64, f64, f64) -> f64;

/// Comparator for a single metric of the announcement decision. Returns true
/// if the first argument is better than the second.
pub type BetterFn = fn(f64, f64) -> bool;

/// The metrics a RIB entry exposes to the announcement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// The announced load of the replica
    Load,
    /// The accumulated path delay towards the replica
    Delay,
}

/// One metric of the announcement decision: which value to compare, and how.
#[derive(Clone, Copy)]
pub struct Metric {
    /// The value to extract from a RIB entry
    pub kind: MetricKind,
    /// The comparator deciding which of two values is better
    pub better: BetterFn,
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric").field("kind", &self.kind).finish()
    }
}

/// The default utility function `U = alpha * load + (1 - alpha) * delay`.
pub fn forwarding_utility(alpha: f64, load: f64, delay: f64) -> f64 {
    alpha * load + (1.0 - alpha) * delay
}

/// `<` as a passable comparator
pub fn less_than(a: f64, b: f64) -> bool {
    a < b
}

/// `>` as a passable comparator
pub fn greater_than(a: f64, b: f64) -> bool {
    a > b
}

fn up_by_1(val: u32) -> u32 {
    val + 1
}

fn down_by_1(val: u32) -> u32 {
    val.saturating_sub(1)
}

fn size_is_time(size: u64) -> SimTime {
    size as SimTime
}

/// Process-wide immutable configuration, created at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Weight between load and delay in the utility function, in `0..=1`.
    pub alpha: f64,
    /// Per-server admission capacity (number of slots).
    pub server_slots: u32,
    /// Server-side relative load-change threshold which triggers an
    /// announcement.
    pub change_factor: f64,
    /// Router-side damping threshold: the minimum utility improvement
    /// required to swap a service forwarding entry.
    pub forwarding_utility_change_factor: f64,
    /// Load delta applied when a request is admitted.
    pub load_up_fn: LoadFn,
    /// Load delta applied when a request completes.
    pub load_down_fn: LoadFn,
    /// Flow-count delta applied when a request is admitted.
    pub flows_up_fn: LoadFn,
    /// Flow-count delta applied when a request completes.
    pub flows_down_fn: LoadFn,
    /// Conversion from request size to service time.
    pub size_to_time: SizeToTimeFn,
    /// The pluggable utility function.
    pub forwarding_utility_fn: UtilityFn,
    /// The ordered metric list of the announcement decision.
    pub metrics: Vec<Metric>,
    /// Serialization rate of all switch ports, in size units per simulated
    /// second. An infinite rate disables serialization delay.
    pub link_rate: f64,
    /// Print tables one row per line instead of a single line.
    pub table_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            server_slots: 10,
            change_factor: 0.1,
            forwarding_utility_change_factor: 0.1,
            load_up_fn: up_by_1,
            load_down_fn: down_by_1,
            flows_up_fn: up_by_1,
            flows_down_fn: down_by_1,
            size_to_time: size_is_time,
            forwarding_utility_fn: forwarding_utility,
            metrics: vec![
                Metric { kind: MetricKind::Load, better: less_than },
                Metric { kind: MetricKind::Delay, better: less_than },
            ],
            link_rate: f64::INFINITY,
            table_format: false,
        }
    }
}
