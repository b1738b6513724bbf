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

//! # Routing Information Base
//!
//! In-memory document store for replica metric entries, plus the sent table
//! recording which entries were advertised to which neighbors. Rows have a
//! stable numeric id across mutations, and lookups are by field-equality
//! predicates.

use crate::config::MetricKind;
use crate::link::LinkEnd;
use crate::types::{LinkWeight, NodeId, ServiceId, SimTime};

/// Stable identifier of a RIB row. Ids are never reused within a run.
pub type DocId = usize;

/// One candidate replica entry in the RIB. At most one row exists per
/// replica.
#[derive(Debug, Clone, PartialEq)]
pub struct RibEntry {
    /// The originating server
    pub replica: NodeId,
    /// The neighbor which delivered the last update
    pub neighbour: NodeId,
    /// The link end which delivered the last update
    pub link: LinkEnd,
    /// Sequence number of the last update at the origin
    pub msg_id: usize,
    /// The service the replica provides
    pub service: ServiceId,
    /// Creation time of the last update at the origin
    pub creation_time: SimTime,
    /// Announced load
    pub load: u32,
    /// Announced flow count
    pub no_of_flows: u32,
    /// Accumulated path delay towards the replica
    pub delay: LinkWeight,
    /// Announced available slots
    pub slots: u32,
}

impl RibEntry {
    /// Extract the value of a metric as used by the announcement decision.
    pub(crate) fn metric(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Load => self.load as f64,
            MetricKind::Delay => self.delay,
        }
    }
}

/// The service RIB: a table of candidate replica entries with stable row
/// ids. Iteration order is ascending by row id, which makes table dumps
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct Rib {
    entries: std::collections::BTreeMap<DocId, RibEntry>,
    next_id: DocId,
}

impl Rib {
    /// Create an empty RIB.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new row and return its stable id.
    pub(crate) fn insert(&mut self, entry: RibEntry) -> DocId {
        self.next_id += 1;
        let doc_id = self.next_id;
        self.entries.insert(doc_id, entry);
        doc_id
    }

    /// Get a row by id.
    pub fn get(&self, doc_id: DocId) -> Option<&RibEntry> {
        self.entries.get(&doc_id)
    }

    /// Get a row by id for mutation. The id stays stable across mutations.
    pub(crate) fn get_mut(&mut self, doc_id: DocId) -> Option<&mut RibEntry> {
        self.entries.get_mut(&doc_id)
    }

    /// Remove a row by id.
    pub(crate) fn remove(&mut self, doc_id: DocId) -> Option<RibEntry> {
        self.entries.remove(&doc_id)
    }

    /// Find the row for a replica. There is at most one.
    pub fn find_replica(&self, replica: NodeId) -> Option<(DocId, &RibEntry)> {
        self.entries.iter().find(|(_, e)| e.replica == replica).map(|(d, e)| (*d, e))
    }

    /// Iterate over all rows in ascending row-id order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &RibEntry)> {
        self.entries.iter().map(|(d, e)| (*d, e))
    }

    /// Iterate over the rows of a single service.
    pub fn service_rows<'a>(
        &'a self,
        service: &'a ServiceId,
    ) -> impl Iterator<Item = (DocId, &'a RibEntry)> {
        self.iter().filter(move |(_, e)| &e.service == service)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the RIB holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The sent table: the set of `(row, neighbor)` pairs for which an
/// announcement is outstanding. Membership implies that the neighbor holds an
/// entry derived from that row which has not yet been withdrawn.
#[derive(Debug, Clone, Default)]
pub struct SentTable {
    entries: std::collections::BTreeSet<(DocId, NodeId)>,
}

impl SentTable {
    /// Create an empty sent table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether an announcement for `(doc_id, neighbour)` is
    /// outstanding.
    pub fn contains(&self, doc_id: DocId, neighbour: NodeId) -> bool {
        self.entries.contains(&(doc_id, neighbour))
    }

    /// Record an announcement. Returns false if it was already recorded.
    pub(crate) fn insert(&mut self, doc_id: DocId, neighbour: NodeId) -> bool {
        self.entries.insert((doc_id, neighbour))
    }

    /// Remove one pair. Returns true if it was present.
    pub(crate) fn remove(&mut self, doc_id: DocId, neighbour: NodeId) -> bool {
        self.entries.remove(&(doc_id, neighbour))
    }

    /// Remove every pair referring to the given row. Returns how many were
    /// removed.
    pub(crate) fn remove_doc(&mut self, doc_id: DocId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(d, _)| *d != doc_id);
        before - self.entries.len()
    }

    /// The set of row ids referenced by any pair.
    pub fn docs(&self) -> std::collections::BTreeSet<DocId> {
        self.entries.iter().map(|(d, _)| *d).collect()
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, NodeId)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of recorded pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no announcement is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
