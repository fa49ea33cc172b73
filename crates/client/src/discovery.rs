//! Topology discovery
//!
//! Asks one seed at a time for the authoritative slot-to-endpoint map and
//! rebuilds the registry from the first answer. A single successful source
//! per reload is sufficient; the seed list is shuffled so repeated reloads
//! spread the discovery load across the cluster.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::connection::{Connection, ConnectionOptions, Connector, SlotAssignment};
use crate::error::{classify_store_error, ClusterError, Result};
use crate::registry::NodeRegistry;
use redroute_core::{Endpoint, SlotRange};

/// Rebuild `registry` from the first seed that answers the topology query,
/// growing `seeds` with every endpoint the answer mentions.
///
/// A seed that reports clustering disabled switches to single-node fallback
/// (that endpoint owns the whole slot space) unless `force_cluster` is set,
/// in which case it is a fatal configuration error. Authentication failures
/// are fatal immediately. Anything else moves on to the next seed; if every
/// seed fails the last error is surfaced.
pub(crate) fn discover<K: Connector>(
    connector: &K,
    registry: &NodeRegistry<K::Conn>,
    seeds: &mut Vec<Endpoint>,
    options: &ConnectionOptions,
    force_cluster: bool,
) -> Result<()> {
    let mut order = seeds.clone();
    order.shuffle(&mut rand::rng());

    let mut last_error = ClusterError::InvalidConfig("no seed endpoints".to_string());
    for seed in order {
        match fetch_topology(connector, &seed, options) {
            Ok(assignments) => {
                rebuild(registry, seeds, &assignments);
                return Ok(());
            }
            Err(ClusterError::ClusterSupportDisabled) => {
                if force_cluster {
                    return Err(ClusterError::ClusterSupportDisabled);
                }
                // Standalone instance: it owns the entire slot space and no
                // further discovery is needed.
                registry.rebuild(vec![(seed.clone(), vec![SlotRange::full()])]);
                merge_seed(seeds, seed.clone());
                info!(endpoint = %seed, "single-node fallback, clustering disabled");
                return Ok(());
            }
            Err(err @ ClusterError::AuthenticationRequired(_)) => return Err(err),
            Err(err) => {
                warn!(seed = %seed, error = %err, "topology query failed, trying next seed");
                last_error = err;
            }
        }
    }
    Err(last_error)
}

fn fetch_topology<K: Connector>(
    connector: &K,
    seed: &Endpoint,
    options: &ConnectionOptions,
) -> Result<Vec<SlotAssignment>> {
    let mut conn = connector.connect(seed, options)?;
    let result = conn.topology();
    conn.close();
    result.map_err(|err| match err {
        ClusterError::Store(message) => classify_store_error(&message),
        other => other,
    })
}

/// Apply a fresh topology answer: group ranges by owning master, drop retired
/// owners (including ex-replicas no longer reported as masters), and replace
/// each survivor's range set wholesale.
fn rebuild<C: Connection>(
    registry: &NodeRegistry<C>,
    seeds: &mut Vec<Endpoint>,
    assignments: &[SlotAssignment],
) {
    // BTreeMap keeps the rebuild order deterministic; registry order feeds
    // the scatter and scan paths. The registry swaps the whole node set in
    // one step, so concurrent routing never sees a half-applied answer.
    let mut grouped: BTreeMap<Endpoint, Vec<SlotRange>> = BTreeMap::new();
    for assignment in assignments {
        grouped
            .entry(assignment.master.clone())
            .or_default()
            .push(assignment.range);
    }
    registry.rebuild(grouped.into_iter().collect());

    for assignment in assignments {
        merge_seed(seeds, assignment.master.clone());
        for replica in &assignment.replicas {
            merge_seed(seeds, replica.clone());
        }
    }

    info!(nodes = registry.len(), "rebuilt cluster topology");
}

fn merge_seed(seeds: &mut Vec<Endpoint>, endpoint: Endpoint) {
    if !seeds.contains(&endpoint) {
        seeds.push(endpoint);
    }
}
