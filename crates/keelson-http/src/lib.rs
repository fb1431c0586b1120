//! ---
//! ksn_section: "03-outbound-transport"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Outbound HTTP client factory with tuned pool parameters."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
//! Outbound HTTP client factory for Keelson services.
//!
//! Produces a [`reqwest::Client`] whose connection pool is sized to the
//! number of workers expected to issue requests in parallel. Services that
//! need the stock tuning call [`default_client`]; deployments that override
//! knobs in configuration deserialize a [`PoolProfile`] and call [`client`].
#![warn(missing_docs)]

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

fn default_max_workers() -> usize {
    8
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_tcp_keepalive() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_expiry() -> Duration {
    Duration::from_secs(90)
}

/// Connection-pool tuning for one outbound client.
///
/// The idle-connection cap per destination is sized `max_workers + 1` so a
/// full complement of workers can hold a connection each with one spare.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolProfile {
    /// Expected number of workers issuing requests in parallel.
    pub max_workers: usize,
    /// Bound on establishing a connection, TLS handshake included.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub connect_timeout: Duration,
    /// TCP keep-alive probe interval for pooled connections.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tcp_keepalive: Duration,
    /// Idle time after which a pooled connection is dropped.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub idle_expiry: Duration,
}

impl Default for PoolProfile {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            connect_timeout: default_connect_timeout(),
            tcp_keepalive: default_tcp_keepalive(),
            idle_expiry: default_idle_expiry(),
        }
    }
}

impl PoolProfile {
    /// Stock tuning for `max_workers` parallel workers.
    pub fn for_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }
}

/// Build a client from an explicit pool profile.
///
/// # Errors
///
/// Returns the underlying builder error if the TLS backend cannot be
/// initialised.
pub fn client(profile: &PoolProfile) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(profile.connect_timeout)
        .tcp_keepalive(profile.tcp_keepalive)
        .pool_max_idle_per_host(profile.max_workers + 1)
        .pool_idle_timeout(profile.idle_expiry)
        .build()
}

/// Build a client with the stock tuning, sized for `max_workers` parallel
/// workers.
///
/// # Errors
///
/// Same contract as [`client`].
pub fn default_client(max_workers: usize) -> reqwest::Result<Client> {
    client(&PoolProfile::for_workers(max_workers))
}
