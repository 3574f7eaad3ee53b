//! Readiness Evaluator
//!
//! Decides whether a remote participant's advertised endpoints may be used:
//! - The remote bag must echo back the requested database, roles and
//!   extensions; this is how the client learns a request was processed
//! - The remote `allowed-subnets` must cover every local `egress-subnets`
//!   entry, so clients never connect before access is granted
//!
//! A unit that publishes no egress subnets is always covered. Older
//! substrates never publish them, and those deployments must keep working.

use std::collections::BTreeSet;

use tracing::debug;

use crate::mirror::{SharedConfig, CONFIG_KEYS};
use crate::substrate::Bag;

/// Remote key listing the subnets granted access.
pub const ALLOWED_SUBNETS_KEY: &str = "allowed-subnets";

/// Local key listing the subnets this unit connects from.
pub const EGRESS_SUBNETS_KEY: &str = "egress-subnets";

/// Whether `remote` has applied the requested configuration and granted
/// access to this unit's egress subnets.
///
/// `shared` is the configuration the leader requested on this relation,
/// `None` if nothing was published yet. `local` is the local unit bag.
pub fn is_ready(shared: Option<&SharedConfig>, local: &Bag, remote: &Bag) -> bool {
    for key in CONFIG_KEYS {
        let got = remote.get(key).map(String::as_str).unwrap_or("");
        let want = shared.map(|config| config.get(key)).unwrap_or("");
        if got != want {
            debug!(key, got, want, "not ready: requested configuration not applied");
            return false;
        }
    }

    let allowed = csplit(remote.get(ALLOWED_SUBNETS_KEY));
    let egress = csplit(local.get(EGRESS_SUBNETS_KEY));
    if egress.is_subset(&allowed) {
        debug!("relation is ready");
        true
    } else {
        debug!(?egress, ?allowed, "not ready: egress not granted access");
        false
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn csplit(value: Option<&String>) -> BTreeSet<String> {
    value
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
