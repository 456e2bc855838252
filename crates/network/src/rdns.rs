//! Reverse DNS for player addresses
//!
//! Lookups block, so each one runs on tokio's blocking pool. A semaphore
//! bounds how many are in flight; the result lands in the player's
//! [`RdnsCell`], which reads `"pending"` until then. Lookups are never
//! cancelled: a player who leaves early just drops their cell.

use rcon_core::u32_to_ipv4;
use rcon_game::RdnsCell;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Address to hostname resolution
pub trait ReverseLookup: Send + Sync + 'static {
    fn lookup(&self, ip: Ipv4Addr) -> Option<String>;
}

/// Resolver backed by the system's `getnameinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

impl ReverseLookup for SystemLookup {
    fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
        dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok()
    }
}

/// Bounded pool of reverse lookups
#[derive(Clone)]
pub struct RdnsPool {
    permits: Option<Arc<Semaphore>>,
    resolver: Arc<dyn ReverseLookup>,
}

impl RdnsPool {
    /// Pool using the system resolver
    ///
    /// # Arguments
    /// * `workers` - Maximum concurrent lookups, 0 disables the pool
    pub fn new(workers: usize) -> Self {
        Self::with_resolver(workers, SystemLookup)
    }

    pub fn with_resolver<R: ReverseLookup>(workers: usize, resolver: R) -> Self {
        Self {
            permits: (workers > 0).then(|| Arc::new(Semaphore::new(workers))),
            resolver: Arc::new(resolver),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.permits.is_some()
    }

    /// Start resolving `ip` into `cell`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    /// `false` when nothing was started (pool disabled, no IPv4 address or
    /// the cell is already filled)
    pub fn resolve(&self, ip: u32, cell: RdnsCell) -> bool {
        let Some(permits) = self.permits.clone() else {
            return false;
        };
        if ip == 0 || !cell.is_pending() {
            return false;
        }

        let resolver = self.resolver.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let address = Ipv4Addr::from(ip);
            let hostname = tokio::task::spawn_blocking(move || resolver.lookup(address))
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| u32_to_ipv4(ip));
            tracing::trace!("rDNS {} -> {}", address, hostname);
            cell.set(hostname);
        });
        true
    }
}

impl std::fmt::Debug for RdnsPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdnsPool")
            .field("available", &self.permits.as_ref().map(|p| p.available_permits()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_core::ipv4_to_u32;
    use std::time::Duration;

    struct FixedLookup;

    impl ReverseLookup for FixedLookup {
        fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
            (ip.octets()[3] == 7).then(|| "seven.example.net".to_string())
        }
    }

    async fn wait_for(cell: &RdnsCell) {
        for _ in 0..100 {
            if !cell.is_pending() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_resolves_into_cell() {
        let pool = RdnsPool::with_resolver(2, FixedLookup);
        let found = RdnsCell::new();
        let missing = RdnsCell::new();

        assert!(pool.resolve(ipv4_to_u32("10.0.0.7"), found.clone()));
        assert!(pool.resolve(ipv4_to_u32("10.0.0.8"), missing.clone()));
        wait_for(&found).await;
        wait_for(&missing).await;

        assert_eq!(found.get(), "seven.example.net");
        // Failed lookups fall back to the dotted address
        assert_eq!(missing.get(), "10.0.0.8");
        assert!(!pool.resolve(ipv4_to_u32("10.0.0.7"), found));
    }

    #[tokio::test]
    async fn test_disabled_pool() {
        let pool = RdnsPool::with_resolver(0, FixedLookup);
        let cell = RdnsCell::new();
        assert!(!pool.is_enabled());
        assert!(!pool.resolve(ipv4_to_u32("10.0.0.7"), cell.clone()));
        assert!(cell.is_pending());
    }
}
