//! Per-run trust decisions keyed by client IPv4 address.
//!
//! # Responsibilities
//! - Prompt the operator exactly once per distinct address
//! - Cache the answer for the remainder of the run
//!
//! # Design Decisions
//! - No TTL and no persistence; a restart clears every decision
//! - A cached negative answer rejects without re-prompting

use std::net::Ipv4Addr;

use dashmap::DashMap;

use crate::catalog::UiHooks;

/// Session-lifetime cache of operator trust decisions.
#[derive(Default)]
pub struct TrustStore {
    decisions: DashMap<Ipv4Addr, bool>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the address is trusted, prompting the operator on first
    /// contact and caching the answer after that.
    pub fn check(&self, addr: Ipv4Addr, hooks: &dyn UiHooks) -> bool {
        if let Some(decision) = self.decisions.get(&addr) {
            return *decision;
        }
        let decision = hooks.on_requester(addr);
        self.decisions.insert(addr, decision);
        decision
    }

    /// Number of addresses a decision has been recorded for.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts prompts and answers from a fixed script.
    struct CountingHooks {
        prompts: AtomicUsize,
        answer: bool,
    }

    impl CountingHooks {
        fn new(answer: bool) -> Self {
            Self { prompts: AtomicUsize::new(0), answer }
        }
    }

    impl UiHooks for CountingHooks {
        fn on_requester(&self, _addr: Ipv4Addr) -> bool {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
        fn disp_error(&self, _msg: &str) {}
        fn disp_req(&self, _msg: &str) {}
        fn on_server_create(&self) {}
        fn keep_running(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_prompts_once_per_address() {
        let store = TrustStore::new();
        let hooks = CountingHooks::new(true);
        let addr = Ipv4Addr::new(192, 168, 1, 50);

        assert!(store.check(addr, &hooks));
        assert!(store.check(addr, &hooks));
        assert!(store.check(addr, &hooks));
        assert_eq!(hooks.prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_negative_decision_sticks() {
        let store = TrustStore::new();
        let hooks = CountingHooks::new(false);
        let addr = Ipv4Addr::new(10, 0, 0, 7);

        assert!(!store.check(addr, &hooks));
        assert!(!store.check(addr, &hooks));
        assert_eq!(hooks.prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_addresses_prompt_separately() {
        let store = TrustStore::new();
        let hooks = CountingHooks::new(true);

        store.check(Ipv4Addr::new(10, 0, 0, 1), &hooks);
        store.check(Ipv4Addr::new(10, 0, 0, 2), &hooks);
        assert_eq!(hooks.prompts.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 2);
    }
}
