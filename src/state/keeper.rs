//! State keeper read model.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::eventbus::{BusError, EventBus};
use crate::events::{ConnectionSessionEvent, NatEvent, ServiceStatusEvent};
use crate::identity::IdentityManager;
use crate::nat::{NatStatus, NatStatusTracker};
use crate::payments::BalanceTracker;
use crate::services::{ServiceInstance, ServicesManager};

/// Snapshot served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub nat_status: NatStatus,
    pub services: Vec<ServiceInstance>,
    pub active_sessions: usize,
    pub identities: Vec<IdentityState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityState {
    pub address: String,
    /// Wei, as a decimal string. Absent until the first successful refresh.
    pub balance: Option<String>,
}

pub struct StateKeeper {
    nat: Arc<NatStatusTracker>,
    services: Arc<ServicesManager>,
    identities: IdentityManager,
    balances: Arc<BalanceTracker>,
    sessions: RwLock<BTreeSet<String>>,
    state: RwLock<NodeState>,
}

impl StateKeeper {
    pub fn new(
        nat: Arc<NatStatusTracker>,
        services: Arc<ServicesManager>,
        identities: IdentityManager,
        balances: Arc<BalanceTracker>,
    ) -> Self {
        let keeper = Self {
            state: RwLock::new(NodeState {
                nat_status: nat.status(),
                services: Vec::new(),
                active_sessions: 0,
                identities: Vec::new(),
            }),
            nat,
            services,
            identities,
            balances,
            sessions: RwLock::new(BTreeSet::new()),
        };
        keeper.rebuild();
        keeper
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let keeper = self.clone();
        bus.subscribe(move |_: NatEvent| keeper.rebuild())?;

        let keeper = self.clone();
        bus.subscribe(move |_: ServiceStatusEvent| keeper.rebuild())?;

        let keeper = self.clone();
        bus.subscribe(move |event: ConnectionSessionEvent| keeper.consume_session(&event))
    }

    pub fn consume_session(&self, event: &ConnectionSessionEvent) {
        if !event.session_info.is_active() {
            return;
        }
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match event.status.as_str() {
                ConnectionSessionEvent::CREATED => {
                    sessions.insert(event.session_info.session_id.clone());
                }
                ConnectionSessionEvent::DESTROYED => {
                    sessions.remove(&event.session_info.session_id);
                }
                _ => {}
            }
        }
        self.rebuild();
    }

    pub fn get_state(&self) -> NodeState {
        self.rebuild();
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn rebuild(&self) {
        let identities = self
            .identities
            .identities()
            .into_iter()
            .map(|address| IdentityState {
                address: address.to_string(),
                balance: self.balances.balance(&address).map(|b| b.to_string()),
            })
            .collect();
        let active_sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner).len();

        let snapshot = NodeState {
            nat_status: self.nat.status(),
            services: self.services.list(),
            active_sessions,
            identities,
        };
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl std::fmt::Debug for StateKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateKeeper").finish_non_exhaustive()
    }
}
