//! Order Lifecycle & Settlement Synchronization Library
//!
//! This crate tracks purchase orders across three inconsistent storage
//! generations, enforces payment-gated status transitions, derives
//! per-supplier settlement parts with shipping proration, fans state changes
//! out as notifications, and keeps a client-side projection synchronized
//! through optimistic updates, request dedup and realtime-driven refreshes.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod models;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod store;
pub mod tiers;

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::services::notifications::NotificationFanout;
use crate::services::read_state::ReadStateReconciler;
use crate::services::resolution::ResolutionChain;
use crate::store::OrderStore;

/// Session-scoped wiring of the engine. Constructed once at session start and
/// passed explicitly to every caller; never a global.
#[derive(Clone)]
pub struct SyncContext {
    pub config: SyncConfig,
    pub chain: Arc<ResolutionChain>,
    pub notifications: Arc<NotificationFanout>,
    pub store: Arc<OrderStore>,
    pub read_state: Arc<ReadStateReconciler>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        chain: Arc<ResolutionChain>,
        notifications: Arc<NotificationFanout>,
        store: Arc<OrderStore>,
        read_state: Arc<ReadStateReconciler>,
    ) -> Self {
        Self {
            config,
            chain,
            notifications,
            store,
            read_state,
        }
    }

    /// Drops all session state. Used at logout and between tests.
    pub fn reset(&self) {
        self.store.reset();
        self.read_state.reset();
    }
}
