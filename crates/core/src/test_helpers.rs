// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: an in-memory remote and a small retail registry.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::record::{Predicate, Record};
use crate::registry::{EntityDescriptor, Registry};
use crate::remote::{RemoteApi, RemoteError, RemoteFuture, RemoteResult};

/// A call received by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Get(String),
    Filter(Predicate),
    Create(Record),
    Update(String, Record),
    Delete(String),
}

#[derive(Default)]
struct State {
    records: Vec<Record>,
    next_id: u64,
    calls: Vec<Call>,
    /// Returned by every call until healed.
    failure: Option<RemoteError>,
    /// Returned by the next calls, one each.
    scripted: VecDeque<RemoteError>,
    omit_create_ids: bool,
}

/// In-memory remote collection. Clones share state.
#[derive(Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<State>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed server-side records.
    pub fn with_records(records: Vec<Record>) -> Self {
        let remote = Self::new();
        remote.state.lock().unwrap().records = records;
        remote
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.records()
            .into_iter()
            .find(|r| r.id().as_deref() == Some(id))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn creates(&self) -> Vec<Record> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Fail every call with `error` until [`MockRemote::heal`].
    pub fn fail_with(&self, error: RemoteError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    /// Fail every call as if the network were down.
    pub fn unreachable(&self) {
        self.fail_with(RemoteError::Network("connection refused".to_string()));
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failure = None;
    }

    /// Fail only the next call with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().unwrap().scripted.push_back(error);
    }

    /// Answer creates without an id, like a broken server.
    pub fn omit_create_ids(&self) {
        self.state.lock().unwrap().omit_create_ids = true;
    }

    fn respond<T: Send + 'static>(
        &self,
        call: Call,
        f: impl FnOnce(&mut State) -> RemoteResult<T>,
    ) -> RemoteFuture<'static, T> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if let Some(error) = state.scripted.pop_front() {
                Err(error)
            } else if let Some(error) = state.failure.clone() {
                Err(error)
            } else {
                f(&mut state)
            }
        };
        Box::pin(async move { result })
    }
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::from_status(404, format!("{id} not found"))
}

fn position(state: &State, id: &str) -> Option<usize> {
    state
        .records
        .iter()
        .position(|r| r.id().as_deref() == Some(id))
}

impl RemoteApi for MockRemote {
    fn list(&self) -> RemoteFuture<'_, Vec<Record>> {
        self.respond(Call::List, |state| Ok(state.records.clone()))
    }

    fn get(&self, id: &str) -> RemoteFuture<'_, Record> {
        let id = id.to_string();
        self.respond(Call::Get(id.clone()), move |state| {
            position(state, &id)
                .map(|i| state.records[i].clone())
                .ok_or_else(|| not_found(&id))
        })
    }

    fn filter(&self, predicate: &Predicate) -> RemoteFuture<'_, Vec<Record>> {
        let predicate = predicate.clone();
        self.respond(Call::Filter(predicate.clone()), move |state| {
            Ok(state
                .records
                .iter()
                .filter(|r| r.matches(&predicate))
                .cloned()
                .collect())
        })
    }

    fn create(&self, payload: &Record) -> RemoteFuture<'_, Record> {
        let payload = payload.clone();
        self.respond(Call::Create(payload.clone()), move |state| {
            state.next_id += 1;
            let mut record = payload;
            record.set_id(&format!("srv-{}", state.next_id));
            state.records.push(record.clone());
            if state.omit_create_ids {
                record.remove("id");
            }
            Ok(record)
        })
    }

    fn update(&self, id: &str, patch: &Record) -> RemoteFuture<'_, Record> {
        let id = id.to_string();
        let patch = patch.clone();
        self.respond(Call::Update(id.clone(), patch.clone()), move |state| {
            let i = position(state, &id).ok_or_else(|| not_found(&id))?;
            state.records[i].merge(&patch);
            state.records[i].set_id(&id);
            Ok(state.records[i].clone())
        })
    }

    fn delete(&self, id: &str) -> RemoteFuture<'_, ()> {
        let id = id.to_string();
        self.respond(Call::Delete(id.clone()), move |state| {
            let i = position(state, &id).ok_or_else(|| not_found(&id))?;
            state.records.remove(i);
            Ok(())
        })
    }
}

/// Remotes behind [`retail_fixture`], one per entity.
pub struct Remotes {
    pub sales: MockRemote,
    pub customers: MockRemote,
    pub products: MockRemote,
}

/// Three entities: `sales` and `customers` offline-writable, `products` not.
pub fn retail_fixture() -> (Registry, Remotes) {
    let remotes = Remotes {
        sales: MockRemote::new(),
        customers: MockRemote::new(),
        products: MockRemote::new(),
    };
    let registry = Registry::new(1)
        .with(
            EntityDescriptor::new("sales", Arc::new(remotes.sales.clone()))
                .offline_writable()
                .index("status")
                .index("customer_id"),
        )
        .and_then(|r| {
            r.with(
                EntityDescriptor::new("customers", Arc::new(remotes.customers.clone()))
                    .offline_writable()
                    .index("document"),
            )
        })
        .and_then(|r| {
            r.with(
                EntityDescriptor::new("products", Arc::new(remotes.products.clone()))
                    .index("category_id"),
            )
        })
        .unwrap();
    (registry, remotes)
}
