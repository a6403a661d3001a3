// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::queue::EntryStatus;
use crate::registry::Registry;
use crate::test_helpers::{retail_fixture, Call, Remotes};
use serde_json::json;

struct Fixture {
    db: Database,
    monitor: Arc<ConnectivityMonitor>,
    registry: Registry,
    remotes: Remotes,
}

impl Fixture {
    fn new(online: bool) -> Self {
        let (registry, remotes) = retail_fixture();
        let db = Database::open_in_memory(&registry.schema()).unwrap();
        Fixture {
            db,
            monitor: Arc::new(ConnectivityMonitor::new(online)),
            registry,
            remotes,
        }
    }

    fn gateway(&self, name: &str) -> EntityGateway {
        EntityGateway::new(
            Arc::clone(self.registry.get(name).unwrap()),
            self.db.clone(),
            Arc::clone(&self.monitor),
        )
    }

    fn store(&self) -> LocalStore {
        LocalStore::new(self.db.clone())
    }

    fn queue(&self) -> SyncQueue {
        SyncQueue::new(self.db.clone())
    }
}

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

fn network_down() -> RemoteError {
    RemoteError::Network("connection refused".to_string())
}

// list

#[tokio::test]
async fn list_online_refreshes_cache() {
    let fx = Fixture::new(true);
    fx.remotes
        .products
        .create(&record(json!({"name": "Arroz"})))
        .await
        .unwrap();

    let products = fx.gateway("products").list().await.unwrap();

    assert_eq!(products.len(), 1);
    assert!(products[0].is_synced());
    assert_eq!(fx.store().count("products").unwrap(), 1);
    assert!(fx.store().last_fetched("products").unwrap().is_some());
}

#[tokio::test]
async fn list_offline_serves_cache_without_calling_remote() {
    let fx = Fixture::new(false);
    fx.store()
        .put("products", &record(json!({"id": "p1", "name": "Feijao"})))
        .unwrap();

    let products = fx.gateway("products").list().await.unwrap();

    assert_eq!(products.len(), 1);
    assert!(fx.remotes.products.calls().is_empty());
}

#[tokio::test]
async fn list_offline_with_empty_cache_is_empty() {
    let fx = Fixture::new(false);
    assert!(fx.gateway("products").list().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_failure_falls_back_to_cache() {
    let fx = Fixture::new(true);
    fx.store()
        .put("products", &record(json!({"id": "p1", "name": "Feijao"})))
        .unwrap();
    fx.remotes
        .products
        .fail_with(RemoteError::from_status(500, "boom"));

    let products = fx.gateway("products").list().await.unwrap();
    assert_eq!(products[0].id().as_deref(), Some("p1"));
    assert!(fx.store().last_fetched("products").unwrap().is_none());
}

#[tokio::test]
async fn list_failure_with_empty_cache_propagates() {
    let fx = Fixture::new(true);
    fx.remotes.products.fail_with(network_down());

    let err = fx.gateway("products").list().await.unwrap_err();
    assert!(err.as_remote().unwrap().is_network());
}

#[tokio::test]
async fn fetched_records_do_not_clobber_unsynced_changes() {
    let fx = Fixture::new(true);
    let server = record(json!({"name": "Ana"}));
    let created = fx.remotes.customers.create(&server).await.unwrap();
    let id = created.id().unwrap();

    let mut local = created.clone().with("name", "Ana Maria");
    local.mark_offline(Utc::now());
    fx.store().put("customers", &local).unwrap();

    fx.gateway("customers").list().await.unwrap();

    let cached = fx.store().get("customers", &id).unwrap().unwrap();
    assert_eq!(cached.get("name"), Some(&json!("Ana Maria")));
    assert!(!cached.is_synced());
}

// get

#[tokio::test]
async fn get_online_caches_the_record() {
    let fx = Fixture::new(true);
    let created = fx
        .remotes
        .products
        .create(&record(json!({"name": "Cafe"})))
        .await
        .unwrap();
    let id = created.id().unwrap();

    let got = fx.gateway("products").get(&id).await.unwrap().unwrap();

    assert_eq!(got.get("name"), Some(&json!("Cafe")));
    assert!(fx.store().get("products", &id).unwrap().is_some());
}

#[tokio::test]
async fn get_not_found_evicts_synced_copy() {
    let fx = Fixture::new(true);
    fx.store()
        .put("products", &record(json!({"id": "gone", "name": "Old"})))
        .unwrap();

    assert_eq!(fx.gateway("products").get("gone").await.unwrap(), None);
    assert!(fx.store().get("products", "gone").unwrap().is_none());
}

#[tokio::test]
async fn get_not_found_keeps_unsynced_copy() {
    let fx = Fixture::new(true);
    let mut local = record(json!({"id": "c1", "name": "Ana"}));
    local.mark_offline(Utc::now());
    fx.store().put("customers", &local).unwrap();

    assert_eq!(fx.gateway("customers").get("c1").await.unwrap(), None);
    assert!(fx.store().get("customers", "c1").unwrap().is_some());
}

#[tokio::test]
async fn get_failure_serves_cache_or_propagates() {
    let fx = Fixture::new(true);
    fx.store()
        .put("products", &record(json!({"id": "p1", "name": "Leite"})))
        .unwrap();
    fx.remotes.products.fail_with(network_down());
    let gateway = fx.gateway("products");

    assert!(gateway.get("p1").await.unwrap().is_some());
    assert!(matches!(gateway.get("p2").await, Err(Error::Remote(_))));
}

#[tokio::test]
async fn get_temp_id_reads_locally_even_online() {
    let fx = Fixture::new(true);
    fx.store()
        .put("sales", &record(json!({"id": "temp_1_abcdefghi", "total": 5})))
        .unwrap();

    let got = fx.gateway("sales").get("temp_1_abcdefghi").await.unwrap();

    assert!(got.is_some());
    assert!(fx.remotes.sales.calls().is_empty());
}

// filter

#[tokio::test]
async fn filter_online_caches_non_empty_results() {
    let fx = Fixture::new(true);
    let sales = fx.remotes.sales.clone();
    sales
        .create(&record(json!({"status": "aberto", "total": 10})))
        .await
        .unwrap();
    sales
        .create(&record(json!({"status": "fechado", "total": 20})))
        .await
        .unwrap();

    let open = fx
        .gateway("sales")
        .filter(&Predicate::new().with("status", "aberto"))
        .await
        .unwrap();

    assert_eq!(open.len(), 1);
    assert_eq!(fx.store().count("sales").unwrap(), 1);
}

#[tokio::test]
async fn filter_online_empty_result_leaves_cache_alone() {
    let fx = Fixture::new(true);
    fx.store()
        .put("sales", &record(json!({"id": "s1", "status": "aberto"})))
        .unwrap();

    let found = fx
        .gateway("sales")
        .filter(&Predicate::new().with("status", "aberto"))
        .await
        .unwrap();

    assert!(found.is_empty());
    assert_eq!(fx.store().count("sales").unwrap(), 1);
}

#[tokio::test]
async fn filter_failure_queries_cache() {
    let fx = Fixture::new(true);
    fx.store()
        .put_many(
            "sales",
            &[
                record(json!({"id": "s1", "status": "aberto"})),
                record(json!({"id": "s2", "status": "fechado"})),
            ],
        )
        .unwrap();
    fx.remotes.sales.fail_with(network_down());

    let found = fx
        .gateway("sales")
        .filter(&Predicate::new().with("status", "fechado"))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id().as_deref(), Some("s2"));
}

// create

#[tokio::test]
async fn create_online_returns_server_record() {
    let fx = Fixture::new(true);
    let created = fx
        .gateway("sales")
        .create(record(json!({"total": 50})))
        .await
        .unwrap();

    assert_eq!(created.id().as_deref(), Some("srv-1"));
    assert!(created.is_synced());
    assert!(fx.store().get("sales", "srv-1").unwrap().is_some());
    assert!(fx.queue().list(None).unwrap().is_empty());
}

#[tokio::test]
async fn create_offline_is_optimistic() {
    let fx = Fixture::new(false);
    let created = fx
        .gateway("sales")
        .create(record(json!({"total": 50})))
        .await
        .unwrap();

    let id = created.id().unwrap();
    assert!(is_temp_id(&id));
    assert!(created.is_offline());
    assert!(!created.is_synced());
    assert!(created.get(CREATED_AT_FIELD).is_some());
    assert_eq!(fx.store().get("sales", &id).unwrap(), Some(created));

    let entries = fx.queue().pending().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, Operation::Create);
    assert_eq!(entries[0].entity_id, id);
    assert_eq!(entries[0].payload.get("total"), Some(&json!(50)));
    assert!(entries[0].payload.get("id").is_none());
    assert!(fx.remotes.sales.calls().is_empty());
}

#[tokio::test]
async fn create_failure_falls_back_for_offline_writable() {
    let fx = Fixture::new(true);
    fx.remotes.sales.fail_with(network_down());

    let created = fx
        .gateway("sales")
        .create(record(json!({"total": 50})))
        .await
        .unwrap();

    assert!(is_temp_id(&created.id().unwrap()));
    assert_eq!(fx.queue().pending().unwrap().len(), 1);
}

#[tokio::test]
async fn create_without_id_in_response_is_not_queued() {
    let fx = Fixture::new(true);
    fx.remotes.sales.omit_create_ids();

    let err = fx
        .gateway("sales")
        .create(record(json!({"total": 50})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote(RemoteError::InvalidResponse(_))));
    // The server stored it; a queued create would store it twice.
    assert_eq!(fx.remotes.sales.records().len(), 1);
    assert!(fx.queue().list(None).unwrap().is_empty());
    assert_eq!(fx.store().count("sales").unwrap(), 0);
}

#[tokio::test]
async fn invalid_update_response_is_not_queued() {
    let fx = Fixture::new(true);
    fx.store()
        .put("customers", &record(json!({"id": "c1", "name": "Ana"})))
        .unwrap();
    fx.remotes
        .customers
        .fail_next(RemoteError::InvalidResponse("truncated body".to_string()));

    let err = fx
        .gateway("customers")
        .update("c1", record(json!({"name": "Ana B"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote(RemoteError::InvalidResponse(_))));
    assert!(fx.queue().list(None).unwrap().is_empty());
}

#[tokio::test]
async fn online_create_referencing_a_temp_id_queues_behind_it() {
    let fx = Fixture::new(false);
    let customer = fx
        .gateway("customers")
        .create(record(json!({"name": "Ana"})))
        .await
        .unwrap()
        .id()
        .unwrap();
    fx.monitor.set_online(true);

    let sale = fx
        .gateway("sales")
        .create(record(json!({"total": 50, "customer_id": customer})))
        .await
        .unwrap();

    assert!(is_temp_id(&sale.id().unwrap()));
    assert!(fx.remotes.sales.calls().is_empty());
    let entries = fx.queue().pending().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].entity, "sales");
    assert_eq!(entries[1].payload.get("customer_id"), Some(&json!(customer)));
}

#[tokio::test]
async fn create_failure_propagates_for_read_only_entity() {
    let fx = Fixture::new(true);
    fx.remotes
        .products
        .fail_with(RemoteError::from_status(422, "invalid"));

    let err = fx
        .gateway("products")
        .create(record(json!({"name": "Acucar"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote(RemoteError::Rejected { status: 422, .. })));
    assert_eq!(fx.store().count("products").unwrap(), 0);
    assert!(fx.queue().list(None).unwrap().is_empty());
}

#[tokio::test]
async fn write_guard_rejects_offline_writes_to_read_only_entity() {
    let fx = Fixture::new(false);
    fx.store()
        .put("products", &record(json!({"id": "p1", "name": "Sal"})))
        .unwrap();
    let products = fx.gateway("products");

    for _ in 0..2 {
        let err = products
            .create(record(json!({"name": "Oleo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity { ref entity } if entity == "products"));
    }
    assert!(matches!(
        products.update("p1", record(json!({"name": "Sal grosso"}))).await,
        Err(Error::Connectivity { .. })
    ));
    assert!(matches!(
        products.delete("p1").await,
        Err(Error::Connectivity { .. })
    ));

    assert!(fx.queue().list(None).unwrap().is_empty());
    assert_eq!(
        fx.store().get("products", "p1").unwrap().unwrap().get("name"),
        Some(&json!("Sal"))
    );
}

// update

#[tokio::test]
async fn update_online_overwrites_cache() {
    let fx = Fixture::new(true);
    let gateway = fx.gateway("customers");
    let created = gateway.create(record(json!({"name": "Ana"}))).await.unwrap();
    let id = created.id().unwrap();

    let updated = gateway
        .update(&id, record(json!({"name": "Ana Maria"})))
        .await
        .unwrap();

    assert_eq!(updated.get("name"), Some(&json!("Ana Maria")));
    assert_eq!(fx.store().get("customers", &id).unwrap(), Some(updated));
}

#[tokio::test]
async fn update_offline_merges_and_queues_the_patch() {
    let fx = Fixture::new(false);
    fx.store()
        .put("customers", &record(json!({"id": "c1", "name": "Ana", "city": "Recife"})))
        .unwrap();

    let updated = fx
        .gateway("customers")
        .update("c1", record(json!({"city": "Olinda"})))
        .await
        .unwrap();

    assert_eq!(updated.get("name"), Some(&json!("Ana")));
    assert_eq!(updated.get("city"), Some(&json!("Olinda")));
    assert!(!updated.is_synced());

    let entries = fx.queue().pending().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, Operation::Update);
    assert_eq!(entries[0].payload, record(json!({"city": "Olinda"})));
}

#[tokio::test]
async fn update_offline_missing_record_is_not_found() {
    let fx = Fixture::new(false);
    let err = fx
        .gateway("customers")
        .update("nobody", record(json!({"name": "x"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert!(fx.queue().list(None).unwrap().is_empty());
}

#[tokio::test]
async fn update_of_temp_record_amends_the_queued_create() {
    let fx = Fixture::new(false);
    let gateway = fx.gateway("sales");
    let created = gateway.create(record(json!({"total": 50}))).await.unwrap();
    let id = created.id().unwrap();

    gateway
        .update(&id, record(json!({"total": 60, "status": "fechado"})))
        .await
        .unwrap();

    let entries = fx.queue().pending().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, Operation::Create);
    assert_eq!(entries[0].payload.get("total"), Some(&json!(60)));
    assert_eq!(entries[0].payload.get("status"), Some(&json!("fechado")));
}

#[tokio::test]
async fn update_online_with_queued_changes_is_queued() {
    let fx = Fixture::new(true);
    let created = fx
        .remotes
        .customers
        .create(&record(json!({"name": "Ana"})))
        .await
        .unwrap();
    let id = created.id().unwrap();
    fx.store().put("customers", &created).unwrap();
    fx.queue()
        .append("customers", Operation::Update, &id, &record(json!({"name": "Ana B"})))
        .unwrap();
    fx.remotes.customers.clear_calls();

    fx.gateway("customers")
        .update(&id, record(json!({"name": "Ana C"})))
        .await
        .unwrap();

    assert!(fx.remotes.customers.calls().is_empty());
    let queued: Vec<_> = fx
        .queue()
        .pending()
        .unwrap()
        .into_iter()
        .map(|e| e.payload.get("name").cloned())
        .collect();
    assert_eq!(queued, vec![Some(json!("Ana B")), Some(json!("Ana C"))]);
}

// delete

#[tokio::test]
async fn delete_online_evicts() {
    let fx = Fixture::new(true);
    let gateway = fx.gateway("products");
    fx.remotes
        .products
        .create(&record(json!({"name": "Sal"})))
        .await
        .unwrap();
    gateway.list().await.unwrap();

    gateway.delete("srv-1").await.unwrap();

    assert!(fx.store().get("products", "srv-1").unwrap().is_none());
    assert!(fx.remotes.products.records().is_empty());
}

#[tokio::test]
async fn delete_online_of_missing_remote_record_succeeds() {
    let fx = Fixture::new(true);
    fx.store()
        .put("products", &record(json!({"id": "p1"})))
        .unwrap();

    fx.gateway("products").delete("p1").await.unwrap();
    assert!(fx.store().get("products", "p1").unwrap().is_none());
}

#[tokio::test]
async fn delete_offline_evicts_and_queues() {
    let fx = Fixture::new(false);
    fx.store()
        .put("customers", &record(json!({"id": "c1", "name": "Ana"})))
        .unwrap();

    fx.gateway("customers").delete("c1").await.unwrap();

    assert!(fx.store().get("customers", "c1").unwrap().is_none());
    let entries = fx.queue().pending().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, Operation::Delete);
    assert_eq!(entries[0].entity_id, "c1");
}

#[tokio::test]
async fn delete_of_temp_record_cancels_its_create() {
    let fx = Fixture::new(false);
    let gateway = fx.gateway("sales");
    let created = gateway.create(record(json!({"total": 50}))).await.unwrap();
    let id = created.id().unwrap();

    gateway.delete(&id).await.unwrap();

    assert!(fx.store().get("sales", &id).unwrap().is_none());
    assert!(fx.queue().list(None).unwrap().is_empty());
}

#[tokio::test]
async fn delete_offline_missing_record_is_not_found() {
    let fx = Fixture::new(false);
    assert!(matches!(
        fx.gateway("sales").delete("s404").await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn routing_follows_connectivity_at_call_time() {
    let fx = Fixture::new(false);
    let gateway = fx.gateway("sales");

    let offline = gateway.create(record(json!({"total": 1}))).await.unwrap();
    fx.monitor.set_online(true);
    let online = gateway.create(record(json!({"total": 2}))).await.unwrap();

    assert!(is_temp_id(&offline.id().unwrap()));
    assert!(!is_temp_id(&online.id().unwrap()));
    assert_eq!(
        fx.remotes.sales.calls(),
        vec![Call::Create(record(json!({"total": 2})))]
    );
    assert_eq!(fx.queue().list(Some(EntryStatus::Pending)).unwrap().len(), 1);
}
