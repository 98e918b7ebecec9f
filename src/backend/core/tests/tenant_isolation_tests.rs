//! Tenant isolation at the data layer: scoping, bypass, and the paths an
//! attacker-controlled filter could try to take across a tenant boundary.

use std::sync::Arc;

use tickethub_core::prelude::*;
use tickethub_core::store::models::User;
use tickethub_core::store::{NewTenant, NewUser, NewWorkItem};

struct World {
    store: Arc<MemoryStore>,
    acme: TenantId,
    globex: TenantId,
    acme_staff: User,
    globex_staff: User,
}

async fn world() -> World {
    let store = Arc::new(MemoryStore::new());
    let acme = store
        .create_tenant(NewTenant {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
        })
        .await
        .unwrap();
    let globex = store
        .create_tenant(NewTenant {
            name: "Globex".to_string(),
            slug: "globex".to_string(),
        })
        .await
        .unwrap();
    let acme_staff = store
        .create_user(NewUser {
            email: "staff@acme.test".to_string(),
            name: "Acme Staff".to_string(),
            role: Role::Staff,
            tenant_id: Some(acme.id),
        })
        .await
        .unwrap();
    let globex_staff = store
        .create_user(NewUser {
            email: "staff@globex.test".to_string(),
            name: "Globex Staff".to_string(),
            role: Role::Staff,
            tenant_id: Some(globex.id),
        })
        .await
        .unwrap();
    World {
        store,
        acme: acme.id,
        globex: globex.id,
        acme_staff,
        globex_staff,
    }
}

fn ticket(tenant: TenantId, creator: &User, title: &str) -> NewWorkItem {
    NewWorkItem {
        tenant_id: Some(tenant),
        kind: WorkItemKind::Ticket,
        title: title.to_string(),
        description: None,
        status: WorkItemStatus::Todo,
        priority: WorkItemPriority::Medium,
        assignee_id: None,
        created_by_id: creator.id,
        meta: None,
    }
}

#[tokio::test]
async fn scoped_reads_never_cross_tenants() {
    let w = world().await;
    w.store
        .create_work_item(ticket(w.acme, &w.acme_staff, "acme item"))
        .await
        .unwrap();
    w.store
        .create_work_item(ticket(w.globex, &w.globex_staff, "globex item"))
        .await
        .unwrap();

    let client = TenantClient::scoped(w.store.clone(), w.acme);
    let items = client
        .find_work_items(WorkItemFilter::default(), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "acme item");
}

#[tokio::test]
async fn foreign_id_reads_as_absent_not_as_denied() {
    let w = world().await;
    let foreign = w
        .store
        .create_work_item(ticket(w.globex, &w.globex_staff, "globex item"))
        .await
        .unwrap();

    let client = TenantClient::scoped(w.store.clone(), w.acme);
    let found = client
        .find_work_item(WorkItemFilter::by_id(foreign.id), QueryOptions::default())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn email_lookup_is_tenant_scoped() {
    let w = world().await;
    let client = TenantClient::scoped(w.store.clone(), w.acme);

    let own = client
        .find_user(UserFilter::by_email("staff@acme.test"), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(own.map(|u| u.id), Some(w.acme_staff.id));

    let foreign = client
        .find_user(
            UserFilter::by_email("staff@globex.test"),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert!(foreign.is_none());
}

#[tokio::test]
async fn bulk_writes_against_foreign_rows_affect_nothing() {
    let w = world().await;
    let foreign = w
        .store
        .create_work_item(ticket(w.globex, &w.globex_staff, "globex item"))
        .await
        .unwrap();
    let client = TenantClient::scoped(w.store.clone(), w.acme);

    let patch = tickethub_core::store::WorkItemPatch {
        title: Some("hijacked".to_string()),
        ..Default::default()
    };
    let updated = client
        .update_work_items(WorkItemFilter::by_id(foreign.id), patch, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(updated, 0);

    let deleted = client
        .delete_work_items(WorkItemFilter::by_id(foreign.id), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(deleted, 0);

    let untouched = w
        .store
        .find_work_item(&WorkItemFilter::by_id(foreign.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.title, "globex item");
}

#[tokio::test]
async fn bypass_lifts_scoping_for_a_single_call() {
    let w = world().await;
    w.store
        .create_work_item(ticket(w.acme, &w.acme_staff, "acme item"))
        .await
        .unwrap();
    w.store
        .create_work_item(ticket(w.globex, &w.globex_staff, "globex item"))
        .await
        .unwrap();
    let client = TenantClient::scoped(w.store.clone(), w.acme);

    let all = client
        .find_work_items(WorkItemFilter::default(), QueryOptions::bypass())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    // The next call over the same client is scoped again.
    let scoped = client
        .find_work_items(WorkItemFilter::default(), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
}

#[tokio::test]
async fn unscoped_client_is_the_cross_tenant_path() {
    let w = world().await;
    w.store
        .create_work_item(ticket(w.acme, &w.acme_staff, "acme item"))
        .await
        .unwrap();
    w.store
        .create_work_item(ticket(w.globex, &w.globex_staff, "globex item"))
        .await
        .unwrap();

    let admin = TenantClient::unscoped(w.store.clone());
    let all = admin
        .find_work_items(WorkItemFilter::default(), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn tenant_deletion_cascades_to_users_and_items() {
    let w = world().await;
    w.store
        .create_work_item(ticket(w.acme, &w.acme_staff, "doomed"))
        .await
        .unwrap();
    let admin = TenantClient::unscoped(w.store.clone());

    let removed = admin
        .delete_tenants(&tickethub_core::store::TenantFilter::by_id(w.acme))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let survivors = admin
        .find_work_items(WorkItemFilter::default(), QueryOptions::default())
        .await
        .unwrap();
    assert!(survivors.is_empty());
    let users = admin
        .find_users(UserFilter::default(), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].tenant_id, w.globex);
}
