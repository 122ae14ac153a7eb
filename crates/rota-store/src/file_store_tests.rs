use super::*;
use chrono::{Duration, TimeZone};
use rota_core::{AgentRole, TenantStatus};
use tempfile::tempdir;

fn ns() -> Namespace {
    Namespace::new("tenant_t1")
}

fn tenant(id: &str, admin: &str) -> Tenant {
    let now = Utc::now();
    Tenant {
        tenant_id: id.to_string(),
        display_name: format!("Tenant {id}"),
        namespace: Namespace::for_tenant(id),
        status: TenantStatus::Active,
        admin_contact: admin.to_string(),
        max_agents: 5,
        max_admins: 1,
        created_at: now,
        updated_at: now,
    }
}

fn agent(address: &str) -> Agent {
    Agent {
        contact_address: address.to_string(),
        role: AgentRole::Standard,
        online: true,
        verified: true,
    }
}

async fn provisioned(store: &FileStore) -> Namespace {
    let ns = ns();
    for collection in Collection::ALL {
        store.create_collection(&ns, collection).await.unwrap();
    }
    ns
}

#[tokio::test]
async fn test_ping_creates_root() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path().join("data"));
    store.ping().await.unwrap();
    assert!(dir.path().join("data").join("registry").is_dir());
}

#[tokio::test]
async fn test_ping_fails_for_unwritable_root() {
    let store = FileStore::new("/dev/null/data");
    assert!(store.ping().await.is_err());
}

#[tokio::test]
async fn test_put_tenant_inserts_then_replaces() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());

    let mut t = tenant("T1", "boss@acme.io");
    store.put_tenant(&t).await.unwrap();
    t.display_name = "Renamed".to_string();
    store.put_tenant(&t).await.unwrap();

    let all = store.list_tenants().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].display_name, "Renamed");
}

#[tokio::test]
async fn test_find_tenant_by_admin_ignores_case() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.put_tenant(&tenant("T1", "Boss@Acme.io")).await.unwrap();

    let found = store.find_tenant_by_admin("boss@acme.io").await.unwrap();
    assert_eq!(found.map(|t| t.tenant_id), Some("T1".to_string()));
    assert!(store.find_tenant_by_admin("x@y.io").await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_tenant_reports_presence() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.put_tenant(&tenant("T1", "a@x.io")).await.unwrap();

    assert!(store.remove_tenant("T1").await.unwrap());
    assert!(!store.remove_tenant("T1").await.unwrap());
    assert!(store.get_tenant("T1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_contact_index_roundtrip_and_unindex() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());

    store.index_contact("A@x.io", "T1").await.unwrap();
    store.index_contact("b@x.io", "T1").await.unwrap();
    store.index_contact("c@x.io", "T2").await.unwrap();

    assert_eq!(
        store.lookup_contact("a@x.io").await.unwrap(),
        Some("T1".to_string())
    );
    assert_eq!(store.unindex_tenant("T1").await.unwrap(), 2);
    assert!(store.lookup_contact("a@x.io").await.unwrap().is_none());
    assert_eq!(
        store.lookup_contact("c@x.io").await.unwrap(),
        Some("T2".to_string())
    );
}

#[tokio::test]
async fn test_create_collection_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = ns();

    assert!(store.create_collection(&ns, Collection::Leads).await.unwrap());
    store
        .insert_lead(&ns, &Lead::new("l1", Utc::now()))
        .await
        .unwrap();
    assert!(!store.create_collection(&ns, Collection::Leads).await.unwrap());
    // Existing documents survive the second create.
    assert_eq!(store.list_leads(&ns).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_namespace_reads_require_provisioning() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let err = store.list_agents(&ns()).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_invalid_namespace_name_rejected() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let bad = Namespace::new("../escape");
    assert!(store.create_collection(&bad, Collection::Agents).await.is_err());
}

#[tokio::test]
async fn test_declare_indexes_skips_duplicates() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    let specs = [
        IndexSpec::unique(Collection::Agents, "contactAddress"),
        IndexSpec::lookup(Collection::Leads, "assignedTo"),
    ];
    store.declare_indexes(&ns, &specs).await.unwrap();
    store.declare_indexes(&ns, &specs).await.unwrap();

    let indexes = store.list_indexes(&ns).await.unwrap();
    assert_eq!(indexes, specs.to_vec());
}

#[tokio::test]
async fn test_insert_agent_rejects_duplicate_address() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    assert!(store.insert_agent(&ns, &agent("a@x.io")).await.unwrap());
    assert!(!store.insert_agent(&ns, &agent("A@X.io")).await.unwrap());
    assert_eq!(store.list_agents(&ns).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_agent_presence() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;
    store.insert_agent(&ns, &agent("a@x.io")).await.unwrap();

    assert!(
        store
            .set_agent_presence(&ns, "a@x.io", Some(false), None)
            .await
            .unwrap()
    );
    let agents = store.list_agents(&ns).await.unwrap();
    assert!(!agents[0].online);
    assert!(agents[0].verified);

    assert!(
        !store
            .set_agent_presence(&ns, "ghost@x.io", Some(true), None)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_assign_lead_only_once() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;
    store
        .insert_lead(&ns, &Lead::new("l1", Utc::now()))
        .await
        .unwrap();

    let at = Utc::now();
    assert!(store.assign_lead(&ns, "l1", "a@x.io", at).await.unwrap());
    assert!(!store.assign_lead(&ns, "l1", "b@x.io", at).await.unwrap());
    assert!(!store.assign_lead(&ns, "missing", "b@x.io", at).await.unwrap());

    let leads = store.list_leads(&ns).await.unwrap();
    assert_eq!(leads[0].assigned_to.as_deref(), Some("a@x.io"));
    assert_eq!(leads[0].assigned_at, Some(at));
    assert_eq!(leads[0].status, LeadStatus::Assigned);
}

#[tokio::test]
async fn test_unassigned_leads_in_stable_order() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
    for (id, offset) in [("c", 2), ("b", 1), ("a", 1), ("z", 0)] {
        store
            .insert_lead(&ns, &Lead::new(id, base + Duration::minutes(offset)))
            .await
            .unwrap();
    }
    store.assign_lead(&ns, "b", "x@x.io", base).await.unwrap();

    let ids: Vec<String> = store
        .unassigned_leads(&ns)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(ids, vec!["z", "a", "c"]);
}

#[tokio::test]
async fn test_seed_cursor_never_overwrites() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    let neutral = Cursor::neutral(Utc::now());
    assert!(store.seed_cursor(&ns, "k", &neutral).await.unwrap());

    let advanced = Cursor {
        last_assigned_index: 2,
        last_assigned_agent: Some("c@x.io".to_string()),
        last_assigned_at: Utc::now(),
    };
    store.save_cursor(&ns, "k", &advanced).await.unwrap();
    assert!(!store.seed_cursor(&ns, "k", &neutral).await.unwrap());

    assert_eq!(store.load_cursor(&ns, "k").await.unwrap(), Some(advanced));
    assert!(store.load_cursor(&ns, "other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_collection_surfaces_parse_error() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;
    let path = store.namespace_dir(&ns).unwrap().join("leads.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = store.list_leads(&ns).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse"));
}

#[tokio::test]
async fn test_drop_namespace() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    assert!(store.drop_namespace(&ns).await.unwrap());
    assert!(!store.namespace_dir(&ns).unwrap().exists());
    assert!(!store.drop_namespace(&ns).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_inserts_are_not_lost() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let ns = provisioned(&store).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let ns = ns.clone();
        handles.push(tokio::spawn(async move {
            store
                .insert_lead(&ns, &Lead::new(format!("l{i:02}"), Utc::now()))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }
    assert_eq!(store.list_leads(&ns).await.unwrap().len(), 16);
}
