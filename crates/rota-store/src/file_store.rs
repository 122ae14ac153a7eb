//! File-backed [`DocumentStore`].
//!
//! Layout under the store root:
//!
//! ```text
//! registry/tenants.json          Vec<Tenant>
//! registry/contact_index.json    BTreeMap<address, tenant_id>
//! namespaces/{ns}/agents.json    Vec<Agent>
//! namespaces/{ns}/leads.json     Vec<Lead>
//! namespaces/{ns}/cursors.toml   BTreeMap<key, Cursor>
//! namespaces/{ns}/indexes.toml   declared indexes
//! ```
//!
//! Writes are read-modify-write under an `fd-lock` write lock on the
//! directory's `.lock` file and land via temp-file + rename, so readers
//! never see a partial document and concurrent writers cannot lose updates.
//! All file I/O runs on tokio's blocking pool.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rota_core::{Agent, Cursor, Lead, LeadStatus, Namespace, Tenant};

use crate::store::{Collection, DocumentStore, IndexSpec};

const LOCK_FILE: &str = ".lock";
const TENANTS_FILE: &str = "tenants.json";
const CONTACT_INDEX_FILE: &str = "contact_index.json";
const INDEXES_FILE: &str = "indexes.toml";

#[derive(Debug, Default, serde::Deserialize, Serialize)]
struct IndexManifest {
    #[serde(default)]
    indexes: Vec<IndexSpec>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn registry_dir(&self) -> PathBuf {
        self.root.join("registry")
    }

    /// Directory of one namespace. Rejects names that could escape the root.
    pub fn namespace_dir(&self, ns: &Namespace) -> Result<PathBuf> {
        let name = ns.as_str();
        let ok = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            bail!("Invalid namespace name: '{name}'");
        }
        Ok(self.root.join("namespaces").join(name))
    }

    /// Namespace dir that must already exist (i.e. was provisioned).
    fn existing_namespace_dir(&self, ns: &Namespace) -> Result<PathBuf> {
        let dir = self.namespace_dir(ns)?;
        if !dir.is_dir() {
            bail!("Namespace '{ns}' does not exist");
        }
        Ok(dir)
    }
}

fn collection_path(ns_dir: &Path, collection: Collection) -> PathBuf {
    match collection {
        Collection::Agents => ns_dir.join("agents.json"),
        Collection::Leads => ns_dir.join("leads.json"),
        Collection::Cursors => ns_dir.join("cursors.toml"),
    }
}

/// Run blocking file I/O off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Store I/O task failed")?
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    atomic_write(path, &data)
}

fn read_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    atomic_write(path, content.as_bytes())
}

/// Write data to a file atomically using temp-file + rename.
fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target.parent().context("Target path has no parent")?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    std::io::Write::write_all(&mut tmp, data).context("Failed to write temp file")?;

    tmp.persist(target)
        .with_context(|| format!("Failed to persist to {}", target.display()))?;

    Ok(())
}

/// Acquire a write lock on `dir`, execute `f`, then release.
fn with_write_lock<T>(dir: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let lock_path = dir.join(LOCK_FILE);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock
        .write()
        .map_err(|e| anyhow::anyhow!("Failed to acquire write lock on {}: {e}", dir.display()))?;

    f()
}

/// Read-modify-write of one JSON document under the directory lock.
fn update_json<T, R>(dir: &Path, path: &Path, f: impl FnOnce(&mut T) -> R) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
{
    with_write_lock(dir, || {
        let mut doc: T = read_json(path)?;
        let result = f(&mut doc);
        write_json(path, &doc)?;
        Ok(result)
    })
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn ping(&self) -> Result<()> {
        let dir = self.registry_dir();
        blocking(move || {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create store root: {}", dir.display()))?;
            tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("Store root is not writable: {}", dir.display()))?;
            Ok(())
        })
        .await
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let path = self.registry_dir().join(TENANTS_FILE);
        blocking(move || read_json(&path)).await
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let tenants = self.list_tenants().await?;
        Ok(tenants.into_iter().find(|t| t.tenant_id == tenant_id))
    }

    async fn find_tenant_by_admin(&self, address: &str) -> Result<Option<Tenant>> {
        let tenants = self.list_tenants().await?;
        Ok(tenants
            .into_iter()
            .find(|t| t.admin_contact.eq_ignore_ascii_case(address)))
    }

    async fn put_tenant(&self, tenant: &Tenant) -> Result<()> {
        let dir = self.registry_dir();
        let path = dir.join(TENANTS_FILE);
        let tenant = tenant.clone();
        blocking(move || {
            update_json(&dir, &path, |tenants: &mut Vec<Tenant>| {
                match tenants.iter_mut().find(|t| t.tenant_id == tenant.tenant_id) {
                    Some(existing) => *existing = tenant,
                    None => tenants.push(tenant),
                }
            })
        })
        .await
    }

    async fn remove_tenant(&self, tenant_id: &str) -> Result<bool> {
        let dir = self.registry_dir();
        let path = dir.join(TENANTS_FILE);
        let tenant_id = tenant_id.to_string();
        blocking(move || {
            update_json(&dir, &path, |tenants: &mut Vec<Tenant>| {
                let before = tenants.len();
                tenants.retain(|t| t.tenant_id != tenant_id);
                tenants.len() != before
            })
        })
        .await
    }

    async fn lookup_contact(&self, address: &str) -> Result<Option<String>> {
        let path = self.registry_dir().join(CONTACT_INDEX_FILE);
        let key = address.to_ascii_lowercase();
        blocking(move || {
            let index: BTreeMap<String, String> = read_json(&path)?;
            Ok(index.get(&key).cloned())
        })
        .await
    }

    async fn index_contact(&self, address: &str, tenant_id: &str) -> Result<()> {
        let dir = self.registry_dir();
        let path = dir.join(CONTACT_INDEX_FILE);
        let key = address.to_ascii_lowercase();
        let tenant_id = tenant_id.to_string();
        blocking(move || {
            update_json(&dir, &path, |index: &mut BTreeMap<String, String>| {
                index.insert(key, tenant_id);
            })
        })
        .await
    }

    async fn unindex_tenant(&self, tenant_id: &str) -> Result<usize> {
        let dir = self.registry_dir();
        let path = dir.join(CONTACT_INDEX_FILE);
        let tenant_id = tenant_id.to_string();
        blocking(move || {
            update_json(&dir, &path, |index: &mut BTreeMap<String, String>| {
                let before = index.len();
                index.retain(|_, owner| *owner != tenant_id);
                before - index.len()
            })
        })
        .await
    }

    async fn create_collection(&self, ns: &Namespace, collection: Collection) -> Result<bool> {
        let dir = self.namespace_dir(ns)?;
        blocking(move || {
            with_write_lock(&dir, || {
                let path = collection_path(&dir, collection);
                if path.exists() {
                    return Ok(false);
                }
                match collection {
                    Collection::Agents => write_json(&path, &Vec::<Agent>::new())?,
                    Collection::Leads => write_json(&path, &Vec::<Lead>::new())?,
                    Collection::Cursors => write_toml(&path, &BTreeMap::<String, Cursor>::new())?,
                }
                Ok(true)
            })
        })
        .await
    }

    async fn declare_indexes(&self, ns: &Namespace, indexes: &[IndexSpec]) -> Result<()> {
        let dir = self.existing_namespace_dir(ns)?;
        let indexes = indexes.to_vec();
        blocking(move || {
            with_write_lock(&dir, || {
                let path = dir.join(INDEXES_FILE);
                let mut manifest: IndexManifest = read_toml(&path)?;
                for index in indexes {
                    if !manifest.indexes.contains(&index) {
                        manifest.indexes.push(index);
                    }
                }
                write_toml(&path, &manifest)
            })
        })
        .await
    }

    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>> {
        let dir = self.existing_namespace_dir(ns)?;
        blocking(move || {
            let manifest: IndexManifest = read_toml(&dir.join(INDEXES_FILE))?;
            Ok(manifest.indexes)
        })
        .await
    }

    async fn drop_namespace(&self, ns: &Namespace) -> Result<bool> {
        let dir = self.namespace_dir(ns)?;
        blocking(move || {
            if !dir.exists() {
                return Ok(false);
            }
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to drop namespace: {}", dir.display()))?;
            Ok(true)
        })
        .await
    }

    async fn list_agents(&self, ns: &Namespace) -> Result<Vec<Agent>> {
        let dir = self.existing_namespace_dir(ns)?;
        blocking(move || read_json(&collection_path(&dir, Collection::Agents))).await
    }

    async fn insert_agent(&self, ns: &Namespace, agent: &Agent) -> Result<bool> {
        let dir = self.existing_namespace_dir(ns)?;
        let agent = agent.clone();
        blocking(move || {
            let path = collection_path(&dir, Collection::Agents);
            update_json(&dir, &path, |agents: &mut Vec<Agent>| {
                let exists = agents
                    .iter()
                    .any(|a| a.contact_address.eq_ignore_ascii_case(&agent.contact_address));
                if exists {
                    return false;
                }
                agents.push(agent);
                true
            })
        })
        .await
    }

    async fn set_agent_presence(
        &self,
        ns: &Namespace,
        address: &str,
        online: Option<bool>,
        verified: Option<bool>,
    ) -> Result<bool> {
        let dir = self.existing_namespace_dir(ns)?;
        let address = address.to_string();
        blocking(move || {
            let path = collection_path(&dir, Collection::Agents);
            update_json(&dir, &path, |agents: &mut Vec<Agent>| {
                let Some(agent) = agents
                    .iter_mut()
                    .find(|a| a.contact_address.eq_ignore_ascii_case(&address))
                else {
                    return false;
                };
                if let Some(online) = online {
                    agent.online = online;
                }
                if let Some(verified) = verified {
                    agent.verified = verified;
                }
                true
            })
        })
        .await
    }

    async fn list_leads(&self, ns: &Namespace) -> Result<Vec<Lead>> {
        let dir = self.existing_namespace_dir(ns)?;
        blocking(move || read_json(&collection_path(&dir, Collection::Leads))).await
    }

    async fn insert_lead(&self, ns: &Namespace, lead: &Lead) -> Result<bool> {
        let dir = self.existing_namespace_dir(ns)?;
        let lead = lead.clone();
        blocking(move || {
            let path = collection_path(&dir, Collection::Leads);
            update_json(&dir, &path, |leads: &mut Vec<Lead>| {
                if leads.iter().any(|l| l.id == lead.id) {
                    return false;
                }
                leads.push(lead);
                true
            })
        })
        .await
    }

    async fn assign_lead(
        &self,
        ns: &Namespace,
        lead_id: &str,
        agent: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let dir = self.existing_namespace_dir(ns)?;
        let lead_id = lead_id.to_string();
        let agent = agent.to_string();
        blocking(move || {
            let path = collection_path(&dir, Collection::Leads);
            update_json(&dir, &path, |leads: &mut Vec<Lead>| {
                match leads.iter_mut().find(|l| l.id == lead_id) {
                    Some(lead) if lead.is_unassigned() => {
                        lead.assigned_to = Some(agent);
                        lead.assigned_at = Some(at);
                        lead.status = LeadStatus::Assigned;
                        true
                    }
                    _ => false,
                }
            })
        })
        .await
    }

    async fn load_cursor(&self, ns: &Namespace, key: &str) -> Result<Option<Cursor>> {
        let dir = self.existing_namespace_dir(ns)?;
        let key = key.to_string();
        blocking(move || {
            let mut cursors: BTreeMap<String, Cursor> =
                read_toml(&collection_path(&dir, Collection::Cursors))?;
            Ok(cursors.remove(&key))
        })
        .await
    }

    async fn save_cursor(&self, ns: &Namespace, key: &str, cursor: &Cursor) -> Result<()> {
        let dir = self.existing_namespace_dir(ns)?;
        let key = key.to_string();
        let cursor = cursor.clone();
        blocking(move || {
            with_write_lock(&dir, || {
                let path = collection_path(&dir, Collection::Cursors);
                let mut cursors: BTreeMap<String, Cursor> = read_toml(&path)?;
                cursors.insert(key, cursor);
                write_toml(&path, &cursors)
            })
        })
        .await
    }

    async fn seed_cursor(&self, ns: &Namespace, key: &str, cursor: &Cursor) -> Result<bool> {
        let dir = self.existing_namespace_dir(ns)?;
        let key = key.to_string();
        let cursor = cursor.clone();
        blocking(move || {
            with_write_lock(&dir, || {
                let path = collection_path(&dir, Collection::Cursors);
                let mut cursors: BTreeMap<String, Cursor> = read_toml(&path)?;
                if cursors.contains_key(&key) {
                    return Ok(false);
                }
                cursors.insert(key, cursor);
                write_toml(&path, &cursors)?;
                Ok(true)
            })
        })
        .await
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
