//! Account setup and runtime.
//!
//! Setup turns one [`AccountConfig`] into a running [`AccountRuntime`]:
//! a client session, a rotation watcher seeded from durable storage, and a
//! supervisor with every discovered door attached. Device listing failure
//! is fatal for the whole account; a single device failing to attach only
//! loses that device.

use crate::cache::StatusCache;
use crate::config::AccountConfig;
use crate::entity::DoorEntity;
use crate::error::{Result, SyncError};
use crate::rotation::RotationWatcher;
use crate::scheduler::DeviceSupervisor;
use doorlink_client::{AnyDoorClient, ClientCredentials, ClientFactory, DoorClient};
use doorlink_core::constants::REMOTE_CALL_TIMEOUT_SECS;
use doorlink_core::{DeviceId, SessionHandle};
use doorlink_store::{CredentialRecord, CredentialRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Everything running for one configured account.
///
/// Owns the supervisor and the entity set; dropping the runtime without
/// calling [`AccountRuntime::shutdown`] aborts the device tasks without
/// subscription teardown.
pub struct AccountRuntime<R> {
    client: AnyDoorClient,
    supervisor: DeviceSupervisor<R>,
    cache: StatusCache,
    watcher: Arc<RotationWatcher<R>>,
    entities: Vec<DoorEntity<R>>,
}

impl<R: CredentialRepository + 'static> AccountRuntime<R> {
    /// The door entities created during setup.
    #[must_use]
    pub fn entities(&self) -> &[DoorEntity<R>] {
        &self.entities
    }

    /// Look up an entity by device id.
    #[must_use]
    pub fn entity(&self, device_id: &DeviceId) -> Option<&DoorEntity<R>> {
        self.entities.iter().find(|e| e.device_id() == device_id)
    }

    /// The shared status cache.
    #[must_use]
    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// The account client session.
    #[must_use]
    pub fn client(&self) -> &AnyDoorClient {
        &self.client
    }

    /// The rotation watcher for this account.
    #[must_use]
    pub fn watcher(&self) -> &Arc<RotationWatcher<R>> {
        &self.watcher
    }

    /// Access the supervisor, for attach and detach.
    pub fn supervisor(&mut self) -> &mut DeviceSupervisor<R> {
        &mut self.supervisor
    }

    /// Detach a device and drop its entity.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAttached` for an unknown device id.
    pub async fn detach(&mut self, device_id: &DeviceId) -> Result<()> {
        self.supervisor.detach(device_id).await?;
        self.entities.retain(|e| e.device_id() != device_id);
        Ok(())
    }

    /// Tear down the account: subscriptions, tasks, cache entries.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
    }
}

impl<R> std::fmt::Debug for AccountRuntime<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRuntime")
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

/// Set up one account end to end.
///
/// Loads (or seeds) the credential record, creates the client session
/// preferring the stored handle with a fall back to account credentials,
/// checks the fresh handle for a rotated token, lists the devices, and
/// attaches each one in its configured mode. Listing failure aborts
/// setup; per-device attach failure is logged and skipped so siblings
/// still come up.
///
/// # Errors
///
/// Returns an error for invalid configuration, unusable credentials, a
/// failed device listing, or a store failure while reading or seeding the
/// credential record.
pub async fn setup_account<F, R>(
    factory: &F,
    repository: R,
    config: &AccountConfig,
    cache: StatusCache,
) -> Result<AccountRuntime<R>>
where
    F: ClientFactory,
    R: CredentialRepository + Clone + 'static,
{
    config.validate()?;

    // Stored credentials win over configured ones: a token rotated by a
    // previous run is the only one the remote still accepts.
    let stored = repository.find_by_account(&config.account_id).await?;
    let (effective_token, stored_handle) = match stored {
        Some(record) => {
            let handle = match record.session_handle() {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(
                        account_id = %config.account_id,
                        error = %e,
                        "stored session handle unreadable, starting from account credentials"
                    );
                    SessionHandle::new()
                }
            };
            (record.refresh_token, handle)
        }
        None => {
            let handle = config.handle.clone().unwrap_or_default();
            let record = CredentialRecord::new(
                &config.account_id,
                &config.refresh_token,
                &handle,
                config.poll_interval().as_secs() as i64,
            )?;
            repository.insert(&record).await?;
            (config.refresh_token.clone(), handle)
        }
    };

    let client = create_client(factory, &config.account_id, &effective_token, &stored_handle).await?;

    let watcher = Arc::new(RotationWatcher::new(
        &config.account_id,
        effective_token,
        repository,
    ));

    // The authentication exchange during create may already have rotated
    // the token; catch it before the first poll cycle.
    watcher.observe(&client.session_handle()).await;

    let devices = timeout(
        Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS),
        client.list_devices(),
    )
    .await
    .map_err(|_| SyncError::setup("device listing timed out"))?
    .map_err(|e| SyncError::setup(format!("device listing failed: {e}")))?;

    info!(
        account_id = %config.account_id,
        device_count = devices.len(),
        "account session established"
    );

    let mut supervisor = DeviceSupervisor::new(
        client.clone(),
        cache.clone(),
        Arc::clone(&watcher),
        config.poll_interval(),
    );

    let mut entities = Vec::with_capacity(devices.len());
    for listed in devices {
        let Some(device) = client.device(&listed.device_id) else {
            warn!(device_id = %listed.device_id, "listed device not resolvable, skipping");
            continue;
        };

        match supervisor.attach(device.clone(), config.mode_for(&listed.device_id)) {
            Ok(mode) => {
                info!(device_id = %listed.device_id, %mode, name = %listed.name, "door ready");
                entities.push(DoorEntity::new(
                    device,
                    client.clone(),
                    cache.clone(),
                    Arc::clone(&watcher),
                ));
            }
            Err(e) => {
                // One broken device must not take its siblings down.
                warn!(device_id = %listed.device_id, error = %e, "device attach failed, skipping");
            }
        }
    }

    Ok(AccountRuntime {
        client,
        supervisor,
        cache,
        watcher,
        entities,
    })
}

/// Create the client session, preferring the stored handle.
///
/// A stale handle being rejected is routine after long downtime; the
/// account/token pair is the fallback. Both paths are time-bounded.
async fn create_client<F: ClientFactory>(
    factory: &F,
    account_id: &str,
    refresh_token: &str,
    handle: &SessionHandle,
) -> Result<AnyDoorClient> {
    let bound = Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS);

    if !handle.is_empty() {
        match timeout(bound, factory.create(&ClientCredentials::Handle(handle.clone()))).await {
            Ok(Ok(client)) => return Ok(client),
            Ok(Err(e)) => {
                warn!(account_id = %account_id, error = %e, "stored handle rejected, re-authenticating");
            }
            Err(_) => {
                warn!(account_id = %account_id, "handle-based session creation timed out, re-authenticating");
            }
        }
    }

    let credentials = ClientCredentials::Account {
        account_id: account_id.to_string(),
        refresh_token: refresh_token.to_string(),
    };
    timeout(bound, factory.create(&credentials))
        .await
        .map_err(|_| SyncError::setup("session creation timed out"))?
        .map_err(|e| SyncError::setup(format!("session creation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SyncMode;
    use doorlink_client::mock::{MockClientFactory, MockDoorClient};
    use doorlink_client::Capabilities;
    use doorlink_core::Device;
    use doorlink_store::{Database, SqliteCredentialRepository};

    fn meta(id: &str, name: &str) -> Device {
        Device::new(DeviceId::new(id).unwrap(), name, "Chamberlain", "WGDO-1")
    }

    async fn repo() -> (Database, SqliteCredentialRepository) {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteCredentialRepository::new(db.pool().clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_setup_creates_entities() {
        let (_db, repo) = repo().await;
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        account.add_device(meta("GD-2", "Side Garage"), Capabilities::poll_only());
        let factory = MockClientFactory::new(client);

        let config = AccountConfig::new("acct-1", "tok-A");
        let runtime = setup_account(&factory, repo.clone(), &config, StatusCache::new())
            .await
            .unwrap();

        assert_eq!(runtime.entities().len(), 2);
        assert!(runtime.entity(&DeviceId::new("GD-1").unwrap()).is_some());

        // Setup seeded the credential record.
        let record = repo.find_by_account("acct-1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, "tok-A");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_setup_prefers_stored_credentials() {
        let (_db, repo) = repo().await;

        // A previous run rotated the token and persisted the handle.
        let mut handle = SessionHandle::new();
        handle.insert("refresh_token", "tok-B");
        let record = CredentialRecord::new("acct-1", "tok-B", &handle, 10).unwrap();
        repo.insert(&record).await.unwrap();

        let (client, account) = MockDoorClient::new("acct-1", "tok-B");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        let factory = MockClientFactory::new(client);

        // The config still carries the stale original token.
        let config = AccountConfig::new("acct-1", "tok-A");
        let runtime = setup_account(&factory, repo.clone(), &config, StatusCache::new())
            .await
            .unwrap();

        // Handle-based creation was used; no fallback needed.
        assert_eq!(factory.handle_creates(), 1);
        assert_eq!(factory.account_creates(), 0);
        assert_eq!(runtime.watcher().current_token().await, "tok-B");

        // The stored token was not clobbered by the stale config.
        let record = repo.find_by_account("acct-1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, "tok-B");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_setup_falls_back_when_handle_rejected() {
        let (_db, repo) = repo().await;

        let mut handle = SessionHandle::new();
        handle.insert("refresh_token", "tok-A");
        let record = CredentialRecord::new("acct-1", "tok-A", &handle, 10).unwrap();
        repo.insert(&record).await.unwrap();

        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        let factory = MockClientFactory::new(client);
        factory.reject_handle_credentials(true);

        let config = AccountConfig::new("acct-1", "tok-A");
        let runtime = setup_account(&factory, repo, &config, StatusCache::new())
            .await
            .unwrap();

        assert_eq!(factory.handle_creates(), 0);
        assert_eq!(factory.account_creates(), 1);
        assert_eq!(runtime.entities().len(), 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_setup_fails_on_listing_failure() {
        let (_db, repo) = repo().await;
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.set_list_failure(true);
        let factory = MockClientFactory::new(client);

        let config = AccountConfig::new("acct-1", "tok-A");
        let result = setup_account(&factory, repo, &config, StatusCache::new()).await;
        assert!(matches!(result, Err(SyncError::Setup { .. })));
    }

    #[tokio::test]
    async fn test_setup_rejects_invalid_config() {
        let (_db, repo) = repo().await;
        let (client, _account) = MockDoorClient::new("acct-1", "tok-A");
        let factory = MockClientFactory::new(client);

        let config = AccountConfig::new("", "tok-A");
        let result = setup_account(&factory, repo, &config, StatusCache::new()).await;
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[tokio::test]
    async fn test_setup_detects_rotation_during_create() {
        let (_db, repo) = repo().await;
        let (client, account) = MockDoorClient::new("acct-1", "tok-B");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        let factory = MockClientFactory::new(client);

        // The fresh session handle already carries a newer token than the
        // one the user configured.
        let config = AccountConfig::new("acct-1", "tok-A");
        let runtime = setup_account(&factory, repo.clone(), &config, StatusCache::new())
            .await
            .unwrap();

        assert_eq!(runtime.watcher().current_token().await, "tok-B");
        let record = repo.find_by_account("acct-1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, "tok-B");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_setup_honors_configured_modes() {
        let (_db, repo) = repo().await;
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        account.add_device(meta("GD-2", "Side Garage"), Capabilities::poll_only());
        let factory = MockClientFactory::new(client);

        // Account-wide push; GD-2 cannot honor it and degrades to poll.
        let config = AccountConfig::new("acct-1", "tok-A").with_mode(SyncMode::Push);
        let mut runtime = setup_account(&factory, repo, &config, StatusCache::new())
            .await
            .unwrap();

        let gd1 = DeviceId::new("GD-1").unwrap();
        let gd2 = DeviceId::new("GD-2").unwrap();
        assert_eq!(runtime.supervisor().mode(&gd1), Some(SyncMode::Push));
        assert_eq!(runtime.supervisor().mode(&gd2), Some(SyncMode::Poll));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_detach_drops_entity() {
        let (_db, repo) = repo().await;
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        account.add_device(meta("GD-2", "Side Garage"), Capabilities::all());
        let factory = MockClientFactory::new(client);

        let config = AccountConfig::new("acct-1", "tok-A");
        let mut runtime = setup_account(&factory, repo, &config, StatusCache::new())
            .await
            .unwrap();
        assert_eq!(runtime.entities().len(), 2);

        let id = DeviceId::new("GD-1").unwrap();
        runtime.detach(&id).await.unwrap();
        assert_eq!(runtime.entities().len(), 1);
        assert!(runtime.entity(&id).is_none());

        runtime.shutdown().await;
    }
}
