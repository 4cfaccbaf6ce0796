use crate::{
    balance::{Balance, SubAccount},
    credentials::{Credentials, CredentialsFingerprint},
    error::VenueError,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use harbor_instrument::{asset::AssetClass, exchange::VenueId, symbol::Symbol};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::debug;

/// Published view of one partition's [`SubAccount`]s after a save.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct AccountSnapshot {
    pub venue: VenueId,
    pub credentials: CredentialsFingerprint,
    pub sub_accounts: Vec<SubAccount>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Partition {
    sub_accounts: BTreeMap<(AssetClass, String), SubAccount>,
}

/// Process-wide store of venue account balances, partitioned by
/// `(venue, credentials fingerprint)` so multiple keys coexist for the same venue.
///
/// Saves upsert into the partition under its lock, then publish an [`AccountSnapshot`] to every
/// subscriber outside the lock. Subscribers that fall away are pruned on the next publish.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    partitions: Mutex<FnvHashMap<(VenueId, CredentialsFingerprint), Arc<Mutex<Partition>>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AccountSnapshot>>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(
        &self,
        venue: VenueId,
        credentials: &Credentials,
    ) -> Result<(CredentialsFingerprint, Arc<Mutex<Partition>>), VenueError> {
        if credentials.is_empty() {
            return Err(VenueError::CredentialsEmpty);
        }
        let fingerprint = credentials.fingerprint();
        let partition = {
            let mut partitions = self.partitions.lock();
            Arc::clone(
                partitions
                    .entry((venue, fingerprint.clone()))
                    .or_default(),
            )
        };
        Ok((fingerprint, partition))
    }

    /// Save the provided [`SubAccount`]s into the partition for these credentials, optionally
    /// publishing the updated snapshot to subscribers.
    pub fn save(
        &self,
        venue: VenueId,
        credentials: &Credentials,
        sub_accounts: Vec<SubAccount>,
        publish: bool,
    ) -> Result<(), VenueError> {
        let (fingerprint, partition) = self.partition(venue, credentials)?;

        let snapshot = {
            let mut partition = partition.lock();
            for sub_account in sub_accounts {
                partition
                    .sub_accounts
                    .insert((sub_account.asset, sub_account.id.clone()), sub_account);
            }
            AccountSnapshot {
                venue,
                credentials: fingerprint,
                sub_accounts: partition.sub_accounts.values().cloned().collect(),
                time: Utc::now(),
            }
        };

        // Publish outside the partition lock so a slow subscriber cannot extend the critical
        // section
        if publish {
            self.publish(snapshot);
        }
        Ok(())
    }

    fn publish(&self, snapshot: AccountSnapshot) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| {
            let delivered = tx.send(snapshot.clone()).is_ok();
            if !delivered {
                debug!("account subscriber dropped - pruning from publish list");
            }
            delivered
        });
    }

    /// Subscribe to every published [`AccountSnapshot`].
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AccountSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Cached [`SubAccount`]s for the provided credentials and [`AssetClass`].
    pub fn sub_accounts(
        &self,
        venue: VenueId,
        credentials: &Credentials,
        asset: AssetClass,
    ) -> Result<Vec<SubAccount>, VenueError> {
        let (_, partition) = self.partition(venue, credentials)?;
        let partition = partition.lock();

        let matches = partition
            .sub_accounts
            .iter()
            .filter(|((sub_asset, _), _)| *sub_asset == asset)
            .map(|(_, sub_account)| sub_account.clone())
            .collect::<Vec<_>>();

        if matches.is_empty() {
            return Err(VenueError::NoSubAccounts);
        }
        Ok(matches)
    }

    /// Cached per-currency [`Balance`]s for the provided credentials and [`AssetClass`],
    /// aggregated across sub-accounts.
    pub fn currency_balances(
        &self,
        venue: VenueId,
        credentials: &Credentials,
        asset: AssetClass,
    ) -> Result<BTreeMap<Symbol, Balance>, VenueError> {
        let sub_accounts = self
            .sub_accounts(venue, credentials, asset)
            .map_err(|_| VenueError::NoBalances)?;

        let mut balances = BTreeMap::<Symbol, Balance>::new();
        for sub_account in sub_accounts {
            for (currency, balance) in sub_account.balances {
                balances
                    .entry(currency)
                    .and_modify(|aggregate| {
                        aggregate.total += balance.total;
                        aggregate.hold += balance.hold;
                        if balance.updated > aggregate.updated {
                            aggregate.updated = balance.updated;
                        }
                    })
                    .or_insert(balance);
            }
        }

        if balances.is_empty() {
            return Err(VenueError::NoBalances);
        }
        Ok(balances)
    }
}
