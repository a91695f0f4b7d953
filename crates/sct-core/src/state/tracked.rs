//! Tracked view: a stack of overlay frames above a base store
//!
//! # Layout
//!
//! ```text
//! frames[depth-1]   nested frame (inner contract call)
//!   ...
//! frames[0]         transaction frame
//! ─────────────────
//! StateStore        committed ground truth
//! ```
//!
//! Each frame holds only its own deltas: full images of the accounts it
//! wrote, and the transfers recorded while it was on top. Reads walk the
//! frames from the top down and fall through to the store. Opening a frame
//! pushes an empty overlay, so its cost does not depend on how much state
//! lower frames have touched.
//!
//! - `commit_frame` folds the top frame into the one below it.
//! - `rollback_frame` drops the top frame; lower frames are untouched.
//! - `commit` folds the transaction frame into the store in one `apply`.
//! - `rollback`, or dropping the view, leaves the store as it was.

use crate::state::overlay::OverlayMap;
use crate::state::store::{Account, StateStore};
use crate::types::{Address, StoredVin, TransferInfo, Value};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Frame {
    accounts: OverlayMap<Address, Account>,
    transfers: Vec<TransferInfo>,
}

/// A writable, discardable view over a state store
#[derive(Debug)]
pub struct TrackedView<'a, S: StateStore> {
    store: &'a mut S,
    frames: Vec<Frame>,
}

impl<'a, S: StateStore> TrackedView<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        TrackedView {
            store,
            frames: vec![Frame::default()],
        }
    }

    /// Number of open frames, 1 for a fresh view
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn top_mut(&mut self) -> &mut Frame {
        // `frames` is never empty: the transaction frame lives until commit/rollback.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Run `f` on the current image of an account, without cloning it
    /// when an overlay already holds it.
    fn with_account<R>(&self, address: &Address, f: impl FnOnce(Option<&Account>) -> R) -> Result<R> {
        for frame in self.frames.iter().rev() {
            if let Some(account) = frame.accounts.get(address) {
                return Ok(f(Some(account)));
            }
        }
        let base = self.store.account(address)?;
        Ok(f(base.as_ref()))
    }

    /// Current image of an account, or `None` if it does not exist
    pub fn account(&self, address: &Address) -> Result<Option<Account>> {
        self.with_account(address, |account| account.cloned())
    }

    /// Copy the account into the top frame (creating it if absent) and
    /// return it for writing.
    fn account_mut(&mut self, address: &Address) -> Result<&mut Account> {
        if !self.top_mut().accounts.contains(address) {
            let image = self.account(address)?.unwrap_or_default();
            self.top_mut().accounts.set(*address, image);
        }
        self.top_mut()
            .accounts
            .get_mut(address)
            .ok_or_else(|| Error::InternalConsistency(format!("account {} vanished from overlay", address)))
    }

    pub fn exists(&self, address: &Address) -> Result<bool> {
        self.with_account(address, |account| account.is_some())
    }

    /// Create an empty account; fails if a contract already lives there
    pub fn create_account(&mut self, address: &Address) -> Result<()> {
        if self.with_account(address, |account| account.map_or(false, Account::is_contract))? {
            return Err(Error::AddressCollision(*address));
        }
        self.account_mut(address)?;
        Ok(())
    }

    pub fn code(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        self.with_account(address, |account| account.and_then(|a| a.code.clone()))
    }

    /// Store contract code. Code is immutable once set.
    pub fn set_code(&mut self, address: &Address, code: Vec<u8>) -> Result<()> {
        let account = self.account_mut(address)?;
        if account.code.is_some() {
            return Err(Error::AddressCollision(*address));
        }
        account.code = Some(code);
        Ok(())
    }

    pub fn unspent(&self, address: &Address) -> Result<Option<StoredVin>> {
        self.with_account(address, |account| account.and_then(|a| a.unspent))
    }

    pub fn set_unspent(&mut self, address: &Address, unspent: Option<StoredVin>) -> Result<()> {
        self.account_mut(address)?.unspent = unspent;
        Ok(())
    }

    pub fn storage(&self, address: &Address, key: &str) -> Result<Value> {
        self.with_account(address, |account| {
            account
                .and_then(|a| a.storage.get(key).cloned())
                .unwrap_or_default()
        })
    }

    /// Write a storage slot; writing `Null` clears it
    pub fn set_storage(&mut self, address: &Address, key: &str, value: Value) -> Result<()> {
        let account = self.account_mut(address)?;
        if value == Value::Null {
            account.storage.remove(key);
        } else {
            account.storage.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Record a transfer against the top frame
    pub fn record_transfer(&mut self, transfer: TransferInfo) {
        self.top_mut().transfers.push(transfer);
    }

    /// Transfers recorded against the top frame only
    pub fn frame_transfers(&self) -> &[TransferInfo] {
        self.frames.last().map(|frame| frame.transfers.as_slice()).unwrap_or(&[])
    }

    /// Transfers of the whole view: every frame, outermost first.
    ///
    /// This is what a transaction commits. Use [`frame_transfers`] for the
    /// current overlay alone.
    ///
    /// [`frame_transfers`]: TrackedView::frame_transfers
    pub fn transfers(&self) -> Vec<TransferInfo> {
        self.frames
            .iter()
            .flat_map(|frame| frame.transfers.iter().copied())
            .collect()
    }

    /// Unspent value plus the net of every transfer recorded in the view
    pub fn balance(&self, address: &Address) -> Result<u64> {
        let mut balance = self.unspent(address)?.map(|vin| vin.value).unwrap_or(0) as i128;
        for transfer in self.frames.iter().flat_map(|frame| frame.transfers.iter()) {
            if transfer.from == *address {
                balance -= transfer.value as i128;
            }
            if transfer.to == *address {
                balance += transfer.value as i128;
            }
        }
        u64::try_from(balance).map_err(|_| {
            Error::InternalConsistency(format!("balance of {} out of range: {}", address, balance))
        })
    }

    /// Open a nested frame, e.g. for an inner contract call
    pub fn start_tracking(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Fold the top nested frame into its parent
    pub fn commit_frame(&mut self) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(Error::InternalConsistency("no nested frame to commit".into()));
        }
        let mut frame = self.frames.pop().unwrap_or_default();
        let parent = self.top_mut();
        frame.accounts.drain_to(|address, account| parent.accounts.set(address, account));
        parent.transfers.append(&mut frame.transfers);
        Ok(())
    }

    /// Discard the top nested frame
    pub fn rollback_frame(&mut self) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(Error::InternalConsistency("no nested frame to roll back".into()));
        }
        self.frames.pop();
        Ok(())
    }

    /// Fold the whole view into the base store atomically.
    pub fn commit(mut self) -> Result<()> {
        if self.frames.len() != 1 {
            return Err(Error::InternalConsistency(format!(
                "commit with {} nested frames still open",
                self.frames.len() - 1
            )));
        }
        let frame = self.frames.pop().unwrap_or_default();
        let changes = frame.accounts.into_inner();
        tracing::trace!(accounts = changes.len(), "applying tracked changes");
        self.store.apply(changes)
    }

    /// Discard every write made through this view
    pub fn rollback(self) {
        tracing::trace!(frames = self.frames.len(), "tracked view rolled back");
    }
}

/// State surface exposed to the virtual machine
pub trait ContractState {
    fn code(&self, address: &Address) -> Result<Option<Vec<u8>>>;
    fn storage(&self, address: &Address, key: &str) -> Result<Value>;
    fn set_storage(&mut self, address: &Address, key: &str, value: Value) -> Result<()>;
    fn balance(&self, address: &Address) -> Result<u64>;
    fn record_transfer(&mut self, transfer: TransferInfo);
    fn start_tracking(&mut self);
    fn commit_frame(&mut self) -> Result<()>;
    fn rollback_frame(&mut self) -> Result<()>;
}

impl<S: StateStore> ContractState for TrackedView<'_, S> {
    fn code(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        TrackedView::code(self, address)
    }

    fn storage(&self, address: &Address, key: &str) -> Result<Value> {
        TrackedView::storage(self, address, key)
    }

    fn set_storage(&mut self, address: &Address, key: &str, value: Value) -> Result<()> {
        TrackedView::set_storage(self, address, key, value)
    }

    fn balance(&self, address: &Address) -> Result<u64> {
        TrackedView::balance(self, address)
    }

    fn record_transfer(&mut self, transfer: TransferInfo) {
        TrackedView::record_transfer(self, transfer)
    }

    fn start_tracking(&mut self) {
        TrackedView::start_tracking(self)
    }

    fn commit_frame(&mut self) -> Result<()> {
        TrackedView::commit_frame(self)
    }

    fn rollback_frame(&mut self) -> Result<()> {
        TrackedView::rollback_frame(self)
    }
}
