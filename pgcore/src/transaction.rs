//! Nested transaction state.
//!
//! [`Atomic`] tracks the atomic blocks entered through
//! [`Connection::atomic`][crate::Connection::atomic]. The outermost block
//! owns the real transaction, nested blocks either get a savepoint or merge
//! into their parent.
//!
//! A merged block has nothing of its own to roll back, so when it fails the
//! enclosing block is marked for rollback. Statements are refused until a
//! block with a savepoint, or the outermost block, ends and undoes the work.
use std::fmt;

use crate::{
    Result,
    client::{Client, TransactionStatus},
    common::debug,
    error::TransactionUsage,
    statement::SavepointNames,
};

pub use crate::statement::SavepointName;

type Callback = Box<dyn FnOnce() + Send>;

/// Callback with the savepoints active when it was registered.
struct Hook {
    scope: Vec<SavepointName>,
    callback: Callback,
}

#[derive(Debug)]
enum Block {
    /// Outermost block, `adopted` when the transaction was already open.
    Root { adopted: bool },
    Savepoint(SavepointName),
    /// Shares the transaction boundary of the enclosing block.
    Merged,
}

/// Atomic block stack of one connection.
pub struct Atomic {
    stack: Vec<Block>,
    needs_rollback: bool,
    broken: bool,
    commit_hooks: Vec<Hook>,
    rollback_hooks: Vec<Hook>,
    names: SavepointNames,
}

impl Atomic {
    pub(crate) fn new(savepoint_prefix: &str) -> Self {
        Self {
            stack: Vec::new(),
            needs_rollback: false,
            broken: false,
            commit_hooks: Vec::new(),
            rollback_hooks: Vec::new(),
            names: SavepointNames::new(savepoint_prefix),
        }
    }

    /// Returns `true` inside an atomic block.
    pub fn in_block(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Count of nested atomic blocks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` when a nested block failed without a savepoint.
    pub fn needs_rollback(&self) -> bool {
        self.needs_rollback
    }

    /// Active savepoints, outermost first.
    pub fn savepoints(&self) -> impl Iterator<Item = &SavepointName> {
        self.stack.iter().filter_map(|block| match block {
            Block::Savepoint(name) => Some(name),
            _ => None,
        })
    }

    /// Pending commit and rollback callbacks.
    pub fn pending_hooks(&self) -> (usize, usize) {
        (self.commit_hooks.len(), self.rollback_hooks.len())
    }

    /// Returns `true` once, after a failed rollback made the connection unusable.
    pub(crate) fn take_broken(&mut self) -> bool {
        std::mem::take(&mut self.broken)
    }

    pub(crate) fn check_manual(&self) -> Result<(), TransactionUsage> {
        match self.in_block() {
            true => Err(TransactionUsage::ManualControl),
            false => Ok(()),
        }
    }

    pub(crate) fn check_usable(&self) -> Result<(), TransactionUsage> {
        match self.needs_rollback {
            true => Err(TransactionUsage::RollbackPending),
            false => Ok(()),
        }
    }

    pub(crate) fn on_commit(&mut self, callback: Callback) -> Result<(), TransactionUsage> {
        let hook = self.hook(callback)?;
        self.commit_hooks.push(hook);
        Ok(())
    }

    pub(crate) fn on_rollback(&mut self, callback: Callback) -> Result<(), TransactionUsage> {
        let hook = self.hook(callback)?;
        self.rollback_hooks.push(hook);
        Ok(())
    }

    fn hook(&self, callback: Callback) -> Result<Hook, TransactionUsage> {
        if !self.in_block() {
            return Err(TransactionUsage::OutsideAtomic);
        }
        Ok(Hook { scope: self.savepoints().cloned().collect(), callback })
    }

    /// Enter a block, starting the transaction or a savepoint as needed.
    pub(crate) fn enter(&mut self, client: &mut dyn Client, savepoint: bool) -> Result<()> {
        let block = if self.stack.is_empty() {
            let adopted = client.transaction_status() != TransactionStatus::Idle;
            if adopted {
                debug!("atomic: adopting open transaction");
            } else {
                debug!("atomic: BEGIN");
                client.execute("BEGIN")?;
            }
            Block::Root { adopted }
        } else if savepoint && !self.needs_rollback {
            let name = self.names.next();
            debug!("atomic: SAVEPOINT {name}");
            client.execute(&name.savepoint())?;
            Block::Savepoint(name)
        } else {
            Block::Merged
        };
        self.stack.push(block);
        Ok(())
    }

    /// Leave the innermost block, `failed` when its callback failed.
    ///
    /// Returns [`TransactionUsage::RolledBack`] when the callback succeeded
    /// but its work was undone because a merged block inside it failed.
    pub(crate) fn exit(&mut self, client: &mut dyn Client, failed: bool) -> Result<()> {
        let Some(block) = self.stack.pop() else {
            return Ok(());
        };

        if !failed && !self.needs_rollback {
            return match block {
                Block::Root { .. } => self.commit(client),
                Block::Savepoint(name) => self.release(client, &name),
                Block::Merged => Ok(()),
            };
        }

        // set again below if this level cannot roll back by itself
        let rolled_back = self.needs_rollback;
        self.needs_rollback = false;

        match block {
            Block::Root { adopted: _adopted } => {
                debug!("atomic: ROLLBACK{}", if _adopted { " of adopted transaction" } else { "" });
                if let Err(_err) = client.execute("ROLLBACK") {
                    debug!("atomic: ROLLBACK failed, closing connection: {_err}");
                    client.close();
                    self.broken = true;
                }
                self.fire_rollback();
            }
            Block::Merged => self.needs_rollback = true,
            Block::Savepoint(name) => {
                if self.rollback_to(client, &name).is_err() {
                    self.needs_rollback = true;
                }
            }
        }

        match rolled_back && !failed && !self.needs_rollback {
            true => Err(TransactionUsage::RolledBack.into()),
            false => Ok(()),
        }
    }

    /// Flush callbacks of a transaction that will never complete.
    pub(crate) fn close(&mut self) {
        if !self.stack.is_empty() {
            debug!("atomic: closed inside {} blocks", self.stack.len());
        }
        self.stack.clear();
        self.needs_rollback = false;
        self.fire_rollback();
    }

    /// A transaction committed outside any atomic block.
    pub(crate) fn committed(&mut self) {
        self.fire_commit();
    }

    /// A transaction rolled back outside any atomic block.
    pub(crate) fn rolled_back(&mut self) {
        self.fire_rollback();
    }

    fn commit(&mut self, client: &mut dyn Client) -> Result<()> {
        debug!("atomic: COMMIT");
        match client.execute("COMMIT") {
            Ok(_) => {
                self.fire_commit();
                Ok(())
            }
            Err(err) => {
                debug!("atomic: COMMIT failed, rolling back: {err}");
                if let Err(_err) = client.execute("ROLLBACK") {
                    debug!("atomic: ROLLBACK failed, closing connection: {_err}");
                    client.close();
                    self.broken = true;
                }
                self.fire_rollback();
                Err(err)
            }
        }
    }

    fn release(&mut self, client: &mut dyn Client, name: &SavepointName) -> Result<()> {
        debug!("atomic: RELEASE SAVEPOINT {name}");
        let Err(err) = client.execute(&name.release()) else {
            return Ok(());
        };
        if self.rollback_to(client, name).is_err() {
            self.needs_rollback = true;
        }
        Err(err)
    }

    /// Roll back to savepoint and release it, firing the callbacks scoped to it.
    fn rollback_to(&mut self, client: &mut dyn Client, name: &SavepointName) -> Result<()> {
        debug!("atomic: ROLLBACK TO SAVEPOINT {name}");
        client.execute(&name.rollback_to())?;
        client.execute(&name.release())?;

        self.commit_hooks.retain(|hook| !hook.scope.contains(name));
        let (fire, keep) = std::mem::take(&mut self.rollback_hooks)
            .into_iter()
            .partition::<Vec<_>, _>(|hook| hook.scope.contains(name));
        self.rollback_hooks = keep;
        run(fire);
        Ok(())
    }

    fn fire_commit(&mut self) {
        self.rollback_hooks.clear();
        run(std::mem::take(&mut self.commit_hooks));
    }

    fn fire_rollback(&mut self) {
        self.commit_hooks.clear();
        run(std::mem::take(&mut self.rollback_hooks));
    }
}

fn run(hooks: Vec<Hook>) {
    if !hooks.is_empty() {
        debug!("atomic: running {} callbacks", hooks.len());
    }
    for hook in hooks {
        (hook.callback)();
    }
}

impl fmt::Debug for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atomic")
            .field("stack", &self.stack)
            .field("needs_rollback", &self.needs_rollback)
            .field("commit_hooks", &self.commit_hooks.len())
            .field("rollback_hooks", &self.rollback_hooks.len())
            .finish()
    }
}
