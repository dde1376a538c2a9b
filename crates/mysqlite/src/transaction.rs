//! Single-transaction state machine.

use mysqlite_core::{Result, StateError};
use mysqlite_sqlite::SqliteConnection;

/// The engine operations a transaction tracker drives.
pub trait TransactionPrimitives {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
    /// Whether the engine itself has a transaction open.
    fn in_transaction(&self) -> bool;
}

impl TransactionPrimitives for SqliteConnection {
    fn begin(&self) -> Result<()> {
        SqliteConnection::begin(self)
    }

    fn commit(&self) -> Result<()> {
        SqliteConnection::commit(self)
    }

    fn rollback(&self) -> Result<()> {
        SqliteConnection::rollback(self)
    }

    fn in_transaction(&self) -> bool {
        !self.is_autocommit()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    NoActive,
    Active,
}

/// Tracks whether a transaction is open and rejects out-of-sequence verbs
/// before they reach the engine.
///
/// A failed begin leaves the state as it was. A failed commit or rollback
/// takes the state from the engine, which may already have left the
/// transaction through raw SQL.
#[derive(Debug, Default)]
pub struct TransactionTracker {
    state: TransactionState,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn begin<P: TransactionPrimitives + ?Sized>(&mut self, engine: &P) -> Result<()> {
        if self.is_active() {
            return Err(StateError::new("There is already an active transaction").into());
        }
        engine.begin()?;
        self.state = TransactionState::Active;
        Ok(())
    }

    pub fn commit<P: TransactionPrimitives + ?Sized>(&mut self, engine: &P) -> Result<()> {
        self.require_active()?;
        let result = engine.commit();
        self.settle(engine, result)
    }

    pub fn rollback<P: TransactionPrimitives + ?Sized>(&mut self, engine: &P) -> Result<()> {
        self.require_active()?;
        let result = engine.rollback();
        self.settle(engine, result)
    }

    fn settle<P: TransactionPrimitives + ?Sized>(
        &mut self,
        engine: &P,
        result: Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                self.state = TransactionState::NoActive;
                Ok(())
            }
            Err(err) => {
                if !engine.in_transaction() {
                    tracing::debug!("engine left the transaction on its own");
                    self.state = TransactionState::NoActive;
                }
                Err(err)
            }
        }
    }

    fn require_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StateError::new("There is no active transaction").into())
        }
    }
}
