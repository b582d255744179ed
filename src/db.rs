//! Persistent storage: ledger snapshots and the event journal (sled + bincode)

use crate::events::LedgerEvent;
use crate::ledger::DrawLedger;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const TREE_LEDGER: &str = "ledger";
const TREE_EVENTS: &str = "events";
const KEY_STATE: &[u8] = b"state";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub struct Storage {
    db: Db,
    ledger: Tree,
    events: Tree,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let ledger = db.open_tree(TREE_LEDGER)?;
        let events = db.open_tree(TREE_EVENTS)?;
        Ok(Self { db, ledger, events })
    }

    pub fn load_ledger(&self) -> Result<Option<DrawLedger>, StorageError> {
        match self.ledger.get(KEY_STATE)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist the ledger snapshot together with the events it emitted
    ///
    /// Both trees are written in one sled transaction. The ledger's events
    /// are drained only once that transaction has committed, so a failed
    /// commit leaves them in place for the next attempt.
    pub fn commit(&self, ledger: &mut DrawLedger) -> Result<(), StorageError> {
        let snapshot = bincode::serialize(&*ledger)?;
        let first_seq = self.next_sequence()?;
        let mut journal = Vec::with_capacity(ledger.events().len());
        for (offset, event) in ledger.events().iter().enumerate() {
            let seq = first_seq + offset as u64;
            journal.push((seq.to_be_bytes().to_vec(), bincode::serialize(event)?));
        }

        (&self.ledger, &self.events)
            .transaction(|(ledger_tx, events_tx)| -> ConflictableTransactionResult<(), StorageError> {
                ledger_tx.insert(KEY_STATE, snapshot.as_slice())?;
                for (key, bytes) in &journal {
                    events_tx.insert(key.as_slice(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StorageError::Db(e),
            })?;

        let events = ledger.drain_events();
        debug!(
            "Ledger snapshot saved (draw {}), {} events journaled",
            ledger.current_draw_index(),
            events.len()
        );
        self.flush()
    }

    pub fn events(&self) -> Result<Vec<LedgerEvent>, StorageError> {
        let mut out = Vec::with_capacity(self.events.len());
        for entry in self.events.iter() {
            let (_, bytes) = entry?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn next_sequence(&self) -> Result<u64, StorageError> {
        match self.events.last()? {
            Some((key, _)) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&key[..8]);
                Ok(u64::from_be_bytes(buf) + 1)
            }
            None => Ok(0),
        }
    }
}
