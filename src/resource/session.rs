//! Request scoped persistence context.

use std::ops::Deref;

use rusqlite::{Connection, Params, Transaction};

use crate::mail::Notice;

/// Wraps the single transaction a request is allowed to open.
///
/// Reads go through `Deref<Target = Connection>`. Writes must go
/// through [`Session::write`] or [`Session::insert`] so the session
/// knows whether anything in the transaction was modified. Dropping a
/// session without calling [`Session::commit`] rolls everything back,
/// including queued notices.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    dirty: bool,
    outbox: Vec<Notice>,
}

impl<'conn> Session<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> rusqlite::Result<Self> {
        Ok(Self {
            tx: conn.transaction()?,
            dirty: false,
            outbox: Vec::new(),
        })
    }

    /// Execute a modifying statement. Statements that match no rows
    /// leave the session clean.
    pub fn write<P: Params>(&mut self, sql: &str, params: P) -> rusqlite::Result<usize> {
        let changed = self.tx.execute(sql, params)?;
        if changed > 0 {
            self.dirty = true;
        }
        Ok(changed)
    }

    /// Execute an `INSERT` and return the new row id.
    pub fn insert<P: Params>(&mut self, sql: &str, params: P) -> rusqlite::Result<i64> {
        self.write(sql, params)?;
        Ok(self.tx.last_insert_rowid())
    }

    /// True when any row anywhere in this transaction was modified.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Queue a notice to be mailed once the transaction has committed.
    pub fn queue_notice(&mut self, notice: Notice) {
        self.outbox.push(notice);
    }

    /// Commit and hand back the notices queued along the way.
    pub fn commit(self) -> rusqlite::Result<Vec<Notice>> {
        let Self { tx, outbox, .. } = self;
        tx.commit()?;
        Ok(outbox)
    }
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}
