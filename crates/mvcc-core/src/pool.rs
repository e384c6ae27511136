//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Session pool sizing, tag routing, and ordered establishment."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use indexmap::IndexMap;
use mvcc_common::SlotLayout;
use mvcc_logging::{log_run_event, sim_info, sim_warn, RunEventOutcome};
use mvcc_scenario::{TransactionTag, MAX_TRANSACTIONS};
use thiserror::Error;

use crate::context::RunContext;
use crate::establish::ConnectError;
use crate::session::{Session, SessionIoError, SharedHandle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("scenario uses {transactions} transactions but the host opened {sessions} sessions")]
    SessionCount {
        transactions: usize,
        sessions: usize,
    },
    #[error("a pool holds between 1 and {MAX_TRANSACTIONS} sessions, got {0}")]
    Size(usize),
    #[error("transaction {0} is listed twice")]
    DuplicateTransaction(TransactionTag),
    #[error("transaction {tag} has no session under the {layout:?} layout, use T1, T2 and T3")]
    Unroutable {
        tag: TransactionTag,
        layout: SlotLayout,
    },
    #[error("transactions {holder} and {tag} both route to session {slot} under the {layout:?} layout")]
    SlotTaken {
        tag: TransactionTag,
        holder: TransactionTag,
        slot: usize,
        layout: SlotLayout,
    },
}

/// Slot for `tag`, the `order`-th distinct tag of a pool of `size` sessions.
///
/// `Direct` follows first appearance. `Legacy` keys on the tag name: `T1` on the first
/// pane, `T2` on the last, `T3` on the second, whatever order they appear in.
pub fn slot_for(
    tag: &TransactionTag,
    order: usize,
    size: usize,
    layout: SlotLayout,
) -> Option<usize> {
    match layout {
        SlotLayout::Direct => (order < size).then_some(order),
        SlotLayout::Legacy => match tag.as_str() {
            "T1" => Some(0),
            "T2" => size.checked_sub(1),
            "T3" if size > 1 => Some(1),
            _ => None,
        },
    }
}

/// Route every tag to its own slot. Tags are given in first-appearance order.
pub fn assign_slots(
    transactions: &[TransactionTag],
    layout: SlotLayout,
) -> Result<IndexMap<TransactionTag, usize>, PoolError> {
    let size = transactions.len();
    let mut routes: IndexMap<TransactionTag, usize> = IndexMap::with_capacity(size);
    for (order, tag) in transactions.iter().enumerate() {
        if routes.contains_key(tag) {
            return Err(PoolError::DuplicateTransaction(tag.clone()));
        }
        let slot = slot_for(tag, order, size, layout).ok_or_else(|| PoolError::Unroutable {
            tag: tag.clone(),
            layout,
        })?;
        if let Some((holder, _)) = routes.iter().find(|(_, taken)| **taken == slot) {
            return Err(PoolError::SlotTaken {
                tag: tag.clone(),
                holder: holder.clone(),
                slot,
                layout,
            });
        }
        routes.insert(tag.clone(), slot);
    }
    Ok(routes)
}

/// Sessions for one run, one per transaction, indexed by slot.
#[derive(Debug)]
pub struct SessionPool {
    sessions: Vec<Session>,
    routes: IndexMap<TransactionTag, usize>,
}

impl SessionPool {
    /// Bind `handles` (in slot order) to `transactions` (in first-appearance order).
    pub fn new(
        handles: Vec<SharedHandle>,
        transactions: &[TransactionTag],
        layout: SlotLayout,
    ) -> Result<Self, PoolError> {
        let size = transactions.len();
        if size == 0 || size > MAX_TRANSACTIONS {
            return Err(PoolError::Size(size));
        }
        if handles.len() != size {
            return Err(PoolError::SessionCount {
                transactions: size,
                sessions: handles.len(),
            });
        }

        let routes = assign_slots(transactions, layout)?;

        // routes are distinct and below `size`, so sorting by slot covers every handle once
        let mut by_slot: Vec<(usize, TransactionTag)> = routes
            .iter()
            .map(|(tag, slot)| (*slot, tag.clone()))
            .collect();
        by_slot.sort_by_key(|(slot, _)| *slot);
        let sessions = handles
            .into_iter()
            .zip(by_slot)
            .map(|(handle, (slot, tag))| Session::new(slot, tag, handle))
            .collect();

        Ok(Self { sessions, routes })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, slot: usize) -> Option<&Session> {
        self.sessions.get(slot)
    }

    /// Slot that runs `tag`, fixed when the pool was built.
    pub fn slot_for(&self, tag: &TransactionTag) -> Option<usize> {
        self.routes.get(tag).copied()
    }

    pub fn session_for(&self, tag: &TransactionTag) -> Option<&Session> {
        self.slot_for(tag).and_then(|slot| self.sessions.get(slot))
    }

    pub fn all_connected(&self) -> bool {
        self.sessions.iter().all(Session::is_connected)
    }

    /// Connect slot 0, initialize the schema through it, then connect the remaining slots.
    ///
    /// Stops at the first failure. Sessions connected so far stay open; see [`Self::teardown`].
    pub async fn establish(&mut self, ctx: &RunContext) -> Result<(), ConnectError> {
        let log = ctx.log_context();
        let establisher = ctx.establisher();

        for slot in 0..self.sessions.len() {
            let session = &mut self.sessions[slot];
            let connected = match establisher.connect(session).await {
                Ok(connected) => connected,
                Err(err) => {
                    log_run_event(
                        Some(&log.clone().with_session(slot)),
                        "pool.connect",
                        &err.to_string(),
                        RunEventOutcome::Fault,
                    );
                    return Err(err);
                }
            };
            sim_info!(
                context = log.clone().with_session(slot),
                "session {} ({}) connected after {} polls",
                slot,
                session.transaction(),
                connected.polls
            );

            if slot == 0 {
                self.initialize_schema(ctx).await?;
            } else {
                self.prepare(slot, ctx).await?;
            }
        }

        log_run_event(
            Some(&log),
            "pool.establish",
            &format!("{} sessions ready", self.sessions.len()),
            RunEventOutcome::Success,
        );
        Ok(())
    }

    /// Run the initialization statements through the first session.
    pub async fn initialize_schema(&mut self, ctx: &RunContext) -> Result<(), ConnectError> {
        let profile = &ctx.profile;
        let cancel = &ctx.cancel;
        let timing = &ctx.config.timing;
        let session = self
            .sessions
            .first()
            .ok_or(SessionIoError::NotConnected { slot: 0 })?;

        session.send(profile.autocommit_on).await?;
        for statement in &ctx.scenario.init_statements {
            if profile.skips_init_statement(statement) {
                continue;
            }
            cancel.check()?;
            session.send(statement).await?;
            if let Some(token) = profile.submit_token {
                session.send(token).await?;
                cancel.sleep(timing.init_submit_pause).await?;
            }
        }

        let isolation = profile.isolation_statements(&ctx.connection);
        if !isolation.is_empty() {
            cancel.sleep(timing.isolation_setup_pause).await?;
            for statement in &isolation {
                session.send(statement).await?;
                if let Some(token) = profile.submit_token {
                    session.send(token).await?;
                }
            }
        }

        self.prepare(0, ctx).await
    }

    /// Tear down every session's handle. Errors are logged and the remaining slots still reset.
    pub async fn teardown(&mut self) {
        for session in &mut self.sessions {
            if let Err(err) = session.reset().await {
                sim_warn!("failed to reset session {}: {}", session.slot(), err);
            }
        }
    }

    /// Leave a session idle with autocommit off and a clean screen.
    async fn prepare(&self, slot: usize, ctx: &RunContext) -> Result<(), ConnectError> {
        let session = &self.sessions[slot];
        ctx.cancel.check()?;
        session.send(ctx.profile.autocommit_off).await?;
        session.send(ctx.profile.clear_command).await?;
        session.send("").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<TransactionTag> {
        names.iter().map(|name| TransactionTag::new(*name)).collect()
    }

    #[test]
    fn direct_layout_uses_first_appearance_order() {
        let routes = assign_slots(&tags(&["T2", "T1", "T3"]), SlotLayout::Direct).unwrap();
        let slots: Vec<_> = routes.iter().map(|(t, s)| (t.as_str(), *s)).collect();
        assert_eq!(slots, [("T2", 0), ("T1", 1), ("T3", 2)]);
    }

    #[test]
    fn legacy_layout_routes_by_tag_name() {
        let routes = assign_slots(&tags(&["T1", "T2", "T3"]), SlotLayout::Legacy).unwrap();
        assert_eq!(routes[&TransactionTag::new("T1")], 0);
        assert_eq!(routes[&TransactionTag::new("T2")], 2);
        assert_eq!(routes[&TransactionTag::new("T3")], 1);

        // T2 first still lands on the last pane
        let routes = assign_slots(&tags(&["T2", "T1", "T3"]), SlotLayout::Legacy).unwrap();
        let slots: Vec<_> = routes.iter().map(|(t, s)| (t.as_str(), *s)).collect();
        assert_eq!(slots, [("T2", 2), ("T1", 0), ("T3", 1)]);

        let routes = assign_slots(&tags(&["T1", "T2"]), SlotLayout::Legacy).unwrap();
        assert_eq!(routes[&TransactionTag::new("T2")], 1);
        let routes = assign_slots(&tags(&["T2"]), SlotLayout::Legacy).unwrap();
        assert_eq!(routes[&TransactionTag::new("T2")], 0);
    }

    #[test]
    fn legacy_layout_rejects_tags_without_a_pane() {
        assert_eq!(
            assign_slots(&tags(&["T1", "T4"]), SlotLayout::Legacy).unwrap_err(),
            PoolError::Unroutable {
                tag: TransactionTag::new("T4"),
                layout: SlotLayout::Legacy,
            }
        );
        assert_eq!(
            assign_slots(&tags(&["T2", "T3"]), SlotLayout::Legacy).unwrap_err(),
            PoolError::SlotTaken {
                tag: TransactionTag::new("T3"),
                holder: TransactionTag::new("T2"),
                slot: 1,
                layout: SlotLayout::Legacy,
            }
        );
        assert!(assign_slots(&tags(&["T4", "T5"]), SlotLayout::Direct).is_ok());
        assert_eq!(
            assign_slots(&tags(&["T1", "T1"]), SlotLayout::Direct).unwrap_err(),
            PoolError::DuplicateTransaction(TransactionTag::new("T1"))
        );
    }
}
