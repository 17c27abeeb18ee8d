//! Identity backfill: one-time batch rewrite of historical records whose
//! identity fields hold a username instead of the stable user id.
//!
//! The scan runs in id-sorted batches with a per-collection cursor, so it is
//! resumable after interruption and never holds more than one batch in
//! memory. Rewrites go through conditional per-document updates; a record
//! converted by a concurrent run is detected and skipped, which makes the
//! whole backfill idempotent. A value that resolves neither as an id nor as
//! a username flags the record for manual review and leaves it untouched.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::identity::IdentityStore;
use crate::models::{Chat, ErrorReport, Ride, UserId, SCHEMA_STABLE_IDS};
use crate::store::{Collection, Document, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    Running,
    /// Scan finished. Unresolved references do not fail the run; they are
    /// reported for manual review while the flagged records stay legacy.
    Completed,
    /// Aborted by fail-fast mode on an unresolved reference; the checkpoint
    /// marks where a later run resumes.
    Failed,
}

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub batch_size: usize,
    /// Classify and count without writing. This is the default mode.
    pub dry_run: bool,
    /// Abort on the first unresolved reference instead of flagging it and
    /// continuing. Off by default.
    pub fail_fast: bool,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            dry_run: true,
            fail_fast: false,
        }
    }
}

/// Per-collection resume cursors: the last record id each scan processed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillCheckpoint {
    pub rides_cursor: Option<String>,
    pub chats_cursor: Option<String>,
    pub reports_cursor: Option<String>,
}

/// A legacy identity value that matched neither a stable id nor a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub collection: &'static str,
    pub record_id: String,
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub state: MigrationState,
    pub scanned: usize,
    pub converted: usize,
    pub already_stable: usize,
    pub unresolved: Vec<UnresolvedReference>,
    pub checkpoint: BackfillCheckpoint,
}

impl BackfillReport {
    pub fn new() -> Self {
        Self::resume(BackfillCheckpoint::default())
    }

    /// Continue an interrupted run from its checkpoint.
    pub fn resume(checkpoint: BackfillCheckpoint) -> Self {
        Self {
            state: MigrationState::NotStarted,
            scanned: 0,
            converted: 0,
            already_stable: 0,
            unresolved: Vec::new(),
            checkpoint,
        }
    }
}

impl Default for BackfillReport {
    fn default() -> Self {
        Self::new()
    }
}

enum Resolution {
    Stable,
    Legacy(UserId),
    Unresolved,
}

fn classify(identity: &IdentityStore, value: &UserId) -> Resolution {
    if identity.user_exists(value) {
        Resolution::Stable
    } else if let Some(id) = identity.resolve_id(value.as_str()) {
        Resolution::Legacy(id)
    } else {
        Resolution::Unresolved
    }
}

fn flag<T: Document>(doc: &T, field: &'static str, value: &UserId) -> UnresolvedReference {
    UnresolvedReference {
        collection: T::COLLECTION,
        record_id: doc.id().to_string(),
        field,
        value: value.as_str().to_string(),
    }
}

/// Rewrite a ride's identity fields. All-or-nothing per record: if any value
/// is unresolvable the ride is left exactly as it was and the flags are
/// returned; otherwise the rewrite lands and the record is stamped with the
/// stable-id schema version.
fn migrate_ride(identity: &IdentityStore, ride: &mut Ride) -> Vec<UnresolvedReference> {
    let mut unresolved = Vec::new();

    let mut driver = ride.driver.clone();
    match classify(identity, &ride.driver) {
        Resolution::Stable => {}
        Resolution::Legacy(id) => driver = id,
        Resolution::Unresolved => unresolved.push(flag(ride, "driver", &ride.driver)),
    }

    let mut riders = ride.riders.clone();
    for (i, rider) in ride.riders.iter().enumerate() {
        match classify(identity, rider) {
            Resolution::Stable => {}
            Resolution::Legacy(id) => riders[i] = id,
            Resolution::Unresolved => unresolved.push(flag(ride, "riders", rider)),
        }
    }

    if unresolved.is_empty() {
        // Mixed legacy forms can name the same person twice; the converted
        // record must keep the driver out of riders and riders free of
        // duplicates.
        let mut seen = BTreeSet::new();
        riders.retain(|rider| *rider != driver && seen.insert(rider.clone()));
        ride.driver = driver;
        ride.riders = riders;
        ride.schema_version = SCHEMA_STABLE_IDS;
    }
    unresolved
}

fn migrate_chat(identity: &IdentityStore, chat: &mut Chat) -> Vec<UnresolvedReference> {
    let mut unresolved = Vec::new();

    let mut participants = BTreeSet::new();
    for participant in &chat.participants {
        match classify(identity, participant) {
            Resolution::Stable => {
                participants.insert(participant.clone());
            }
            Resolution::Legacy(id) => {
                participants.insert(id);
            }
            Resolution::Unresolved => unresolved.push(flag(chat, "participants", participant)),
        }
    }

    let mut messages = chat.messages.clone();
    for message in &mut messages {
        match classify(identity, &message.sender) {
            Resolution::Stable => {}
            Resolution::Legacy(id) => message.sender = id,
            Resolution::Unresolved => {
                unresolved.push(flag(chat, "messages.sender", &message.sender))
            }
        }
    }

    if unresolved.is_empty() {
        chat.participants = participants;
        chat.messages = messages;
        chat.schema_version = SCHEMA_STABLE_IDS;
    }
    unresolved
}

fn migrate_report(identity: &IdentityStore, report: &mut ErrorReport) -> Vec<UnresolvedReference> {
    let mut unresolved = Vec::new();

    let mut updated_by = report.updated_by.clone();
    if let Some(admin) = &report.updated_by {
        match classify(identity, admin) {
            Resolution::Stable => {}
            Resolution::Legacy(id) => updated_by = Some(id),
            Resolution::Unresolved => unresolved.push(flag(report, "updated_by", admin)),
        }
    }

    if unresolved.is_empty() {
        report.updated_by = updated_by;
        report.schema_version = SCHEMA_STABLE_IDS;
    }
    unresolved
}

pub struct IdentityBackfill {
    store: Store,
    identity: IdentityStore,
    config: BackfillConfig,
}

impl IdentityBackfill {
    pub fn new(store: Store, identity: IdentityStore, config: BackfillConfig) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    /// Run the backfill to completion from a fresh checkpoint.
    pub fn run(&self) -> BackfillReport {
        let mut report = BackfillReport::new();
        while self.run_batch(&mut report) {}
        if report.state != MigrationState::Failed {
            report.state = MigrationState::Completed;
        }
        report
    }

    /// Process one batch per collection from the report's checkpoint.
    /// Returns true while any collection still has records past its cursor;
    /// a fail-fast abort returns false with the report left in `Failed`.
    pub fn run_batch(&self, report: &mut BackfillReport) -> bool {
        report.state = MigrationState::Running;
        let mut checkpoint = report.checkpoint.clone();

        let more_rides = self.backfill_collection(
            &self.store.rides,
            &mut checkpoint.rides_cursor,
            migrate_ride,
            report,
        );
        let more_chats = self.backfill_collection(
            &self.store.chats,
            &mut checkpoint.chats_cursor,
            migrate_chat,
            report,
        );
        let more_reports = self.backfill_collection(
            &self.store.reports,
            &mut checkpoint.reports_cursor,
            migrate_report,
            report,
        );

        report.checkpoint = checkpoint;
        if report.state == MigrationState::Failed {
            return false;
        }
        more_rides || more_chats || more_reports
    }

    fn backfill_collection<T: Document>(
        &self,
        collection: &Collection<T>,
        cursor: &mut Option<String>,
        rewrite: fn(&IdentityStore, &mut T) -> Vec<UnresolvedReference>,
        report: &mut BackfillReport,
    ) -> bool {
        if report.state == MigrationState::Failed {
            return false;
        }
        let ids: Vec<String> = collection
            .ids_sorted()
            .into_iter()
            .filter(|id| cursor.as_ref().map_or(true, |c| id > c))
            .take(self.config.batch_size)
            .collect();
        if ids.is_empty() {
            return false;
        }

        // The cursor advances per record so a fail-fast abort resumes at the
        // record that triggered it.
        for id in &ids {
            report.scanned += 1;
            let Some(doc) = collection.get(id) else {
                // Removed since the id listing; nothing to convert.
                *cursor = Some(id.clone());
                continue;
            };
            if doc.schema_version() >= SCHEMA_STABLE_IDS {
                report.already_stable += 1;
                *cursor = Some(id.clone());
                continue;
            }

            if self.config.dry_run {
                let mut draft = doc;
                let unresolved = rewrite(&self.identity, &mut draft);
                if unresolved.is_empty() {
                    report.converted += 1;
                } else {
                    report.unresolved.extend(unresolved);
                    if self.config.fail_fast {
                        report.state = MigrationState::Failed;
                        return false;
                    }
                }
                *cursor = Some(id.clone());
                continue;
            }

            // The schema check and the rewrite re-run under the entry lock;
            // a concurrent conversion turns this into a no-op.
            let mut flagged = Vec::new();
            let identity = &self.identity;
            let outcome = collection.update_if(id, |doc| {
                if doc.schema_version() >= SCHEMA_STABLE_IDS {
                    return Ok(false);
                }
                let unresolved = rewrite(identity, doc);
                if unresolved.is_empty() {
                    Ok(true)
                } else {
                    flagged = unresolved;
                    Ok(false)
                }
            });

            match outcome {
                Ok(Some(converted)) => {
                    report.converted += 1;
                    tracing::debug!(
                        collection = T::COLLECTION,
                        record_id = converted.id(),
                        "identity fields converted"
                    );
                }
                Ok(None) if flagged.is_empty() => report.already_stable += 1,
                Ok(None) => {
                    for reference in &flagged {
                        tracing::warn!(
                            collection = reference.collection,
                            record_id = %reference.record_id,
                            field = reference.field,
                            value = %reference.value,
                            "unresolved identity reference, record left in legacy form"
                        );
                    }
                    report.unresolved.extend(flagged);
                    if self.config.fail_fast {
                        report.state = MigrationState::Failed;
                        return false;
                    }
                }
                // Record removed between the get and the update.
                Err(_) => {}
            }
            *cursor = Some(id.clone());
        }

        true
    }
}
