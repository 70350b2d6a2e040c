// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Entry/exit ledger and gate state machine.
//!
//! The ledger is an append-only log of scan attempts plus an active-entry
//! index. Both live under one `RwLock`, so every transition sees and
//! preserves the invariant: at most one active row per vehicle. A vehicle's
//! INSIDE/OUTSIDE state is derived from that index, never stored elsewhere.
//!
//! Gate transitions:
//! - scan while OUTSIDE → entry attempt (cooldown, minimum balance, fee)
//! - scan while INSIDE → exit (no fee, no balance check)
//! - maintenance sweep → auto-close overdue entries, prune old inactive rows

use crate::base::{EntryId, StaffId, VehicleId};
use crate::error::GateError;
use crate::settings::TerminalSettings;
use crate::vehicle::Vehicle;
use crate::wallet::WalletBook;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Bounded retries on transient wallet lock contention.
const DEBIT_RETRIES: usize = 3;

/// Outcome class of a scan attempt, recorded on every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
    Insufficient,
    Invalid,
}

/// One row of the queue ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryRecord {
    pub id: EntryId,
    /// `None` when the token resolved to nothing, or kept as a dangling
    /// reference after the vehicle is deleted.
    pub vehicle: Option<VehicleId>,
    pub staff: StaffId,
    pub fee_charged: Decimal,
    pub status: EntryStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub departed_at: Option<DateTime<Utc>>,
    /// Staff-adjusted departure; replaces the computed horizon when set.
    pub departure_override: Option<DateTime<Utc>>,
}

impl EntryRecord {
    /// Effective departure horizon for display and auto-close.
    pub fn departure_time(&self, stay: Duration) -> DateTime<Utc> {
        self.departure_override.unwrap_or(self.created_at + stay)
    }
}

/// Result of a successful scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScanOutcome {
    Entered {
        entry: EntryId,
        fee: Decimal,
        balance: Decimal,
        message: String,
    },
    Exited {
        entry: EntryId,
        balance: Decimal,
        message: String,
    },
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MaintenanceReport {
    pub closed: usize,
    pub pruned: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_id: u64,
    /// Rows ordered by id; ids are assigned in creation order, so this is
    /// also `created_at` order with a deterministic tie-break.
    records: BTreeMap<EntryId, EntryRecord>,
    /// The "vehicle is currently inside" marker.
    active: HashMap<VehicleId, EntryId>,
}

impl LedgerState {
    fn append(
        &mut self,
        vehicle: Option<VehicleId>,
        staff: StaffId,
        fee_charged: Decimal,
        status: EntryStatus,
        message: String,
        now: DateTime<Utc>,
        is_active: bool,
    ) -> EntryId {
        self.next_id += 1;
        let id = EntryId(self.next_id);
        self.records.insert(
            id,
            EntryRecord {
                id,
                vehicle,
                staff,
                fee_charged,
                status,
                message,
                created_at: now,
                is_active,
                departed_at: None,
                departure_override: None,
            },
        );
        if is_active {
            if let Some(vehicle) = vehicle {
                let previous = self.active.insert(vehicle, id);
                debug_assert!(
                    previous.is_none(),
                    "Invariant violated: vehicle {vehicle} already had an active entry"
                );
            }
        }
        id
    }

    fn close(&mut self, id: EntryId, now: DateTime<Utc>, message: Option<String>) {
        if let Some(record) = self.records.get_mut(&id) {
            record.is_active = false;
            record.departed_at = Some(now);
            if let Some(message) = message {
                record.message = message;
            }
            if let Some(vehicle) = record.vehicle {
                self.active.remove(&vehicle);
            }
        }
    }

    /// Newest successful row for a vehicle: `created_at` descending with the
    /// row id as the deterministic tie-break (ids follow creation order).
    fn latest_success(&self, vehicle: VehicleId) -> Option<&EntryRecord> {
        self.records
            .values()
            .rev()
            .find(|record| record.vehicle == Some(vehicle) && record.status == EntryStatus::Success)
    }
}

/// The queue ledger: append-only log plus active-entry index.
#[derive(Debug, Default)]
pub struct EntryLedger {
    state: RwLock<LedgerState>,
}

impl EntryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a scan whose token resolved to no vehicle. Audit only.
    pub fn record_invalid(&self, token: &str, staff: StaffId, now: DateTime<Utc>) -> EntryId {
        let mut state = self.state.write();
        state.append(
            None,
            staff,
            Decimal::ZERO,
            EntryStatus::Invalid,
            format!("Invalid QR code '{token}'. Vehicle not found."),
            now,
            false,
        )
    }

    /// Runs the full entry/exit state machine for a resolved vehicle.
    ///
    /// Holds the ledger write lock across the whole transition (lock order
    /// is always ledger → wallet), so racing scans of the same vehicle
    /// serialize: one enters, the next one exits.
    pub fn scan(
        &self,
        vehicle: &Vehicle,
        staff: StaffId,
        now: DateTime<Utc>,
        settings: &TerminalSettings,
        wallets: &WalletBook,
    ) -> Result<ScanOutcome, GateError> {
        let mut state = self.state.write();

        // INSIDE: this scan is an exit. Terminal action, no fee.
        if let Some(&entry) = state.active.get(&vehicle.id) {
            let message = format!("Vehicle '{}' departed the terminal.", vehicle.plate);
            state.close(entry, now, Some(message.clone()));
            tracing::info!(vehicle = %vehicle.id, %entry, "exit scan");
            return Ok(ScanOutcome::Exited {
                entry,
                balance: wallets.balance(vehicle.id),
                message,
            });
        }

        // OUTSIDE: entry attempt. Cooldown looks only at successful entries.
        if let Some(last) = state.latest_success(vehicle.id) {
            let elapsed = now - last.created_at;
            if elapsed < settings.cooldown() {
                let remaining = settings.cooldown() - elapsed;
                state.append(
                    Some(vehicle.id),
                    staff,
                    Decimal::ZERO,
                    EntryStatus::Failed,
                    format!(
                        "Vehicle '{}' re-scanned during cooldown ({}s remaining).",
                        vehicle.plate,
                        remaining.num_seconds()
                    ),
                    now,
                    false,
                );
                tracing::debug!(vehicle = %vehicle.id, "entry rejected: cooldown");
                return Err(GateError::CooldownActive {
                    remaining_secs: remaining.num_seconds(),
                });
            }
        }

        if wallets.balance(vehicle.id) < settings.min_deposit_amount {
            state.append(
                Some(vehicle.id),
                staff,
                Decimal::ZERO,
                EntryStatus::Failed,
                format!(
                    "Vehicle '{}' below minimum deposit of ₱{}.",
                    vehicle.plate, settings.min_deposit_amount
                ),
                now,
                false,
            );
            tracing::debug!(vehicle = %vehicle.id, "entry rejected: below minimum deposit");
            return Err(GateError::BelowMinimumDeposit);
        }

        let fee = settings.terminal_fee;
        match debit_with_retry(wallets, vehicle.id, fee) {
            Ok(balance) => {
                let message = format!(
                    "Vehicle '{}' entry validated. ₱{fee} deducted.",
                    vehicle.plate
                );
                let entry = state.append(
                    Some(vehicle.id),
                    staff,
                    fee,
                    EntryStatus::Success,
                    message.clone(),
                    now,
                    true,
                );
                tracing::info!(vehicle = %vehicle.id, %entry, %fee, "entry scan accepted");
                Ok(ScanOutcome::Entered {
                    entry,
                    fee,
                    balance,
                    message,
                })
            }
            Err(GateError::InsufficientBalance) => {
                // Fee recorded for audit, but nothing was debited.
                state.append(
                    Some(vehicle.id),
                    staff,
                    fee,
                    EntryStatus::Insufficient,
                    format!("Insufficient balance for vehicle '{}'.", vehicle.plate),
                    now,
                    false,
                );
                tracing::debug!(vehicle = %vehicle.id, "entry rejected: insufficient balance");
                Err(GateError::InsufficientBalance)
            }
            // Transient conflict after retries: nothing durable, no row.
            Err(other) => Err(other),
        }
    }

    /// Explicit-exit entry point. Same transition as an exit scan, but a
    /// vehicle that is OUTSIDE is an error instead of an entry attempt.
    pub fn exit(
        &self,
        vehicle: &Vehicle,
        now: DateTime<Utc>,
        wallets: &WalletBook,
    ) -> Result<ScanOutcome, GateError> {
        let mut state = self.state.write();
        let Some(&entry) = state.active.get(&vehicle.id) else {
            return Err(GateError::NotInside);
        };
        let message = format!("Vehicle '{}' departed the terminal.", vehicle.plate);
        state.close(entry, now, Some(message.clone()));
        tracing::info!(vehicle = %vehicle.id, %entry, "explicit exit");
        Ok(ScanOutcome::Exited {
            entry,
            balance: wallets.balance(vehicle.id),
            message,
        })
    }

    /// Staff override: close an active entry immediately.
    pub fn force_depart(&self, entry: EntryId, now: DateTime<Utc>) -> Result<(), GateError> {
        let mut state = self.state.write();
        let record = state.records.get(&entry).ok_or(GateError::EntryNotFound)?;
        if !record.is_active {
            return Err(GateError::NotInside);
        }
        state.close(entry, now, Some("Marked departed by staff.".to_string()));
        tracing::info!(%entry, "entry force-departed by staff");
        Ok(())
    }

    /// Staff override: move an active entry's departure horizon. Affects
    /// both the displayed departure time and the auto-close sweep.
    pub fn adjust_departure(
        &self,
        entry: EntryId,
        new_time: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let mut state = self.state.write();
        let record = state
            .records
            .get_mut(&entry)
            .ok_or(GateError::EntryNotFound)?;
        if !record.is_active {
            return Err(GateError::NotInside);
        }
        record.departure_override = Some(new_time);
        tracing::info!(%entry, %new_time, "departure time adjusted");
        Ok(())
    }

    /// Maintenance pass: auto-close overdue active entries, then prune old
    /// inactive rows. Idempotent; safe to run redundantly and concurrently.
    /// Close runs strictly before prune so a just-expired entry is closed
    /// before it can become eligible for deletion a window later.
    pub fn sweep(&self, now: DateTime<Utc>, settings: &TerminalSettings) -> MaintenanceReport {
        let mut state = self.state.write();
        let stay = settings.departure_duration();

        let overdue: Vec<EntryId> = state
            .active
            .values()
            .copied()
            .filter(|id| {
                state
                    .records
                    .get(id)
                    .is_some_and(|record| record.departure_time(stay) <= now)
            })
            .collect();
        for id in &overdue {
            state.close(*id, now, Some("Auto-departed after stay duration.".to_string()));
        }

        let cutoff = now - settings.delete_after();
        let stale: Vec<EntryId> = state
            .records
            .values()
            .filter(|record| {
                record.created_at < cutoff && (!record.is_active || record.departed_at.is_some())
            })
            .map(|record| record.id)
            .collect();
        for id in &stale {
            state.records.remove(id);
        }

        let report = MaintenanceReport {
            closed: overdue.len(),
            pruned: stale.len(),
        };
        if report.closed > 0 || report.pruned > 0 {
            tracing::debug!(closed = report.closed, pruned = report.pruned, "maintenance sweep");
        }
        report
    }

    /// Id of the active entry for a vehicle, if it is inside.
    pub fn active_entry(&self, vehicle: VehicleId) -> Option<EntryId> {
        self.state.read().active.get(&vehicle).copied()
    }

    pub fn get(&self, entry: EntryId) -> Option<EntryRecord> {
        self.state.read().records.get(&entry).cloned()
    }

    /// All rows in id (creation) order. Read models filter this snapshot.
    pub fn snapshot(&self) -> Vec<EntryRecord> {
        self.state.read().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

fn debit_with_retry(
    wallets: &WalletBook,
    vehicle: VehicleId,
    fee: Decimal,
) -> Result<Decimal, GateError> {
    let mut attempt = 0;
    loop {
        match wallets.debit(vehicle, fee) {
            Err(GateError::ConcurrencyConflict) if attempt + 1 < DEBIT_RETRIES => {
                attempt += 1;
                tracing::warn!(%vehicle, attempt, "wallet contended, retrying debit");
            }
            other => return other,
        }
    }
}
