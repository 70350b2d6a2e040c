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

//! Terminal facade.
//!
//! Wires the registry, wallet book, queue ledger, and settings store into
//! the public engine surface. Maintenance sweeps run opportunistically
//! before every read-heavy query, so callers never schedule them.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//! use terminal_queue_rs::{ScanOutcome, StaffId, Terminal, VehicleClass, VehicleSpec};
//!
//! let terminal = Terminal::new();
//! let vehicle = terminal
//!     .register_vehicle(VehicleSpec {
//!         plate: "ABC 123".to_string(),
//!         driver: "Juan Dela Cruz".to_string(),
//!         class: VehicleClass::Jeepney,
//!         seat_capacity: 20,
//!         route: None,
//!     })
//!     .unwrap();
//!
//! terminal.record_deposit(vehicle.id, dec!(200.00), Utc::now()).unwrap();
//! let outcome = terminal.scan(&vehicle.qr_token, StaffId(1), Utc::now()).unwrap();
//! assert!(matches!(outcome, ScanOutcome::Entered { .. }));
//! ```

use crate::base::{EntryId, RouteId, StaffId, VehicleId};
use crate::error::GateError;
use crate::gate::{EntryLedger, EntryRecord, MaintenanceReport, ScanOutcome};
use crate::settings::{SettingsStore, TerminalSettings};
use crate::vehicle::{Route, Vehicle, VehicleRegistry, VehicleSpec};
use crate::view::{self, BoardRow, QueueRow};
use crate::wallet::{Deposit, DepositReceipt, WalletBook};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The terminal engine.
///
/// # Invariants
///
/// - At most one entry log row per vehicle is active at any instant.
/// - Wallet balances never go negative.
/// - QR tokens map one-to-one onto registered vehicles.
#[derive(Debug, Default)]
pub struct Terminal {
    registry: VehicleRegistry,
    wallets: WalletBook,
    ledger: EntryLedger,
    settings: SettingsStore,
}

impl Terminal {
    /// Creates a terminal with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: TerminalSettings) -> Self {
        Self {
            settings: SettingsStore::new(settings),
            ..Self::default()
        }
    }

    // === Settings ===

    pub fn settings(&self) -> TerminalSettings {
        self.settings.load()
    }

    /// Admin update; takes effect for subsequent operations.
    pub fn update_settings(&self, settings: TerminalSettings) {
        self.settings.update(settings);
    }

    // === Registration ===

    /// Registers a vehicle and opens its wallet at zero balance.
    pub fn register_vehicle(&self, spec: VehicleSpec) -> Result<Vehicle, GateError> {
        let settings = self.settings.load();
        let vehicle = self.registry.register(spec, &settings.seat_limits)?;
        self.wallets.ensure(vehicle.id);
        Ok(vehicle)
    }

    /// Changes a plate; the QR token is regenerated from the new identity.
    pub fn update_plate(&self, vehicle: VehicleId, plate: &str) -> Result<Vehicle, GateError> {
        self.registry.update_plate(vehicle, plate)
    }

    pub fn remove_vehicle(&self, vehicle: VehicleId) -> Result<(), GateError> {
        self.registry.remove(vehicle)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        self.registry.get(id)
    }

    /// Resolves a QR token without touching gate state.
    pub fn resolve_token(&self, token: &str) -> Option<VehicleId> {
        self.registry.resolve_token(token)
    }

    pub fn register_route(
        &self,
        origin: &str,
        destination: &str,
        base_fare: Decimal,
    ) -> Route {
        self.registry.register_route(origin, destination, base_fare)
    }

    pub fn active_routes(&self) -> Vec<Route> {
        self.registry.active_routes()
    }

    /// Deactivated routes disappear from dropdowns; assigned vehicles keep
    /// the reference and still display under the route's lane.
    pub fn set_route_active(&self, route: RouteId, active: bool) -> Result<(), GateError> {
        self.registry.set_route_active(route, active)
    }

    // === Wallet ===

    /// Records a cash deposit. Instantly settled; the wallet is credited
    /// atomically with the deposit record.
    pub fn record_deposit(
        &self,
        vehicle: VehicleId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt, GateError> {
        if self.registry.get(vehicle).is_none() {
            return Err(GateError::VehicleNotFound);
        }
        self.wallets.credit(vehicle, amount, now)
    }

    pub fn balance(&self, vehicle: VehicleId) -> Decimal {
        self.wallets.balance(vehicle)
    }

    pub fn deposits(&self, vehicle: VehicleId) -> Vec<Deposit> {
        self.wallets.deposits(vehicle)
    }

    // === Gate ===

    /// Runs the entry/exit state machine for a scanned QR token.
    ///
    /// A vehicle that is inside exits; a vehicle that is outside attempts
    /// entry (cooldown, minimum balance, then fee debit). Every attempt is
    /// logged, including failures.
    pub fn scan(
        &self,
        token: &str,
        staff: StaffId,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, GateError> {
        let settings = self.settings.load();
        let Some(vehicle_id) = self.registry.resolve_token(token) else {
            self.ledger.record_invalid(token, staff, now);
            tracing::debug!(token, "scan rejected: invalid token");
            return Err(GateError::InvalidToken);
        };
        let vehicle = self
            .registry
            .get(vehicle_id)
            .ok_or(GateError::InvalidToken)?;
        self.ledger
            .scan(&vehicle, staff, now, &settings, &self.wallets)
    }

    /// Explicit exit endpoint; same transition as an exit scan but errors
    /// with [`GateError::NotInside`] instead of attempting entry.
    pub fn scan_exit(&self, token: &str, now: DateTime<Utc>) -> Result<ScanOutcome, GateError> {
        let vehicle_id = self
            .registry
            .resolve_token(token)
            .ok_or(GateError::InvalidToken)?;
        let vehicle = self
            .registry
            .get(vehicle_id)
            .ok_or(GateError::InvalidToken)?;
        self.ledger.exit(&vehicle, now, &self.wallets)
    }

    /// Whether the vehicle currently holds an active entry.
    pub fn is_inside(&self, vehicle: VehicleId) -> bool {
        self.ledger.active_entry(vehicle).is_some()
    }

    pub fn entry(&self, id: EntryId) -> Option<EntryRecord> {
        self.ledger.get(id)
    }

    /// Full ledger snapshot in creation order, for audit tooling.
    pub fn entry_log(&self) -> Vec<EntryRecord> {
        self.ledger.snapshot()
    }

    // === Staff overrides ===

    pub fn force_mark_departed(&self, entry: EntryId, now: DateTime<Utc>) -> Result<(), GateError> {
        self.ledger.force_depart(entry, now)
    }

    pub fn adjust_departure_time(
        &self,
        entry: EntryId,
        new_time: DateTime<Utc>,
    ) -> Result<(), GateError> {
        self.ledger.adjust_departure(entry, new_time)
    }

    // === Maintenance & read models ===

    /// Runs one maintenance pass (auto-close, then prune). Also invoked
    /// implicitly before every read model.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let settings = self.settings.load();
        self.ledger.sweep(now, &settings)
    }

    /// Staff live queue: vehicles currently inside, newest first.
    pub fn live_queue(&self, route_filter: Option<RouteId>, now: DateTime<Utc>) -> Vec<QueueRow> {
        let settings = self.settings.load();
        self.ledger.sweep(now, &settings);
        view::live_queue(&self.ledger, &self.registry, &settings, route_filter)
    }

    /// Passenger departure board: boarding and recently departed vehicles.
    pub fn public_board(
        &self,
        route_filter: Option<RouteId>,
        now: DateTime<Utc>,
    ) -> Vec<BoardRow> {
        let settings = self.settings.load();
        self.ledger.sweep(now, &settings);
        view::public_board(&self.ledger, &self.registry, &settings, now, route_filter)
    }

    /// Live queue grouped by route lane for multi-lane displays.
    pub fn route_board(&self, now: DateTime<Utc>) -> BTreeMap<String, Vec<QueueRow>> {
        let settings = self.settings.load();
        self.ledger.sweep(now, &settings);
        view::route_board(&self.ledger, &self.registry, &settings)
    }
}
