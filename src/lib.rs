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

//! # Terminal Queue
//!
//! This library provides the queue and wallet ledger engine for a vehicle
//! terminal: QR-token entry/exit gating with prepaid fee debits, cooldown
//! and minimum-balance rules, time-driven auto-expiry of queue entries, and
//! the derived views that feed staff tooling and the public departure board.
//!
//! ## Core Components
//!
//! - [`Terminal`]: Facade wiring registry, wallets, ledger, and settings
//! - [`EntryLedger`]: Append-only scan log with the active-entry index
//! - [`WalletBook`]: Per-vehicle prepaid wallets with atomic credit/debit
//! - [`VehicleRegistry`]: Vehicles, routes, and the QR token index
//! - [`GateError`]: Structured outcomes for every expected failure
//!
//! ## Example
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
//! // Fund the wallet, then scan in.
//! terminal.record_deposit(vehicle.id, dec!(200.00), Utc::now()).unwrap();
//! let outcome = terminal.scan(&vehicle.qr_token, StaffId(1), Utc::now()).unwrap();
//! assert!(matches!(outcome, ScanOutcome::Entered { .. }));
//! ```
//!
//! ## Thread Safety
//!
//! All engine state is safe for concurrent access: wallets live behind
//! per-vehicle locks, and the ledger's active-entry index shares one lock
//! with the log so the at-most-one-active-row invariant holds under racing
//! scans. The vehicle's INSIDE/OUTSIDE state is always derived from the
//! ledger, never stored separately.

pub mod base;
pub mod error;
pub mod gate;
pub mod settings;
mod terminal;
pub mod vehicle;
pub mod view;
pub mod wallet;

pub use base::{EntryId, RouteId, StaffId, VehicleId};
pub use error::GateError;
pub use gate::{EntryLedger, EntryRecord, EntryStatus, MaintenanceReport, ScanOutcome};
pub use settings::{SeatLimits, SettingsStore, TerminalSettings};
pub use terminal::Terminal;
pub use vehicle::{Route, Vehicle, VehicleClass, VehicleRegistry, VehicleSpec};
pub use view::{BoardRow, BoardStatus, QueueRow};
pub use wallet::{Deposit, DepositReceipt, WalletBook};
