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

//! Wallet ledger.
//!
//! One prepaid wallet per vehicle. Credits create an immutable [`Deposit`]
//! record and increment the balance under the same wallet lock; debits are
//! conditional and never let the balance go negative.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use terminal_queue_rs::{VehicleId, WalletBook};
//! use chrono::Utc;
//!
//! let book = WalletBook::new();
//! let receipt = book.credit(VehicleId(1), dec!(100.00), Utc::now()).unwrap();
//! assert_eq!(receipt.balance, dec!(100.00));
//! ```

use crate::base::VehicleId;
use crate::error::GateError;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration as StdDuration;

/// How long a debit waits on a contended wallet before reporting
/// [`GateError::ConcurrencyConflict`] to the retry layer.
const DEBIT_LOCK_TIMEOUT: StdDuration = StdDuration::from_millis(50);

/// Immutable record of a cash credit. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deposit {
    pub amount: Decimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful credit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositReceipt {
    pub balance: Decimal,
    pub reference: String,
}

#[derive(Debug)]
struct WalletData {
    balance: Decimal,
    deposits: Vec<Deposit>,
}

impl WalletData {
    fn new() -> Self {
        Self {
            balance: Decimal::ZERO,
            deposits: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: wallet balance went negative: {}",
            self.balance
        );
    }

    fn credit(&mut self, deposit: Deposit) -> Decimal {
        self.balance += deposit.amount;
        self.deposits.push(deposit);
        self.assert_invariants();
        self.balance
    }

    /// Conditional debit; no mutation when the balance cannot cover it.
    fn debit(&mut self, amount: Decimal) -> Result<Decimal, GateError> {
        if self.balance < amount {
            return Err(GateError::InsufficientBalance);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(self.balance)
    }
}

/// A single vehicle's wallet, guarded by its own mutex.
#[derive(Debug)]
pub struct Wallet {
    inner: Mutex<WalletData>,
}

impl Wallet {
    fn new() -> Self {
        Self {
            inner: Mutex::new(WalletData::new()),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub fn deposits(&self) -> Vec<Deposit> {
        self.inner.lock().deposits.clone()
    }
}

/// Concurrent wallet store indexed by vehicle.
///
/// Wallets are created lazily with zero balance. The normal flow creates one
/// at vehicle registration; lazy creation covers lookups that arrive first.
#[derive(Debug, Default)]
pub struct WalletBook {
    wallets: DashMap<VehicleId, Wallet>,
    /// Issued deposit references, for global uniqueness.
    references: DashSet<String>,
}

impl WalletBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the wallet for a vehicle if it does not exist yet.
    pub fn ensure(&self, vehicle: VehicleId) {
        self.wallets.entry(vehicle).or_insert_with(Wallet::new);
    }

    pub fn balance(&self, vehicle: VehicleId) -> Decimal {
        self.wallets
            .entry(vehicle)
            .or_insert_with(Wallet::new)
            .balance()
    }

    pub fn deposits(&self, vehicle: VehicleId) -> Vec<Deposit> {
        self.wallets
            .get(&vehicle)
            .map(|wallet| wallet.deposits())
            .unwrap_or_default()
    }

    /// Credits the wallet, recording a [`Deposit`] with a generated unique
    /// reference. Deposit creation and the balance increment happen under
    /// one wallet lock, so concurrent credits all land.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidAmount`] if `amount <= 0`.
    pub fn credit(
        &self,
        vehicle: VehicleId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt, GateError> {
        if amount <= Decimal::ZERO {
            return Err(GateError::InvalidAmount);
        }

        let reference = self.issue_reference(now);
        let wallet = self.wallets.entry(vehicle).or_insert_with(Wallet::new);
        let balance = wallet.inner.lock().credit(Deposit {
            amount,
            reference: reference.clone(),
            created_at: now,
        });
        tracing::info!(%vehicle, %amount, %reference, "deposit credited");
        Ok(DepositReceipt { balance, reference })
    }

    /// Debits the wallet if the balance covers `amount`. A zero amount is a
    /// valid no-op charge (a terminal configured with a free entry fee).
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidAmount`] - `amount < 0`.
    /// - [`GateError::InsufficientBalance`] - balance would go negative.
    /// - [`GateError::ConcurrencyConflict`] - wallet lock contended past the
    ///   timeout; the caller retries.
    pub fn debit(&self, vehicle: VehicleId, amount: Decimal) -> Result<Decimal, GateError> {
        if amount < Decimal::ZERO {
            return Err(GateError::InvalidAmount);
        }
        let wallet = self.wallets.entry(vehicle).or_insert_with(Wallet::new);
        let mut data = wallet
            .inner
            .try_lock_for(DEBIT_LOCK_TIMEOUT)
            .ok_or(GateError::ConcurrencyConflict)?;
        data.debit(amount)
    }

    /// Date-stamped reference with a random suffix, collision-checked.
    fn issue_reference(&self, now: DateTime<Utc>) -> String {
        loop {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            let candidate = format!(
                "DEP-{}-{}",
                now.format("%Y%m%d"),
                suffix[..6].to_uppercase()
            );
            if self.references.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
