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

//! Terminal configuration.
//!
//! Settings are an explicit value type, not a hidden singleton. Every gate
//! operation loads one consistent copy from the [`SettingsStore`] up front;
//! admin updates replace the whole struct.

use crate::vehicle::VehicleClass;
use chrono::Duration;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Seat-capacity ceilings per vehicle class, enforced at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLimits {
    pub jeepney: u32,
    pub bus: u32,
    pub van: u32,
    pub tricycle: u32,
    pub taxi: u32,
}

impl SeatLimits {
    pub fn for_class(&self, class: VehicleClass) -> u32 {
        match class {
            VehicleClass::Jeepney => self.jeepney,
            VehicleClass::Bus => self.bus,
            VehicleClass::Van => self.van,
            VehicleClass::Tricycle => self.tricycle,
            VehicleClass::Taxi => self.taxi,
        }
    }
}

impl Default for SeatLimits {
    fn default() -> Self {
        Self {
            jeepney: 24,
            bus: 60,
            van: 18,
            tricycle: 6,
            taxi: 4,
        }
    }
}

/// Terminal-wide settings consulted by every queue operation.
///
/// Durations are stored as whole minutes, matching how staff configure them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// Fee debited from the wallet on each successful entry (PHP).
    pub terminal_fee: Decimal,
    /// Minimum wallet balance required before an entry is attempted (PHP).
    pub min_deposit_amount: Decimal,
    /// Minimum gap between a successful entry and the next entry attempt.
    pub entry_cooldown_minutes: u32,
    /// How long a vehicle may stay before the sweep auto-closes its entry.
    pub departure_duration_minutes: u32,
    /// Age past which inactive entry log rows are pruned.
    pub delete_after_minutes: u32,
    /// How long departed vehicles remain visible on the public board.
    pub board_visibility_minutes: u32,
    pub seat_limits: SeatLimits,
}

impl TerminalSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.entry_cooldown_minutes))
    }

    pub fn departure_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.departure_duration_minutes))
    }

    pub fn delete_after(&self) -> Duration {
        Duration::minutes(i64::from(self.delete_after_minutes))
    }

    pub fn board_visibility(&self) -> Duration {
        Duration::minutes(i64::from(self.board_visibility_minutes))
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            terminal_fee: Decimal::new(5000, 2),        // 50.00
            min_deposit_amount: Decimal::new(10000, 2), // 100.00
            entry_cooldown_minutes: 5,
            departure_duration_minutes: 30,
            delete_after_minutes: 10,
            board_visibility_minutes: 10,
            seat_limits: SeatLimits::default(),
        }
    }
}

/// Cached settings with explicit invalidation on admin update.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<TerminalSettings>,
}

impl SettingsStore {
    pub fn new(settings: TerminalSettings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }

    /// Returns a consistent copy for the duration of one operation.
    pub fn load(&self) -> TerminalSettings {
        self.current.read().clone()
    }

    /// Replaces the settings wholesale. Operations already in flight keep
    /// the copy they loaded.
    pub fn update(&self, settings: TerminalSettings) {
        *self.current.write() = settings;
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(TerminalSettings::default())
    }
}
