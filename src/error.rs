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

//! Error types for gate and wallet operations.
//!
//! Every variant except [`GateError::ConcurrencyConflict`] is an expected,
//! user-facing outcome the caller renders as scan-station feedback.
//! `ConcurrencyConflict` is retried transparently by the engine before it
//! ever surfaces.

use thiserror::Error;

/// Gate and wallet processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// QR token does not resolve to any registered vehicle
    #[error("invalid QR token: no matching vehicle")]
    InvalidToken,

    /// Vehicle re-entered before the cooldown window elapsed
    #[error("entry cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: i64 },

    /// Wallet balance is below the minimum required to queue
    #[error("wallet balance below minimum deposit requirement")]
    BelowMinimumDeposit,

    /// Wallet cannot cover the terminal fee
    #[error("insufficient wallet balance for terminal fee")]
    InsufficientBalance,

    /// Explicit exit requested for a vehicle that is not inside
    #[error("vehicle is not inside the terminal")]
    NotInside,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// License plate does not match the required format
    #[error("license plate must be in format XXX 123 or XXX 1234")]
    InvalidPlate,

    /// Another vehicle is already registered with this plate
    #[error("a vehicle with this license plate already exists")]
    DuplicatePlate,

    /// Declared seat capacity exceeds the ceiling for the vehicle class
    #[error("seat capacity {requested} exceeds limit {limit} for this vehicle class")]
    SeatLimitExceeded { requested: u32, limit: u32 },

    /// Referenced vehicle does not exist
    #[error("vehicle not found")]
    VehicleNotFound,

    /// Referenced route does not exist
    #[error("route not found")]
    RouteNotFound,

    /// Referenced entry log row does not exist
    #[error("entry log row not found")]
    EntryNotFound,

    /// Transient lock contention; retried internally, rarely user-visible
    #[error("concurrent operation in progress, try again")]
    ConcurrencyConflict,
}
