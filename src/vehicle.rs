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

//! Vehicle and route registry.
//!
//! The registry owns the QR token index. Tokens are derived deterministically
//! from vehicle identity (`VEH-{id}-{plate}`) and regenerated whenever the
//! plate changes, so a token maps to exactly one vehicle at any time.

use crate::base::{RouteId, VehicleId};
use crate::error::GateError;
use crate::settings::SeatLimits;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

static PLATE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{3}\s\d{3,4}$").unwrap()
});

/// Vehicle classes recognized at the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Jeepney,
    Bus,
    Van,
    Tricycle,
    Taxi,
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jeepney => "jeepney",
            Self::Bus => "bus",
            Self::Van => "van",
            Self::Tricycle => "tricycle",
            Self::Taxi => "taxi",
        };
        f.write_str(name)
    }
}

/// Display route used for board partitioning, never for fee computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub origin: String,
    pub destination: String,
    pub base_fare: rust_decimal::Decimal,
    pub active: bool,
}

impl Route {
    /// Lane label shown on multi-route displays.
    pub fn display_name(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}

/// A registered vehicle with its derived QR token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub driver: String,
    pub class: VehicleClass,
    pub seat_capacity: u32,
    pub route: Option<RouteId>,
    pub qr_token: String,
}

fn derive_token(id: VehicleId, plate: &str) -> String {
    format!("VEH-{}-{}", id, plate.replace(' ', "-")).to_uppercase()
}

/// Registration input; the id and token are assigned by the registry.
#[derive(Debug, Clone)]
pub struct VehicleSpec {
    pub plate: String,
    pub driver: String,
    pub class: VehicleClass,
    pub seat_capacity: u32,
    pub route: Option<RouteId>,
}

/// Concurrent vehicle and route store.
#[derive(Debug, Default)]
pub struct VehicleRegistry {
    vehicles: DashMap<VehicleId, Vehicle>,
    /// QR token -> vehicle, kept one-to-one with the vehicles map.
    tokens: DashMap<String, VehicleId>,
    /// Plate -> vehicle, for duplicate rejection.
    plates: DashMap<String, VehicleId>,
    routes: DashMap<RouteId, Route>,
    next_vehicle: AtomicU32,
    next_route: AtomicU32,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vehicle, deriving its QR token.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidPlate`] - plate is not `XXX 123` / `XXX 1234`.
    /// - [`GateError::DuplicatePlate`] - plate already registered.
    /// - [`GateError::SeatLimitExceeded`] - capacity above the class ceiling.
    pub fn register(&self, spec: VehicleSpec, limits: &SeatLimits) -> Result<Vehicle, GateError> {
        if !PLATE_FORMAT.is_match(&spec.plate) {
            return Err(GateError::InvalidPlate);
        }
        let limit = limits.for_class(spec.class);
        if spec.seat_capacity > limit {
            return Err(GateError::SeatLimitExceeded {
                requested: spec.seat_capacity,
                limit,
            });
        }

        let plate = spec.plate.to_uppercase();
        let id = VehicleId(self.next_vehicle.fetch_add(1, Ordering::Relaxed) + 1);
        // Atomic check-and-insert on the plate index prevents two racing
        // registrations from sharing a plate.
        match self.plates.entry(plate.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(GateError::DuplicatePlate),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let vehicle = Vehicle {
            id,
            qr_token: derive_token(id, &plate),
            plate,
            driver: spec.driver,
            class: spec.class,
            seat_capacity: spec.seat_capacity,
            route: spec.route,
        };
        self.tokens.insert(vehicle.qr_token.clone(), id);
        self.vehicles.insert(id, vehicle.clone());
        tracing::info!(vehicle = %id, plate = %vehicle.plate, "vehicle registered");
        Ok(vehicle)
    }

    /// Changes a vehicle's plate and regenerates its QR token.
    ///
    /// The old token stops resolving as soon as the new one is indexed.
    pub fn update_plate(&self, id: VehicleId, new_plate: &str) -> Result<Vehicle, GateError> {
        if !PLATE_FORMAT.is_match(new_plate) {
            return Err(GateError::InvalidPlate);
        }
        let new_plate = new_plate.to_uppercase();
        let mut vehicle = self.vehicles.get_mut(&id).ok_or(GateError::VehicleNotFound)?;
        if new_plate == vehicle.plate {
            return Ok(vehicle.clone());
        }
        // Claim the new plate through the same atomic check-and-insert as
        // registration; racing updates to one plate serialize here and the
        // loser sees it occupied.
        match self.plates.entry(new_plate.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(GateError::DuplicatePlate),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let old_token = vehicle.qr_token.clone();
        self.plates.remove(&vehicle.plate);
        vehicle.plate = new_plate;
        vehicle.qr_token = derive_token(id, &vehicle.plate);
        self.tokens.remove(&old_token);
        self.tokens.insert(vehicle.qr_token.clone(), id);
        tracing::info!(vehicle = %id, plate = %vehicle.plate, "plate updated, token regenerated");
        Ok(vehicle.clone())
    }

    /// Removes a vehicle. Entry log rows keep their vehicle id; views render
    /// missing vehicles with placeholders.
    pub fn remove(&self, id: VehicleId) -> Result<(), GateError> {
        let (_, vehicle) = self.vehicles.remove(&id).ok_or(GateError::VehicleNotFound)?;
        self.tokens.remove(&vehicle.qr_token);
        self.plates.remove(&vehicle.plate);
        Ok(())
    }

    pub fn resolve_token(&self, token: &str) -> Option<VehicleId> {
        self.tokens.get(token.trim()).map(|entry| *entry)
    }

    pub fn get(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.get(&id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn register_route(
        &self,
        origin: &str,
        destination: &str,
        base_fare: rust_decimal::Decimal,
    ) -> Route {
        let id = RouteId(self.next_route.fetch_add(1, Ordering::Relaxed) + 1);
        let route = Route {
            id,
            origin: origin.to_string(),
            destination: destination.to_string(),
            base_fare,
            active: true,
        };
        self.routes.insert(id, route.clone());
        route
    }

    pub fn route(&self, id: RouteId) -> Option<Route> {
        self.routes.get(&id).map(|entry| entry.clone())
    }

    /// Active routes, ordered by origin then destination for dropdowns.
    pub fn active_routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.clone())
            .collect();
        routes.sort_by(|a, b| (&a.origin, &a.destination).cmp(&(&b.origin, &b.destination)));
        routes
    }

    pub fn set_route_active(&self, id: RouteId, active: bool) -> Result<(), GateError> {
        let mut route = self.routes.get_mut(&id).ok_or(GateError::RouteNotFound)?;
        route.active = active;
        Ok(())
    }
}
