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

//! Read models over the queue ledger.
//!
//! Pure projections: they filter and join a ledger snapshot against the
//! vehicle registry, parameterized by "now" and an optional route filter.
//! They never mutate state; the maintenance sweep is a precondition the
//! caller runs first, not something embedded here.

use crate::base::RouteId;
use crate::gate::{EntryLedger, EntryRecord, EntryStatus};
use crate::settings::TerminalSettings;
use crate::vehicle::VehicleRegistry;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Placeholder shown when a log row outlives its vehicle.
const UNKNOWN: &str = "—";

/// One line of the staff live queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueRow {
    pub entry: crate::base::EntryId,
    pub plate: String,
    pub driver: String,
    pub route: Option<String>,
    pub entered_at: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
}

/// Public board status for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoardStatus {
    Boarding,
    Departed,
}

/// One line of the public departure board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardRow {
    pub plate: String,
    pub driver: String,
    pub route: Option<String>,
    pub status: BoardStatus,
    pub departure_time: DateTime<Utc>,
}

fn matches_route(
    record: &EntryRecord,
    registry: &VehicleRegistry,
    filter: Option<RouteId>,
) -> bool {
    match filter {
        None => true,
        Some(route) => record
            .vehicle
            .and_then(|id| registry.get(id))
            .is_some_and(|vehicle| vehicle.route == Some(route)),
    }
}

fn enrich(record: &EntryRecord, registry: &VehicleRegistry) -> (String, String, Option<String>) {
    let vehicle = record.vehicle.and_then(|id| registry.get(id));
    match vehicle {
        Some(vehicle) => {
            let route = vehicle
                .route
                .and_then(|id| registry.route(id))
                .map(|route| route.display_name());
            (vehicle.plate, vehicle.driver, route)
        }
        None => (UNKNOWN.to_string(), UNKNOWN.to_string(), None),
    }
}

/// Staff live queue: active rows, newest first.
pub fn live_queue(
    ledger: &EntryLedger,
    registry: &VehicleRegistry,
    settings: &TerminalSettings,
    route_filter: Option<RouteId>,
) -> Vec<QueueRow> {
    let stay = settings.departure_duration();
    let mut rows: Vec<QueueRow> = ledger
        .snapshot()
        .into_iter()
        .filter(|record| record.is_active)
        .filter(|record| matches_route(record, registry, route_filter))
        .map(|record| {
            let (plate, driver, route) = enrich(&record, registry);
            QueueRow {
                entry: record.id,
                plate,
                driver,
                route,
                entered_at: record.created_at,
                departure_time: record.departure_time(stay),
            }
        })
        .collect();
    rows.reverse(); // snapshot is oldest-first
    rows
}

/// Public departure board: boarding vehicles that entered today, plus
/// vehicles departed within the visibility window. Oldest first, so the
/// next vehicle to leave sits at the top.
pub fn public_board(
    ledger: &EntryLedger,
    registry: &VehicleRegistry,
    settings: &TerminalSettings,
    now: DateTime<Utc>,
    route_filter: Option<RouteId>,
) -> Vec<BoardRow> {
    let stay = settings.departure_duration();
    let visibility = settings.board_visibility();
    let today = (now.year(), now.ordinal());

    ledger
        .snapshot()
        .into_iter()
        .filter(|record| record.status == EntryStatus::Success)
        .filter(|record| matches_route(record, registry, route_filter))
        .filter_map(|record| {
            let boarding =
                record.is_active && (record.created_at.year(), record.created_at.ordinal()) == today;
            let departed_recently = !record.is_active
                && record
                    .departed_at
                    .is_some_and(|departed| now - departed <= visibility);
            if !boarding && !departed_recently {
                return None;
            }
            let (plate, driver, route) = enrich(&record, registry);
            Some(BoardRow {
                plate,
                driver,
                route,
                status: if boarding {
                    BoardStatus::Boarding
                } else {
                    BoardStatus::Departed
                },
                departure_time: record.departure_time(stay),
            })
        })
        .collect()
}

/// Live queue partitioned by route lane for multi-route TV displays.
/// Vehicles without a route gather under the unassigned lane.
pub fn route_board(
    ledger: &EntryLedger,
    registry: &VehicleRegistry,
    settings: &TerminalSettings,
) -> BTreeMap<String, Vec<QueueRow>> {
    let mut lanes: BTreeMap<String, Vec<QueueRow>> = BTreeMap::new();
    for row in live_queue(ledger, registry, settings, None) {
        let lane = row.route.clone().unwrap_or_else(|| "Unassigned".to_string());
        lanes.entry(lane).or_default().push(row);
    }
    lanes
}
