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

use chrono::Utc;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use terminal_queue_rs::{StaffId, Terminal, VehicleClass, VehicleSpec};
use tracing_subscriber::EnvFilter;

/// Terminal Queue - Replay gate event CSV files
///
/// Reads registration, deposit, and scan events from a CSV file, applies
/// them against a fresh terminal, and prints the public departure board.
#[derive(Parser, Debug)]
#[command(name = "terminal-queue-rs")]
#[command(about = "Replays terminal gate events from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with gate events
    ///
    /// Expected format: op,plate,driver,amount
    /// Example: cargo run -- events.csv > board.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let terminal = match replay_events(BufReader::new(file)) {
        Ok(terminal) => terminal,
        Err(e) => {
            eprintln!("Error replaying events: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_board(&terminal, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, plate, driver, amount`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    plate: String,
    #[serde(default)]
    driver: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    amount: Option<Decimal>,
}

/// Replays gate events from a CSV reader.
///
/// Supported ops:
/// - `register`: registers `plate` with `driver` as a jeepney
/// - `deposit`: credits `amount` to the vehicle's wallet
/// - `scan`: runs the entry/exit state machine for the vehicle's token
///
/// Malformed rows and rejected scans are skipped; the replay keeps going so
/// the board reflects everything that did apply.
pub fn replay_events<R: Read>(reader: R) -> Result<Terminal, csv::Error> {
    let terminal = Terminal::new();
    // Tokens issued during this replay, keyed by plate.
    let mut tokens: HashMap<String, String> = HashMap::new();
    let staff = StaffId(1);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("skipping malformed row: {e}");
                continue;
            }
        };
        let plate = record.plate.to_uppercase();

        let outcome = match record.op.to_lowercase().as_str() {
            "register" => terminal
                .register_vehicle(VehicleSpec {
                    plate: plate.clone(),
                    driver: record.driver.unwrap_or_default(),
                    class: VehicleClass::Jeepney,
                    seat_capacity: 20,
                    route: None,
                })
                .map(|vehicle| {
                    tokens.insert(plate.clone(), vehicle.qr_token);
                }),
            "deposit" => {
                let Some(amount) = record.amount else {
                    tracing::debug!(%plate, "skipping deposit without amount");
                    continue;
                };
                let vehicle = tokens
                    .get(&plate)
                    .and_then(|token| terminal.resolve_token(token));
                match vehicle {
                    Some(vehicle) => terminal
                        .record_deposit(vehicle, amount, Utc::now())
                        .map(|_| ()),
                    None => {
                        tracing::debug!(%plate, "skipping deposit for unknown plate");
                        continue;
                    }
                }
            }
            "scan" => match tokens.get(&plate) {
                Some(token) => terminal.scan(token, staff, Utc::now()).map(|_| ()),
                None => {
                    tracing::debug!(%plate, "skipping scan for unknown plate");
                    continue;
                }
            },
            other => {
                tracing::debug!(op = other, "skipping unknown op");
                continue;
            }
        };

        if let Err(e) = outcome {
            tracing::info!(%plate, "event rejected: {e}");
        }
    }

    Ok(terminal)
}

/// Write the public board to a CSV writer.
///
/// Columns: `plate, driver, route, status, departure`
pub fn write_board<W: Write>(terminal: &Terminal, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["plate", "driver", "route", "status", "departure"])?;

    for row in terminal.public_board(None, Utc::now()) {
        wtr.write_record([
            row.plate.as_str(),
            row.driver.as_str(),
            row.route.as_deref().unwrap_or("—"),
            match row.status {
                terminal_queue_rs::BoardStatus::Boarding => "Boarding",
                terminal_queue_rs::BoardStatus::Departed => "Departed",
            },
            &row.departure_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
