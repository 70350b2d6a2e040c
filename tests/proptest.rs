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

//! Property-based tests for the terminal queue engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! valid gate and wallet operations.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use terminal_queue_rs::{
    EntryLedger, ScanOutcome, SeatLimits, StaffId, TerminalSettings, Vehicle, VehicleClass,
    VehicleId, VehicleRegistry, VehicleSpec, WalletBook,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

fn test_vehicle() -> Vehicle {
    let registry = VehicleRegistry::new();
    registry
        .register(
            VehicleSpec {
                plate: "ABC 123".to_string(),
                driver: "Juan Dela Cruz".to_string(),
                class: VehicleClass::Jeepney,
                seat_capacity: 20,
                route: None,
            },
            &SeatLimits::default(),
        )
        .unwrap()
}

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive peso amount (0.01 to 10000.00, 2 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|centavos| Decimal::new(centavos, 2))
}

/// One step of a random gate schedule: what to do, and how many minutes
/// pass before doing it.
#[derive(Debug, Clone)]
enum GateOp {
    Scan,
    Sweep,
    Credit(Decimal),
}

fn arb_gate_op() -> impl Strategy<Value = GateOp> {
    prop_oneof![
        3 => Just(GateOp::Scan),
        1 => Just(GateOp::Sweep),
        1 => arb_amount().prop_map(GateOp::Credit),
    ]
}

fn arb_schedule() -> impl Strategy<Value = Vec<(GateOp, u32)>> {
    prop::collection::vec((arb_gate_op(), 0u32..=40), 1..30)
}

// =============================================================================
// Wallet Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Sum of deposits equals the balance when nothing is debited.
    #[test]
    fn deposits_sum_to_balance(
        amounts in prop::collection::vec(arb_amount(), 1..20),
    ) {
        let book = WalletBook::new();
        let vehicle = VehicleId(1);
        let expected: Decimal = amounts.iter().copied().sum();

        for amount in &amounts {
            book.credit(vehicle, *amount, start()).unwrap();
        }

        prop_assert_eq!(book.balance(vehicle), expected);
        prop_assert_eq!(book.deposits(vehicle).len(), amounts.len());
    }

    /// Balance is never negative after any mix of credits and debits.
    #[test]
    fn balance_never_negative(
        credits in prop::collection::vec(arb_amount(), 1..5),
        debits in prop::collection::vec(arb_amount(), 0..10),
    ) {
        let book = WalletBook::new();
        let vehicle = VehicleId(1);

        for amount in &credits {
            book.credit(vehicle, *amount, start()).unwrap();
        }
        // Debits may fail, that's ok.
        for amount in &debits {
            let _ = book.debit(vehicle, *amount);
        }

        prop_assert!(book.balance(vehicle) >= Decimal::ZERO);
    }

    /// Credit then debit of the same amount round-trips the balance.
    #[test]
    fn credit_debit_round_trip(
        opening in arb_amount(),
        amount in arb_amount(),
    ) {
        let book = WalletBook::new();
        let vehicle = VehicleId(1);
        book.credit(vehicle, opening, start()).unwrap();

        book.credit(vehicle, amount, start()).unwrap();
        book.debit(vehicle, amount).unwrap();

        prop_assert_eq!(book.balance(vehicle), opening);
    }

    /// Order of credits doesn't affect the final balance.
    #[test]
    fn credit_order_independent(
        amounts in prop::collection::vec(arb_amount(), 2..10),
    ) {
        let forward = WalletBook::new();
        for amount in &amounts {
            forward.credit(VehicleId(1), *amount, start()).unwrap();
        }

        let backward = WalletBook::new();
        for amount in amounts.iter().rev() {
            backward.credit(VehicleId(1), *amount, start()).unwrap();
        }

        prop_assert_eq!(forward.balance(VehicleId(1)), backward.balance(VehicleId(1)));
    }

    /// A failed debit leaves the balance untouched.
    #[test]
    fn failed_debit_is_a_no_op(
        opening in arb_amount(),
        extra in arb_amount(),
    ) {
        let book = WalletBook::new();
        let vehicle = VehicleId(1);
        book.credit(vehicle, opening, start()).unwrap();

        let result = book.debit(vehicle, opening + extra);
        prop_assert!(result.is_err());
        prop_assert_eq!(book.balance(vehicle), opening);
    }

    /// Every issued deposit reference is unique.
    #[test]
    fn deposit_references_unique(
        count in 1usize..100,
    ) {
        let book = WalletBook::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..count {
            let receipt = book.credit(VehicleId(1), Decimal::ONE, start()).unwrap();
            prop_assert!(seen.insert(receipt.reference));
        }
    }
}

// =============================================================================
// Gate Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// At most one active row exists after any schedule of scans, sweeps,
    /// and credits, and the wallet accounts exactly for the entry fees.
    #[test]
    fn gate_schedule_preserves_invariants(
        schedule in arb_schedule(),
    ) {
        let ledger = EntryLedger::new();
        let settings = TerminalSettings::default();
        let wallets = WalletBook::new();
        let vehicle = test_vehicle();

        let opening = Decimal::from(10_000);
        wallets.credit(vehicle.id, opening, start()).unwrap();

        let mut now = start();
        let mut credited = Decimal::ZERO;
        let mut entries = 0u32;

        for (op, advance) in &schedule {
            now += Duration::minutes(i64::from(*advance));
            match op {
                GateOp::Scan => {
                    if let Ok(ScanOutcome::Entered { .. }) =
                        ledger.scan(&vehicle, StaffId(1), now, &settings, &wallets)
                    {
                        entries += 1;
                    }
                }
                GateOp::Sweep => {
                    ledger.sweep(now, &settings);
                }
                GateOp::Credit(amount) => {
                    wallets.credit(vehicle.id, *amount, now).unwrap();
                    credited += *amount;
                }
            }
        }

        let active = ledger
            .snapshot()
            .iter()
            .filter(|record| record.is_active)
            .count();
        prop_assert!(active <= 1, "found {} active rows", active);

        let expected = opening + credited
            - settings.terminal_fee * Decimal::from(entries);
        prop_assert_eq!(wallets.balance(vehicle.id), expected);
        prop_assert!(wallets.balance(vehicle.id) >= Decimal::ZERO);
    }

    /// Running the sweep twice in succession changes nothing the second time.
    #[test]
    fn sweep_is_idempotent_after_any_schedule(
        schedule in arb_schedule(),
        settle in 0u32..=60,
    ) {
        let ledger = EntryLedger::new();
        let settings = TerminalSettings::default();
        let wallets = WalletBook::new();
        let vehicle = test_vehicle();
        wallets.credit(vehicle.id, Decimal::from(10_000), start()).unwrap();

        let mut now = start();
        for (op, advance) in &schedule {
            now += Duration::minutes(i64::from(*advance));
            match op {
                GateOp::Scan => {
                    let _ = ledger.scan(&vehicle, StaffId(1), now, &settings, &wallets);
                }
                GateOp::Sweep => {
                    ledger.sweep(now, &settings);
                }
                GateOp::Credit(amount) => {
                    wallets.credit(vehicle.id, *amount, now).unwrap();
                }
            }
        }

        now += Duration::minutes(i64::from(settle));
        ledger.sweep(now, &settings);
        let after_first = ledger.snapshot();
        let report = ledger.sweep(now, &settings);

        prop_assert_eq!(report.closed, 0);
        prop_assert_eq!(report.pruned, 0);
        prop_assert_eq!(ledger.snapshot(), after_first);
    }

    /// A scan never flips another vehicle's state: per-vehicle isolation.
    #[test]
    fn vehicles_are_isolated(
        first_credit in arb_amount(),
        second_credit in arb_amount(),
    ) {
        let registry = VehicleRegistry::new();
        let ledger = EntryLedger::new();
        let settings = TerminalSettings::default();
        let wallets = WalletBook::new();

        let a = registry
            .register(
                VehicleSpec {
                    plate: "AAA 111".to_string(),
                    driver: "A".to_string(),
                    class: VehicleClass::Jeepney,
                    seat_capacity: 20,
                    route: None,
                },
                &SeatLimits::default(),
            )
            .unwrap();
        let b = registry
            .register(
                VehicleSpec {
                    plate: "BBB 222".to_string(),
                    driver: "B".to_string(),
                    class: VehicleClass::Jeepney,
                    seat_capacity: 20,
                    route: None,
                },
                &SeatLimits::default(),
            )
            .unwrap();

        wallets.credit(a.id, first_credit, start()).unwrap();
        wallets.credit(b.id, second_credit, start()).unwrap();

        let _ = ledger.scan(&a, StaffId(1), start(), &settings, &wallets);

        prop_assert_eq!(ledger.active_entry(b.id), None);
        prop_assert_eq!(wallets.balance(b.id), second_credit);
    }
}

// =============================================================================
// Cooldown Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Re-entry before the cooldown elapses is always rejected; re-entry
    /// at or after the cooldown always reaches the balance checks.
    #[test]
    fn cooldown_boundary_is_exact(
        gap_minutes in 0u32..=10,
    ) {
        let ledger = EntryLedger::new();
        let settings = TerminalSettings::default(); // cooldown 5 minutes
        let wallets = WalletBook::new();
        let vehicle = test_vehicle();
        wallets.credit(vehicle.id, Decimal::from(1_000), start()).unwrap();

        let entered_at = start();
        ledger.scan(&vehicle, StaffId(1), entered_at, &settings, &wallets).unwrap();
        ledger
            .scan(&vehicle, StaffId(1), entered_at + Duration::seconds(30), &settings, &wallets)
            .unwrap(); // exit

        let retry_at = entered_at + Duration::minutes(i64::from(gap_minutes));
        let result = ledger.scan(&vehicle, StaffId(1), retry_at, &settings, &wallets);

        if gap_minutes < 5 {
            prop_assert!(
                matches!(
                    result,
                    Err(terminal_queue_rs::GateError::CooldownActive { .. })
                ),
                "expected CooldownActive, got {:?}",
                result
            );
        } else {
            prop_assert!(
                matches!(result, Ok(ScanOutcome::Entered { .. })),
                "expected Entered, got {:?}",
                result
            );
        }
    }
}
