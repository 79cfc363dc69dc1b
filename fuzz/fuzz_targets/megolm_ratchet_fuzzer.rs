//! Fuzz target for the Megolm ratchet
//!
//! # Strategy
//!
//! - Arbitrary initial state and counter
//! - Sequences of single steps and jumps, including jumps across part
//!   boundaries
//!
//! # Invariants
//!
//! - `advance_to(counter + n)` matches `n` calls to `advance`
//! - Jumping never panics, whatever the distance

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use olmkit_core::megolm::{MEGOLM_RATCHET_LENGTH, Megolm};

#[derive(Debug, Arbitrary)]
struct Scenario {
    data: [u8; MEGOLM_RATCHET_LENGTH],
    counter: u32,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Step(u8),
    Jump(u32),
}

fuzz_target!(|scenario: Scenario| {
    let mut stepped = Megolm::new(&scenario.data, scenario.counter);
    let mut jumped = stepped.clone();

    for operation in scenario.operations {
        match operation {
            Operation::Step(count) => {
                // Stay clear of u32::MAX so stepping never wraps.
                if stepped.counter().checked_add(u32::from(count)).is_none() {
                    return;
                }
                for _ in 0..count {
                    stepped.advance();
                }
                jumped.advance_to(stepped.counter());
                assert_eq!(jumped, stepped);
            },
            Operation::Jump(distance) => {
                let Some(target) = jumped.counter().checked_add(distance) else {
                    return;
                };
                jumped.advance_to(target);
                assert_eq!(jumped.counter(), target);
                stepped = jumped.clone();
            },
        }
    }
});
