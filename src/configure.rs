// Configuration Orchestrator (spec.md §4.5).
//
// Assigns unique IDs and the canonical baud rate to a set of unconfigured
// motors connected one at a time. Built entirely from the Motors Bus's own
// primitives — baud switching and the two `Transport` group-sync
// primitives spec.md §6.1 defines, nothing else. Motor presence is
// detected with "a per-id `read(ID)` probe" exactly as spec.md §4.5 step 1
// says: a `GroupSyncRead` of width 1 over the `ID` register for a single
// candidate id, mirroring the original's `find_motor_indices`
// (`read_with_motor_ids(models, [idx], "ID")`). A response that disagrees
// with the id it was addressed to (`idx != present_idx`) is the original's
// "motor memory might be damaged" sanity check, not a mere absence.
//
// A single initial scan fixes the starting population (`possible_ids`);
// each slot rescans only within that fixed population and expects exactly
// one id to answer.

use std::collections::HashSet;
use std::time::Duration;

use tracing::info;

use crate::bus::MotorsBus;
use crate::codec::Width;
use crate::config::{baudrate_code_for, BAUDRATE, MAX_ID_RANGE, NUM_WRITE_RETRY, SCS_SERIES_BAUDRATE_TABLE};
use crate::error::{BusError, Result};
use crate::transport::Transport;

/// Operator interaction hook, so the orchestrator is testable without a
/// real terminal. The CLI binary supplies a stdin-backed implementation;
/// tests supply one that returns immediately.
pub trait Prompter {
    fn prompt(&mut self, message: &str);
}

/// Blocks on stdin until the operator presses Enter, the way the
/// original's bare `input()` calls do.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt(&mut self, message: &str) {
        println!("{message} [press Enter when done]");
        let mut buf = String::new();
        let _ = std::io::stdin().read_line(&mut buf);
    }
}

/// A prompter for tests and scripted runs: logs the prompt and proceeds
/// immediately, as if the operator had already acted.
#[derive(Default)]
pub struct NoopPrompter {
    pub prompts: Vec<String>,
}

impl Prompter for NoopPrompter {
    fn prompt(&mut self, message: &str) {
        self.prompts.push(message.to_string());
    }
}

impl<T: Transport> MotorsBus<T> {
    /// Drive the one-motor-at-a-time ID/baud assignment protocol
    /// (spec.md §4.5) until every motor in the roster carries its
    /// assigned ID at the canonical baud rate.
    pub fn configure_motors(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        let roster_ids = self.motor_indices();
        let roster_models = self.motor_models();
        let n = roster_ids.len();

        let id_entry = self.registry().assert_same_address(&roster_models, "ID")?;
        let id_width = Width::from_bytes(id_entry.width_bytes)?;
        let baud_entry = self.registry().assert_same_address(&roster_models, "Baud_Rate")?;
        let baud_width = Width::from_bytes(baud_entry.width_bytes)?;

        // Step 1: one scan across every baud fixes the starting population.
        let possible_ids = self.scan_all_bauds(id_entry.address, id_width)?;
        let roster_id_set: HashSet<u8> = roster_ids.iter().copied().collect();
        let untaken_ids: Vec<u8> = (0..MAX_ID_RANGE)
            .filter(|id| !possible_ids.contains(id) && !roster_id_set.contains(id))
            .collect();
        if untaken_ids.len() < n {
            return Err(BusError::MotorNotFound { slot: 0 });
        }

        // Step 3: one motor at a time.
        for slot in 0..n {
            prompter.prompt(&format!(
                "Connect motor #{} of {} now (only this one new motor).",
                slot + 1,
                n
            ));

            if slot > 0 {
                self.verify_relabeled_reachable(&untaken_ids[..slot], prompter, id_entry.address, id_width)?;
            }

            let (new_id, motor_baud) = self.find_single_motor_among(&possible_ids, slot, id_entry.address, id_width)?;

            if motor_baud != BAUDRATE {
                self.write_canonical_baud(new_id, motor_baud, baud_entry.address, baud_width, id_entry.address, id_width)?;
            }

            let temp_id = untaken_ids[slot];
            self.transport_mut()
                .set_baud(BAUDRATE)
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_baud".to_string(),
                    reason,
                })?;
            self.transport_mut()
                .group_sync_write(id_entry.address, id_width, &[(new_id, temp_id as i32)])
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_id".to_string(),
                    reason,
                })?;

            // Verify by read-back (spec.md §4.5 step 3).
            match self.probe_id(temp_id, id_entry.address, id_width) {
                Some(actual) if actual == temp_id => {}
                Some(actual) => {
                    return Err(BusError::IdWriteFailed {
                        expected: temp_id,
                        actual: Some(actual),
                    })
                }
                None => {
                    return Err(BusError::IdWriteFailed {
                        expected: temp_id,
                        actual: None,
                    })
                }
            }
            info!(slot, temp_id, "motor relabeled to scratch id");
        }

        // Step 4: batch-write the final roster IDs and verify by read-back.
        let data: Vec<(u8, i32)> = untaken_ids[..n]
            .iter()
            .zip(roster_ids.iter())
            .map(|(&from, &to)| (from, to as i32))
            .collect();
        self.transport_mut()
            .set_baud(BAUDRATE)
            .map_err(|reason| BusError::BusCommError {
                group_key: "configure_final_baud".to_string(),
                reason,
            })?;
        self.transport_mut()
            .group_sync_write(id_entry.address, id_width, &data)
            .map_err(|reason| BusError::BusCommError {
                group_key: "configure_final_id".to_string(),
                reason,
            })?;

        let readback = self
            .transport_mut()
            .group_sync_read(&roster_ids, id_entry.address, id_width)
            .map_err(|reason| BusError::BusCommError {
                group_key: "configure_final_verify".to_string(),
                reason,
            })?;
        for (&expected, &actual) in roster_ids.iter().zip(readback.iter()) {
            let actual = actual as u8;
            if actual != expected {
                return Err(BusError::IdWriteFailed {
                    expected,
                    actual: Some(actual),
                });
            }
        }

        Ok(())
    }

    /// Probe `candidate`'s `ID` register with a width-1 `GroupSyncRead`
    /// (spec.md §4.5 step 1). `None` means no response, treated as "not
    /// present" (the original catches `ConnectionError` and continues).
    /// `Some(actual)` is the index the motor itself reports, which the
    /// caller compares against `candidate` — a mismatch is the original's
    /// memory-corruption sanity check, not an absence.
    fn probe_id(&mut self, candidate: u8, id_address: u16, id_width: Width) -> Option<u8> {
        self.transport_mut()
            .group_sync_read(&[candidate], id_address, id_width)
            .ok()
            .map(|values| values[0] as u8)
    }

    fn scan_all_bauds(&mut self, id_address: u16, id_width: Width) -> Result<HashSet<u8>> {
        let mut seen = HashSet::new();
        for &(_, bps) in SCS_SERIES_BAUDRATE_TABLE {
            self.transport_mut()
                .set_baud(bps)
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_scan".to_string(),
                    reason,
                })?;
            for id in 0..MAX_ID_RANGE {
                match self.probe_id(id, id_address, id_width) {
                    Some(actual) if actual == id => {
                        seen.insert(id);
                    }
                    Some(actual) => return Err(BusError::CorruptedMotorMemory { expected: id, actual }),
                    None => {}
                }
            }
        }
        Ok(seen)
    }

    /// Verify the motors already relabeled to `untaken_ids[..slot]` are
    /// still reachable at the canonical baud; reprompt once on failure
    /// (mirrors the original's single batched `read_with_motor_ids` call
    /// guarded by a `ConnectionError` catch, not a per-id loop).
    fn verify_relabeled_reachable(
        &mut self,
        relabeled: &[u8],
        prompter: &mut dyn Prompter,
        id_address: u16,
        id_width: Width,
    ) -> Result<()> {
        self.transport_mut()
            .set_baud(BAUDRATE)
            .map_err(|reason| BusError::BusCommError {
                group_key: "configure_verify".to_string(),
                reason,
            })?;
        if self.transport_mut().group_sync_read(relabeled, id_address, id_width).is_err() {
            prompter.prompt("Failed to reach a previously configured motor; reconnect the power cord.");
        }
        Ok(())
    }

    /// Scan each baud for exactly one id from `possible_ids` that answers
    /// (spec.md §4.5 step 3): the newly connected motor among the fixed
    /// starting population, distinguishable because already-relabeled
    /// motors have moved to an untaken id outside `possible_ids`.
    fn find_single_motor_among(
        &mut self,
        possible_ids: &HashSet<u8>,
        slot: usize,
        id_address: u16,
        id_width: Width,
    ) -> Result<(u8, u32)> {
        for &(_, bps) in SCS_SERIES_BAUDRATE_TABLE {
            self.transport_mut()
                .set_baud(bps)
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_rescan".to_string(),
                    reason,
                })?;
            let mut present = Vec::new();
            for &id in possible_ids {
                match self.probe_id(id, id_address, id_width) {
                    Some(actual) if actual == id => present.push(id),
                    Some(actual) => return Err(BusError::CorruptedMotorMemory { expected: id, actual }),
                    None => {}
                }
            }
            match present.len() {
                0 => continue,
                1 => return Ok((present[0], bps)),
                _ => return Err(BusError::AmbiguousBus { slot, ids: present }),
            }
        }
        Err(BusError::MotorNotFound { slot })
    }

    fn write_canonical_baud(
        &mut self,
        id: u8,
        current_baud: u32,
        baud_address: u16,
        baud_width: Width,
        id_address: u16,
        id_width: Width,
    ) -> Result<()> {
        let baud_code = baudrate_code_for(BAUDRATE).expect("canonical baud has a code");
        for attempt in 1..=NUM_WRITE_RETRY {
            self.transport_mut()
                .set_baud(current_baud)
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_baud_write".to_string(),
                    reason,
                })?;
            let _ = self
                .transport_mut()
                .group_sync_write(baud_address, baud_width, &[(id, baud_code as i32)]);
            std::thread::sleep(Duration::from_millis(500));
            self.transport_mut()
                .set_baud(BAUDRATE)
                .map_err(|reason| BusError::BusCommError {
                    group_key: "configure_baud_write".to_string(),
                    reason,
                })?;
            if matches!(self.probe_id(id, id_address, id_width), Some(actual) if actual == id) {
                return Ok(());
            }
            if attempt == NUM_WRITE_RETRY {
                return Err(BusError::BaudWriteFailed { id, attempts: attempt });
            }
        }
        unreachable!("loop returns or errors before exhausting attempts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MotorDescriptor;
    use crate::transport::MockTransport;

    const ID_ADDRESS: u16 = 5;
    const ID_WIDTH: Width = Width::One;

    fn bus_with_roster(roster: &[(u8, &str)]) -> MotorsBus<MockTransport> {
        let motors = roster
            .iter()
            .map(|(id, name)| (name.to_string(), MotorDescriptor::new(*id, "sts3215".to_string())))
            .collect();
        MotorsBus::new("/dev/mock0", motors, None, None)
    }

    fn is_present(bus: &mut MotorsBus<MockTransport>, id: u8) -> bool {
        matches!(bus.transport_mut().group_sync_read(&[id], ID_ADDRESS, ID_WIDTH), Ok(values) if values[0] as u8 == id)
    }

    #[test]
    fn configure_single_unconfigured_motor() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        // present at id=1, baud=500_000 before configuration (spec.md §8 S7)
        bus.transport_mut().set_motor_baud(1, 500_000);

        let mut prompter = NoopPrompter::default();
        bus.configure_motors(&mut prompter).unwrap();

        bus.transport_mut().set_baud(BAUDRATE).unwrap();
        assert!(is_present(&mut bus, 6));
        assert_eq!(bus.transport_mut().get_baud(), BAUDRATE);
        assert_eq!(prompter.prompts.len(), 1);
    }

    #[test]
    fn configure_is_idempotent_once_roster_is_installed() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        bus.transport_mut().set_motor_baud(6, BAUDRATE);

        let mut prompter = NoopPrompter::default();
        bus.configure_motors(&mut prompter).unwrap();

        bus.transport_mut().set_baud(BAUDRATE).unwrap();
        assert!(is_present(&mut bus, 6));
    }

    #[test]
    fn configure_fails_with_zero_new_motors() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        let mut prompter = NoopPrompter::default();
        let err = bus.configure_motors(&mut prompter).unwrap_err();
        assert!(matches!(err, BusError::MotorNotFound { .. }));
    }

    #[test]
    fn configure_fails_with_ambiguous_new_motors() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        bus.transport_mut().set_motor_baud(1, BAUDRATE);
        bus.transport_mut().set_motor_baud(2, BAUDRATE);
        let mut prompter = NoopPrompter::default();
        let err = bus.configure_motors(&mut prompter).unwrap_err();
        assert!(matches!(err, BusError::AmbiguousBus { .. }));
    }

    #[test]
    fn configure_fails_with_corrupted_motor_memory() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        // id 1 is present, but its ID register reports 9: a damaged-memory
        // motor that the bus should refuse to proceed with.
        bus.transport_mut().corrupt_id_memory(1, 9);
        let mut prompter = NoopPrompter::default();
        let err = bus.configure_motors(&mut prompter).unwrap_err();
        assert!(matches!(err, BusError::CorruptedMotorMemory { expected: 1, actual: 9 }));
    }

    #[test]
    fn configure_reports_observed_id_when_final_verify_mismatches() {
        let mut bus = bus_with_roster(&[(6, "gripper")]);
        bus.transport_mut().set_motor_baud(1, BAUDRATE);
        // The final read-back at id 6 reports 99, as if the write silently
        // landed on the wrong motor or memory.
        bus.transport_mut().id_memory_override.insert(6, 99);

        let mut prompter = NoopPrompter::default();
        let err = bus.configure_motors(&mut prompter).unwrap_err();
        assert!(matches!(
            err,
            BusError::IdWriteFailed {
                expected: 6,
                actual: Some(99)
            }
        ));
    }
}
