// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::{CrossbarEntry, PendingCredit, Router, RouterError};
use flit::{Flit, InVcMode, OutputSet, PortId, VcId, VcState};
use tracing::trace;

impl Router {
    /// `ReadInputs`: pull at most one flit per input channel, and stamp
    /// arriving credits with their `now + credit_delay` due time.
    pub fn read_inputs(&mut self, now: u64) {
        let mut activity = false;
        for input in 0..self.num_inputs {
            if let Some(flit) = self.input_channels[input].receive() {
                if flit.watch {
                    trace!(node = self.id.into_raw(), input, flit = flit.id.into_raw(), "received flit");
                }
                self.in_queue_flits[input] = Some(flit);
                self.total_buffer_occupancy += 1;
                activity = true;
            }
        }
        for output in 0..self.num_outputs {
            if let Some(credit) = self.output_credit_channels[output].receive() {
                self.proc_credits.push_back(PendingCredit {
                    due: now + self.credit_delay,
                    credit,
                    output: PortId::from_raw(output as u32),
                });
                activity = true;
            }
        }
        self.active = self.active || activity;
    }

    /// `InternalStep`: `InputQueuing` → `SwitchEvaluate` → `SwitchUpdate` →
    /// `OutputQueuing`, with the `active` idle-skip short-circuit.
    pub fn internal_step(&mut self, now: u64) -> Result<(), RouterError> {
        if !self.active {
            return Ok(());
        }

        self.input_queuing(now)?;
        let mut activity = !self.proc_credits.is_empty();

        if !self.crossbar_flits.is_empty() {
            self.switch_evaluate(now);
        }
        if !self.crossbar_flits.is_empty() {
            self.switch_update(now);
            activity = activity || !self.crossbar_flits.is_empty();
        }

        self.active = activity;
        self.output_queuing();
        Ok(())
    }

    /// `WriteOutputs`: drive one flit per non-empty output buffer and one
    /// credit per non-empty input credit buffer.
    pub fn write_outputs(&mut self) {
        self.send_flits();
        self.send_credits();
    }

    fn input_queuing(&mut self, now: u64) -> Result<(), RouterError> {
        for input in 0..self.num_inputs {
            let Some(flit) = self.in_queue_flits[input].take() else {
                continue;
            };
            self.input_queuing_one(now, input, flit)?;
        }

        while let Some(front) = self.proc_credits.front() {
            if now < front.due {
                break;
            }
            let pending = self.proc_credits.pop_front().unwrap();
            if self.use_endpoint_crediting {
                self.next_buf[pending.output.index()].send_credit(pending.credit.vcs[0]);
            }
        }
        Ok(())
    }

    fn input_queuing_one(&mut self, now: u64, input: usize, flit: Flit) -> Result<(), RouterError> {
        let vc = flit.vc;
        let was_idle = self.buf[input].vc(vc).is_idle();
        self.buf[input].vc_mut(vc).queue.push_back(flit.clone());

        if was_idle {
            debug_assert!(flit.head, "first flit queued onto an idle VC must be a head");

            let mut output_set = OutputSet::default();
            self.rf.route(
                self.id,
                &flit,
                PortId::from_raw(input as u32),
                &mut output_set,
                InVcMode::Resolve,
            );
            if output_set.candidates.len() != 1 {
                return Err(RouterError::NonSingletonRoute {
                    input: PortId::from_raw(input as u32),
                    candidates: output_set.candidates.len(),
                });
            }
            let output_port = output_set.candidates[0];

            let overflow = flit.size
                > self
                    .output_buffer_size
                    .saturating_sub(self.output_buffer_occupancy[output_port.index()]);
            let random_drop = (self.rng.next_u32() as f64 / f64::from(u32::MAX)) < self.random_packet_drop_rate;

            if overflow || random_drop {
                debug_assert!(
                    !self.drop_packet_at_input[input],
                    "a head flit cannot arrive while a previous packet on this input is still dropping"
                );
                if !flit.tail {
                    self.drop_packet_at_input[input] = true;
                    self.buf[input].vc_mut(vc).state = Some(VcState::Active);
                }
                self.stats.record_head_dropped(output_port.into_raw());
                self.total_buffer_occupancy -= 1;
                self.buf[input].vc_mut(vc).queue.pop_front();
            } else if self.drop_packet_at_input[input] {
                // Head arriving while a drop is already in progress on this
                // idle input can only happen if the previous packet's tail
                // never cleared the drop state; that's only fatal when this
                // errant flit is itself a tail. A non-tail one just keeps
                // getting dropped along with the rest of that packet.
                if flit.tail {
                    return Err(RouterError::InconsistentDropState {
                        input: PortId::from_raw(input as u32),
                    });
                }
                self.total_buffer_occupancy -= 1;
                self.buf[input].vc_mut(vc).queue.pop_front();
            } else {
                self.buf[input].vc_mut(vc).queue.pop_front();
                self.last_head_flit_output_port[input] = Some(output_port);
                if !flit.tail {
                    self.buf[input].vc_mut(vc).state = Some(VcState::Active);
                } else {
                    self.buf[input].vc_mut(vc).state = None;
                }
                self.admit_to_crossbar(now, input, vc, output_port, flit);
            }
            return Ok(());
        }

        // Non-head flit on an already-active VC.
        if self.drop_packet_at_input[input] {
            self.stats.record_flit_dropped(
                self.last_head_flit_output_port[input]
                    .map(PortId::into_raw)
                    .unwrap_or_default(),
            );
            if flit.tail {
                self.drop_packet_at_input[input] = false;
                self.buf[input].vc_mut(vc).state = None;
                self.last_head_flit_output_port[input] = None;
            }
            self.total_buffer_occupancy -= 1;
            self.buf[input].vc_mut(vc).queue.pop_front();
        } else {
            let Some(output_port) = self.last_head_flit_output_port[input] else {
                return Err(RouterError::InconsistentDropState {
                    input: PortId::from_raw(input as u32),
                });
            };
            self.buf[input].vc_mut(vc).queue.pop_front();
            if flit.tail {
                self.buf[input].vc_mut(vc).state = None;
                self.last_head_flit_output_port[input] = None;
            }
            self.admit_to_crossbar(now, input, vc, output_port, flit);
        }
        Ok(())
    }

    fn admit_to_crossbar(&mut self, now: u64, input: usize, vc: VcId, output_port: PortId, flit: Flit) {
        let expanded_input =
            input as u32 * self.input_speedup + vc.into_raw() % self.input_speedup;
        let expanded_output =
            output_port.into_raw() * self.output_speedup + input as u32 % self.output_speedup;
        let scheduled_exit = self.crossbar_latency.map(|lat| now + lat);
        self.crossbar_flits.push_back(CrossbarEntry {
            scheduled_exit,
            flit,
            expanded_input,
            expanded_output,
        });
        self.output_buffer_occupancy[output_port.index()] += 1;
    }

    /// `SwitchEvaluate`: resolve the "unscheduled" sentinel on every entry
    /// inserted this cycle; the scan stops at the first already-scheduled
    /// entry because everything after it was inserted later.
    fn switch_evaluate(&mut self, now: u64) {
        for entry in &mut self.crossbar_flits {
            if entry.scheduled_exit.is_some() {
                break;
            }
            entry.scheduled_exit = Some(now + self.crossbar_delay - 1);
        }
    }

    /// `SwitchUpdate`: drain the front of `crossbar_flits` while its exit
    /// time equals `now`, inserting each into its output buffer.
    fn switch_update(&mut self, now: u64) {
        while let Some(front) = self.crossbar_flits.front() {
            match front.scheduled_exit {
                Some(t) if t == now => {}
                _ => break,
            }
            let entry = self.crossbar_flits.pop_front().unwrap();
            let input = PortId::from_raw(entry.expanded_input / self.input_speedup);
            let output = (entry.expanded_output / self.output_speedup) as usize;
            self.output_buffer[output].insert(input, entry.flit);
        }
    }

    /// `OutputQueuing`: transit any allocator-staged credits into per-input
    /// credit FIFOs. The lossy router never runs a VC allocator, so this is
    /// presently always a no-op, kept for parity with the non-lossy pipeline
    /// shape.
    fn output_queuing(&mut self) {}

    /// `SendFlits`: drive one flit per non-empty output buffer.
    fn send_flits(&mut self) {
        for output in 0..self.num_outputs {
            let Some(flit) = self.output_buffer[output].pop_front() else {
                continue;
            };
            self.total_buffer_occupancy -= 1;
            self.output_buffer_occupancy[output] -= 1;
            self.stats.record_flit_sent(output as u32);
            if flit.watch {
                trace!(node = self.id.into_raw(), output, flit = flit.id.into_raw(), "sending flit");
            }
            self.output_channels[output].send(flit);
        }
    }

    /// `SendCredits`: drive one credit per non-empty input credit buffer.
    fn send_credits(&mut self) {
        for input in 0..self.num_inputs {
            if let Some(credit) = self.credit_buffer[input].pop_front() {
                self.input_credit_channels[input].send(credit);
            }
        }
    }
}
