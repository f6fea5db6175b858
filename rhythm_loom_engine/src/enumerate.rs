// Single-rhythm enumerator.
//
// Walks every digit string of the configured length and radix with a
// fixed-width odometer: start at all zeros, increment the least significant
// digit, carry left on overflow, stop when the carry falls off the most
// significant digit. States are visited in increasing numeric order, which
// is also the order records are streamed in.
//
// Each state is expanded to onsets through a per-radix `DigitLookup`, run
// through the `FilterPipeline`, and, if accepted, turned into a record with
// id `{radix}:{grouped}:{index}` (`index` = accepted count so far). Trivial
// states (all zeros, all `radix - 1`) are skipped before expansion when
// trivial exclusion is on; they still count as processed.
//
// The loop stops at the first of: `maxAccepted` reached (0 = no limit), a
// stop request observed at a yield point, or the odometer wrapping around.

use tracing::info;

use rhythm_loom_protocol::{FilterConfig, Radix, RhythmRecord};

use crate::bits::{DigitLookup, group_digits};
use crate::pipeline::FilterPipeline;
use crate::stream::{Host, RunSummary, Streamer, Termination};

/// Fixed-width mixed-radix counter over digit strings.
#[derive(Clone, Debug)]
pub struct Odometer {
    digits: Vec<u8>,
    base: u8,
}

impl Odometer {
    pub fn new(len: usize, radix: Radix) -> Self {
        Odometer {
            digits: vec![0; len],
            base: radix.base(),
        }
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    /// Step to the next digit string. Returns `false` when the counter wraps
    /// back to all zeros, i.e. the space is exhausted.
    pub fn increment(&mut self) -> bool {
        for digit in self.digits.iter_mut().rev() {
            if *digit + 1 < self.base {
                *digit += 1;
                return true;
            }
            *digit = 0;
        }
        false
    }

    /// All rests or all onsets.
    pub fn is_trivial(&self) -> bool {
        let max = self.base - 1;
        self.digits.iter().all(|&d| d == 0) || self.digits.iter().all(|&d| d == max)
    }
}

/// Run one enumeration to completion, streaming into `host`.
pub fn enumerate<H: Host + ?Sized>(config: &FilterConfig, host: &mut H) -> RunSummary {
    let radix = config.radix;
    let meter = config.meter();
    let group_size = config.denominator as usize;
    let len = config.total_bits();

    info!(
        %radix,
        %meter,
        states = ?config.state_space_size(),
        max_accepted = config.max_accepted,
        "enumeration started"
    );

    let lookup = DigitLookup::new(radix);
    let mut pipeline = FilterPipeline::new(config);
    let mut odometer = Odometer::new(config.digits_count(), radix);
    let mut onsets = Vec::with_capacity(len);
    let mut streamer = Streamer::new(host);

    let termination = loop {
        if !(config.exclude_trivial && odometer.is_trivial()) {
            lookup.fill_onsets(odometer.digits(), &mut onsets);
            if pipeline.accepts(&onsets, len) {
                let grouped = group_digits(odometer.digits(), radix, group_size);
                let record = RhythmRecord {
                    id: format!("{radix}:{grouped}:{}", streamer.emitted()),
                    radix,
                    onset_count: onsets.len(),
                    canonical_contour: pipeline.contour_of(&onsets, len),
                    grouped_digits_string: grouped,
                    numerator: Some(meter.numerator),
                    denominator: Some(meter.denominator),
                    digits: None,
                };
                streamer.accept(record);
            }
        }

        let keep_going = streamer.advance();
        if config.max_accepted > 0 && streamer.emitted() >= config.max_accepted {
            break Termination::LimitReached;
        }
        if !keep_going {
            break Termination::Cancelled;
        }
        if !odometer.increment() {
            break Termination::Exhausted;
        }
    };

    let summary = streamer.finish(termination);
    info!(
        processed = summary.processed,
        emitted = summary.emitted,
        termination = ?summary.termination,
        "enumeration finished"
    );
    summary
}
