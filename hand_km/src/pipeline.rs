//! End-to-end run: every hand is preprocessed and reconstructed on its own
//! thread, and a failure in one hand never touches another.

use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::{AlignmentConfig, Config};
use crate::error::{ConfigError, Error};
use crate::hand::{Hand, HandType};
use crate::preprocess::preprocess_hand;
use crate::reconstruct::{reconstruct, HandAnimation};
use crate::sink::{export_hand, SkeletonSink};

/// Result of one pipeline stage for one hand.
#[derive(Debug)]
pub struct HandOutcome<T> {
    pub name: String,
    pub hand_type: HandType,
    pub result: Result<T, Error>,
}

impl<T> HandOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Preprocesses and reconstructs one hand.
pub fn process_hand(hand: &Hand, config: &Config) -> Result<HandAnimation, Error> {
    let preprocessed = preprocess_hand(hand, &config.preprocess)?;
    reconstruct(&preprocessed, &config.reconstruction)
}

/// Processes every hand in parallel, returning outcomes in input order.
///
/// An invalid configuration fails the whole batch before any frame is touched.
pub fn run(hands: &[Hand], config: &Config) -> Result<Vec<HandOutcome<HandAnimation>>, ConfigError> {
    config.validate()?;

    let now = Instant::now();
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = hands
            .iter()
            .map(|hand| scope.spawn(move || process_hand(hand, config)))
            .collect();

        hands
            .iter()
            .zip(handles)
            .map(|(hand, handle)| HandOutcome {
                name: hand.name.clone(),
                hand_type: hand.hand_type,
                result: handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
            })
            .collect()
    });

    for outcome in &outcomes {
        if let Err(err) = &outcome.result {
            warn!(hand = %outcome.name, error = %err, "hand failed");
        }
    }
    info!(
        hands = outcomes.len(),
        failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
        timer = now.elapsed().as_secs_f64(),
        "pipeline finished"
    );
    Ok(outcomes)
}

/// Sends every successfully reconstructed hand to `sink`, in order.
pub fn export_all(
    sink: &mut dyn SkeletonSink,
    outcomes: &[HandOutcome<HandAnimation>],
    alignment: &AlignmentConfig,
) -> Vec<HandOutcome<()>> {
    outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok())
        .map(|animation| {
            let result = export_hand(sink, animation, alignment);
            if let Err(err) = &result {
                warn!(hand = %animation.name, error = %err, "export failed");
            }
            HandOutcome {
                name: animation.name.clone(),
                hand_type: animation.hand_type,
                result,
            }
        })
        .collect()
}
