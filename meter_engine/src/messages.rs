//! Static flavor text for the unluck layers.
//!
//! Selection is by PRNG index, so the order of entries is part of the
//! replay contract. Append only.

use crate::domain::Choice;

/// Used when a `(step, choice)` pair has no bank of its own.
pub const GENERIC_UNLUCK_MESSAGES: &[&str] =
    &["Something went sideways this quarter. Nobody is quite sure what."];

pub const PERFECT_STORM_MESSAGES: &[&str] = &[
    "Perfect Storm: your lead investor pulled out the same week the main database melted down.",
    "Perfect Storm: a competitor launched your roadmap, and your biggest customer noticed first.",
    "Perfect Storm: the bank froze your account during the outage that trended on every feed.",
];

const STEP_1_A: &[&str] = &[
    "Your co-founder's demo crashed in front of the angel you needed most.",
    "The launch post got buried under a much bigger announcement.",
];
const STEP_1_B: &[&str] = &[
    "The freelancer you hired vanished with half the codebase.",
    "Your domain name lapsed on launch day.",
];
const STEP_2_A: &[&str] = &[
    "The growth hack worked, on bots.",
    "A key early adopter churned and wrote a blog post about it.",
];
const STEP_2_B: &[&str] = &[
    "The enterprise pilot stalled in procurement for a full quarter.",
    "Your champion at the pilot customer changed jobs.",
];
const STEP_3_A: &[&str] = &[
    "The rewrite took twice as long as the estimate, which had already been doubled.",
    "A cloud bill surprise ate the month's runway.",
];
const STEP_3_B: &[&str] = &[
    "The shortcut you shipped became the outage everyone remembers.",
    "Tech debt came due with interest.",
];
const STEP_4_A: &[&str] = &[
    "Your first sales hire spent the quarter building slide decks.",
    "The conference booth was next to the bathrooms.",
];
const STEP_4_B: &[&str] = &[
    "The bridge round came with terms you would rather not read twice.",
    "An investor update leaked to the press before the good news did.",
];
const STEP_5_A: &[&str] = &[
    "The expansion market had a regulation nobody checked.",
    "A key engineer left for a competitor right before the push.",
];
const STEP_5_B: &[&str] = &[
    "The acquisition talks collapsed over a clause in the fine print.",
    "Your biggest partner quietly built the same feature.",
];

/// Unluck messages for a step/choice pair, or the generic bank.
pub fn unluck_messages(step_id: u8, choice: Choice) -> &'static [&'static str] {
    match (step_id, choice) {
        (1, Choice::A) => STEP_1_A,
        (1, Choice::B) => STEP_1_B,
        (2, Choice::A) => STEP_2_A,
        (2, Choice::B) => STEP_2_B,
        (3, Choice::A) => STEP_3_A,
        (3, Choice::B) => STEP_3_B,
        (4, Choice::A) => STEP_4_A,
        (4, Choice::B) => STEP_4_B,
        (5, Choice::A) => STEP_5_A,
        (5, Choice::B) => STEP_5_B,
        _ => GENERIC_UNLUCK_MESSAGES,
    }
}
