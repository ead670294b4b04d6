use crate::entity::submission::{self, Solution};

/// Whether `code` repeats the head of the chain. Only the files are compared;
/// comments never make an iteration distinct.
pub fn duplicate(head: Option<&submission::Model>, code: &Solution) -> bool {
    head.is_some_and(|h| h.solution() == *code)
}
