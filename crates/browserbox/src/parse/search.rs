//! SEARCH response parsing.

use std::collections::BTreeSet;

use browserbox_imap::{Attribute, Response};

/// Collects the numbers of every `* SEARCH` in the payload, sorted and
/// without duplicates. Tokens that are not numbers are skipped.
#[must_use]
pub fn parse_search(response: &Response) -> Vec<u32> {
    response
        .payload("SEARCH")
        .iter()
        .flat_map(|result| result.attributes.iter())
        .filter_map(Attribute::as_number)
        .filter_map(|nr| u32::try_from(nr).ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
