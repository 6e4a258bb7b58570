// Merging and de-duplication of flights coming from several sources

use std::collections::HashMap;

use crate::flight::{Flight, FlightSet};

// Concatenate every present flight set, keeping source order
pub fn merge<'a, I>(sets: I) -> Vec<Flight>
where
    I: IntoIterator<Item = &'a FlightSet>,
{
    sets.into_iter()
        .flat_map(|set| set.flights.iter().cloned())
        .collect()
}

/// Removes duplicate flights. Two flights are duplicates when their slices
/// carry the same flight numbers and departure times in the same order.
///
/// The last flight in input order wins, so a later source overrides an earlier
/// one. Output keeps the position at which each key was first seen.
pub fn deduplicate(flights: Vec<Flight>) -> Vec<Flight> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(flights.len());
    let mut unique: Vec<Flight> = Vec::with_capacity(flights.len());

    for flight in flights {
        let key = flight.dedup_key();
        match positions.get(&key) {
            Some(&idx) => unique[idx] = flight,
            None => {
                positions.insert(key, unique.len());
                unique.push(flight);
            }
        }
    }

    unique
}
