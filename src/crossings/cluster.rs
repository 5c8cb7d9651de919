use std::collections::BTreeSet;

use log::{debug, info};

use super::Proximity;
use crate::data::crossing::{point_id, Crossing, CrossingId, CrossingMap};

/// Where a crossing lives. Detected crossings come first in the ordering, so the
/// scan for a partner always prefers them over earlier cluster results.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum CrossingKey {
    Detected(CrossingId),
    Clustered(CrossingId),
}

fn lookup<'m, 'a>(
    key: &CrossingKey,
    detected: &'m CrossingMap<'a>,
    clustered: &'m CrossingMap<'a>,
) -> Option<&'m Crossing<'a>> {
    match key {
        CrossingKey::Detected(id) => detected.get(id),
        CrossingKey::Clustered(id) => clustered.get(id),
    }
}

fn lookup_mut<'m, 'a>(
    key: &CrossingKey,
    detected: &'m mut CrossingMap<'a>,
    clustered: &'m mut CrossingMap<'a>,
) -> Option<&'m mut Crossing<'a>> {
    match key {
        CrossingKey::Detected(id) => detected.get_mut(id),
        CrossingKey::Clustered(id) => clustered.get_mut(id),
    }
}

/// Grid ids collide for points in the same 1/10000 degree cell.
fn unique_id(id: CrossingId, clustered: &CrossingMap) -> CrossingId {
    if !clustered.contains_key(&id) {
        return id;
    }
    (1..)
        .map(|n| format!("{}-{}", id, n))
        .find(|candidate| !clustered.contains_key(candidate))
        .unwrap_or(id)
}

fn eligible(crossing: &Crossing) -> bool {
    crossing.is_live() && !crossing.is_fake() && crossing.coords.is_some()
}

/// Merges crossings that are close to each other and share at least two road names,
/// typically the two carriageways of a divided road meeting the same cross street.
#[derive(Debug, Clone, Default)]
pub struct CrossingClusterer {
    proximity: Proximity,
}

impl CrossingClusterer {
    pub fn new(proximity: Proximity) -> Self {
        CrossingClusterer { proximity }
    }

    /// Returns the crossings created by merging. Every merged-away crossing, in
    /// `detected` or in the returned map, has `obsoleted_by` set to an id of the
    /// returned map.
    pub fn cluster<'a>(&self, detected: &mut CrossingMap<'a>) -> CrossingMap<'a> {
        let mut clustered = CrossingMap::new();
        let mut live: BTreeSet<CrossingKey> = detected.values()
            .filter(|crossing| eligible(crossing))
            .map(|crossing| CrossingKey::Detected(crossing.id.clone()))
            .collect();
        let sources: Vec<CrossingKey> = live.iter().cloned().collect();

        for source in sources {
            let mut current = source;
            while live.contains(&current) {
                let Some(partner) = self.find_partner(&current, &live, detected, &clustered) else {
                    break;
                };
                match Self::merge(&current, &partner, detected, &mut clustered, &mut live) {
                    Some(merged) => current = merged,
                    None => break,
                }
            }
        }

        info!(
            detected = detected.len(),
            merged = clustered.len(),
            live = live.len();
            "Clustered crossings"
        );
        clustered
    }

    /// First live crossing, in key order, that is close by and shares two names.
    fn find_partner(
        &self,
        current: &CrossingKey,
        live: &BTreeSet<CrossingKey>,
        detected: &CrossingMap,
        clustered: &CrossingMap,
    ) -> Option<CrossingKey> {
        let crossing = lookup(current, detected, clustered)?;
        live.iter()
            .filter(|key| *key != current)
            .find(|key| {
                lookup(key, detected, clustered).is_some_and(|other| {
                    crossing.close_by(other, &self.proximity) && crossing.clusterable_with(other)
                })
            })
            .cloned()
    }

    fn merge<'a>(
        first: &CrossingKey,
        second: &CrossingKey,
        detected: &mut CrossingMap<'a>,
        clustered: &mut CrossingMap<'a>,
        live: &mut BTreeSet<CrossingKey>,
    ) -> Option<CrossingKey> {
        let merged = {
            let a = lookup(first, detected, clustered)?;
            let b = lookup(second, detected, clustered)?;
            let coords = a.coords?.midpoint(&b.coords?);
            let id = unique_id(point_id(&coords), clustered);
            let merged = Crossing::merge(id, coords, a, b);
            debug!("Merging {} with {} into {}", a, b, merged);
            merged
        };

        for key in [first, second] {
            if let Some(crossing) = lookup_mut(key, detected, clustered) {
                crossing.obsolete(merged.id.clone());
            }
            live.remove(key);
        }

        let key = CrossingKey::Clustered(merged.id.clone());
        clustered.insert(merged.id.clone(), merged);
        live.insert(key.clone());
        Some(key)
    }
}

/// Crossings that survived clustering: live, non-fake and hydrated detections in id
/// order, followed by live cluster results.
pub fn final_crossings<'m, 'a>(
    detected: &'m CrossingMap<'a>,
    clustered: &'m CrossingMap<'a>,
) -> Vec<&'m Crossing<'a>> {
    detected.values()
        .chain(clustered.values())
        .filter(|crossing| eligible(crossing))
        .collect()
}
