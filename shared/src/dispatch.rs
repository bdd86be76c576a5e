use uuid::Uuid;

use crate::model::Agent;

/// Pick the default agent for an order in `zone_name` of `district`.
///
/// `pending_count` reports how many pending orders an agent currently holds.
/// The agent with the strictly smallest count wins; ties go to the agent seen
/// first. The result is advisory: near-simultaneous orders may pick the same
/// agent.
pub fn assign<F>(agents: &[Agent], district: &str, zone_name: &str, mut pending_count: F) -> Option<Uuid>
where
    F: FnMut(Uuid) -> i64,
{
    let mut best: Option<(Uuid, i64)> = None;

    for agent in agents.iter().filter(|a| a.covers(district, zone_name)) {
        let load = pending_count(agent.id);
        match best {
            Some((_, lowest)) if load >= lowest => {}
            _ => best = Some((agent.id, load)),
        }
    }

    best.map(|(id, _)| id)
}

/// Agents eligible for dispatch in a zone, in the caller's order.
pub fn candidates<'a>(agents: &'a [Agent], district: &'a str, zone_name: &'a str) -> impl Iterator<Item = &'a Agent> {
    agents.iter().filter(move |a| a.covers(district, zone_name))
}
