//! Read-only snapshots of zones and agents, and the placement of new work
//! onto them.

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::{dispatch, zone, Address, Agent, OrderStatus, Placement, StaffRole, Zone};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{DbStaff, DbZone};
use crate::schema::{orders, staff, zones};

pub async fn load_zones(conn: &mut AsyncPgConnection, district: &str) -> Result<Vec<Zone>, ServiceError> {
    let rows = zones::table
        .filter(zones::district.eq(district))
        .order((zones::created_at.asc(), zones::name.asc()))
        .load::<DbZone>(conn)
        .await?;
    Ok(rows.into_iter().map(Zone::from).collect())
}

pub async fn load_agents(conn: &mut AsyncPgConnection, district: &str) -> Result<Vec<Agent>, ServiceError> {
    let rows = staff::table
        .filter(staff::district.eq(district))
        .filter(staff::role.eq(StaffRole::Agent.as_str()))
        .order((staff::created_at.asc(), staff::id.asc()))
        .load::<DbStaff>(conn)
        .await?;
    rows.into_iter().map(Agent::try_from).collect()
}

pub async fn find_agent(conn: &mut AsyncPgConnection, agent_id: Uuid) -> Result<Option<Agent>, ServiceError> {
    let row = staff::table
        .find(agent_id)
        .first::<DbStaff>(conn)
        .await
        .optional()?;
    row.map(Agent::try_from).transpose()
}

/// Pending orders currently held by each of `agent_ids`.
pub async fn pending_loads(
    conn: &mut AsyncPgConnection,
    agent_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, ServiceError> {
    if agent_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = orders::table
        .filter(orders::status.eq(OrderStatus::Pending.as_str()))
        .filter(orders::assigned_agent_id.eq_any(agent_ids.to_vec()))
        .group_by(orders::assigned_agent_id)
        .select((orders::assigned_agent_id, count_star()))
        .load::<(Option<Uuid>, i64)>(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(agent, count)| agent.map(|id| (id, count)))
        .collect())
}

/// Resolve the zone for an address and pick its least-loaded agent.
///
/// Districts without zones, and zones without agents, yield an empty or
/// partial placement; that is the normal outcome, not a failure.
pub async fn place(
    conn: &mut AsyncPgConnection,
    district: &str,
    address: &Address,
) -> Result<Placement, ServiceError> {
    let zones = load_zones(conn, district).await?;
    let resolved = zone::resolve(
        &zones,
        district,
        address.postal_code.as_deref(),
        Some(address.line.as_str()),
    );

    let Some(resolved) = resolved else {
        debug!(district, "No zone matched, leaving work in the district pool");
        return Ok(Placement::default());
    };

    let agents = load_agents(conn, district).await?;
    let candidate_ids: Vec<Uuid> = dispatch::candidates(&agents, district, &resolved.name)
        .map(|a| a.id)
        .collect();
    let loads = pending_loads(conn, &candidate_ids).await?;
    let agent_id = dispatch::assign(&agents, district, &resolved.name, |id| {
        loads.get(&id).copied().unwrap_or(0)
    });

    info!(
        district,
        zone = %resolved.name,
        agent_id = ?agent_id,
        candidates = candidate_ids.len(),
        "Placed work in zone"
    );

    Ok(Placement {
        zone_name: Some(resolved.name.clone()),
        agent_id,
    })
}
