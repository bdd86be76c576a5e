//! Zone detection for an order or pickup address.
//!
//! Zones are scanned in the order the caller supplies them; callers load them
//! in a stable order (creation time, then name) so the same input always
//! resolves to the same zone.

use crate::model::Zone;

/// Deduce the zone of `district` an address falls in.
///
/// A postal-code match on any zone beats a landmark match on any other zone.
/// Landmark matching is a case-insensitive substring test against the address.
pub fn resolve<'a>(
    zones: &'a [Zone],
    district: &str,
    postal_code: Option<&str>,
    address: Option<&str>,
) -> Option<&'a Zone> {
    let candidates: Vec<&Zone> = zones
        .iter()
        .filter(|zone| zone.active && zone.district == district)
        .collect();

    if candidates.is_empty() {
        return None;
    }

    if let Some(code) = postal_code.map(str::trim).filter(|c| !c.is_empty()) {
        let by_postal = candidates
            .iter()
            .find(|zone| zone.postal_codes.iter().any(|p| p.trim() == code));
        if let Some(zone) = by_postal {
            return Some(*zone);
        }
    }

    let address = address.map(str::trim).filter(|a| !a.is_empty())?;
    let address = address.to_lowercase();

    candidates.into_iter().find(|zone| {
        zone.landmarks.iter().any(|landmark| {
            let landmark = landmark.trim();
            // blank landmarks would match every address
            !landmark.is_empty() && address.contains(&landmark.to_lowercase())
        })
    })
}
