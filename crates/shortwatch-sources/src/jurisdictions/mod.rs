//! Per-jurisdiction adapters.

mod be;
mod de;
mod dk;
mod es;
mod fi;
mod fr;
mod gb;
mod ie;
mod it;
mod nl;
mod no;
mod se;

pub use be::Belgium;
pub use de::Germany;
pub use dk::Denmark;
pub use es::Spain;
pub use fi::Finland;
pub use fr::France;
pub use gb::UnitedKingdom;
pub use ie::Ireland;
pub use it::Italy;
pub use nl::Netherlands;
pub use no::Norway;
pub use se::Sweden;

use crate::adapter::{Extraction, RawPayload};
use crate::definition::SourceProfile;
use crate::tabular::Table;
use shortwatch_core::Provenance;

/// Decode a file payload, turning a decode failure into a layout issue.
pub(crate) fn decode_tables(
    profile: &SourceProfile,
    payload: &RawPayload,
    name: &str,
    delimiter: Option<u8>,
) -> Result<Vec<Table>, Extraction> {
    payload.tables(name, delimiter).map_err(|e| {
        tracing::warn!(jurisdiction = %profile.code, resource = %name, "Cannot decode payload: {}", e);
        Extraction::layout(format!("{name}: {e}"))
    })
}

/// Provenance of a sheet: current if its name contains one of `current`.
pub(crate) fn sheet_provenance(sheet: &str, current: &[&str]) -> Provenance {
    let lower = sheet.to_lowercase();
    let label = format!("sheet:{sheet}");
    if current.iter().any(|keyword| lower.contains(keyword)) {
        Provenance::current(label)
    } else {
        Provenance::historical(label)
    }
}
