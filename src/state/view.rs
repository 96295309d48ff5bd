use serde::Serialize;

use crate::display::{DisplayError, resolve_now};
use crate::state::model::ApplicationState;
use crate::time_zone::{ZoneFormatter, zone_label};

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTime {
    pub label: String,
    pub short_time: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneTime {
    pub label: String,
    pub short_time: String,
    pub first: bool,
    pub last: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedViewModel {
    pub local: LocalTime,
    pub time_zones: Vec<ZoneTime>,
}

pub fn derive_view(
    state: &ApplicationState,
    now_ms: i64,
    viewer_zone: &str,
    formatter: &dyn ZoneFormatter,
) -> Result<DerivedViewModel, DisplayError> {
    let now = resolve_now(state.custom_date_time.as_deref(), now_ms, viewer_zone)?;

    let label = if state.user_label.is_empty() {
        zone_label(viewer_zone)
    } else {
        state.user_label.clone()
    };
    let local = LocalTime {
        label,
        short_time: formatter.short_time(now, viewer_zone)?,
    };

    let last_index = state.time_zones.len().saturating_sub(1);
    let time_zones = state
        .time_zones
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Ok(ZoneTime {
                label: entry.label.clone(),
                short_time: formatter.short_time(now, &entry.time_zone)?,
                first: index == 0,
                last: index == last_index,
            })
        })
        .collect::<Result<Vec<_>, DisplayError>>()?;

    Ok(DerivedViewModel { local, time_zones })
}
