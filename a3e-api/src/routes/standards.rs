/// Accreditation standards catalog
///
/// - `GET /api/standards` - Every set, or one with `?set=sacscoc|hlc`
/// - `GET /api/standards/:id` - One standard, e.g. `SACSCOC-6`

use crate::{
    error::{ApiError, ApiResult},
    routes::documents::parse_standard_set,
};
use a3e_shared::standards::{find_standard, Standard, StandardSet};
use axum::{
    extract::{Path, Query},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct StandardsQuery {
    pub set: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StandardSetView {
    pub set: StandardSet,
    pub accreditor: &'static str,
    pub standards: &'static [Standard],
}

impl From<StandardSet> for StandardSetView {
    fn from(set: StandardSet) -> Self {
        StandardSetView {
            set,
            accreditor: set.accreditor(),
            standards: set.standards(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StandardView {
    pub set: StandardSet,
    pub accreditor: &'static str,

    #[serde(flatten)]
    pub standard: &'static Standard,
}

pub fn select_sets(query: &StandardsQuery) -> ApiResult<Vec<StandardSetView>> {
    match query.set.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Ok(vec![parse_standard_set(raw)?.into()]),
        None => Ok(StandardSet::ALL.into_iter().map(Into::into).collect()),
    }
}

pub async fn list_standards(Query(query): Query<StandardsQuery>) -> ApiResult<Json<Vec<StandardSetView>>> {
    select_sets(&query).map(Json)
}

pub async fn get_standard(Path(id): Path<String>) -> ApiResult<Json<StandardView>> {
    let (set, standard) =
        find_standard(&id).ok_or_else(|| ApiError::NotFound(format!("Standard {} not found", id)))?;

    Ok(Json(StandardView {
        set,
        accreditor: set.accreditor(),
        standard,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sets() {
        let all = select_sets(&StandardsQuery::default()).unwrap();
        assert_eq!(all.len(), 2);

        let hlc = select_sets(&StandardsQuery {
            set: Some("hlc".to_string()),
        })
        .unwrap();
        assert_eq!(hlc.len(), 1);
        assert_eq!(hlc[0].set, StandardSet::Hlc);

        assert!(select_sets(&StandardsQuery {
            set: Some("msche".to_string()),
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_get_standard_case_insensitive() {
        let Json(view) = get_standard(Path("sacscoc-6".to_string())).await.unwrap();
        assert_eq!(view.set, StandardSet::Sacscoc);
        assert_eq!(view.standard.id, "SACSCOC-6");

        assert!(matches!(
            get_standard(Path("SACSCOC-99".to_string())).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_standard_view_flattens() {
        let (set, standard) = find_standard("HLC-2").unwrap();
        let json = serde_json::to_value(StandardView {
            set,
            accreditor: set.accreditor(),
            standard,
        })
        .unwrap();
        assert_eq!(json["set"], "hlc");
        assert_eq!(json["id"], "HLC-2");
        assert!(json["keywords"].as_array().unwrap().len() > 3);
    }
}
