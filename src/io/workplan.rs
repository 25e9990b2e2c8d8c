//! Work plan reader.
//!
//! A work plan is a JSON document with a `tiles` collection; each entry names
//! a Sentinel-2 tile and the Sentinel-1 products to turn into ARD for it.
//! `s1_ids` is either pre-grouped (`[[id, id], [id]]`, one group per date
//! slice) or a flat list that is grouped here by acquisition start date.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::io::sentinel1::ProductIdentifier;
use crate::types::check_tile_id;

/// Product ids of one tile, as written in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductIdGroups {
    Grouped(Vec<Vec<String>>),
    Flat(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    pub tile_id: String,
    pub s1_ids: ProductIdGroups,
}

impl TileEntry {
    /// Date-slice groups in plan order.
    pub fn groups(&self) -> Vec<Vec<String>> {
        match &self.s1_ids {
            ProductIdGroups::Grouped(groups) => groups.clone(),
            ProductIdGroups::Flat(ids) => group_by_start_date(ids),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPlan {
    pub tiles: Vec<TileEntry>,
}

impl WorkPlan {
    /// Read and check a plan file once; the plan is immutable afterwards.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let plan: WorkPlan = serde_json::from_str(&text).map_err(|e| Error::WorkPlan {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        plan.check().map_err(|reason| Error::WorkPlan {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(plan)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let plan: WorkPlan = serde_json::from_str(text)?;
        plan.check().map_err(|reason| Error::WorkPlan {
            path: Default::default(),
            reason,
        })?;
        Ok(plan)
    }

    fn check(&self) -> std::result::Result<(), String> {
        for tile in &self.tiles {
            if check_tile_id(&tile.tile_id).is_err() {
                return Err(format!("invalid tile id {:?}", tile.tile_id));
            }
        }
        Ok(())
    }
}

/// Group a flat id list by the start date of each product, in first-seen order.
/// Ids that do not parse cannot be dated and are dropped with a warning.
pub fn group_by_start_date(ids: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for id in ids {
        let key = match ProductIdentifier::parse(id) {
            Ok(prd) => prd.start_date_key(),
            Err(e) => {
                warn!("Dropping undatable product id {}: {}", id, e);
                continue;
            }
        };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(id.clone()),
            None => groups.push((key, vec![id.clone()])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

/// `YYYYMMDD` start date of the first valid id in `group`.
pub fn group_date_key(group: &[String]) -> Option<String> {
    group
        .iter()
        .find_map(|id| ProductIdentifier::parse(id).ok())
        .map(|prd| prd.start_date_key())
}
