//! TOML fixture seeding the demo site with posts and menus.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{NavMenuRecord, PostRecord};

use super::error::InfraError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFixture {
    #[serde(default)]
    pub posts: Vec<PostRecord>,
    #[serde(default)]
    pub menus: Vec<NavMenuRecord>,
}

impl SiteFixture {
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw, path)
    }

    /// Parse and validate fixture text; `origin` only labels errors.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, InfraError> {
        let fixture: SiteFixture =
            toml::from_str(raw).map_err(|err| InfraError::fixture(origin, err.to_string()))?;
        fixture.validate(origin)?;
        Ok(fixture)
    }

    fn validate(&self, origin: &Path) -> Result<(), InfraError> {
        let mut post_ids = BTreeSet::new();
        for post in &self.posts {
            if !post_ids.insert(post.id) {
                return Err(InfraError::fixture(
                    origin,
                    format!("duplicate post id {}", post.id),
                ));
            }
        }

        let mut locations = BTreeSet::new();
        for menu in &self.menus {
            if menu.location.trim().is_empty() {
                return Err(InfraError::fixture(origin, "menu location must not be empty"));
            }
            if !locations.insert(menu.location.as_str()) {
                return Err(InfraError::fixture(
                    origin,
                    format!("duplicate menu location `{}`", menu.location),
                ));
            }
        }
        Ok(())
    }
}
