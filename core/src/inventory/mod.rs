use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::Asset;

/// Source of asset records (BMC address, credentials, hardware identity).
#[async_trait]
pub trait AssetRepository: Send + Sync {
    fn name(&self) -> &str;
    async fn asset_by_id(&self, id: Uuid) -> anyhow::Result<Asset>;
}

/// Fixed set of assets, for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    assets: HashMap<Uuid, Asset>,
}

impl InMemoryRepository {
    pub fn new(assets: impl IntoIterator<Item = Asset>) -> Self {
        Self {
            assets: assets.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.id, asset);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[async_trait]
impl AssetRepository for InMemoryRepository {
    fn name(&self) -> &str {
        "static"
    }

    async fn asset_by_id(&self, id: Uuid) -> anyhow::Result<Asset> {
        self.assets
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("asset {id} not found in static inventory"))
    }
}
