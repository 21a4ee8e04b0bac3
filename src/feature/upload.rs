//! Synthetic file upload to the artifact store

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ActionOutput, ExecutionContext, Feature, FeatureDescriptor, FeatureKind};
use crate::artifact::{delete_artifact, ArtifactGenerator};
use crate::error::{Error, Result};
use crate::ledger::{ArtifactStore, BalanceReader};

pub const UPLOAD_FEATURE_NAME: &str = "File Upload";

pub struct UploadFeature {
    store: Arc<dyn ArtifactStore>,
    balances: Arc<dyn BalanceReader>,
    generator: ArtifactGenerator,
    min_balance: f64,
    wallet: String,
}

impl UploadFeature {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        balances: Arc<dyn BalanceReader>,
        generator: ArtifactGenerator,
        min_balance: f64,
        wallet: impl Into<String>,
    ) -> Self {
        Self {
            store,
            balances,
            generator,
            min_balance,
            wallet: wallet.into(),
        }
    }
}

#[async_trait]
impl Feature for UploadFeature {
    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            name: UPLOAD_FEATURE_NAME.to_string(),
            kind: FeatureKind::Upload,
            strategy: None,
            repetitions: 1,
        }
    }

    async fn pre_execution_checks(&self, _ctx: &ExecutionContext) -> Result<()> {
        let available = self.balances.native_balance(&self.wallet).await?;
        if available < self.min_balance {
            return Err(Error::InsufficientBalance {
                available,
                required: self.min_balance,
            });
        }
        Ok(())
    }

    async fn perform_action(&self, _ctx: &ExecutionContext) -> Result<ActionOutput> {
        let artifact = self.generator.generate().await?;
        let file_size_kb = match tokio::fs::metadata(&artifact.path).await {
            Ok(meta) => meta.len() as f64 / 1024.0,
            Err(_) => artifact.target_bytes as f64 / 1024.0,
        };

        info!("Uploading {} ({:.2} KB)", artifact.path.display(), file_size_kb);
        let uploaded = self.store.upload(&artifact.path).await;
        delete_artifact(&artifact.path).await;
        let ids = uploaded?;

        if ids.is_empty() {
            warn!("Upload returned no transaction ids, file might already exist");
        } else {
            info!("Upload successful, ids: {}", ids.join(", "));
        }

        Ok(ActionOutput {
            summary: format!("Uploaded {:.2} KB file", file_size_kb),
            tx_hash: ids.first().cloned(),
            file_size_kb: Some(file_size_kb),
            details: serde_json::json!({ "tx_ids": ids }),
        })
    }
}
