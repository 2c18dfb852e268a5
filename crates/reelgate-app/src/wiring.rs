//! Assembly of storage, classifier and engine from an [`AppConfig`].

use std::sync::Arc;

use reelgate_core::classifier::{ChatClassifier, ChatClassifierConfig, SemanticClassifier};
use reelgate_core::learning::FeedbackRecorder;
use reelgate_core::{ConfigError, DecisionEngine};
use reelgate_storage::Database;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Opens the configured database, or the default one.
pub fn open_database(config: &AppConfig) -> reelgate_storage::Result<Database> {
    match &config.storage.path {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
}

/// Builds the chat classifier, or `None` if it is disabled or has no key.
pub fn build_classifier(chat: ChatClassifierConfig, enabled: bool) -> Option<ChatClassifier> {
    if !enabled {
        info!("Semantic classifier disabled, decisions use the rule cascade");
        return None;
    }

    match ChatClassifier::new(chat) {
        Ok(classifier) if classifier.is_configured() => {
            info!(model = %classifier.config().model, "Semantic classifier ready");
            Some(classifier)
        }
        Ok(_) => {
            warn!("No classifier API key found, decisions use the rule cascade");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not build classifier client, decisions use the rule cascade");
            None
        }
    }
}

/// Builds a decision engine backed by `db` for patterns and reviews.
pub fn build_engine(config: &AppConfig, db: Arc<Database>) -> Result<DecisionEngine, ConfigError> {
    let mut engine =
        DecisionEngine::new(config.rules.clone(), db.clone())?.with_pattern_store(db);

    let chat = config.classifier.chat_config();
    let timeout = chat.timeout();
    if let Some(classifier) = build_classifier(chat, config.classifier.enabled) {
        let classifier: Arc<dyn SemanticClassifier> = Arc::new(classifier);
        engine = engine
            .with_classifier(classifier)
            .with_classifier_timeout(timeout);
    }

    Ok(engine)
}

/// Feedback recorder writing to `db` with the configured batch threshold.
pub fn feedback_recorder(config: &AppConfig, db: Arc<Database>) -> FeedbackRecorder {
    FeedbackRecorder::new(db, config.rules.machine_learning.batch_threshold)
}
