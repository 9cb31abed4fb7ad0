use rust_bert::pipelines::common::ModelType;
use rust_bert::pipelines::ner::{Entity, NERModel};
use rust_bert::pipelines::token_classification::{LabelAggregationOption, TokenClassificationConfig};
use rust_bert::resources::LocalResource;
use tch::Device;

use std::panic::{self, AssertUnwindSafe};

use log::*;

use crate::config::Config;
use crate::fetch::{self, FetchRequest, ModelFiles};
use crate::reconcile::EntitySpan;
use crate::Error;

/// Anything that can tag entities in cleaned text.
///
/// Offsets of the returned spans are character offsets into `text`.
pub trait Classify {
    fn classify(&self, text: &str) -> Result<Vec<EntitySpan>, Error>;
}

pub struct Enti {
    model: NERModel,
}

impl Enti {
    pub fn new(files: &ModelFiles, model_type: ModelType, lower_case: bool, device: Device) -> Result<Self, Error> {
        let mut ner_config = TokenClassificationConfig::new(
            model_type,
            LocalResource { local_path: files.weights.clone() },
            LocalResource { local_path: files.config.clone() },
            LocalResource { local_path: files.vocab.clone() },
            files.merges.clone().map(|local_path| LocalResource { local_path }),
            lower_case,
            false,
            None,
            LabelAggregationOption::Mode,
        );
        ner_config.device = device;
        let entity_model = NERModel::new(ner_config)
            .map_err(|e| Error::ModelUnavailable(format!("Unable to setup model: {}", e)))?;

        Ok(Self {
            model: entity_model,
        })
    }
}

impl Classify for Enti {
    fn classify(&self, text: &str) -> Result<Vec<EntitySpan>, Error> {
        // libtorch failures surface as panics.
        let entities = panic::catch_unwind(AssertUnwindSafe(|| self.model.predict_full_entities(&[text])))
            .map_err(|cause| Error::InferenceFailure(panic_message(cause.as_ref())))?;
        Ok(entities
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(to_span)
            .collect())
    }
}

fn to_span(entity: Entity) -> EntitySpan {
    EntitySpan {
        start: entity.offset.begin as usize,
        end: entity.offset.end as usize,
        label: entity.label,
        score: entity.score,
        surface: entity.word,
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "model panicked".to_string()
    }
}

pub fn model_type(name: &str) -> Result<ModelType, Error> {
    match name {
        "bert" => Ok(ModelType::Bert),
        "distilbert" => Ok(ModelType::DistilBert),
        "roberta" => Ok(ModelType::Roberta),
        "xlmroberta" => Ok(ModelType::XLMRoberta),
        "electra" => Ok(ModelType::Electra),
        "mobilebert" => Ok(ModelType::MobileBert),
        other => Err(Error::ModelUnavailable(format!("Unsupported model type {}", other))),
    }
}

/// Fetch the model files and build the tagger.
pub fn load(config: &Config) -> Result<Box<dyn Classify>, Error> {
    let files = fetch::acquire(&FetchRequest {
        source: config.model_source(),
        vocab_file: &config.vocab_file,
        merges_file: config.merges_file.as_deref(),
        cache_dir: config.cache_dir(),
        min_model_bytes: config.min_model_bytes,
    })?;
    let device = if config.cpu_only {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    debug!("Loading {} model on {:?}", config.model_type, device);
    let enti = Enti::new(&files, model_type(&config.model_type)?, config.lower_case, device)?;
    info!("Model loaded");
    Ok(Box::new(enti))
}
