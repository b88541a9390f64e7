pub mod ml_model;
pub mod inference;

pub use ml_model::{BreedClassifierNet, ModelConfig, IMAGE_SIZE, IMAGENET_MEAN, IMAGENET_STD, normalize_pixel_buffer};
pub use inference::{InferenceEngine, export_untrained_bundle};
