use thiserror::Error;

/// Startup failures. Once an engine is built, ticking never fails.
#[derive(Error, Debug)]
pub enum SculptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Failed to load mask {path}: {source}")]
    Mask {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
