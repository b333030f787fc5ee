use thiserror::Error;

#[derive(Debug, Error)]
pub enum RaceError {
    #[error("only the authority may change race state")]
    NotAuthority,
    #[error("the extra lap has already been used this race")]
    ExtraLapAlreadyUsed,
    #[error("lap count cannot be changed in mode {mode}")]
    LapIncreaseUnsupported { mode: String },
    #[error("invalid track: {0}")]
    InvalidTrack(String),
    #[error("unknown game type {0}")]
    UnknownGameType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Packet(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RaceError>;
