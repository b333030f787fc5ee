pub mod authority;
pub mod error;
pub mod events;
pub mod game_type;
pub mod mode_clock;
pub mod networking;
pub mod player;
pub mod presentation;
pub mod sound_effect;
pub mod sync;
pub mod tick;
pub mod track;
pub mod view;
mod settings;

pub use settings::GLOBAL_CONFIG;
