use config::{Config, ConfigError, File};
use lazy_static::lazy_static;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Settings {
    pub port: String,
    pub server_address: String,
    pub tick_rate: u32,
    pub player_amount: usize,

    // which entry of the game type catalogue this server runs
    pub game_type: String,
    pub game_types_path: String,
    pub track_path: String,

    pub countdown_secs: f64,
    pub equip_item_timeout_secs: f64,
    pub time_up_grace_secs: f64,
    pub lobby_transition_delay_secs: f64,
    pub spinout_secs: f64,
    pub item_box_cooldown_secs: f64,
    pub boost_secs: f64,
}

impl Settings {
    fn new() -> Result<Settings, ConfigError> {
        let config = Config::builder()
            .set_default("port", "24247")?
            .set_default("server_address", "127.0.0.1")?
            .set_default("tick_rate", 60)?
            .set_default("player_amount", 1)?
            .set_default("game_type", "race")?
            .set_default("game_types_path", "game_types.yaml")?
            .set_default("track_path", "track.json")?
            .set_default("countdown_secs", 3.0)?
            .set_default("equip_item_timeout_secs", 3.0)?
            .set_default("time_up_grace_secs", 3.0)?
            .set_default("lobby_transition_delay_secs", 0.5)?
            .set_default("spinout_secs", 2.0)?
            .set_default("item_box_cooldown_secs", 5.0)?
            .set_default("boost_secs", 1.5)?
            .add_source(File::with_name("config.yaml").required(false))
            .build()?;

        config.try_deserialize()
    }
}

lazy_static! {
    pub static ref GLOBAL_CONFIG: Settings = Settings::new().expect("failed to read config file");
}
