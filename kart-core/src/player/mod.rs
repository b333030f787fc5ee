pub mod items;
pub mod lap_info;
pub mod player_inputs;


pub type RacerID = usize;
