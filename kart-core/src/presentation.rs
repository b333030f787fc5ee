use crate::player::items::{ItemIndex, ItemSlot};
use crate::player::lap_info::Placement;
use crate::sound_effect::SoundEffect;

/// The UI and audio side of a participant. The render step calls these once
/// per detected change; anything a front end does not show can be left at
/// the default no-op.
pub trait Presentation {
    fn set_lap_count(&mut self, _text: &str) {}

    // fill in 0..=1
    fn set_time_bar(&mut self, _fill: f64) {}

    fn refresh_slot_icon(&mut self, _slot: ItemSlot, _item: ItemIndex) {}
    fn select_slot(&mut self, _slot: ItemSlot) {}

    fn play_cue(&mut self, _cue: SoundEffect) {}

    fn show_end_race_screen(&mut self, _total_time: f64) {}
    fn hide_end_race_screen(&mut self) {}

    fn show_time_warning(&mut self, _remaining_secs: f64) {}
    fn show_time_up(&mut self) {}

    fn show_placement(&mut self, _placement: Placement) {}

    // racers despawn on the way back to the lobby
    fn hide_racers(&mut self) {}
}
