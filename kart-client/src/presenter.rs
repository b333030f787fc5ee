use log::{debug, info};
use ordinal::Ordinal;

use kart_core::player::items::{ItemIndex, ItemSlot, EMPTY_ITEM};
use kart_core::player::lap_info::Placement;
use kart_core::presentation::Presentation;
use kart_core::sound_effect::SoundEffect;

pub fn placement_text(placement: Placement) -> String {
    if placement == 0 {
        String::from("-")
    } else {
        Ordinal(placement).to_string()
    }
}

// the time bar is reported in tenths so a smooth drain doesn't flood the log
fn tenths(fill: f64) -> u32 {
    (fill.clamp(0.0, 1.0) * 10.0).ceil() as u32
}

/// A text front end: writes what a HUD would show to the log.
#[derive(Default)]
pub struct LogPresenter {
    lap_text: String,
    time_tenths: Option<u32>,
    placement: Option<Placement>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lap_text(&self) -> &str {
        &self.lap_text
    }
}

impl Presentation for LogPresenter {
    fn set_lap_count(&mut self, text: &str) {
        if self.lap_text != text {
            info!("lap {}", text);
            self.lap_text = text.to_string();
        }
    }

    fn set_time_bar(&mut self, fill: f64) {
        let tenths = tenths(fill);
        if self.time_tenths != Some(tenths) {
            debug!("time left: {}0%", tenths);
            self.time_tenths = Some(tenths);
        }
    }

    fn refresh_slot_icon(&mut self, slot: ItemSlot, item: ItemIndex) {
        if item == EMPTY_ITEM {
            info!("slot {} is empty", slot.number());
        } else {
            info!("slot {} holds item {}", slot.number(), item);
        }
    }

    fn select_slot(&mut self, slot: ItemSlot) {
        info!("selected slot {}", slot.number());
    }

    fn play_cue(&mut self, cue: SoundEffect) {
        debug!("playing {}", cue.key());
    }

    fn show_end_race_screen(&mut self, total_time: f64) {
        info!("race over after {:.2}s", total_time);
    }

    fn hide_end_race_screen(&mut self) {
        debug!("end screen hidden");
    }

    fn show_time_warning(&mut self, remaining_secs: f64) {
        info!("{:.0} seconds left!", remaining_secs);
    }

    fn show_time_up(&mut self) {
        info!("time's up!");
    }

    fn show_placement(&mut self, placement: Placement) {
        if self.placement != Some(placement) {
            info!("you are {}", placement_text(placement));
            self.placement = Some(placement);
        }
    }

    fn hide_racers(&mut self) {
        info!("heading back to the lobby");
    }
}
