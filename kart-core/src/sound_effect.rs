use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SoundEffect {
    Countdown,
    NextLap,
    RaceFinished,
    Checkpoint,

    TimeWarning,
    TimeUp,
    Crash,

    ItemCollect,
    Horn,
}

impl SoundEffect {
    // cue names the audio collaborator knows its clips by
    pub fn key(&self) -> &'static str {
        match self {
            SoundEffect::Countdown => "countdownSFX",
            SoundEffect::NextLap => "newLapSFX",
            SoundEffect::RaceFinished => "raceFinishedSFX",
            SoundEffect::Checkpoint => "checkpointSFX",
            SoundEffect::TimeWarning => "warningTimeSFX",
            SoundEffect::TimeUp => "timeUpSFX",
            SoundEffect::Crash => "crashSFX",
            SoundEffect::ItemCollect => "itemCollectSFX",
            SoundEffect::Horn => "hornSFX",
        }
    }
}
