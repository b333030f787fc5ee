use std::cmp::Ordering;

use kart_core::player::lap_info::{Placement, RaceProgress, RaceState};
use kart_core::player::RacerID;

// Ahead sorts first: finished racers by finish tick, then racers still on
// track by lap and checkpoint, then anyone who has not started.
pub fn compare_progress(this: &RaceProgress, other: &RaceProgress) -> Ordering {
    match (this.state(), other.state()) {
        (RaceState::Finished, RaceState::Finished) => {
            this.end_race_tick().cmp(&other.end_race_tick())
        }
        (RaceState::Finished, _) => Ordering::Less,
        (_, RaceState::Finished) => Ordering::Greater,
        (RaceState::Racing, RaceState::Racing) => {
            if this.lap() != other.lap() {
                this.lap().cmp(&other.lap()).reverse()
            } else {
                this.checkpoint_index()
                    .cmp(&other.checkpoint_index())
                    .reverse()
            }
        }
        (RaceState::Racing, RaceState::NotStarted) => Ordering::Less,
        (RaceState::NotStarted, RaceState::Racing) => Ordering::Greater,
        (RaceState::NotStarted, RaceState::NotStarted) => Ordering::Equal,
    }
}

// 1-based placements, ties broken by racer id
pub fn standings(mut racers: Vec<(RacerID, RaceProgress)>) -> Vec<(RacerID, Placement)> {
    racers.sort_by(|(this_id, this), (other_id, other)| {
        compare_progress(this, other).then(this_id.cmp(other_id))
    });
    racers
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (id, (index + 1) as Placement))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_core::authority::Role;
    use kart_core::game_type::{GameType, ModeKind};
    use kart_core::player::lap_info::LapRules;
    use kart_core::track::Track;

    #[test]
    fn test_standings_order() {
        let authority = Role::Authority.authority().unwrap();
        let rules = LapRules::new(&GameType::default(), 1, &Track::builtin_oval());

        let racing = |checkpoints: i32| {
            let mut progress = RaceProgress::new(ModeKind::LapRace);
            progress.start_race(&authority, 1, ModeKind::LapRace);
            for index in 0..checkpoints {
                progress.process_checkpoint(&authority, index, &rules);
            }
            progress
        };

        let behind = racing(1);
        let ahead = racing(2);
        let mut late_finisher = racing(3);
        late_finisher.process_finish_line(&authority, false, 500, &rules);
        let mut early_finisher = racing(3);
        early_finisher.process_finish_line(&authority, false, 400, &rules);
        let waiting = RaceProgress::new(ModeKind::LapRace);

        let placements = standings(vec![
            (0, waiting),
            (1, behind),
            (2, late_finisher),
            (3, ahead),
            (4, early_finisher),
        ]);

        assert_eq!(placements, vec![(4, 1), (2, 2), (3, 3), (1, 4), (0, 5)]);
    }
}
