use kart_core::player::items::ItemIndex;

pub mod pickups;

// Item indices on the wire are positions in this list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerUp {
    // Beneficial
    Boost,

    // Detrimental
    OilSlick,
    Shockwave,
}

impl PowerUp {
    pub const ALL: [PowerUp; 3] = [PowerUp::Boost, PowerUp::OilSlick, PowerUp::Shockwave];

    pub fn from_index(index: ItemIndex) -> Option<PowerUp> {
        usize::try_from(index)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn index(self) -> ItemIndex {
        self as ItemIndex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_core::player::items::EMPTY_ITEM;

    #[test]
    fn test_index_mapping() {
        for powerup in PowerUp::ALL {
            assert_eq!(PowerUp::from_index(powerup.index()), Some(powerup));
        }
        assert_eq!(PowerUp::from_index(EMPTY_ITEM), None);
        assert_eq!(PowerUp::from_index(3), None);
    }
}
