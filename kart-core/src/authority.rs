use serde::{Deserialize, Serialize};

use crate::error::{RaceError, Result};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Authority,
    Observer,
}

// Capability token every state mutation takes. Only obtainable from the
// authority role, so observers holding mirrored state cannot write to it.
#[derive(Debug)]
pub struct Authority {
    _private: (),
}

impl Role {
    pub fn authority(self) -> Result<Authority> {
        match self {
            Role::Authority => Ok(Authority { _private: () }),
            Role::Observer => Err(RaceError::NotAuthority),
        }
    }

    pub fn is_authority(self) -> bool {
        self == Role::Authority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authority_gets_token() {
        assert!(Role::Authority.authority().is_ok());
        assert!(matches!(
            Role::Observer.authority(),
            Err(RaceError::NotAuthority)
        ));
    }
}
