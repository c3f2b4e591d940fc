use fvm_shared::clock::ChainEpoch;

/// Randomness returned for any draw that no recording matches.
pub const FIXED_RANDOMNESS: [u8; 32] = *b"i_am_random_____i_am_random_____";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomnessKind {
    Chain,
    Beacon,
}

/// The parameters of a single randomness draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRule {
    pub kind: RandomnessKind,
    /// Domain separation tag.
    pub dst: i64,
    pub epoch: ChainEpoch,
    pub entropy: Vec<u8>,
}

/// A recorded draw and the value it returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessMatch {
    pub on: RandomnessRule,
    pub ret: [u8; 32],
}

/// A randomness source that replays recorded values, falling back to a constant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayingRand {
    recorded: Vec<RandomnessMatch>,
}

impl ReplayingRand {
    pub fn new(recorded: Vec<RandomnessMatch>) -> Self {
        Self { recorded }
    }

    pub fn recorded(&self) -> &[RandomnessMatch] {
        &self.recorded
    }

    /// Returns the recorded value for an exactly matching draw, if any.
    pub fn matches(&self, requested: &RandomnessRule) -> Option<[u8; 32]> {
        self.recorded.iter().find(|m| &m.on == requested).map(|m| m.ret)
    }

    pub fn chain(&self, dst: i64, epoch: ChainEpoch, entropy: &[u8]) -> [u8; 32] {
        self.lookup(RandomnessKind::Chain, dst, epoch, entropy)
    }

    pub fn beacon(&self, dst: i64, epoch: ChainEpoch, entropy: &[u8]) -> [u8; 32] {
        self.lookup(RandomnessKind::Beacon, dst, epoch, entropy)
    }

    /// The value the VM sees for a chain draw at an epoch. The VM asks for a digest by epoch
    /// alone and mixes in tag and entropy itself, so the first recording of that kind at that
    /// epoch answers.
    pub fn chain_digest(&self, epoch: ChainEpoch) -> [u8; 32] {
        self.at_epoch(RandomnessKind::Chain, epoch)
    }

    pub fn beacon_digest(&self, epoch: ChainEpoch) -> [u8; 32] {
        self.at_epoch(RandomnessKind::Beacon, epoch)
    }

    fn at_epoch(&self, kind: RandomnessKind, epoch: ChainEpoch) -> [u8; 32] {
        self.recorded
            .iter()
            .find(|m| m.on.kind == kind && m.on.epoch == epoch)
            .map_or(FIXED_RANDOMNESS, |m| m.ret)
    }

    fn lookup(
        &self,
        kind: RandomnessKind,
        dst: i64,
        epoch: ChainEpoch,
        entropy: &[u8],
    ) -> [u8; 32] {
        let rule = RandomnessRule { kind, dst, epoch, entropy: entropy.to_vec() };
        self.matches(&rule).unwrap_or(FIXED_RANDOMNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(kind: RandomnessKind, epoch: ChainEpoch, ret: u8) -> RandomnessMatch {
        RandomnessMatch {
            on: RandomnessRule { kind, dst: 2, epoch, entropy: b"seed".to_vec() },
            ret: [ret; 32],
        }
    }

    #[test]
    fn empty_source_is_fixed() {
        let rand = ReplayingRand::default();
        assert_eq!(FIXED_RANDOMNESS, rand.chain(2, 10, b"seed"));
        assert_eq!(FIXED_RANDOMNESS, rand.beacon(2, 10, b"seed"));
    }

    #[test]
    fn replays_exact_matches() {
        let rand = ReplayingRand::new(vec![
            recorded(RandomnessKind::Chain, 10, 7),
            recorded(RandomnessKind::Beacon, 10, 9),
        ]);
        assert_eq!([7; 32], rand.chain(2, 10, b"seed"));
        assert_eq!([9; 32], rand.beacon(2, 10, b"seed"));
    }

    #[test]
    fn any_differing_field_falls_back() {
        let rand = ReplayingRand::new(vec![recorded(RandomnessKind::Chain, 10, 7)]);
        assert_eq!(FIXED_RANDOMNESS, rand.chain(3, 10, b"seed"));
        assert_eq!(FIXED_RANDOMNESS, rand.chain(2, 11, b"seed"));
        assert_eq!(FIXED_RANDOMNESS, rand.chain(2, 10, b"other"));
        // Kind is part of the match.
        assert_eq!(FIXED_RANDOMNESS, rand.beacon(2, 10, b"seed"));
    }

    #[test]
    fn digests_match_kind_and_epoch() {
        let rand = ReplayingRand::new(vec![
            recorded(RandomnessKind::Chain, 10, 7),
            recorded(RandomnessKind::Chain, 10, 8),
            recorded(RandomnessKind::Beacon, 12, 9),
        ]);
        assert_eq!([7; 32], rand.chain_digest(10));
        assert_eq!([9; 32], rand.beacon_digest(12));
        assert_eq!(FIXED_RANDOMNESS, rand.chain_digest(12));
        assert_eq!(FIXED_RANDOMNESS, rand.beacon_digest(10));
    }
}
