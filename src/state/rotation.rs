//! Clockwise court rotation applied on every side-out.

use crate::state::game::Formation;

/// Rotate a formation one step: slot 1 takes slot 2's player, ..., slot 6 takes slot 1's.
///
/// The same function rotates either team; the opponent mirror uses the identical cycle.
pub fn rotate(formation: &Formation) -> Formation {
    Formation::from_fn(|slot| formation.player(slot.filled_from()).clone())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::state::{game::Slot, test_support::numbered_formation};

    #[test]
    fn rotate_moves_every_player_one_slot() {
        let formation = numbered_formation([1, 2, 3, 4, 5, 6]);
        let rotated = rotate(&formation);

        let order: Vec<_> = rotated.iter().map(|(_, p)| p.number).collect();
        assert_eq!(order, vec![2, 3, 4, 5, 6, 1]);
    }

    #[test]
    fn server_moves_to_back_center() {
        let formation = numbered_formation([11, 3, 6, 8, 12, 13]);
        let rotated = rotate(&formation);
        assert_eq!(rotated.slot_of(11), Some(Slot::new(6).unwrap()));
        assert_eq!(rotated.player(Slot::SERVER).number, 3);
    }

    proptest! {
        #[test]
        fn six_rotations_are_identity(numbers in proptest::sample::subsequence((1u8..=99).collect::<Vec<_>>(), 6)) {
            let numbers: [u8; 6] = numbers.try_into().unwrap();
            let formation = numbered_formation(numbers);

            let mut rotated = formation.clone();
            for step in 1..=6 {
                rotated = rotate(&rotated);
                if step < 6 {
                    prop_assert_ne!(&rotated, &formation);
                }
            }
            prop_assert_eq!(rotated, formation);
        }
    }
}
