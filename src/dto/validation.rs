//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::game::PlayerNumber;

/// Validates that a jersey number lies in the official `1..=99` range.
///
/// # Examples
///
/// ```ignore
/// validate_player_number(12)  // Ok
/// validate_player_number(0)   // Err
/// validate_player_number(120) // Err
/// ```
pub fn validate_player_number(number: PlayerNumber) -> Result<(), ValidationError> {
    if !(1..=99).contains(&number) {
        let mut err = ValidationError::new("player_number_range");
        err.message = Some(format!("Player number must be between 1 and 99 (got {number})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_number_valid() {
        assert!(validate_player_number(1).is_ok());
        assert!(validate_player_number(12).is_ok());
        assert!(validate_player_number(99).is_ok());
    }

    #[test]
    fn test_validate_player_number_out_of_range() {
        assert!(validate_player_number(0).is_err());
        assert!(validate_player_number(100).is_err());
        assert!(validate_player_number(255).is_err());
    }
}
