//! Proof-of-work (NIP-13) difficulty check.

use super::mode::{MatchResult, Mode};
use super::rejection::Rejection;
use super::unit::SifterUnit;
use crate::error::{Result, SieveError};

/// Number of leading zero bits of a hex-encoded event id.
pub fn leading_zero_bits(id: &str) -> Result<u32> {
    let mut zeros = 0;
    for c in id.chars() {
        let nibble = c
            .to_digit(16)
            .filter(|_| !c.is_ascii_uppercase())
            .ok_or_else(|| {
                SieveError::Match(format!("unexpected character in event ID: {:?}", c))
            })?;
        if nibble != 0 {
            // a nibble is 4 bits wide; leading_zeros counts over 32
            return Ok(zeros + nibble.leading_zeros() - 28);
        }
        zeros += 4;
    }
    Ok(zeros)
}

/// Accept events whose id has at least `min_difficulty` leading zero bits.
///
/// Only the achieved difficulty is checked, not the target declared in the
/// nonce tag.
pub fn pow_min_difficulty(min_difficulty: u32) -> SifterUnit {
    SifterUnit::new(
        move |input| {
            let difficulty = leading_zero_bits(&input.event.id)?;
            Ok(MatchResult::from(difficulty >= min_difficulty))
        },
        Mode::Allow,
        Rejection::message(format!("pow: difficulty is less than {}", min_difficulty)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Event, Input};
    use crate::sifters::Sifter;

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits("ffff").unwrap(), 0);
        assert_eq!(leading_zero_bits("7fff").unwrap(), 1);
        assert_eq!(leading_zero_bits("3fff").unwrap(), 2);
        assert_eq!(leading_zero_bits("1fff").unwrap(), 3);
        assert_eq!(leading_zero_bits("0fff").unwrap(), 4);
        assert_eq!(leading_zero_bits("000000000e9d").unwrap(), 36);
        assert_eq!(leading_zero_bits("0000").unwrap(), 16);
        assert!(leading_zero_bits("00zz").is_err());
    }

    #[tokio::test]
    async fn test_pow_min_difficulty() {
        let s = pow_min_difficulty(8);
        let mut input = Input::from_client(Event::default(), "127.0.0.1");

        input.event.id = "00ff".to_string();
        assert!(s.sift(&input).await.unwrap().is_accept());

        input.event.id = "01ff".to_string();
        let res = s.sift(&input).await.unwrap();
        assert_eq!(res.msg, "pow: difficulty is less than 8");

        input.event.id = "0g".to_string();
        assert!(s.sift(&input).await.is_err());
    }
}
