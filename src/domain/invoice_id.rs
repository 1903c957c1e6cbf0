//! Shape of the human-readable external invoice identifier:
//! `YY-MM-DD-XXXXXXX`, a date prefix followed by seven symbols drawn
//! uniformly from [`SUFFIX_ALPHABET`].

use chrono::NaiveDate;
use rand::Rng;

pub const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGH0123456789";
pub const SUFFIX_LEN: usize = 7;

pub fn date_prefix(date: NaiveDate) -> String {
    date.format("%y-%m-%d").to_string()
}

pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Draws one candidate identifier for `date`. Uniqueness is not checked here.
pub fn candidate<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    format!("{}-{}", date_prefix(date), random_suffix(rng))
}

/// Whether `value` has the `YY-MM-DD-XXXXXXX` shape.
pub fn is_well_formed(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 4 {
        return false;
    }

    let date_ok = parts[..3]
        .iter()
        .all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit()));
    let suffix_ok =
        parts[3].len() == SUFFIX_LEN && parts[3].bytes().all(|b| SUFFIX_ALPHABET.contains(&b));

    date_ok && suffix_ok
}
