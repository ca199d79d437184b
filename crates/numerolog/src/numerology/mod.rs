//! Numerology arithmetic.
//!
//! Everything here is a pure function of a birth date, a name and (for the
//! personal cycles) the current date. Letters use the Pythagorean values for
//! both the Latin and the Russian alphabet.

pub mod knowledge;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Russian alphabet in order; letter values cycle 1..=9 over it.
const CYRILLIC_ALPHABET: &str = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя";

/// Vowels of both alphabets.
const VOWELS: &str = "aeiouаеёиоуыэюя";

/// Master numbers survive reduction.
const MASTER_NUMBERS: [u32; 3] = [11, 22, 33];

/// Score used for pairs outside the table (master numbers).
const DEFAULT_PAIR_SCORE: u32 = 70;

/// Accepted birth date input formats.
const DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Pair scores for life path and soul numbers, smaller number first.
const PAIR_SCORES: [(u32, u32, u32); 45] = [
    (1, 1, 70), (1, 2, 60), (1, 3, 85), (1, 4, 50), (1, 5, 90),
    (1, 6, 65), (1, 7, 55), (1, 8, 75), (1, 9, 80),
    (2, 2, 75), (2, 3, 70), (2, 4, 85), (2, 5, 55), (2, 6, 90),
    (2, 7, 65), (2, 8, 80), (2, 9, 75),
    (3, 3, 80), (3, 4, 50), (3, 5, 90), (3, 6, 85), (3, 7, 60),
    (3, 8, 55), (3, 9, 95),
    (4, 4, 70), (4, 5, 45), (4, 6, 75), (4, 7, 85), (4, 8, 90), (4, 9, 55),
    (5, 5, 65), (5, 6, 50), (5, 7, 80), (5, 8, 60), (5, 9, 85),
    (6, 6, 85), (6, 7, 55), (6, 8, 70), (6, 9, 90),
    (7, 7, 75), (7, 8, 60), (7, 9, 65),
    (8, 8, 80), (8, 9, 70),
    (9, 9, 85),
];

/// A user's calculated numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumerologyProfile {
    /// Life path number, from the full birth date.
    pub life_path: u32,
    /// Soul number, from the day of birth.
    pub soul_number: u32,
    /// Expression number, from all letters of the name.
    pub expression_number: u32,
    /// Personality number, from the consonants of the name.
    pub personality_number: u32,
    /// Pythagoras square: digit 1..=9 to occurrence count.
    pub matrix: BTreeMap<u8, u32>,
    /// Day of birth reduced without master numbers.
    pub birthday_number: u32,
    /// Life path plus expression.
    pub maturity_number: u32,
    /// Personal year for the reference date.
    pub personal_year: u32,
    /// Personal month for the reference date.
    pub personal_month: u32,
    /// Personal day for the reference date.
    pub personal_day: u32,
}

/// Numbers of one side of a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonNumbers {
    /// Life path number.
    pub life_path: u32,
    /// Soul number.
    pub soul: u32,
}

/// Result of a compatibility check between two birth dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityScores {
    /// Weighted score, 60% life path and 40% soul.
    pub overall_score: u32,
    /// Score of the life path pair.
    pub life_path_score: u32,
    /// Score of the soul number pair.
    pub soul_score: u32,
    /// The user.
    pub person1: PersonNumbers,
    /// The partner.
    pub person2: PersonNumbers,
}

/// Reduce a number to a single digit, optionally keeping master numbers.
#[must_use]
pub fn reduce(mut num: u32, keep_master: bool) -> u32 {
    while num > 9 {
        if keep_master && MASTER_NUMBERS.contains(&num) {
            return num;
        }
        num = digit_sum(num);
    }
    num
}

fn digit_sum(mut num: u32) -> u32 {
    let mut sum = 0;
    while num > 0 {
        sum += num % 10;
        num /= 10;
    }
    sum
}

fn date_digits(date: NaiveDate) -> String {
    date.format("%d%m%Y").to_string()
}

fn sum_of_digits(text: &str) -> u32 {
    text.chars().filter_map(|c| c.to_digit(10)).sum()
}

/// Pythagorean value of a single lower-case letter; 0 for anything else.
#[must_use]
pub fn letter_value(c: char) -> u32 {
    if c.is_ascii_lowercase() {
        return (u32::from(c) - u32::from('a')) % 9 + 1;
    }
    CYRILLIC_ALPHABET
        .chars()
        .position(|letter| letter == c)
        .map_or(0, |index| u32::try_from(index % 9).unwrap_or(0) + 1)
}

fn is_vowel(c: char) -> bool {
    VOWELS.contains(c)
}

fn name_sum(name: &str, include: impl Fn(char) -> bool) -> u32 {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|&c| include(c))
        .map(letter_value)
        .sum()
}

/// Life path number: all digits of the birth date.
#[must_use]
pub fn life_path(birth_date: NaiveDate) -> u32 {
    reduce(sum_of_digits(&date_digits(birth_date)), true)
}

/// Soul number: the day of birth.
#[must_use]
pub fn soul_number(birth_date: NaiveDate) -> u32 {
    reduce(birth_date.day(), true)
}

/// Expression number: every letter of the name.
#[must_use]
pub fn expression_number(name: &str) -> u32 {
    reduce(name_sum(name, |_| true), true)
}

/// Soul urge number: vowels of the name.
#[must_use]
pub fn soul_urge(name: &str) -> u32 {
    reduce(name_sum(name, is_vowel), true)
}

/// Personality number: everything in the name that is not a vowel.
#[must_use]
pub fn personality_number(name: &str) -> u32 {
    reduce(name_sum(name, |c| !is_vowel(c)), true)
}

/// Birthday number: the day of birth without master numbers.
#[must_use]
pub fn birthday_number(birth_date: NaiveDate) -> u32 {
    reduce(birth_date.day(), false)
}

/// Maturity number: life path plus expression.
#[must_use]
pub fn maturity_number(life_path: u32, expression: u32) -> u32 {
    reduce(life_path + expression, true)
}

/// Pythagoras square of a birth date.
///
/// Counts the digits 1..=9 over the date and its four working numbers.
#[must_use]
pub fn pythagoras_matrix(birth_date: NaiveDate) -> BTreeMap<u8, u32> {
    let digits = date_digits(birth_date);

    let first = sum_of_digits(&digits);
    let second = reduce(first, false);
    let leading = digits
        .chars()
        .take(2)
        .filter_map(|c| c.to_digit(10))
        .find(|&d| d != 0)
        .unwrap_or(0);
    let third = first.abs_diff(2 * leading);
    let fourth = reduce(third, false);

    let all = format!("{digits}{first}{second}{third}{fourth}");

    let mut matrix: BTreeMap<u8, u32> = (1..=9).map(|d| (d, 0)).collect();
    for d in all.chars().filter_map(|c| c.to_digit(10)) {
        if let Ok(cell) = u8::try_from(d) {
            if let Some(count) = matrix.get_mut(&cell) {
                *count += 1;
            }
        }
    }
    matrix
}

/// Personal year: birth month and day plus the current year.
#[must_use]
pub fn personal_year(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let year = u32::try_from(today.year()).unwrap_or(0);
    reduce(birth_date.month() + birth_date.day() + year, true)
}

/// Personal month: personal year plus the current month.
#[must_use]
pub fn personal_month(personal_year: u32, today: NaiveDate) -> u32 {
    reduce(personal_year + today.month(), true)
}

/// Personal day: personal month plus the current day.
#[must_use]
pub fn personal_day(personal_month: u32, today: NaiveDate) -> u32 {
    reduce(personal_month + today.day(), true)
}

fn pair_score(a: u32, b: u32) -> u32 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    PAIR_SCORES
        .iter()
        .find(|(x, y, _)| *x == low && *y == high)
        .map_or(DEFAULT_PAIR_SCORE, |(_, _, score)| *score)
}

/// Compatibility of two birth dates.
#[must_use]
pub fn compatibility(date1: NaiveDate, date2: NaiveDate) -> CompatibilityScores {
    let person1 = PersonNumbers {
        life_path: life_path(date1),
        soul: soul_number(date1),
    };
    let person2 = PersonNumbers {
        life_path: life_path(date2),
        soul: soul_number(date2),
    };

    let life_path_score = pair_score(person1.life_path, person2.life_path);
    let soul_score = pair_score(person1.soul, person2.soul);
    // Integer form of floor(0.6 * lp + 0.4 * soul)
    let overall_score = (life_path_score * 6 + soul_score * 4) / 10;

    CompatibilityScores {
        overall_score,
        life_path_score,
        soul_score,
        person1,
        person2,
    }
}

/// Full profile for a name and birth date as of `today`.
#[must_use]
pub fn full_profile(name: &str, birth_date: NaiveDate, today: NaiveDate) -> NumerologyProfile {
    let life_path = life_path(birth_date);
    let expression = expression_number(name);
    let personal_year = personal_year(birth_date, today);
    let personal_month = personal_month(personal_year, today);

    NumerologyProfile {
        life_path,
        soul_number: soul_number(birth_date),
        expression_number: expression,
        personality_number: personality_number(name),
        matrix: pythagoras_matrix(birth_date),
        birthday_number: birthday_number(birth_date),
        maturity_number: maturity_number(life_path, expression),
        personal_year,
        personal_month,
        personal_day: personal_day(personal_month, today),
    }
}

/// Parse a birth date typed by a user.
///
/// Accepts `DD.MM.YYYY`, `DD/MM/YYYY`, `DD-MM-YYYY` and `YYYY-MM-DD`.
#[must_use]
pub fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reduce_single_digit_unchanged() {
        assert_eq!(reduce(7, true), 7);
        assert_eq!(reduce(0, true), 0);
    }

    #[test]
    fn test_reduce_keeps_master_numbers() {
        assert_eq!(reduce(11, true), 11);
        assert_eq!(reduce(22, true), 22);
        assert_eq!(reduce(33, true), 33);
        assert_eq!(reduce(11, false), 2);
        assert_eq!(reduce(29, true), 11);
    }

    #[test]
    fn test_reduce_multiple_rounds() {
        // 1999 -> 28 -> 10 -> 1
        assert_eq!(reduce(1999, true), 1);
    }

    #[test]
    fn test_life_path() {
        // 15.03.1990: 1+5+0+3+1+9+9+0 = 28 -> 10 -> 1
        assert_eq!(life_path(date(1990, 3, 15)), 1);
        // 29.11.1992: 2+9+1+1+1+9+9+2 = 34 -> 7
        assert_eq!(life_path(date(1992, 11, 29)), 7);
    }

    #[test]
    fn test_life_path_master() {
        // 29.09.1991: 2+9+0+9+1+9+9+1 = 40 -> 4
        assert_eq!(life_path(date(1991, 9, 29)), 4);
        // 02.09.1980: 0+2+0+9+1+9+8+0 = 29 -> 11
        assert_eq!(life_path(date(1980, 9, 2)), 11);
    }

    #[test]
    fn test_soul_and_birthday_numbers() {
        assert_eq!(soul_number(date(1990, 3, 29)), 11);
        assert_eq!(birthday_number(date(1990, 3, 29)), 2);
        assert_eq!(soul_number(date(1990, 3, 15)), 6);
    }

    #[test]
    fn test_letter_values() {
        assert_eq!(letter_value('a'), 1);
        assert_eq!(letter_value('i'), 9);
        assert_eq!(letter_value('j'), 1);
        assert_eq!(letter_value('z'), 8);
        assert_eq!(letter_value('а'), 1);
        assert_eq!(letter_value('з'), 9);
        assert_eq!(letter_value('и'), 1);
        assert_eq!(letter_value('я'), 6);
        assert_eq!(letter_value('-'), 0);
    }

    #[test]
    fn test_expression_number() {
        // anna: 1 + 5 + 5 + 1 = 12 -> 3
        assert_eq!(expression_number("Anna"), 3);
        // Spaces and case are ignored
        assert_eq!(expression_number("A N n a"), 3);
        // анна: 1 + 6 + 6 + 1 = 14 -> 5
        assert_eq!(expression_number("Анна"), 5);
    }

    #[test]
    fn test_soul_urge_and_personality() {
        // anna vowels a + a = 2, consonants n + n = 10 -> 1
        assert_eq!(soul_urge("Anna"), 2);
        assert_eq!(personality_number("Anna"), 1);
    }

    #[test]
    fn test_maturity_number() {
        assert_eq!(maturity_number(1, 3), 4);
        assert_eq!(maturity_number(9, 9), 9);
        assert_eq!(maturity_number(11, 11), 22);
    }

    #[test]
    fn test_pythagoras_matrix() {
        // 15.03.1990 -> "15031990"; first = 28, second = 1,
        // third = |28 - 2| = 26, fourth = 8
        // digits: 1503199028 1 26 8 -> without zeros: 1,5,3,1,9,9,2,8,1,2,6,8
        let matrix = pythagoras_matrix(date(1990, 3, 15));
        assert_eq!(matrix.len(), 9);
        assert_eq!(matrix[&1], 3);
        assert_eq!(matrix[&2], 2);
        assert_eq!(matrix[&3], 1);
        assert_eq!(matrix[&4], 0);
        assert_eq!(matrix[&5], 1);
        assert_eq!(matrix[&6], 1);
        assert_eq!(matrix[&7], 0);
        assert_eq!(matrix[&8], 2);
        assert_eq!(matrix[&9], 2);
    }

    #[test]
    fn test_pythagoras_matrix_leading_zero_day() {
        // 05.06.1985 -> "05061985"; first = 34, leading digit 5,
        // third = |34 - 10| = 24
        let matrix = pythagoras_matrix(date(1985, 6, 5));
        let total: u32 = matrix.values().sum();
        // 5,6,1,9,8,5 + 3,4 + 7 + 2,4 + 6
        assert_eq!(total, 12);
        assert_eq!(matrix[&4], 2);
    }

    #[test]
    fn test_personal_cycles() {
        let birth = date(1990, 3, 15);
        let today = date(2025, 6, 10);
        // 3 + 15 + 2025 = 2043 -> 9
        let py = personal_year(birth, today);
        assert_eq!(py, 9);
        // 9 + 6 = 15 -> 6
        let pm = personal_month(py, today);
        assert_eq!(pm, 6);
        // 6 + 10 = 16 -> 7
        assert_eq!(personal_day(pm, today), 7);
    }

    #[test]
    fn test_compatibility_is_symmetric_in_scores() {
        let a = date(1990, 3, 15);
        let b = date(1992, 11, 29);
        let ab = compatibility(a, b);
        let ba = compatibility(b, a);
        assert_eq!(ab.overall_score, ba.overall_score);
        assert_eq!(ab.person1, ba.person2);
    }

    #[test]
    fn test_compatibility_scores() {
        // life paths 1 and 7 -> 55; souls 6 and 11 -> default 70
        let scores = compatibility(date(1990, 3, 15), date(1992, 11, 29));
        assert_eq!(scores.life_path_score, 55);
        assert_eq!(scores.soul_score, 70);
        // floor(33 + 28)
        assert_eq!(scores.overall_score, 61);
    }

    #[test]
    fn test_pair_score_table_lookup() {
        assert_eq!(pair_score(3, 9), 95);
        assert_eq!(pair_score(9, 3), 95);
        assert_eq!(pair_score(4, 5), 45);
        assert_eq!(pair_score(22, 1), DEFAULT_PAIR_SCORE);
    }

    #[test]
    fn test_full_profile() {
        let profile = full_profile("Anna", date(1990, 3, 15), date(2025, 6, 10));
        assert_eq!(profile.life_path, 1);
        assert_eq!(profile.expression_number, 3);
        assert_eq!(profile.maturity_number, 4);
        assert_eq!(profile.personal_year, 9);
        assert_eq!(profile.personal_day, 7);
        assert_eq!(profile.matrix.len(), 9);
    }

    #[test]
    fn test_parse_birth_date_formats() {
        let expected = Some(date(1990, 3, 15));
        assert_eq!(parse_birth_date("15.03.1990"), expected);
        assert_eq!(parse_birth_date(" 15/03/1990 "), expected);
        assert_eq!(parse_birth_date("15-03-1990"), expected);
        assert_eq!(parse_birth_date("1990-03-15"), expected);
    }

    #[test]
    fn test_parse_birth_date_rejects_garbage() {
        assert_eq!(parse_birth_date("yesterday"), None);
        assert_eq!(parse_birth_date("31.02.1990"), None);
        assert_eq!(parse_birth_date(""), None);
    }

    #[test]
    fn test_profile_serializes_matrix_with_string_keys() {
        let profile = full_profile("Anna", date(1990, 3, 15), date(2025, 6, 10));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["matrix"]["1"], 3);
    }
}
