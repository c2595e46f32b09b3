use derive_more::{Display, Error};
use std::str::FromStr;

/// A column on the chess board.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[repr(i8)]
pub enum File {
    #[display(fmt = "a")]
    A,
    #[display(fmt = "b")]
    B,
    #[display(fmt = "c")]
    C,
    #[display(fmt = "d")]
    D,
    #[display(fmt = "e")]
    E,
    #[display(fmt = "f")]
    F,
    #[display(fmt = "g")]
    G,
    #[display(fmt = "h")]
    H,
}

impl File {
    pub const ALL: [File; 8] = [
        File::A,
        File::B,
        File::C,
        File::D,
        File::E,
        File::F,
        File::G,
        File::H,
    ];

    /// Constructs [`File`] from its index.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside of the range `0..8`.
    pub fn new(i: i8) -> Self {
        Self::ALL[i as usize]
    }

    /// This file's index in the range `0..8`.
    pub fn index(&self) -> i8 {
        *self as i8
    }
}

/// The reason why parsing [`File`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error)]
#[display(fmt = "failed to parse file, expected a letter in the range `[a, h]`")]
pub struct ParseFileError;

impl FromStr for File {
    type Err = ParseFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(File::A),
            "b" => Ok(File::B),
            "c" => Ok(File::C),
            "d" => Ok(File::D),
            "e" => Ok(File::E),
            "f" => Ok(File::F),
            "g" => Ok(File::G),
            "h" => Ok(File::H),
            _ => Err(ParseFileError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn file_has_an_index(f: File) {
        assert_eq!(File::new(f.index()), f);
    }

    #[proptest]
    fn parsing_printed_file_is_an_identity(f: File) {
        assert_eq!(f.to_string().parse(), Ok(f));
    }

    #[proptest]
    fn parsing_file_fails_for_upper_case_letter(#[strategy("[A-H]")] s: String) {
        assert_eq!(s.parse::<File>(), Err(ParseFileError));
    }

    #[proptest]
    fn parsing_file_fails_except_for_letters_between_a_and_h(#[strategy("[^a-h]+")] s: String) {
        assert_eq!(s.parse::<File>(), Err(ParseFileError));
    }
}
