use super::Error;
use std::fmt;
use std::str::FromStr;

/// Escape letters in delimiter order: field, component, repetition, escape, subcomponent
const LETTERS: [char; 5] = ['F', 'S', 'R', 'E', 'T'];

/// The five characters that structure a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Separates fields, `|` by default
    pub field: char,
    /// Separates components, `^` by default
    pub component: char,
    /// Separates repetitions, `~` by default
    pub repetition: char,
    /// Starts and ends an escape sequence, `\` by default
    pub escape: char,
    /// Separates subcomponents, `&` by default
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Reads the delimiters from the first five characters of `s`
    ///
    /// Characters after the fifth are ignored.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut chars = s.chars();
        match (
            chars.next(),
            chars.next(),
            chars.next(),
            chars.next(),
            chars.next(),
        ) {
            (Some(field), Some(component), Some(repetition), Some(escape), Some(subcomponent)) => {
                Ok(Self {
                    field,
                    component,
                    repetition,
                    escape,
                    subcomponent,
                })
            }
            _ => Err(Error::InvalidDelimiters(s.to_string())),
        }
    }

    fn as_array(&self) -> [char; 5] {
        [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ]
    }

    /// The four encoding characters that follow the field delimiter in `MSH-2`
    pub fn encoding_characters(&self) -> String {
        self.as_array()[1..].iter().collect()
    }

    fn letter_for(&self, c: char) -> Option<char> {
        self.as_array()
            .iter()
            .position(|d| *d == c)
            .map(|i| LETTERS[i])
    }

    fn delimiter_for(&self, letter: char) -> Option<char> {
        LETTERS
            .iter()
            .position(|l| *l == letter)
            .map(|i| self.as_array()[i])
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.as_array().iter() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for Delimiters {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Replaces every delimiter in `data` with its escape sequence
pub fn encode(data: &str, delims: &Delimiters) -> String {
    let mut out = String::with_capacity(data.len());
    for c in data.chars() {
        match delims.letter_for(c) {
            Some(letter) => {
                out.push(delims.escape);
                out.push(letter);
                out.push(delims.escape);
            }
            None => out.push(c),
        }
    }
    out
}

/// Replaces escape sequences in `data` with the delimiters they stand for
///
/// An unknown escape letter is kept as is and an escape character at the very end is
/// dropped.
pub fn decode(data: &str, delims: &Delimiters) -> String {
    let mut out = String::with_capacity(data.len());
    let mut chars = data.chars().peekable();
    while let Some(c) = chars.next() {
        if c != delims.escape {
            out.push(c);
            continue;
        }
        let letter = match chars.next() {
            Some(letter) => letter,
            None => break,
        };
        out.push(delims.delimiter_for(letter).unwrap_or(letter));
        // Closing escape
        if chars.peek() == Some(&delims.escape) {
            chars.next();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_escapes() {
        let d = Delimiters::default();
        assert_eq!(encode("a|b^c~d\\e&f", &d), "a\\F\\b\\S\\c\\R\\d\\E\\e\\T\\f");
        assert_eq!(decode("a\\F\\b\\S\\c\\R\\d\\E\\e\\T\\f", &d), "a|b^c~d\\e&f");
        assert_eq!(encode("plain text", &d), "plain text");
    }

    #[test]
    fn test_decode_oddities() {
        let d = Delimiters::default();
        assert_eq!(decode("a\\Q\\b", &d), "aQb");
        assert_eq!(decode("trailing\\", &d), "trailing");
        assert_eq!(decode("\\F", &d), "|");
    }

    #[test]
    fn test_round_trip_any_delimiters() {
        let sets = ["|^~\\&", "#$%!*", "FSRET", "ab cd", "|^~\\&#"];
        for set in sets.iter() {
            let d: Delimiters = set.parse().unwrap();
            let every = format!("x{}y{}{}z FSRET \\E\\", set, set, set);
            assert_eq!(decode(&encode(&every, &d), &d), every, "delimiters {}", set);
        }
    }

    #[test]
    fn test_parse_delimiters() {
        let d = Delimiters::parse("|^~\\&#").unwrap();
        assert_eq!(d, Delimiters::default());
        assert_eq!(d.to_string(), "|^~\\&");
        assert_eq!(d.encoding_characters(), "^~\\&");
        assert_matches!(Delimiters::parse("|^~\\"), Err(Error::InvalidDelimiters(_)));
    }
}
