use super::Error;
use nom::{
    bytes::complete::{take_till, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    sequence::{preceded, terminated},
};

type IResult<I, O, E = nom::error::VerboseError<I>> = Result<(I, O), nom::Err<E>>;

/// The characters that structure a path
///
/// The defaults give paths like `OBX:2-5:1-3-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathDelims {
    /// Introduces a segment occurrence or a field repetition
    pub occurrence: char,
    /// Introduces the next level down
    pub level: char,
}

impl Default for PathDelims {
    fn default() -> Self {
        Self {
            occurrence: ':',
            level: '-',
        }
    }
}

/// A parsed path, with numbers as written
///
/// `occurrence`, `repetition`, `component` and `subcomponent` count from one. `field`
/// is taken as is since field zero is the segment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Segment name
    pub segment: String,
    /// Which segment of that name, the first if not given
    pub occurrence: Option<usize>,
    /// Field number
    pub field: Option<usize>,
    /// Repetition of the field
    pub repetition: Option<usize>,
    /// Component of the repetition
    pub component: Option<usize>,
    /// Subcomponent of the component
    pub subcomponent: Option<usize>,
}

impl Path {
    /// Parses `SEGMENT[:occurrence][-field[:repetition][-component[-subcomponent]]]`
    ///
    /// Every number may be followed by text up to the next delimiter, so `OBX-6th` is
    /// field 6 of the first OBX.
    pub fn parse(path: &str, delims: PathDelims) -> Result<Self, Error> {
        let invalid = || Error::InvalidPath(path.to_string());
        let (rest, parsed) = path_parser(path, delims).map_err(|_| invalid())?;
        if !rest.is_empty() {
            return Err(invalid());
        }
        let counts_from_one = [
            parsed.occurrence,
            parsed.repetition,
            parsed.component,
            parsed.subcomponent,
        ];
        if counts_from_one.iter().any(|n| *n == Some(0)) {
            return Err(invalid());
        }
        Ok(parsed)
    }

    /// Builds the textual form of this path
    pub fn to_string_with(&self, delims: PathDelims) -> String {
        let mut out = self.segment.clone();
        let mut push = |sep: char, n: Option<usize>| {
            if let Some(n) = n {
                out.push(sep);
                out.push_str(&n.to_string());
            }
        };
        push(delims.occurrence, self.occurrence);
        push(delims.level, self.field);
        push(delims.occurrence, self.repetition);
        push(delims.level, self.component);
        push(delims.level, self.subcomponent);
        out
    }
}

fn segment_name(buf: &str) -> IResult<&str, &str> {
    take_while_m_n(3, 3, |c: char| c.is_ascii_alphanumeric())(buf)
}

/// Digits with an optional suffix up to the next delimiter
fn number<'a>(delims: PathDelims) -> impl FnMut(&'a str) -> IResult<&'a str, usize> {
    terminated(
        map_res(digit1, |d: &str| d.parse::<usize>()),
        take_till(move |c: char| c == delims.occurrence || c == delims.level),
    )
}

fn path_parser(buf: &str, delims: PathDelims) -> IResult<&str, Path> {
    let (buf, segment) = segment_name(buf)?;
    let (buf, occurrence) = opt(preceded(char(delims.occurrence), number(delims)))(buf)?;
    let (buf, field) = opt(preceded(char(delims.level), number(delims)))(buf)?;

    let (buf, repetition, component) = if field.is_some() {
        let (buf, repetition) = opt(preceded(char(delims.occurrence), number(delims)))(buf)?;
        let (buf, component) = opt(preceded(char(delims.level), number(delims)))(buf)?;
        (buf, repetition, component)
    } else {
        (buf, None, None)
    };
    let (buf, subcomponent) = if component.is_some() {
        opt(preceded(char(delims.level), number(delims)))(buf)?
    } else {
        (buf, None)
    };

    Ok((
        buf,
        Path {
            segment: segment.to_string(),
            occurrence,
            field,
            repetition,
            component,
            subcomponent,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(path: &str) -> Result<Path, Error> {
        Path::parse(path, PathDelims::default())
    }

    #[test]
    fn test_full_path() {
        assert_eq!(
            parse("OBX:2-5:3-1-2").unwrap(),
            Path {
                segment: "OBX".to_string(),
                occurrence: Some(2),
                field: Some(5),
                repetition: Some(3),
                component: Some(1),
                subcomponent: Some(2),
            }
        );
    }

    #[test]
    fn test_short_paths() {
        let p = parse("MSH").unwrap();
        assert_eq!(p.segment, "MSH");
        assert_eq!((p.occurrence, p.field), (None, None));

        let p = parse("MSH-6:2").unwrap();
        assert_eq!((p.field, p.repetition, p.component), (Some(6), Some(2), None));

        let p = parse("PID-3-1").unwrap();
        assert_eq!((p.field, p.repetition, p.component), (Some(3), None, Some(1)));
    }

    #[test]
    fn test_number_suffix() {
        let p = parse("OBX:2nd-6th field").unwrap();
        assert_eq!((p.occurrence, p.field), (Some(2), Some(6)));
    }

    #[test]
    fn test_custom_delims() {
        let delims = PathDelims {
            occurrence: '#',
            level: '.',
        };
        let p = Path::parse("OBX#2.5#1.3", delims).unwrap();
        assert_eq!(p.occurrence, Some(2));
        assert_eq!(p.component, Some(3));
        assert_eq!(p.to_string_with(delims), "OBX#2.5#1.3");
    }

    #[test]
    fn test_invalid_paths() {
        for bad in &["", "MS", "MSH-", "MSH-x", "MSH:0", "MSH-3:0", "MSH-3-0", "MSH-1-2-3-4"] {
            assert_matches!(parse(bad), Err(Error::InvalidPath(_)), "{}", bad);
        }
    }
}
