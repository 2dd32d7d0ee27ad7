use super::path::{Path, PathDelims};
use super::{Delimiters, Error};
use lazy_static::lazy_static;
use log::*;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};

lazy_static! {
    static ref SEGMENT_NAME: Regex = Regex::new(r"^[A-Z][A-Z][A-Z0-9]$").unwrap();
}

/// Segments whose first fields carry the delimiters
pub const DELIMITER_SEGMENTS: [&str; 3] = ["MSH", "FHS", "BHS"];

/// Subcomponent values, `None` where nothing was ever set
pub type Component = Vec<Option<String>>;
/// Components of one repetition
pub type Repetition = Vec<Component>;
/// Repetitions of one field
pub type Field = Vec<Repetition>;
/// Fields of one segment, field zero holds the segment name
pub type Segment = Vec<Field>;

/// True if `name` is a valid segment name
pub fn is_segment_name(name: &str) -> bool {
    SEGMENT_NAME.is_match(name)
}

/// True for segments that carry delimiters, judged by the start of `segment`
pub fn has_delimiters(segment: &str) -> bool {
    DELIMITER_SEGMENTS.iter().any(|d| segment.starts_with(d))
}

/// A numeric address into a message, all levels counted from zero
///
/// `None` at a level stops the address there, which is how [`Hl7Msg::size_at`] and
/// [`Hl7Msg::clear_at`] learn which level is meant. Value access treats `None` as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Index {
    /// Position of the segment in the message
    pub segment: Option<usize>,
    /// Field number, zero being the segment name
    pub field: Option<usize>,
    /// Repetition of the field
    pub repetition: Option<usize>,
    /// Component of the repetition
    pub component: Option<usize>,
    /// Subcomponent of the component
    pub subcomponent: Option<usize>,
}

impl Index {
    /// Addresses a single value
    pub fn leaf(
        segment: usize,
        field: usize,
        repetition: usize,
        component: usize,
        subcomponent: usize,
    ) -> Self {
        Self {
            segment: Some(segment),
            field: Some(field),
            repetition: Some(repetition),
            component: Some(component),
            subcomponent: Some(subcomponent),
        }
    }

    /// Addresses a whole segment
    pub fn segment(segment: usize) -> Self {
        Self {
            segment: Some(segment),
            ..Default::default()
        }
    }
}

/// An HL7 message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hl7Msg {
    segments: Vec<Segment>,
    path_delims: PathDelims,
}

impl Hl7Msg {
    /// An empty message
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses bar delimited text
    pub fn parse(text: &str) -> Result<Self, Error> {
        super::de::parse(text)
    }

    /// Formats the message with the default delimiters
    pub fn format(&self) -> Result<String, Error> {
        super::ser::format(self, &Delimiters::default())
    }

    /// Formats the message with a delimiter string such as `|^~\&`
    pub fn format_with(&self, delimiters: &str) -> Result<String, Error> {
        super::ser::format(self, &Delimiters::parse(delimiters)?)
    }

    /// Changes the characters used by the path grammar
    pub fn set_path_delims(&mut self, occurrence: char, level: char) {
        self.path_delims = PathDelims { occurrence, level };
    }

    /// The characters used by the path grammar
    pub fn path_delims(&self) -> PathDelims {
        self.path_delims
    }

    /// All segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Name of the segment at `index`
    pub fn segment_name(&self, index: usize) -> Option<&str> {
        self.get_at(&Index::leaf(index, 0, 0, 0, 0))
    }

    /// Finds the `occurrence`th segment named `name`, counting from one
    pub fn find_segment(&self, name: &str, occurrence: usize) -> Option<usize> {
        if occurrence == 0 {
            return None;
        }
        (0..self.segments.len())
            .filter(|i| self.segment_name(*i) == Some(name))
            .nth(occurrence - 1)
    }

    /// Index of the segment named by a path such as `OBX:2`
    pub fn segment_index(&self, path: &str) -> Option<usize> {
        let path = Path::parse(path, self.path_delims).ok()?;
        self.find_segment(&path.segment, path.occurrence.unwrap_or(1))
    }

    /// Path of the segment at `index`, in the form `NAME:occurrence`
    pub fn segment_path(&self, index: usize) -> Option<String> {
        let name = self.segment_name(index)?;
        let occurrence = (0..=index)
            .filter(|i| self.segment_name(*i) == Some(name))
            .count();
        Some(format!("{}{}{}", name, self.path_delims.occurrence, occurrence))
    }

    /// Inserts a new segment at `at`, which may equal the segment count to append
    ///
    /// Returns the path of the new segment.
    pub fn add_segment(&mut self, at: usize, name: &str) -> Result<String, Error> {
        if !is_segment_name(name) {
            return Err(Error::InvalidSegmentName(name.to_string()));
        }
        if at > self.segments.len() {
            return Err(Error::InvalidPath(format!("segment index {}", at)));
        }
        self.segments
            .insert(at, vec![vec![vec![vec![Some(name.to_string())]]]]);
        self.segment_path(at)
            .ok_or_else(|| Error::InvalidPath(format!("segment index {}", at)))
    }

    /// Adds a segment after the last one
    pub fn append_segment(&mut self, name: &str) -> Result<String, Error> {
        self.add_segment(self.segments.len(), name)
    }

    /// Adds a segment in front of the segment named by `path`
    pub fn insert_segment(&mut self, path: &str, name: &str) -> Result<String, Error> {
        let at = self
            .segment_index(path)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        self.add_segment(at, name)
    }

    /// Adds a segment after the segment named by `path`
    pub fn append_segment_after(&mut self, path: &str, name: &str) -> Result<String, Error> {
        let at = self
            .segment_index(path)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        self.add_segment(at + 1, name)
    }

    /// Resolves a path to an index
    ///
    /// For value access every missing level is zero. Otherwise missing levels stay `None`
    /// except the repetition, which is zero once a component is named.
    pub fn resolve(&self, path: &str, value_access: bool) -> Result<Index, Error> {
        let parsed = Path::parse(path, self.path_delims)?;
        let segment = self
            .find_segment(&parsed.segment, parsed.occurrence.unwrap_or(1))
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let from_one = |n: Option<usize>| n.map(|n| n - 1);

        let mut index = Index {
            segment: Some(segment),
            field: parsed.field,
            repetition: from_one(parsed.repetition),
            component: from_one(parsed.component),
            subcomponent: from_one(parsed.subcomponent),
        };
        if value_access {
            index.field.get_or_insert(0);
            index.repetition.get_or_insert(0);
            index.component.get_or_insert(0);
            index.subcomponent.get_or_insert(0);
        } else if index.component.is_some() && index.repetition.is_none() {
            index.repetition = Some(0);
        }
        Ok(index)
    }

    /// Gets the value at a path such as `PID-5-1`
    pub fn get(&self, path: &str) -> Option<&str> {
        let index = self.resolve(path, true).ok()?;
        self.get_at(&index)
    }

    /// Sets the value at a path, creating the levels in between
    ///
    /// The segment must already exist.
    pub fn set<T: Into<String>>(&mut self, path: &str, value: T) -> Result<(), Error> {
        let index = self.resolve(path, true)?;
        if self.set_at(&index, value) {
            Ok(())
        } else {
            Err(Error::InvalidPath(path.to_string()))
        }
    }

    /// Removes everything at and below a path
    ///
    /// An empty path clears the message. A segment path removes that segment. Paths that
    /// do not resolve are ignored.
    pub fn clear(&mut self, path: &str) {
        if path.is_empty() {
            self.clear_at(&Index::default());
            return;
        }
        match self.resolve(path, false) {
            Ok(index) => self.clear_at(&index),
            Err(e) => debug!("Nothing to clear: {}", e),
        }
    }

    /// Number of elements one level below the deepest level named by a path
    ///
    /// An empty path counts the segments.
    pub fn size(&self, path: &str) -> usize {
        if path.is_empty() {
            return self.segments.len();
        }
        match self.resolve(path, false) {
            Ok(index) => self.size_at(&index),
            Err(_) => 0,
        }
    }

    /// Gets a value by index
    pub fn get_at(&self, index: &Index) -> Option<&str> {
        self.segments
            .get(index.segment.unwrap_or(0))?
            .get(index.field.unwrap_or(0))?
            .get(index.repetition.unwrap_or(0))?
            .get(index.component.unwrap_or(0))?
            .get(index.subcomponent.unwrap_or(0))?
            .as_deref()
    }

    /// Sets a value by index, growing every level below the segment as needed
    ///
    /// Returns false if the segment does not exist.
    pub fn set_at<T: Into<String>>(&mut self, index: &Index, value: T) -> bool {
        let segment = match self.segments.get_mut(index.segment.unwrap_or(0)) {
            Some(segment) => segment,
            None => return false,
        };
        let field = grow(segment, index.field.unwrap_or(0));
        let repetition = grow(field, index.repetition.unwrap_or(0));
        let component = grow(repetition, index.component.unwrap_or(0));
        *grow(component, index.subcomponent.unwrap_or(0)) = Some(value.into());
        true
    }

    /// Removes everything at and below the deepest level of an index
    pub fn clear_at(&mut self, index: &Index) {
        let s = match index.segment {
            None => {
                self.segments.clear();
                return;
            }
            Some(s) if s < self.segments.len() => s,
            Some(_) => return,
        };
        let f = match index.field {
            None => {
                self.segments.remove(s);
                return;
            }
            Some(f) => f,
        };
        let field = match self.segments[s].get_mut(f) {
            Some(field) => field,
            None => return,
        };
        let r = match index.repetition {
            None => return field.clear(),
            Some(r) => r,
        };
        let repetition = match field.get_mut(r) {
            Some(repetition) => repetition,
            None => return,
        };
        let c = match index.component {
            None => return repetition.clear(),
            Some(c) => c,
        };
        let component = match repetition.get_mut(c) {
            Some(component) => component,
            None => return,
        };
        match index.subcomponent {
            None => component.clear(),
            Some(sub) => {
                if let Some(value) = component.get_mut(sub) {
                    *value = None;
                }
            }
        }
    }

    /// Number of elements one level below the deepest level of an index
    pub fn size_at(&self, index: &Index) -> usize {
        let segment = match index.segment {
            None => return self.segments.len(),
            Some(s) => self.segments.get(s),
        };
        let field = match (segment, index.field) {
            (None, _) => return 0,
            (Some(segment), None) => return segment.len(),
            (Some(segment), Some(f)) => segment.get(f),
        };
        let repetition = match (field, index.repetition) {
            (None, _) => return 0,
            (Some(field), None) => return field.len(),
            (Some(field), Some(r)) => field.get(r),
        };
        let component = match (repetition, index.component) {
            (None, _) => return 0,
            (Some(repetition), None) => return repetition.len(),
            (Some(repetition), Some(c)) => repetition.get(c),
        };
        component.map(|c| c.len()).unwrap_or(0)
    }

    /// A whole field with all repetitions, components and subcomponents
    pub fn field(&self, segment: usize, field: usize) -> Option<&Field> {
        self.segments.get(segment)?.get(field)
    }

    /// Replaces a whole field, returning false if the segment does not exist
    pub fn set_field(&mut self, segment: usize, field: usize, value: Field) -> bool {
        match self.segments.get_mut(segment) {
            Some(segment) => {
                *grow(segment, field) = value;
                true
            }
            None => false,
        }
    }
}

/// Gets an element of a list, first extending the list with defaults if it is too short
fn grow<T: Default>(list: &mut Vec<T>, index: usize) -> &mut T {
    if list.len() <= index {
        list.resize_with(index + 1, T::default);
    }
    &mut list[index]
}

/// Formats a time as an HL7 `yyyyMMddHHmmss` timestamp
pub fn hl7_date(when: OffsetDateTime) -> String {
    when.format(format_description!(
        "[year][month][day][hour][minute][second]"
    ))
    .unwrap_or_default()
}

/// The current local time as an HL7 timestamp
///
/// Falls back to UTC where the local offset cannot be determined.
pub fn hl7_now() -> String {
    hl7_date(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
}
