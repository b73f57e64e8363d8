use std::fmt;
use std::ops::Range;

/// Identifies a file registered in a [`FileIdMap`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A span of text in a source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// The index of the first byte in the span.
    pub start: u32,
    /// The index of the first byte after the span.
    pub end: u32,
    pub file_id: FileId,
}

impl Span {
    pub fn new(file_id: FileId, range: Range<usize>) -> Self {
        Self {
            start: range.start as u32,
            end: range.end as u32,
            file_id,
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Anything that can point at a location in a source file.
pub trait GetSpan {
    fn span(&self) -> Span;
}

impl GetSpan for Span {
    fn span(&self) -> Span {
        *self
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spanned<T>(pub T, pub Span);

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}..{}) ", self.1.start, self.1.end)?;
        self.0.fmt(f)
    }
}

impl<T> GetSpan for Spanned<T> {
    fn span(&self) -> Span {
        self.1
    }
}

/// Maps [`FileId`]s to the name and contents of every file seen so far.
#[derive(Debug, Default)]
pub struct FileIdMap {
    files: Vec<(String, String)>,
}

impl FileIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file by display name and contents. The file need not exist on disk.
    pub fn create_virtual_file(&mut self, name: &str, source: String) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push((name.to_string(), source));
        id
    }

    pub fn get_virtual_source(&self, id: FileId) -> &str {
        &self.files[id.0 as usize].1
    }

    pub fn get_file_display(&self, id: FileId) -> String {
        self.files[id.0 as usize].0.clone()
    }
}
