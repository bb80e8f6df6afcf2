use crate::chapter::Chapter;

/// Maps char offsets to the chapter containing them.
pub struct ChapterLocator<'c> {
    chapters: &'c [Chapter],
}

impl<'c> ChapterLocator<'c> {
    /// `chapters` must be ordered by `start`, as the segmenter produces them.
    pub fn new(chapters: &'c [Chapter]) -> Self {
        Self { chapters }
    }

    /// Index into the chapter slice, or `None` for preamble offsets and
    /// offsets past the last chapter.
    pub fn locate(&self, offset: usize) -> Option<usize> {
        let after = self.chapters.partition_point(|c| c.start <= offset);
        let candidate = after.checked_sub(1)?;
        self.chapters[candidate]
            .contains(offset)
            .then_some(candidate)
    }

    pub fn chapter(&self, offset: usize) -> Option<&'c Chapter> {
        self.locate(offset).map(|i| &self.chapters[i])
    }
}
