use crate::data::DynScalar;

/// Compression filter requested at variable creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    /// Deflate with the given level.
    Gzip(u32),
    Szip { options: u32, pixels_per_block: u32 },
}

/// Optional settings applied when a variable is created.
///
/// Engines that cannot honour chunking or compression still record them; see
/// [`crate::backend::Capabilities`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCreationParams {
    pub fill_value: Option<DynScalar>,
    pub chunks: Option<Vec<usize>>,
    pub compression: Option<Compression>,
}

impl VariableCreationParams {
    pub fn with_fill_value<T: Into<DynScalar>>(mut self, fill: T) -> Self {
        self.fill_value = Some(fill.into());
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<usize>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}
