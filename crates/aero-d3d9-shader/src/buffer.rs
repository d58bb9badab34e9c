pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Append-only text buffer stored as a chain of fixed-capacity blocks.
///
/// Appends never move previously written text. A string longer than the block size gets a block
/// of its own, so blocks always end on a UTF-8 character boundary.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    block_size: usize,
    blocks: Vec<String>,
    len: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl OutputBuffer {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let fits = self
            .blocks
            .last()
            .is_some_and(|b| b.capacity() - b.len() >= s.len());
        if !fits {
            self.blocks
                .push(String::with_capacity(self.block_size.max(s.len())));
        }
        if let Some(block) = self.blocks.last_mut() {
            block.push_str(s);
        }
        self.len += s.len();
    }

    /// Joins every block into one string.
    #[cfg(test)]
    pub fn flatten(&self) -> String {
        let mut out = String::with_capacity(self.len);
        self.append_to(&mut out);
        out
    }

    fn append_to(&self, out: &mut String) {
        for block in &self.blocks {
            out.push_str(block);
        }
    }

    /// Concatenates several buffers, allocating the result once.
    pub fn concat<'a>(buffers: impl IntoIterator<Item = &'a OutputBuffer> + Clone) -> String {
        let total = buffers.clone().into_iter().map(OutputBuffer::len).sum();
        let mut out = String::with_capacity(total);
        for buffer in buffers {
            buffer.append_to(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_across_blocks() {
        let mut buf = OutputBuffer::new(4);
        buf.push_str("ab");
        buf.push_str("cd");
        buf.push_str("efghij");
        buf.push_str("42");
        assert_eq!(buf.len(), 12);
        assert_eq!(buf.flatten(), "abcdefghij42");
    }

    #[test]
    fn multibyte_text_survives_block_splits() {
        let mut buf = OutputBuffer::new(3);
        buf.push_str("é");
        buf.push_str("ü→");
        assert_eq!(buf.flatten(), "éü→");
    }

    #[test]
    fn concat_skips_empty_buffers() {
        let mut a = OutputBuffer::new(8);
        let b = OutputBuffer::new(8);
        let mut c = OutputBuffer::new(8);
        a.push_str("first\n");
        c.push_str("third\n");
        assert_eq!(OutputBuffer::concat([&a, &b, &c]), "first\nthird\n");
    }
}
