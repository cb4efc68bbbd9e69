/// Default number of words per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A window of consecutive words taken from one uploaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub filename: String,
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// Vector record identifier: `<filename>-chunk-<index>`
    pub fn id(&self) -> String {
        format!("{}-chunk-{}", self.filename, self.index)
    }

    #[cfg(test)]
    pub fn word_count(&self) -> usize {
        self.text.split(' ').count()
    }
}

/// Split text into windows of at most `chunk_size` words.
///
/// Words are whatever lies between single space characters; no other
/// whitespace is treated as a separator, so newlines and tabs stay inside
/// words. Windows do not overlap and the last one may be shorter. Text that
/// is empty or whitespace-only produces no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let words: Vec<&str> = text.split(' ').collect();

    words
        .chunks(chunk_size.max(1))
        .map(|window| window.join(" "))
        .collect()
}

/// Chunk a document's text, tagging every chunk with its filename and position
pub fn chunk_document(filename: &str, text: &str, chunk_size: usize) -> Vec<Chunk> {
    chunk_text(text, chunk_size)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            filename: filename.to_string(),
            index,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_chunk_text_short() {
        let chunks = chunk_text("Short text.", 500);
        assert_eq!(chunks, vec!["Short text.".to_string()]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 500).is_empty());
        assert!(chunk_text("  \n\t ", 500).is_empty());
    }

    #[test]
    fn test_chunk_text_1200_words() {
        let chunks = chunk_document("notes.txt", &words(1200), 500);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.word_count()).collect();
        assert_eq!(sizes, vec![500, 500, 200]);

        let ids: Vec<String> = chunks.iter().map(|c| c.id()).collect();
        assert_eq!(
            ids,
            vec!["notes.txt-chunk-0", "notes.txt-chunk-1", "notes.txt-chunk-2"]
        );
        assert!(chunks[1].text.starts_with("w500 "));
    }

    #[test]
    fn test_chunk_text_only_splits_on_spaces() {
        let chunks = chunk_text("one\ntwo three\tfour", 2);
        assert_eq!(chunks, vec!["one\ntwo three\tfour".to_string()]);

        let chunks = chunk_text("a  b", 1);
        assert_eq!(chunks, vec!["a", "", "b"]);
    }

    #[test]
    fn test_chunk_size_zero_is_clamped() {
        assert_eq!(chunk_text("a b", 0), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn chunks_reconstruct_word_sequence(
            source in prop::collection::vec("[a-z]{1,8}", 1..1500),
            chunk_size in 1usize..600,
        ) {
            let text = source.join(" ");
            let chunks = chunk_text(&text, chunk_size);

            prop_assert_eq!(chunks.len(), source.len().div_ceil(chunk_size));
            for chunk in &chunks {
                prop_assert!(chunk.split(' ').count() <= chunk_size);
            }

            let rejoined = chunks.join(" ");
            let resplit: Vec<&str> = rejoined.split(' ').collect();
            prop_assert_eq!(resplit, source.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
