//! Reading-time estimate for a post body.

use super::posts::ContentBlock;

pub const WORDS_PER_MINUTE: usize = 200;

/// Whitespace-delimited words across every heading and body fragment.
pub fn word_count(blocks: &[ContentBlock]) -> usize {
    blocks
        .iter()
        .map(|block| {
            let heading = block.heading.split_whitespace().count();
            let body: usize = block
                .body
                .iter()
                .map(|fragment| fragment.text.split_whitespace().count())
                .sum();
            heading + body
        })
        .sum()
}

/// Whole minutes needed to read `blocks`, rounded up.
pub fn reading_time_minutes(blocks: &[ContentBlock]) -> u32 {
    let minutes = word_count(blocks).div_ceil(WORDS_PER_MINUTE);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rich_text::RichTextNode;

    fn block(heading: &str, fragments: &[&str]) -> ContentBlock {
        ContentBlock::new(
            heading,
            fragments
                .iter()
                .map(|text| RichTextNode::paragraph(*text))
                .collect(),
        )
    }

    fn words(count: usize) -> String {
        vec!["palavra"; count].join(" ")
    }

    #[test]
    fn empty_content_takes_no_time() {
        assert_eq!(reading_time_minutes(&[]), 0);
        assert_eq!(reading_time_minutes(&[block("", &[])]), 0);
    }

    #[test]
    fn counts_headings_and_fragments() {
        let blocks = [
            block("Proin et varius", &["Lorem ipsum dolor", "sit amet"]),
            block("Cras laoreet", &["mi"]),
        ];
        assert_eq!(word_count(&blocks), 3 + 3 + 2 + 2 + 1);
    }

    #[test]
    fn splitting_ignores_repeated_whitespace() {
        let blocks = [block("  a\tb  ", &["c\n\nd   e"])];
        assert_eq!(word_count(&blocks), 5);
    }

    #[test]
    fn rounds_up_to_whole_minutes() {
        assert_eq!(reading_time_minutes(&[block("", &[words(1).as_str()])]), 1);
        assert_eq!(reading_time_minutes(&[block("", &[words(200).as_str()])]), 1);
        assert_eq!(reading_time_minutes(&[block("", &[words(201).as_str()])]), 2);
        assert_eq!(reading_time_minutes(&[block("", &[words(400).as_str()])]), 2);
    }

    #[test]
    fn sums_across_blocks_before_rounding() {
        let blocks = [
            block("", &[words(150).as_str()]),
            block("", &[words(150).as_str()]),
        ];
        assert_eq!(reading_time_minutes(&blocks), 2);
    }

    #[test]
    fn appending_blocks_never_decreases_the_estimate() {
        let mut blocks = Vec::new();
        let mut previous = 0;
        for size in [0, 7, 193, 1, 250, 0, 399] {
            blocks.push(block("Seção", &[words(size).as_str()]));
            let current = reading_time_minutes(&blocks);
            assert!(current >= previous, "{current} < {previous}");
            previous = current;
        }
    }
}
