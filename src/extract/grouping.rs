//! Grouping of captured images into logical output images.
//!
//! Several network images can belong to one logical image (split halves
//! served under part-suffixed names). Those collapse into a single group
//! that the sink stitches vertically.

use serde::{Deserialize, Serialize};

use crate::models::{ImageGroup, ImageRecord};

/// Prefix of every group name; group names are relative to the artwork
/// directory.
pub const IMAGES_PREFIX: &str = "./images/";

/// How image URLs map to group keys.
///
/// `PartStem` merges `A_p0.jpg` and `A_p1.jpg` into one stitched `A.jpg`,
/// which is right when a page serves one illustration split into parts.
/// Full-size album URLs also use `<id>_p<N>` for distinct pages, so when a
/// page exposes those, `PartStem` stitches the whole album into a single
/// image. Pick `ExactFilename` to keep every page as its own file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// Key is the file stem with any trailing `_p<digits>` part suffix removed.
    #[default]
    PartStem,
    /// Key is the whole last path segment.
    ExactFilename,
}

/// Last path segment of a URL, without query or fragment.
fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn strip_part_suffix(stem: &str) -> &str {
    match stem.rsplit_once("_p") {
        Some((base, digits))
            if !base.is_empty()
                && !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => stem,
    }
}

/// Group key and extension for one image URL.
pub fn group_key(url: &str, mode: GroupingMode) -> (String, Option<String>) {
    let name = file_name(url);
    match mode {
        GroupingMode::ExactFilename => (name.to_string(), None),
        GroupingMode::PartStem => {
            let (stem, ext) = match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext.to_string())),
                _ => (name, None),
            };
            (strip_part_suffix(stem).to_string(), ext)
        }
    }
}

/// Collapse images into groups. Groups appear in first-seen order and keep
/// their members in original order.
pub fn group_images(images: Vec<ImageRecord>, mode: GroupingMode) -> Vec<ImageGroup> {
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<ImageGroup> = Vec::new();

    for image in images {
        let (key, ext) = group_key(&image.source_url, mode);
        match keys.iter().position(|k| *k == key) {
            Some(idx) => groups[idx].images.push(image),
            None => {
                let file = match ext {
                    Some(ext) => format!("{}.{}", key, ext),
                    None => key.clone(),
                };
                keys.push(key);
                groups.push(ImageGroup {
                    name: format!("{}{}", IMAGES_PREFIX, file),
                    images: vec![image],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str, byte: u8) -> ImageRecord {
        ImageRecord {
            source_url: url.to_string(),
            bytes: vec![byte],
        }
    }

    #[test]
    fn part_suffixed_images_share_a_group() {
        let groups = group_images(
            vec![
                image("https://i.pximg.net/img-original/A_p0.jpg", 0),
                image("https://i.pximg.net/img-original/B.jpg", 2),
                image("https://i.pximg.net/img-original/A_p1.jpg", 1),
            ],
            GroupingMode::PartStem,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "./images/A.jpg");
        assert_eq!(
            groups[0].images.iter().map(|i| i.bytes[0]).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(groups[0].is_composite());
        assert_eq!(groups[1].name, "./images/B.jpg");
        assert_eq!(groups[1].images.len(), 1);
        assert!(!groups[1].is_composite());
    }

    #[test]
    fn exact_mode_only_merges_identical_file_names() {
        let groups = group_images(
            vec![
                image("https://i.pximg.net/a/A_p0.jpg", 0),
                image("https://i.pximg.net/b/A_p0.jpg", 1),
                image("https://i.pximg.net/a/A_p1.jpg", 2),
            ],
            GroupingMode::ExactFilename,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "./images/A_p0.jpg");
        assert_eq!(groups[0].images.len(), 2);
        assert_eq!(groups[1].name, "./images/A_p1.jpg");
    }

    #[test]
    fn album_pages_stay_separate_in_exact_mode() {
        let pages = || {
            vec![
                image("https://i.pximg.net/img-original/img/2024/01/02/1001_p0.png", 0),
                image("https://i.pximg.net/img-original/img/2024/01/02/1001_p1.png", 1),
            ]
        };

        let stitched = group_images(pages(), GroupingMode::PartStem);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].name, "./images/1001.png");

        let separate = group_images(pages(), GroupingMode::ExactFilename);
        assert_eq!(
            separate.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["./images/1001_p0.png", "./images/1001_p1.png"]
        );
    }

    #[test]
    fn key_ignores_query_and_keeps_unsuffixed_stems() {
        assert_eq!(
            group_key("https://i.pximg.net/x/123_p0.png?v=2", GroupingMode::PartStem),
            ("123".to_string(), Some("png".to_string()))
        );
        assert_eq!(
            group_key(
                "https://i.pximg.net/x/123_p0_master1200.jpg",
                GroupingMode::PartStem
            ),
            ("123_p0_master1200".to_string(), Some("jpg".to_string()))
        );
        assert_eq!(
            group_key("https://i.pximg.net/x/_p3.jpg", GroupingMode::PartStem).0,
            "_p3"
        );
        assert_eq!(
            group_key("https://i.pximg.net/x/noext", GroupingMode::PartStem),
            ("noext".to_string(), None)
        );
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(group_images(Vec::new(), GroupingMode::PartStem).is_empty());
    }
}
