//! Image ordering: stable sequence positions for uploaded images and the
//! storage-relative paths derived from them.
//!
//! Orders are assigned append-only: a new batch starts right after the
//! current maximum and never renumbers images that already have a position.

use super::{DomainError, DomainResult};

/// Assign order values to a batch of new images given the highest order
/// already present on the owner (`None` when it has no images yet).
pub fn next_orders(max_existing: Option<i64>, batch_len: usize) -> DomainResult<Vec<i64>> {
    if batch_len == 0 {
        return Err(DomainError::InvalidArgument(
            "image batch must not be empty".to_string(),
        ));
    }

    let start = max_existing.map_or(0, |max| max + 1);
    Ok((0..batch_len as i64).map(|i| start + i).collect())
}

/// Storage-relative path for one uploaded image:
/// `feeds/<feed_id>/image_<order>_<filename>`.
///
/// The client-supplied filename may carry platform path separators; only
/// its final component is kept, and the result always uses forward slashes.
pub fn image_relative_path(feed_id: &str, order: i64, filename: &str) -> String {
    let name = sanitize_filename(filename);
    format!("feeds/{feed_id}/image_{order}_{name}")
}

/// Strip any directory components from a client-supplied filename,
/// treating both `/` and `\` as separators.
fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_batch_starts_at_zero() {
        assert_eq!(next_orders(None, 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_batch_appends_after_max() {
        // Existing max order 4, three new images -> {5, 6, 7}.
        assert_eq!(next_orders(Some(4), 3).unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_repeated_calls_never_overlap() {
        let first = next_orders(None, 2).unwrap();
        let second = next_orders(first.iter().max().copied(), 2).unwrap();
        assert_eq!(second, vec![2, 3]);
        assert!(first.iter().all(|o| !second.contains(o)));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            next_orders(Some(4), 0),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_relative_path_shape() {
        assert_eq!(
            image_relative_path("feed-1", 5, "vase.jpg"),
            "feeds/feed-1/image_5_vase.jpg"
        );
    }

    #[test]
    fn test_path_separators_normalized() {
        // Windows-style client paths collapse to the bare filename.
        assert_eq!(
            image_relative_path("f", 0, r"C:\Photos\vase.jpg"),
            "feeds/f/image_0_vase.jpg"
        );
        assert_eq!(
            image_relative_path("f", 0, "albums/2024/vase.jpg"),
            "feeds/f/image_0_vase.jpg"
        );
    }

    #[test]
    fn test_blank_filename_gets_placeholder() {
        assert_eq!(image_relative_path("f", 1, "  "), "feeds/f/image_1_upload");
    }
}
