//! Deterministic object-store path derivation.
//!
//! Every path is a pure function of `(partner, record id, ordinal)`. Two runs
//! for the same record and ordinal always compute the same path; this is the
//! idempotence key for the whole ingest fast path, so nothing here may depend
//! on time, randomness, or completion order.
//!
//! Layout:
//!
//! ```text
//! {partner}/images/{id[0]}/{id[1]}/{id[2]}/{id[3]}/{id}/{ordinal}_{id}   media
//! {partner}/images/{id[0]}/{id[1]}/{id[2]}/{id[3]}/{id}/dpla-map.json   raw record
//! {partner}/images/{id[0]}/{id[1]}/{id[2]}/{id[3]}/{id}/iiif.json       raw manifest
//! {partner}/images/{id[0]}/{id[1]}/{id[2]}/{id[3]}/{id}/file-list.txt   asset URLs
//! ```
//!
//! The first four characters of the record id partition records for fan-out.

use object_store::path::Path;

/// Returns the per-record prefix `{partner}/images/{a}/{b}/{c}/{d}/{id}`.
#[must_use]
pub fn record_prefix(partner: &str, record_id: &str) -> Path {
    let mut chars = record_id.chars();
    let a = chars.next().unwrap_or('0');
    let b = chars.next().unwrap_or('0');
    let c = chars.next().unwrap_or('0');
    let d = chars.next().unwrap_or('0');
    Path::from(format!("{partner}/images/{a}/{b}/{c}/{d}/{record_id}"))
}

/// Returns the destination path for one media asset.
///
/// `ordinal` is the 1-based, order-significant position assigned during
/// manifest resolution.
#[must_use]
pub fn asset_path(partner: &str, record_id: &str, ordinal: usize) -> Path {
    Path::from(format!(
        "{}/{ordinal}_{record_id}",
        record_prefix(partner, record_id)
    ))
}

/// Returns the path of the raw-metadata side file.
#[must_use]
pub fn metadata_path(partner: &str, record_id: &str) -> Path {
    Path::from(format!("{}/dpla-map.json", record_prefix(partner, record_id)))
}

/// Returns the path of the raw-manifest side file.
#[must_use]
pub fn manifest_path(partner: &str, record_id: &str) -> Path {
    Path::from(format!("{}/iiif.json", record_prefix(partner, record_id)))
}

/// Returns the path of the ordered asset-URL list side file.
#[must_use]
pub fn file_list_path(partner: &str, record_id: &str) -> Path {
    Path::from(format!("{}/file-list.txt", record_prefix(partner, record_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_prefix_partitions_on_first_four_chars() {
        let prefix = record_prefix("nara", "4f302d0cc3a7bc0ecf0b5325b0f295e7");
        assert_eq!(
            prefix.as_ref(),
            "nara/images/4/f/3/0/4f302d0cc3a7bc0ecf0b5325b0f295e7"
        );
    }

    #[test]
    fn test_asset_path_includes_ordinal() {
        let path = asset_path("nara", "4f302d0cc3a7bc0ecf0b5325b0f295e7", 2);
        assert_eq!(
            path.as_ref(),
            "nara/images/4/f/3/0/4f302d0cc3a7bc0ecf0b5325b0f295e7/2_4f302d0cc3a7bc0ecf0b5325b0f295e7"
        );
    }

    #[test]
    fn test_asset_path_is_deterministic() {
        let first = asset_path("p", "abcd1234", 1);
        let second = asset_path("p", "abcd1234", 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_side_file_paths_share_record_prefix() {
        let prefix = record_prefix("ohio", "deadbeef").to_string();
        assert_eq!(
            metadata_path("ohio", "deadbeef").as_ref(),
            format!("{prefix}/dpla-map.json")
        );
        assert_eq!(
            manifest_path("ohio", "deadbeef").as_ref(),
            format!("{prefix}/iiif.json")
        );
        assert_eq!(
            file_list_path("ohio", "deadbeef").as_ref(),
            format!("{prefix}/file-list.txt")
        );
    }

    #[test]
    fn test_short_record_id_pads_partitions() {
        let prefix = record_prefix("p", "ab");
        assert_eq!(prefix.as_ref(), "p/images/a/b/0/0/ab");
    }
}
