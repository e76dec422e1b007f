//! Record matcher

use crate::record::RemoteRecord;

/// First remote record whose name equals `name` exactly
///
/// Names are assumed unique within a snapshot; duplicates are not detected.
pub fn find_remote<'a>(name: &str, remote: &'a [RemoteRecord]) -> Option<&'a RemoteRecord> {
    remote.iter().find(|record| record.name() == name)
}
