//! Turns raw file I/O rows into a [`Snapshot`].

use tracing::{debug, warn};

use super::{SampleError, Session};
use crate::model::{FileIo, Snapshot};

/// Cumulative InnoDB data-file I/O per file. Ordering is cosmetic.
pub const FILE_IO_QUERY: &str = r#"
    SELECT
        FILE_NAME,
        COUNT_READ,
        COUNT_WRITE,
        SUM_NUMBER_OF_BYTES_READ,
        SUM_NUMBER_OF_BYTES_WRITE
    FROM performance_schema.file_summary_by_instance
    WHERE EVENT_NAME = 'wait/io/file/innodb/innodb_data_file'
    ORDER BY COUNT_READ DESC
"#;

/// Derives the entity name from a data file path.
///
/// Takes the last path segment and drops everything from its last `.`:
/// `/var/lib/mysql/shop/orders.ibd` → `orders`.
pub fn entity_name(file_name: &str) -> &str {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(pos) => &base[..pos],
        None => base,
    }
}

/// Performs one poll against an open session.
#[derive(Debug, Default)]
pub struct Sampler;

impl Sampler {
    pub fn new() -> Self {
        Self
    }

    /// Samples through `session`, or fails with [`SampleError::NotConnected`].
    pub fn sample_checked(
        &self,
        session: Option<&mut (dyn Session + 'static)>,
    ) -> Result<Snapshot, SampleError> {
        match session {
            Some(session) => self.sample(session),
            None => Err(SampleError::NotConnected),
        }
    }

    /// Runs the query once and builds a snapshot. Never retries.
    pub fn sample(&self, session: &mut dyn Session) -> Result<Snapshot, SampleError> {
        let rows = session.fetch_file_io()?;

        let mut snapshot = Snapshot::new();
        for row in &rows {
            let name = entity_name(&row.file_name);
            if name.is_empty() {
                warn!(file = %row.file_name, "skipping file with empty entity name");
                continue;
            }
            if snapshot.contains(name) {
                debug!(entity = name, file = %row.file_name, "entity name collision, summing");
            }
            snapshot.record(
                name,
                FileIo::new(row.count_read, row.count_write, row.bytes_read, row.bytes_write),
            );
        }

        debug!(rows = rows.len(), entities = snapshot.len(), "file io sampled");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FileIoRow;
    use crate::collector::mock::MockSession;

    fn row(file_name: &str, count_read: u64) -> FileIoRow {
        FileIoRow {
            file_name: file_name.to_string(),
            count_read,
            count_write: 1,
            bytes_read: count_read * 16384,
            bytes_write: 16384,
        }
    }

    #[test]
    fn entity_name_strips_path_and_extension() {
        assert_eq!(entity_name("/var/lib/mysql/ibdata1.ibd"), "ibdata1");
        assert_eq!(entity_name("table_x.ibd"), "table_x");
        assert_eq!(entity_name("./shop/orders.ibd"), "orders");
        assert_eq!(entity_name("/var/lib/mysql/ibdata1"), "ibdata1");
        assert_eq!(entity_name("C:\\mysql\\data\\shop\\items.ibd"), "items");
    }

    #[test]
    fn entity_name_cuts_at_last_dot() {
        assert_eq!(entity_name("/data/a.b.ibd"), "a.b");
        assert_eq!(entity_name("/data/.hidden"), "");
        assert_eq!(entity_name("/data/dir/"), "");
    }

    #[test]
    fn sample_builds_snapshot_from_rows() {
        let mut session = MockSession::new(vec![Ok(vec![
            row("/var/lib/mysql/shop/orders.ibd", 10),
            row("/var/lib/mysql/ibdata1", 3),
        ])]);

        let snapshot = Sampler::new().sample(&mut session).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("orders"),
            Some(&FileIo::new(10, 1, 163840, 16384))
        );
        assert!(snapshot.contains("ibdata1"));
    }

    #[test]
    fn sample_sums_name_collisions_and_skips_empty_names() {
        let mut session = MockSession::new(vec![Ok(vec![
            row("/var/lib/mysql/a/users.ibd", 5),
            row("/var/lib/mysql/b/users.ibd", 2),
            row("/var/lib/mysql/.ibd", 100),
        ])]);

        let snapshot = Sampler::new().sample(&mut session).unwrap();
        assert_eq!(snapshot.len(), 1);
        let users = snapshot.get("users").unwrap();
        assert_eq!(users.count_read, 7);
        assert_eq!(users.count_write, 2);
    }

    #[test]
    fn sample_propagates_query_failure() {
        let mut session = MockSession::new(vec![Err(SampleError::QueryError(
            "server has gone away".to_string(),
        ))]);

        let err = Sampler::new().sample(&mut session).unwrap_err();
        assert!(matches!(err, SampleError::QueryError(_)));
    }

    #[test]
    fn sample_checked_without_session_is_not_connected() {
        let err = Sampler::new().sample_checked(None).unwrap_err();
        assert_eq!(err, SampleError::NotConnected);
    }
}
